// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! System User Lifecycle
//!
//! Login accounts on a managed host. The account password reaches the
//! workspace only as a SHA-512 crypt digest.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Create/delete ordinary user accounts on hosts

use async_trait::async_trait;
use tracing::{info, warn};

use crate::application::provisioning::{
    compensate, patch_record, settle, status_body, ticket, ProvisioningContext, ProvisioningError,
    ProvisioningTicket,
};
use crate::domain::repository::RecordQuery;
use crate::domain::resource::{Record, ResourceStatus, SystemUserRecord};
use crate::domain::tag::ProvisionTag;
use crate::domain::tenant::TenantId;
use crate::infrastructure::renderer::{RenderParams, UserParams};

/// Intent to create a login account on a managed host
#[derive(Debug, Clone)]
pub struct CreateSystemUser {
    pub server_id: String,
    pub username: String,
    /// Plaintext; only its digest reaches the workspace
    pub password: String,
    pub ssh_key_id: Option<String>,
}

#[async_trait]
pub trait SystemUserService: Send + Sync {
    async fn create(
        &self,
        tenant: &TenantId,
        request: CreateSystemUser,
    ) -> Result<ProvisioningTicket, ProvisioningError>;

    async fn delete(
        &self,
        tenant: &TenantId,
        user_id: &str,
    ) -> Result<ProvisioningTicket, ProvisioningError>;
}

pub struct StandardSystemUserService {
    ctx: ProvisioningContext,
}

impl StandardSystemUserService {
    pub fn new(ctx: ProvisioningContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SystemUserService for StandardSystemUserService {
    async fn create(
        &self,
        tenant: &TenantId,
        request: CreateSystemUser,
    ) -> Result<ProvisioningTicket, ProvisioningError> {
        let guard = self.ctx.locks.acquire(tenant).await;
        let store = self.ctx.store.clone();
        let server = self.ctx.load_server(tenant, &request.server_id).await?;

        let duplicate = RecordQuery::new()
            .eq("serverId", &request.server_id)
            .eq("username", &request.username);
        if store.find(SystemUserRecord::TABLE, &duplicate).await?.total > 0 {
            return Err(ProvisioningError::conflict(
                SystemUserRecord::TABLE,
                "username",
                &request.username,
            ));
        }

        let row = SystemUserRecord {
            id: None,
            tenant_id: tenant.clone(),
            username: request.username.clone(),
            server_id: request.server_id.clone(),
            ssh_key_id: request.ssh_key_id.clone(),
            status: ResourceStatus::Provisioning,
        };
        let (_, user_id) = self.ctx.create_record(&row).await?;
        let created = [(SystemUserRecord::TABLE, user_id.clone())];

        let params = RenderParams {
            user: Some(UserParams {
                username: Some(request.username.clone()),
                password: Some(request.password.clone()),
            }),
            ..Default::default()
        };
        let workspace = match self.ctx.prepare(tenant, &server, &params).await {
            Ok(workspace) => workspace,
            Err(e) => {
                self.ctx.compensate(&created).await;
                return Err(e);
            }
        };

        info!(tenant = %tenant, user_id = %user_id, username = %request.username, "Creating system user");
        let job = self
            .ctx
            .start(&workspace, &ProvisionTag::CreateSystemUser, &user_id);

        let id = user_id.clone();
        let settlement = settle(guard, job.clone(), move |status| async move {
            if status.is_success() {
                patch_record::<SystemUserRecord>(store.as_ref(), &id, status_body(ResourceStatus::Active))
                    .await?;
                info!(user_id = %id, "System user created");
            } else {
                compensate(store.as_ref(), &created).await;
            }
            Ok(())
        });

        Ok(ticket(user_id, job, settlement))
    }

    async fn delete(
        &self,
        tenant: &TenantId,
        user_id: &str,
    ) -> Result<ProvisioningTicket, ProvisioningError> {
        let guard = self.ctx.locks.acquire(tenant).await;
        let store = self.ctx.store.clone();
        let user = self.ctx.load_system_user(tenant, user_id).await?;
        let server = self.ctx.load_server(tenant, &user.server_id).await?;

        patch_record::<SystemUserRecord>(store.as_ref(), user_id, status_body(ResourceStatus::Deleting))
            .await?;

        let params = RenderParams {
            user: Some(UserParams {
                username: Some(user.username.clone()),
                password: None,
            }),
            ..Default::default()
        };
        let workspace = match self.ctx.prepare(tenant, &server, &params).await {
            Ok(workspace) => workspace,
            Err(e) => {
                if let Err(patch_err) = patch_record::<SystemUserRecord>(
                    store.as_ref(),
                    user_id,
                    status_body(ResourceStatus::Failed),
                )
                .await
                {
                    warn!(user_id, "Failed to mark system user failed: {}", patch_err);
                }
                return Err(e);
            }
        };

        info!(tenant = %tenant, user_id, username = %user.username, "Deleting system user");
        let job = self
            .ctx
            .start(&workspace, &ProvisionTag::DeleteSystemUser, user_id);

        let id = user_id.to_string();
        let settlement = settle(guard, job.clone(), move |status| async move {
            if status.is_success() {
                store.remove(SystemUserRecord::TABLE, &id).await?;
                info!(user_id = %id, "System user deleted");
            } else {
                patch_record::<SystemUserRecord>(store.as_ref(), &id, status_body(ResourceStatus::Failed))
                    .await?;
            }
            Ok(())
        });

        Ok(ticket(user_id.to_string(), job, settlement))
    }
}
