// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Server Lifecycle
//!
//! Brings hosts under management and forgets them again.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Connect and delete managed hosts
//!
//! The login given at connect time is kept on the `servers` row; every later
//! run against the host renders it again.

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::application::provisioning::{
    compensate, host_login, patch_record, remove_all, settle, ticket, ProvisioningContext,
    ProvisioningError, ProvisioningTicket,
};
use crate::domain::repository::RecordQuery;
use crate::domain::resource::{
    AppRecord, DatabaseRecord, HostFlags, Record, ResourceStatus, ServerRecord, SystemUserRecord,
};
use crate::domain::tag::ProvisionTag;
use crate::domain::tenant::TenantId;
use crate::infrastructure::renderer::RenderParams;

/// Intent to bring a host under management
#[derive(Debug, Clone)]
pub struct ConnectServer {
    pub name: String,
    pub ip: String,
    /// Login the automation uses on the host
    pub username: String,
    pub password: Option<String>,
    /// PEM private key staged into the workspace for key-based login
    pub private_key: Option<String>,
}

#[async_trait]
pub trait ServerService: Send + Sync {
    /// Register the host and run `connect` against it
    async fn connect(
        &self,
        tenant: &TenantId,
        request: ConnectServer,
    ) -> Result<ProvisioningTicket, ProvisioningError>;

    /// Forget a host that nothing references any more
    async fn delete(&self, tenant: &TenantId, server_id: &str) -> Result<(), ProvisioningError>;
}

pub struct StandardServerService {
    ctx: ProvisioningContext,
}

impl StandardServerService {
    pub fn new(ctx: ProvisioningContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ServerService for StandardServerService {
    async fn connect(
        &self,
        tenant: &TenantId,
        request: ConnectServer,
    ) -> Result<ProvisioningTicket, ProvisioningError> {
        let guard = self.ctx.locks.acquire(tenant).await;
        let store = self.ctx.store.clone();

        let duplicate = RecordQuery::new()
            .eq("tenantId", tenant)
            .eq("ip", &request.ip);
        if store.find(ServerRecord::TABLE, &duplicate).await?.total > 0 {
            return Err(ProvisioningError::conflict(ServerRecord::TABLE, "ip", &request.ip));
        }

        let mut row = ServerRecord {
            id: None,
            tenant_id: tenant.clone(),
            name: request.name.clone(),
            ip: request.ip.clone(),
            username: request.username.clone(),
            password: request.password.clone(),
            ssh_key_id: None,
            reachable: false,
            status: ResourceStatus::Connecting,
            flags: HostFlags::default(),
        };
        let (_, server_id) = self.ctx.create_record(&row).await?;
        row.id = Some(server_id.clone());
        let created = [(ServerRecord::TABLE, server_id.clone())];

        let prepared = async {
            let workspace = self.ctx.workspaces.ensure_workspace(tenant).await?;
            if let Some(pem) = &request.private_key {
                let key = self.ctx.workspaces.stage_private_key(&workspace, pem).await?;
                patch_record::<ServerRecord>(
                    store.as_ref(),
                    &server_id,
                    json!({ "sshKeyId": key.as_str() }),
                )
                .await?;
                row.ssh_key_id = Some(key.as_str().to_string());
            }
            let params = RenderParams {
                ansible: Some(host_login(&row)),
                ..Default::default()
            };
            self.ctx.renderer.render(&workspace, &row.ip, &params).await?;
            Ok::<_, ProvisioningError>(workspace)
        }
        .await;

        let workspace = match prepared {
            Ok(workspace) => workspace,
            Err(e) => {
                self.ctx.compensate(&created).await;
                return Err(e);
            }
        };

        info!(tenant = %tenant, server_id = %server_id, ip = %request.ip, "Connecting server");
        let job = self.ctx.start(&workspace, &ProvisionTag::Connect, &server_id);

        let id = server_id.clone();
        let settlement = settle(guard, job.clone(), move |status| async move {
            if status.is_success() {
                patch_record::<ServerRecord>(
                    store.as_ref(),
                    &id,
                    json!({ "reachable": true, "status": ResourceStatus::Connected }),
                )
                .await?;
                info!(server_id = %id, "Server connected");
            } else {
                compensate(store.as_ref(), &created).await;
            }
            Ok(())
        });

        Ok(ticket(server_id, job, settlement))
    }

    async fn delete(&self, tenant: &TenantId, server_id: &str) -> Result<(), ProvisioningError> {
        let _guard = self.ctx.locks.acquire(tenant).await;
        let server = self.ctx.load_server(tenant, server_id).await?;
        let store = self.ctx.store.as_ref();
        let on_host = RecordQuery::new().eq("serverId", server_id);

        let apps = store.find_as::<AppRecord>(&on_host).await?;
        let databases: Vec<DatabaseRecord> = store.find_as::<DatabaseRecord>(&on_host).await?;
        let users = store.find_as::<SystemUserRecord>(&on_host).await?;
        let user_databases = databases.iter().filter(|db| !db.is_root()).count();

        if !apps.is_empty() || user_databases > 0 || !users.is_empty() {
            return Err(ProvisioningError::in_use(
                ServerRecord::TABLE,
                server_id,
                format!(
                    "{} apps, {} databases and {} system users reference it",
                    apps.len(),
                    user_databases,
                    users.len()
                ),
            ));
        }

        // The root credential dies with the host record
        let root_rows: Vec<(&'static str, String)> = databases
            .iter()
            .filter_map(|db| db.id.clone().map(|id| (DatabaseRecord::TABLE, id)))
            .collect();
        remove_all(store, &root_rows).await?;
        store.remove(ServerRecord::TABLE, server_id).await?;

        info!(tenant = %tenant, server_id, ip = %server.ip, "Server deleted");
        Ok(())
    }
}
