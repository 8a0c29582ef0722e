// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Database Lifecycle
//!
//! User databases on a host's mysql engine, plus removal of the engine itself.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Create/delete databases and uninstall mysql
//!
//! Every database run renders the host's root credential so the automation can
//! administer the engine. The root row is managed here and never deleted on
//! its own; it goes when mysql is uninstalled. Once a run has used a freshly
//! generated root credential the row stays, even if the run failed, so a
//! retry sets the same password.

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::application::provisioning::{
    compensate, patch_record, remove_all, settle, status_body, ticket, ProvisioningContext,
    ProvisioningError, ProvisioningTicket,
};
use crate::domain::repository::RecordQuery;
use crate::domain::resource::{Component, DatabaseRecord, Record, ResourceStatus, ServerRecord};
use crate::domain::tag::ProvisionTag;
use crate::domain::tenant::TenantId;
use crate::infrastructure::credentials::{CredentialGenerator, SECRET_BYTES, SUFFIX_BYTES};
use crate::infrastructure::renderer::{AppParams, DatabaseParams, RenderParams};

#[derive(Debug, Clone)]
pub struct CreateDatabase {
    pub server_id: String,
    pub name: String,
    /// Generated when absent
    pub username: Option<String>,
    pub password: Option<String>,
    /// App the database belongs to, if any
    pub app_id: Option<String>,
}

#[async_trait]
pub trait DatabaseService: Send + Sync {
    async fn create(
        &self,
        tenant: &TenantId,
        request: CreateDatabase,
    ) -> Result<ProvisioningTicket, ProvisioningError>;

    async fn delete(
        &self,
        tenant: &TenantId,
        database_id: &str,
    ) -> Result<ProvisioningTicket, ProvisioningError>;

    /// Remove the mysql engine and every database record of the host
    async fn uninstall(
        &self,
        tenant: &TenantId,
        server_id: &str,
    ) -> Result<ProvisioningTicket, ProvisioningError>;
}

pub struct StandardDatabaseService {
    ctx: ProvisioningContext,
}

impl StandardDatabaseService {
    pub fn new(ctx: ProvisioningContext) -> Self {
        Self { ctx }
    }

    async fn mysql_host(&self, tenant: &TenantId, server_id: &str) -> Result<ServerRecord, ProvisioningError> {
        let server = self.ctx.load_server(tenant, server_id).await?;
        if !server.flags.has(Component::Mysql) {
            return Err(ProvisioningError::EngineNotInstalled {
                server_id: server_id.to_string(),
                engine: Component::Mysql.as_str().to_string(),
            });
        }
        Ok(server)
    }
}

#[async_trait]
impl DatabaseService for StandardDatabaseService {
    async fn create(
        &self,
        tenant: &TenantId,
        request: CreateDatabase,
    ) -> Result<ProvisioningTicket, ProvisioningError> {
        let guard = self.ctx.locks.acquire(tenant).await;
        let store = self.ctx.store.clone();
        let server = self.mysql_host(tenant, &request.server_id).await?;

        let duplicate = RecordQuery::new()
            .eq("serverId", &request.server_id)
            .eq("name", &request.name);
        if store.find(DatabaseRecord::TABLE, &duplicate).await?.total > 0 {
            return Err(ProvisioningError::conflict(DatabaseRecord::TABLE, "name", &request.name));
        }

        let root = self.ctx.root_credential(tenant, &request.server_id).await?;
        // Rows removed if the call aborts before the run starts
        let mut aborted: Vec<(&'static str, String)> = root
            .created_id
            .iter()
            .map(|id| (DatabaseRecord::TABLE, id.clone()))
            .collect();

        let username = request
            .username
            .clone()
            .unwrap_or_else(|| CredentialGenerator::generate_suffix(SUFFIX_BYTES));
        let password = request
            .password
            .clone()
            .unwrap_or_else(|| CredentialGenerator::generate_secret(SECRET_BYTES).into_inner());

        let row = DatabaseRecord {
            id: None,
            tenant_id: tenant.clone(),
            name: request.name.clone(),
            username: username.clone(),
            password: password.clone(),
            server_id: request.server_id.clone(),
            app_id: request.app_id.clone(),
            status: ResourceStatus::Provisioning,
        };
        let database_id = match self.ctx.create_record(&row).await {
            Ok((_, id)) => id,
            Err(e) => {
                self.ctx.compensate(&aborted).await;
                return Err(e);
            }
        };
        let created = [(DatabaseRecord::TABLE, database_id.clone())];
        aborted.extend(created.iter().cloned());

        let params = RenderParams {
            app: Some(AppParams {
                name: Some(request.name.clone()),
                username: Some(username),
                password: Some(password),
                domain: None,
            }),
            database: Some(DatabaseParams {
                root_password: Some(root.secret.into_inner()),
            }),
            ..Default::default()
        };
        let workspace = match self.ctx.prepare(tenant, &server, &params).await {
            Ok(workspace) => workspace,
            Err(e) => {
                self.ctx.compensate(&aborted).await;
                return Err(e);
            }
        };

        info!(tenant = %tenant, database_id = %database_id, name = %request.name, "Creating database");
        let job = self
            .ctx
            .start(&workspace, &ProvisionTag::MysqlCreateSingleDb, &database_id);

        let id = database_id.clone();
        let settlement = settle(guard, job.clone(), move |status| async move {
            if status.is_success() {
                patch_record::<DatabaseRecord>(store.as_ref(), &id, status_body(ResourceStatus::Active))
                    .await?;
                info!(database_id = %id, "Database created");
            } else {
                compensate(store.as_ref(), &created).await;
            }
            Ok(())
        });

        Ok(ticket(database_id, job, settlement))
    }

    async fn delete(
        &self,
        tenant: &TenantId,
        database_id: &str,
    ) -> Result<ProvisioningTicket, ProvisioningError> {
        let guard = self.ctx.locks.acquire(tenant).await;
        let store = self.ctx.store.clone();
        let database = self.ctx.load_database(tenant, database_id).await?;
        if database.is_root() {
            return Err(ProvisioningError::in_use(
                DatabaseRecord::TABLE,
                database_id,
                "root credential is removed with the mysql engine",
            ));
        }
        let server = self.ctx.load_server(tenant, &database.server_id).await?;

        patch_record::<DatabaseRecord>(store.as_ref(), database_id, status_body(ResourceStatus::Deleting))
            .await?;

        let root_password = self
            .ctx
            .existing_root_credential(&database.server_id)
            .await?
            .map(|secret| secret.into_inner());
        let params = RenderParams {
            app: Some(AppParams {
                name: Some(database.name.clone()),
                username: Some(database.username.clone()),
                ..Default::default()
            }),
            database: Some(DatabaseParams { root_password }),
            ..Default::default()
        };
        let workspace = match self.ctx.prepare(tenant, &server, &params).await {
            Ok(workspace) => workspace,
            Err(e) => {
                if let Err(patch_err) = patch_record::<DatabaseRecord>(
                    store.as_ref(),
                    database_id,
                    status_body(ResourceStatus::Failed),
                )
                .await
                {
                    warn!(database_id, "Failed to mark database failed: {}", patch_err);
                }
                return Err(e);
            }
        };

        info!(tenant = %tenant, database_id, name = %database.name, "Deleting database");
        let job = self
            .ctx
            .start(&workspace, &ProvisionTag::MysqlDeleteSingleDb, database_id);

        let id = database_id.to_string();
        let settlement = settle(guard, job.clone(), move |status| async move {
            if status.is_success() {
                store.remove(DatabaseRecord::TABLE, &id).await?;
                info!(database_id = %id, "Database deleted");
            } else {
                patch_record::<DatabaseRecord>(store.as_ref(), &id, status_body(ResourceStatus::Failed))
                    .await?;
            }
            Ok(())
        });

        Ok(ticket(database_id.to_string(), job, settlement))
    }

    async fn uninstall(
        &self,
        tenant: &TenantId,
        server_id: &str,
    ) -> Result<ProvisioningTicket, ProvisioningError> {
        let guard = self.ctx.locks.acquire(tenant).await;
        let store = self.ctx.store.clone();
        let server = self.mysql_host(tenant, server_id).await?;

        let root_password = self
            .ctx
            .existing_root_credential(server_id)
            .await?
            .map(|secret| secret.into_inner());
        let params = RenderParams {
            database: Some(DatabaseParams { root_password }),
            ..Default::default()
        };
        let workspace = self.ctx.prepare(tenant, &server, &params).await?;

        info!(tenant = %tenant, server_id, "Uninstalling mysql");
        let job = self
            .ctx
            .start(&workspace, &ProvisionTag::MysqlUninstall, server_id);

        let id = server_id.to_string();
        let settlement = settle(guard, job.clone(), move |status| async move {
            if !status.is_success() {
                return Ok(());
            }
            patch_record::<ServerRecord>(store.as_ref(), &id, json!({ "mysql": false })).await?;

            let rows: Vec<(&'static str, String)> = store
                .find_as::<DatabaseRecord>(&RecordQuery::new().eq("serverId", &id))
                .await?
                .into_iter()
                .filter_map(|db| db.id.map(|db_id| (DatabaseRecord::TABLE, db_id)))
                .collect();
            remove_all(store.as_ref(), &rows).await?;
            info!(server_id = %id, removed = rows.len(), "Mysql uninstalled");
            Ok(())
        });

        Ok(ticket(server_id.to_string(), job, settlement))
    }
}
