// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! App Lifecycle
//!
//! Installs single components (`nginx`, `mysql`, `docker`, ...) and composite
//! stacks on a connected host, and removes them again.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Create/delete apps and keep the host's component flags in step
//!
//! Stack creation picks between a full install and adding a single app with
//! [`requires_full_install`]. Deletion of the last stack app on a host with no
//! user databases left tears the whole stack down.

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::application::provisioning::{
    compensate, patch_record, remove_all, settle, status_body, ticket, ProvisioningContext, ProvisioningError,
    ProvisioningTicket,
};
use crate::domain::repository::RecordQuery;
use crate::domain::resource::{
    requires_full_install, AppRecord, AppType, Component, DatabaseRecord, HostFlags, Record,
    ResourceStatus, ServerRecord,
};
use crate::domain::tag::ProvisionTag;
use crate::domain::tenant::TenantId;
use crate::infrastructure::credentials::{CredentialGenerator, SECRET_BYTES, SUFFIX_BYTES};
use crate::infrastructure::renderer::{AppParams, DatabaseParams, RenderParams, WordpressParams};

#[derive(Debug, Clone)]
pub struct CreateApp {
    pub server_id: String,
    pub name: String,
    pub app_type: AppType,
    pub domain: Option<String>,
    /// Database login for stack apps; generated when absent
    pub app_username: Option<String>,
    pub app_password: Option<String>,
    pub wordpress: Option<WordpressParams>,
}

#[async_trait]
pub trait AppService: Send + Sync {
    async fn create(
        &self,
        tenant: &TenantId,
        request: CreateApp,
    ) -> Result<ProvisioningTicket, ProvisioningError>;

    async fn delete(
        &self,
        tenant: &TenantId,
        app_id: &str,
    ) -> Result<ProvisioningTicket, ProvisioningError>;
}

pub struct StandardAppService {
    ctx: ProvisioningContext,
}

impl StandardAppService {
    pub fn new(ctx: ProvisioningContext) -> Self {
        Self { ctx }
    }

    /// Tag for creating `app_type` on a host with `flags`, and whether it
    /// provisions the whole stack
    pub fn create_tag(flags: &HostFlags, app_type: AppType) -> (ProvisionTag, bool) {
        match app_type {
            AppType::Component(component) => (ProvisionTag::Install(component), false),
            AppType::Stack(stack) if requires_full_install(flags, stack) => {
                (ProvisionTag::StackFullInstall(stack), true)
            }
            AppType::Stack(stack) => (ProvisionTag::StackCreateSingleApp(stack), false),
        }
    }

    /// Components whose flag turns on once `tag` succeeded
    fn installed_by(tag: &ProvisionTag) -> Vec<Component> {
        match tag {
            ProvisionTag::Install(component) => vec![*component],
            ProvisionTag::StackFullInstall(stack) => stack.full_install_components().to_vec(),
            _ => Vec::new(),
        }
    }

    /// Components whose flag turns off once `tag` succeeded
    fn removed_by(tag: &ProvisionTag) -> Vec<Component> {
        match tag {
            ProvisionTag::Uninstall(component) => vec![*component],
            ProvisionTag::StackFullUninstall(stack) => stack.full_install_components().to_vec(),
            _ => Vec::new(),
        }
    }
}

fn flags_body(flags: &HostFlags) -> serde_json::Value {
    serde_json::to_value(flags).unwrap_or_else(|_| json!({}))
}

#[async_trait]
impl AppService for StandardAppService {
    async fn create(
        &self,
        tenant: &TenantId,
        request: CreateApp,
    ) -> Result<ProvisioningTicket, ProvisioningError> {
        let guard = self.ctx.locks.acquire(tenant).await;
        let store = self.ctx.store.clone();
        let server = self.ctx.load_server(tenant, &request.server_id).await?;

        let duplicate = RecordQuery::new()
            .eq("tenantId", tenant)
            .eq("name", &request.name);
        if store.find(AppRecord::TABLE, &duplicate).await?.total > 0 {
            return Err(ProvisioningError::conflict(AppRecord::TABLE, "name", &request.name));
        }

        let (tag, init) = Self::create_tag(&server.flags, request.app_type);

        let row = AppRecord {
            id: None,
            tenant_id: tenant.clone(),
            name: request.name.clone(),
            app_type: request.app_type,
            domain: request.domain.clone(),
            server_id: request.server_id.clone(),
            init,
            status: ResourceStatus::Provisioning,
        };
        let (_, app_id) = self.ctx.create_record(&row).await?;
        let created = [(AppRecord::TABLE, app_id.clone())];
        // A root credential generated here goes only if nothing ran with it
        let mut new_root: Option<String> = None;

        let prepared = async {
            let mut params = RenderParams::default();

            if request.app_type.needs_database() {
                let root = self.ctx.root_credential(tenant, &request.server_id).await?;
                new_root = root.created_id;
                params.database = Some(DatabaseParams {
                    root_password: Some(root.secret.into_inner()),
                });
            }

            if let AppType::Stack(_) = request.app_type {
                params.app = Some(AppParams {
                    name: Some(request.name.clone()),
                    username: Some(
                        request
                            .app_username
                            .clone()
                            .unwrap_or_else(|| CredentialGenerator::generate_suffix(SUFFIX_BYTES)),
                    ),
                    password: Some(request.app_password.clone().unwrap_or_else(|| {
                        CredentialGenerator::generate_secret(SECRET_BYTES).into_inner()
                    })),
                    domain: request.domain.clone(),
                });
                params.wordpress = request.wordpress.clone();
            }

            self.ctx.prepare(tenant, &server, &params).await
        }
        .await;

        let workspace = match prepared {
            Ok(workspace) => workspace,
            Err(e) => {
                self.ctx.compensate(&created).await;
                if let Some(root_id) = new_root {
                    self.ctx.compensate(&[(DatabaseRecord::TABLE, root_id)]).await;
                }
                return Err(e);
            }
        };

        info!(
            tenant = %tenant,
            app_id = %app_id,
            server_id = %request.server_id,
            tag = %tag,
            "Creating app"
        );
        let job = self.ctx.start(&workspace, &tag, &app_id);

        let id = app_id.clone();
        let server_id = request.server_id.clone();
        let settlement = settle(guard, job.clone(), move |status| async move {
            if !status.is_success() {
                compensate(store.as_ref(), &created).await;
                return Ok(());
            }

            patch_record::<AppRecord>(store.as_ref(), &id, status_body(ResourceStatus::Active)).await?;

            let installed = Self::installed_by(&tag);
            if !installed.is_empty() {
                let current = store.get_as::<ServerRecord>(&server_id).await?;
                let mut flags = current.flags;
                for component in installed {
                    flags.set(component, true);
                }
                patch_record::<ServerRecord>(store.as_ref(), &server_id, flags_body(&flags)).await?;
            }
            info!(app_id = %id, tag = %tag, "App created");
            Ok(())
        });

        Ok(ticket(app_id, job, settlement))
    }

    async fn delete(
        &self,
        tenant: &TenantId,
        app_id: &str,
    ) -> Result<ProvisioningTicket, ProvisioningError> {
        let guard = self.ctx.locks.acquire(tenant).await;
        let store = self.ctx.store.clone();
        let app = self.ctx.load_app(tenant, app_id).await?;
        let server = self.ctx.load_server(tenant, &app.server_id).await?;

        let on_host = RecordQuery::new().eq("serverId", &app.server_id);
        let tag = match app.app_type {
            AppType::Component(component) => ProvisionTag::Uninstall(component),
            AppType::Stack(stack) => {
                let other_apps = store
                    .find_as::<AppRecord>(&on_host)
                    .await?
                    .iter()
                    .filter(|a| a.id.as_deref() != Some(app_id))
                    .count();
                let user_databases = store
                    .find_as::<DatabaseRecord>(&on_host)
                    .await?
                    .iter()
                    .filter(|db| !db.is_root())
                    .count();
                if other_apps == 0 && user_databases == 0 {
                    ProvisionTag::StackFullUninstall(stack)
                } else {
                    ProvisionTag::StackDeleteSingleApp(stack)
                }
            }
        };

        patch_record::<AppRecord>(store.as_ref(), app_id, status_body(ResourceStatus::Deleting)).await?;

        let prepared = async {
            let mut params = RenderParams::default();
            if let AppType::Stack(_) = app.app_type {
                params.app = Some(AppParams {
                    name: Some(app.name.clone()),
                    domain: app.domain.clone(),
                    ..Default::default()
                });
            }
            if app.app_type.needs_database() {
                if let Some(root) = self.ctx.existing_root_credential(&app.server_id).await? {
                    params.database = Some(DatabaseParams {
                        root_password: Some(root.into_inner()),
                    });
                }
            }
            self.ctx.prepare(tenant, &server, &params).await
        }
        .await;

        let workspace = match prepared {
            Ok(workspace) => workspace,
            Err(e) => {
                if let Err(patch_err) =
                    patch_record::<AppRecord>(store.as_ref(), app_id, status_body(ResourceStatus::Failed)).await
                {
                    warn!(app_id, "Failed to mark app failed: {}", patch_err);
                }
                return Err(e);
            }
        };

        info!(tenant = %tenant, app_id, tag = %tag, "Deleting app");
        let job = self.ctx.start(&workspace, &tag, app_id);

        let id = app_id.to_string();
        let server_id = app.server_id.clone();
        let settlement = settle(guard, job.clone(), move |status| async move {
            if !status.is_success() {
                patch_record::<AppRecord>(store.as_ref(), &id, status_body(ResourceStatus::Failed)).await?;
                return Ok(());
            }

            store.remove(AppRecord::TABLE, &id).await?;

            let removed = Self::removed_by(&tag);
            if !removed.is_empty() {
                let current = store.get_as::<ServerRecord>(&server_id).await?;
                let mut flags = current.flags;
                for component in &removed {
                    flags.set(*component, false);
                }
                patch_record::<ServerRecord>(store.as_ref(), &server_id, flags_body(&flags)).await?;

                // Tearing mysql down takes every database on the host with it
                if removed.contains(&Component::Mysql) {
                    let leftovers: Vec<(&'static str, String)> = store
                        .find_as::<DatabaseRecord>(&RecordQuery::new().eq("serverId", &server_id))
                        .await?
                        .into_iter()
                        .filter_map(|db| db.id.map(|db_id| (DatabaseRecord::TABLE, db_id)))
                        .collect();
                    remove_all(store.as_ref(), &leftovers).await?;
                }
            }
            info!(app_id = %id, tag = %tag, "App deleted");
            Ok(())
        });

        Ok(ticket(app_id.to_string(), job, settlement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::Stack;

    #[test]
    fn test_create_tag_selection() {
        let bare = HostFlags::default();
        let prepared = HostFlags {
            nginx: true,
            mysql: true,
            ..HostFlags::default()
        };
        let wordpress = AppType::Stack(Stack::Wordpress);

        assert_eq!(
            StandardAppService::create_tag(&bare, wordpress),
            (ProvisionTag::StackFullInstall(Stack::Wordpress), true)
        );
        assert_eq!(
            StandardAppService::create_tag(&prepared, wordpress),
            (ProvisionTag::StackCreateSingleApp(Stack::Wordpress), false)
        );
        assert_eq!(
            StandardAppService::create_tag(&prepared, AppType::Component(Component::Docker)),
            (ProvisionTag::Install(Component::Docker), false)
        );
    }

    #[test]
    fn test_flag_changes_per_tag() {
        assert_eq!(
            StandardAppService::installed_by(&ProvisionTag::StackFullInstall(Stack::Wordpress)),
            vec![Component::Nginx, Component::Mysql]
        );
        assert!(StandardAppService::installed_by(&ProvisionTag::StackCreateSingleApp(Stack::Wordpress)).is_empty());
        assert_eq!(
            StandardAppService::removed_by(&ProvisionTag::Uninstall(Component::Mongodb)),
            vec![Component::Mongodb]
        );
        assert!(StandardAppService::removed_by(&ProvisionTag::StackDeleteSingleApp(Stack::Wordpress)).is_empty());
    }
}
