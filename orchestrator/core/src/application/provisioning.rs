// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Provisioning Use-Case Support
//!
//! Shared plumbing for the resource lifecycle services: the error type they
//! return, the ticket handed back for a started run, and the context bundling
//! the workspace, renderer, supervisor, record store and tenant locks.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Compose infrastructure into lifecycle workflows
//!
//! Every workflow follows the same order: tenant lock, uniqueness checks,
//! record creation, workspace refresh, render, run, settle. Failures before
//! the run remove the records the call created; run outcomes are applied by
//! a settlement task that holds the tenant lock until it finishes.

use std::future::Future;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::locks::TenantLocks;
use crate::domain::credential::{KeyId, TransportSecret};
use crate::domain::job::{JobId, JobStatus};
use crate::domain::repository::{RecordQuery, RecordStore, RecordStoreError};
use crate::domain::resource::{
    AppRecord, DatabaseRecord, Record, ResourceStatus, ServerRecord, SystemUserRecord, ROOT_DB_USER,
};
use crate::domain::tag::ProvisionTag;
use crate::domain::tenant::{TenantId, TenantIdError};
use crate::infrastructure::credentials::{CredentialError, CredentialGenerator, SECRET_BYTES};
use crate::infrastructure::renderer::{AnsibleParams, RenderError, RenderParams, VariableRenderer};
use crate::infrastructure::supervisor::{RunHandle, RunOptions, RunSupervisor};
use crate::infrastructure::workspace::{Workspace, WorkspaceError, WorkspaceManager};

#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    #[error("Invalid tenant: {0}")]
    InvalidTenant(#[from] TenantIdError),

    #[error("A {table} record with {key} = {value} already exists")]
    ResourceConflict {
        table: String,
        key: String,
        value: String,
    },

    #[error("{table} record not found: {id}")]
    NotFound { table: String, id: String },

    #[error("{engine} is not installed on server {server_id}")]
    EngineNotInstalled { server_id: String, engine: String },

    #[error("{table} record {id} is in use: {reason}")]
    ResourceInUse {
        table: String,
        id: String,
        reason: String,
    },

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("Record store error: {0}")]
    RecordStore(#[from] RecordStoreError),

    #[error("Settlement task failed: {0}")]
    Settlement(String),
}

impl ProvisioningError {
    pub(crate) fn conflict(table: &str, key: &str, value: impl ToString) -> Self {
        ProvisioningError::ResourceConflict {
            table: table.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub(crate) fn in_use(table: &str, id: &str, reason: impl Into<String>) -> Self {
        ProvisioningError::ResourceInUse {
            table: table.to_string(),
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

/// A started lifecycle run
pub struct ProvisioningTicket {
    /// Record the run acts on (the job is keyed by it)
    pub resource_id: String,
    pub job: RunHandle,
    settlement: JoinHandle<Result<JobStatus, ProvisioningError>>,
}

impl ProvisioningTicket {
    pub fn job_id(&self) -> &JobId {
        self.job.job_id()
    }

    /// Wait until the run finished and its outcome was applied to the records
    pub async fn settled(self) -> Result<JobStatus, ProvisioningError> {
        self.settlement
            .await
            .map_err(|e| ProvisioningError::Settlement(e.to_string()))?
    }
}

/// Root database credential for a host
pub(crate) struct RootCredential {
    pub secret: TransportSecret,
    /// Row id when this call created the credential
    pub created_id: Option<String>,
}

#[derive(Clone)]
pub struct ProvisioningContext {
    pub workspaces: Arc<WorkspaceManager>,
    pub renderer: Arc<VariableRenderer>,
    pub supervisor: Arc<RunSupervisor>,
    pub store: Arc<dyn RecordStore>,
    pub locks: TenantLocks,
}

impl ProvisioningContext {
    pub fn new(
        workspaces: Arc<WorkspaceManager>,
        renderer: Arc<VariableRenderer>,
        supervisor: Arc<RunSupervisor>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            workspaces,
            renderer,
            supervisor,
            store,
            locks: TenantLocks::new(),
        }
    }

    /// Load a record owned by `tenant`; other tenants' records read as missing
    pub(crate) async fn load<R, F>(
        &self,
        tenant: &TenantId,
        id: &str,
        owner: F,
    ) -> Result<R, ProvisioningError>
    where
        R: Record,
        F: Fn(&R) -> &TenantId,
    {
        let not_found = || ProvisioningError::NotFound {
            table: R::TABLE.to_string(),
            id: id.to_string(),
        };
        match self.store.get_as::<R>(id).await {
            Ok(record) if owner(&record) == tenant => Ok(record),
            Ok(_) | Err(RecordStoreError::NotFound { .. }) => Err(not_found()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn load_server(
        &self,
        tenant: &TenantId,
        id: &str,
    ) -> Result<ServerRecord, ProvisioningError> {
        self.load(tenant, id, |s: &ServerRecord| &s.tenant_id).await
    }

    pub(crate) async fn load_app(&self, tenant: &TenantId, id: &str) -> Result<AppRecord, ProvisioningError> {
        self.load(tenant, id, |a: &AppRecord| &a.tenant_id).await
    }

    pub(crate) async fn load_database(
        &self,
        tenant: &TenantId,
        id: &str,
    ) -> Result<DatabaseRecord, ProvisioningError> {
        self.load(tenant, id, |d: &DatabaseRecord| &d.tenant_id).await
    }

    pub(crate) async fn load_system_user(
        &self,
        tenant: &TenantId,
        id: &str,
    ) -> Result<SystemUserRecord, ProvisioningError> {
        self.load(tenant, id, |u: &SystemUserRecord| &u.tenant_id).await
    }

    /// Create a record and return it with its store-assigned id
    pub(crate) async fn create_record<R: Record>(&self, record: &R) -> Result<(R, String), ProvisioningError> {
        let created = self.store.create_as(record).await?;
        let id = created
            .id()
            .map(str::to_string)
            .ok_or_else(|| RecordStoreError::Serialization(format!("{} record created without id", R::TABLE)))?;
        Ok((created, id))
    }

    /// The host's root database credential: reused when stored, otherwise
    /// generated and stored before anything runs.
    pub(crate) async fn root_credential(
        &self,
        tenant: &TenantId,
        server_id: &str,
    ) -> Result<RootCredential, ProvisioningError> {
        let query = RecordQuery::new()
            .eq("serverId", server_id)
            .eq("username", ROOT_DB_USER);
        if let Some(existing) = self.store.first_as::<DatabaseRecord>(&query).await? {
            return Ok(RootCredential {
                secret: TransportSecret::new(existing.password),
                created_id: None,
            });
        }

        let secret = CredentialGenerator::generate_secret(SECRET_BYTES);
        let row = DatabaseRecord {
            id: None,
            tenant_id: tenant.clone(),
            name: ROOT_DB_USER.to_string(),
            username: ROOT_DB_USER.to_string(),
            password: secret.expose().to_string(),
            server_id: server_id.to_string(),
            app_id: None,
            status: ResourceStatus::Active,
        };
        let (_, id) = self.create_record(&row).await?;
        info!(server_id, "Generated root database credential");

        Ok(RootCredential {
            secret,
            created_id: Some(id),
        })
    }

    /// Stored root credential, if any, without creating one
    pub(crate) async fn existing_root_credential(
        &self,
        server_id: &str,
    ) -> Result<Option<TransportSecret>, ProvisioningError> {
        let query = RecordQuery::new()
            .eq("serverId", server_id)
            .eq("username", ROOT_DB_USER);
        Ok(self
            .store
            .first_as::<DatabaseRecord>(&query)
            .await?
            .map(|row| TransportSecret::new(row.password)))
    }

    /// Refresh the tenant workspace and render this step's variables along
    /// with the login and address of `server`
    pub async fn prepare(
        &self,
        tenant: &TenantId,
        server: &ServerRecord,
        params: &RenderParams,
    ) -> Result<Workspace, ProvisioningError> {
        let workspace = self.workspaces.ensure_workspace(tenant).await?;
        let params = RenderParams {
            ansible: Some(host_login(server)),
            ..params.clone()
        };
        self.renderer.render(&workspace, &server.ip, &params).await?;
        Ok(workspace)
    }

    pub(crate) fn start(&self, workspace: &Workspace, tag: &ProvisionTag, resource_id: &str) -> RunHandle {
        self.supervisor
            .run(workspace, tag, RunOptions::for_job(JobId::for_resource(resource_id)))
    }

    /// Remove records created by a call that did not complete
    pub(crate) async fn compensate(&self, created: &[(&'static str, String)]) {
        compensate(self.store.as_ref(), created).await
    }
}

/// Login the automation uses on `server`
pub(crate) fn host_login(server: &ServerRecord) -> AnsibleParams {
    AnsibleParams {
        username: Some(server.username.clone()),
        password: server.password.clone(),
        ssh_key: server.ssh_key_id.clone().map(KeyId::new),
    }
}

pub(crate) async fn compensate(store: &dyn RecordStore, created: &[(&'static str, String)]) {
    for (table, id) in created {
        match store.remove(table, id).await {
            Ok(_) => warn!(table, id = %id, "Removed record after failed provisioning"),
            Err(RecordStoreError::NotFound { .. }) => {}
            Err(e) => error!(table, id = %id, "Failed to remove record: {}", e),
        }
    }
}

/// Remove records that are expected to go; already-missing rows are fine
pub(crate) async fn remove_all(
    store: &dyn RecordStore,
    rows: &[(&'static str, String)],
) -> Result<(), ProvisioningError> {
    for (table, id) in rows {
        match store.remove(table, id).await {
            Ok(_) | Err(RecordStoreError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Patch a record, mapping to the typed view
pub(crate) async fn patch_record<R: Record>(
    store: &dyn RecordStore,
    id: &str,
    body: serde_json::Value,
) -> Result<R, ProvisioningError> {
    Ok(store.patch_as::<R>(id, body).await?)
}

pub(crate) fn status_body(status: ResourceStatus) -> serde_json::Value {
    json!({ "status": status })
}

/// Spawn the task applying a run's outcome; it owns the tenant guard so the
/// next operation for this tenant starts only after the records are updated.
pub(crate) fn settle<F, Fut>(
    guard: OwnedMutexGuard<()>,
    job: RunHandle,
    on_outcome: F,
) -> JoinHandle<Result<JobStatus, ProvisioningError>>
where
    F: FnOnce(JobStatus) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), ProvisioningError>> + Send + 'static,
{
    tokio::spawn(async move {
        let status = job.wait().await;
        let applied = on_outcome(status.clone()).await;
        drop(guard);

        if let Err(e) = &applied {
            error!(job_id = %job.job_id(), "Failed to apply run outcome: {}", e);
        }
        applied.map(|_| status)
    })
}

pub(crate) fn ticket(
    resource_id: String,
    job: RunHandle,
    settlement: JoinHandle<Result<JobStatus, ProvisioningError>>,
) -> ProvisioningTicket {
    ProvisioningTicket {
        resource_id,
        job,
        settlement,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::HostFlags;
    use crate::infrastructure::repositories::InMemoryRecordStore;

    fn server_row(tenant: &str) -> ServerRecord {
        ServerRecord {
            id: None,
            tenant_id: TenantId::parse(tenant).unwrap(),
            name: "web-1".to_string(),
            ip: "10.0.0.5".to_string(),
            username: "ops".to_string(),
            password: Some("P@ss1".to_string()),
            ssh_key_id: Some("ab12".to_string()),
            reachable: false,
            status: ResourceStatus::Connecting,
            flags: HostFlags::default(),
        }
    }

    #[tokio::test]
    async fn test_record_helpers_accept_borrowed_store() {
        let backing = InMemoryRecordStore::new();
        let store: &dyn RecordStore = &backing;

        let created = store.create_as(&server_row("t1")).await.unwrap();
        let id = created.id.unwrap();

        let patched: ServerRecord = patch_record(store, &id, status_body(ResourceStatus::Connected))
            .await
            .unwrap();
        assert_eq!(patched.status, ResourceStatus::Connected);
        assert_eq!(store.find_as::<ServerRecord>(&RecordQuery::new()).await.unwrap().len(), 1);

        let rows = [(ServerRecord::TABLE, id.clone()), (ServerRecord::TABLE, "gone".to_string())];
        remove_all(store, &rows).await.unwrap();
        assert!(store.get_as::<ServerRecord>(&id).await.is_err());
        compensate(store, &rows).await;
    }

    #[test]
    fn test_host_login_from_server_row() {
        let login = host_login(&server_row("t1"));
        assert_eq!(login.username.as_deref(), Some("ops"));
        assert_eq!(login.password.as_deref(), Some("P@ss1"));
        assert_eq!(login.ssh_key.unwrap().relative_path(), "files/ab12.pem");
    }
}
