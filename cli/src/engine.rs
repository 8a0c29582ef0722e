// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process engine wiring
//!
//! Builds the provisioning services from the loaded configuration. Every CLI
//! invocation owns one engine; nothing outlives the process except the
//! workspace tree and whatever the record store keeps.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use hostwright_core::{
    application::{
        ProvisioningContext, StandardAppService, StandardDatabaseService, StandardServerService,
        StandardSystemUserService,
    },
    domain::{node_config::ProvisionerConfigManifest, repository::RecordStore},
    infrastructure::{
        EventBus, HttpRecordStore, InMemoryRecordStore, RunSupervisor, VariableRenderer,
        WorkspaceManager,
    },
};

pub struct Engine {
    pub config: ProvisionerConfigManifest,
    pub context: ProvisioningContext,
    pub event_bus: Arc<EventBus>,
}

impl Engine {
    pub fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let config = ProvisionerConfigManifest::load_or_default(config_path)
            .context("Failed to load configuration")?;
        config
            .validate()
            .context("Configuration validation failed")?;
        Self::from_config(config)
    }

    pub fn from_config(config: ProvisionerConfigManifest) -> Result<Self> {
        let spec = &config.spec;

        let workspaces = WorkspaceManager::new(&spec.workspace.root, &spec.workspace.template_dir)
            .with_preserved([
                spec.automation.variables_file.clone(),
                spec.automation.inventory_file.clone(),
            ]);
        let renderer = VariableRenderer::new(
            &spec.automation.variables_file,
            &spec.automation.inventory_file,
        );
        let event_bus = Arc::new(EventBus::new(spec.events.capacity));
        let supervisor = RunSupervisor::new(spec.automation.clone(), event_bus.clone());

        let store: Arc<dyn RecordStore> = match &spec.record_store {
            Some(record_store) => {
                let token = record_store
                    .resolve_token()
                    .context("Failed to resolve record store token")?;
                info!("Using record store at {}", record_store.url);
                Arc::new(HttpRecordStore::new(&record_store.url, token))
            }
            None => {
                warn!("No record store configured; records live only for this invocation");
                Arc::new(InMemoryRecordStore::new())
            }
        };

        let context = ProvisioningContext::new(
            Arc::new(workspaces),
            Arc::new(renderer),
            Arc::new(supervisor),
            store,
        );

        Ok(Self {
            config,
            context,
            event_bus,
        })
    }

    pub fn servers(&self) -> StandardServerService {
        StandardServerService::new(self.context.clone())
    }

    pub fn apps(&self) -> StandardAppService {
        StandardAppService::new(self.context.clone())
    }

    pub fn databases(&self) -> StandardDatabaseService {
        StandardDatabaseService::new(self.context.clone())
    }

    pub fn system_users(&self) -> StandardSystemUserService {
        StandardSystemUserService::new(self.context.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_from_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ProvisionerConfigManifest::default();
        config.spec.workspace.root = dir.path().join("scripts");
        config.spec.workspace.template_dir = dir.path().join("automation");

        let engine = Engine::from_config(config).unwrap();
        assert_eq!(engine.event_bus.subscriber_count(), 0);
        assert!(engine.context.supervisor.active_jobs().is_empty());
    }
}
