// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hostwright_core::application::ProvisioningContext;
use hostwright_core::domain::events::RunEvent;
use hostwright_core::domain::job::JobId;
use hostwright_core::domain::node_config::AutomationConfig;
use hostwright_core::domain::repository::RecordStore;
use hostwright_core::domain::resource::{HostFlags, ResourceStatus, ServerRecord};
use hostwright_core::domain::tenant::TenantId;
use hostwright_core::domain::variables::VariableSet;
use hostwright_core::infrastructure::event_bus::EventReceiver;
use hostwright_core::infrastructure::{
    EventBus, InMemoryRecordStore, RunSupervisor, VariableRenderer, WorkspaceManager,
};
use tempfile::TempDir;

pub const VARIABLES_FILE: &str = "group_vars/all.yml";
pub const INVENTORY_FILE: &str = "ansible.host";

/// Stand-in for the automation executable. Appends the selected tag to
/// `runs.log`, sleeps when the workspace has a `slow-<tag>` marker holding a
/// number of seconds, and fails when there is a `fail-<tag>` marker.
const FAKE_PLAYBOOK: &str = r#"
echo "$2" >> runs.log
echo "PLAY [all] ***"
echo "TASK [Gathering Facts] ***"
if [ -f "slow-$2" ]; then
  sleep "$(cat "slow-$2")"
fi
echo "TASK [$2] ***"
if [ -f "fail-$2" ]; then
  echo "fatal: [host]: FAILED!" >&2
  exit 2
fi
echo "PLAY RECAP ***"
"#;

pub struct Harness {
    pub dir: TempDir,
    pub template: PathBuf,
    pub workspaces: PathBuf,
    pub store: Arc<dyn RecordStore>,
    pub bus: Arc<EventBus>,
    pub ctx: ProvisioningContext,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("automation");
        std::fs::create_dir_all(template.join("group_vars")).unwrap();
        std::fs::write(template.join("play.sh"), FAKE_PLAYBOOK).unwrap();
        std::fs::write(template.join(VARIABLES_FILE), "php_version: \"8.2\"\n").unwrap();
        std::fs::write(template.join(INVENTORY_FILE), "").unwrap();

        let workspaces = dir.path().join("scripts");
        let manager = WorkspaceManager::new(&workspaces, &template)
            .with_preserved([VARIABLES_FILE, INVENTORY_FILE]);
        let renderer = VariableRenderer::new(VARIABLES_FILE, INVENTORY_FILE);

        let bus = Arc::new(EventBus::new(256));
        let config = AutomationConfig {
            executable: "sh".to_string(),
            playbook: "play.sh".to_string(),
            ..AutomationConfig::default()
        };
        let supervisor = RunSupervisor::new(config, bus.clone());
        let store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::new());

        let ctx = ProvisioningContext::new(
            Arc::new(manager),
            Arc::new(renderer),
            Arc::new(supervisor),
            store.clone(),
        );

        Self {
            dir,
            template,
            workspaces,
            store,
            bus,
            ctx,
        }
    }

    /// Make the fake playbook exit non-zero for `tag`
    pub fn fail_tag(&self, tag: &str) {
        std::fs::write(self.template.join(format!("fail-{}", tag)), "").unwrap();
    }

    /// Make runs of `tag` in one tenant's workspace take `seconds`
    pub fn slow_tag(&self, tenant: &str, tag: &str, seconds: u32) {
        let workspace = self.workspace(tenant);
        std::fs::create_dir_all(&workspace).unwrap();
        std::fs::write(workspace.join(format!("slow-{}", tag)), seconds.to_string()).unwrap();
    }

    /// Undo [`Harness::fail_tag`]
    pub fn pass_tag(&self, tag: &str) {
        std::fs::remove_file(self.template.join(format!("fail-{}", tag))).unwrap();
    }

    pub fn workspace(&self, tenant: &str) -> PathBuf {
        self.workspaces.join(tenant)
    }

    pub fn variables(&self, tenant: &str) -> VariableSet {
        let raw = std::fs::read_to_string(self.workspace(tenant).join(VARIABLES_FILE)).unwrap();
        serde_yaml::from_str(&raw).unwrap()
    }

    pub fn inventory(&self, tenant: &str) -> String {
        std::fs::read_to_string(self.workspace(tenant).join(INVENTORY_FILE))
            .unwrap()
            .trim()
            .to_string()
    }

    /// Tags the fake playbook was run with, in order
    pub fn runs(&self, tenant: &str) -> Vec<String> {
        read_lines(&self.workspace(tenant).join("runs.log"))
    }

    /// Insert a server row as if it had already been connected
    pub async fn seed_server(&self, tenant: &str, ip: &str, flags: HostFlags) -> String {
        let row = ServerRecord {
            id: None,
            tenant_id: TenantId::parse(tenant).unwrap(),
            name: format!("host-{}", ip),
            ip: ip.to_string(),
            username: "ops".to_string(),
            password: Some(format!("pw-{}", ip)),
            ssh_key_id: None,
            reachable: true,
            status: ResourceStatus::Connected,
            flags,
        };
        self.store
            .create_as(&row)
            .await
            .unwrap()
            .id
            .unwrap()
    }

    pub async fn server(&self, id: &str) -> ServerRecord {
        self.store.get_as::<ServerRecord>(id).await.unwrap()
    }
}

pub fn tenant(id: &str) -> TenantId {
    TenantId::parse(id).unwrap()
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|content| content.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Everything already published for `job_id`
pub fn drain_job_events(events: &mut EventReceiver, job_id: &JobId) -> Vec<RunEvent> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        if event.job_id() == job_id {
            collected.push(event);
        }
    }
    collected
}
