// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Provisioner Configuration Types
//
// Defines the configuration schema for a Hostwright provisioning node:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Workspace root and automation template location
// - Automation executable invocation and output markers
// - Event channel sizing and the external record store endpoint

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const API_VERSION: &str = "hostwright.io/v1";
pub const KIND: &str = "ProvisionerConfig";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable not set: {0}")]
    MissingEnv(String),
}

/// Top-level Kubernetes-style provisioner configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionerConfigManifest {
    /// API version (must be "hostwright.io/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "ProvisionerConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: ProvisionerConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable node name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Configuration specification (content under spec:)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionerConfigSpec {
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    #[serde(default)]
    pub automation: AutomationConfig,

    #[serde(default)]
    pub events: EventsConfig,

    /// External record store; in-memory storage is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_store: Option<RecordStoreConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory holding one subdirectory per tenant
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,

    /// Automation template tree copied into every tenant workspace
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
            template_dir: default_template_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Automation executable, resolved through PATH when not absolute
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Playbook entry point, relative to the workspace
    #[serde(default = "default_playbook")]
    pub playbook: String,

    /// Inventory file the host address is written to
    #[serde(default = "default_inventory_file")]
    pub inventory_file: PathBuf,

    /// Flat variable file merged by the renderer
    #[serde(default = "default_variables_file")]
    pub variables_file: PathBuf,

    /// Output substring marking that the remote phase has begun
    #[serde(default = "default_phase_marker")]
    pub phase_marker: String,

    /// Output substring selecting lines forwarded to log subscribers
    #[serde(default = "default_progress_marker")]
    pub progress_marker: String,

    /// Wall-clock limit for a single run (e.g. "30m")
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            playbook: default_playbook(),
            inventory_file: default_inventory_file(),
            variables_file: default_variables_file(),
            phase_marker: default_phase_marker(),
            progress_marker: default_progress_marker(),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Broadcast buffer size; slow subscribers lag past this
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordStoreConfig {
    /// Base URL of the record store REST API
    pub url: String,

    /// Bearer token (supports "env:VAR_NAME" for environment variables)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl RecordStoreConfig {
    /// Resolve the bearer token, reading `env:` references from the environment
    pub fn resolve_token(&self) -> Result<Option<String>, ConfigError> {
        match &self.token {
            Some(token) => match token.strip_prefix("env:") {
                Some(var_name) => std::env::var(var_name)
                    .map(Some)
                    .map_err(|_| ConfigError::MissingEnv(var_name.to_string())),
                None => Ok(Some(token.clone())),
            },
            None => Ok(None),
        }
    }
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from("./scripts")
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("./automation")
}

fn default_executable() -> String {
    "ansible-playbook".to_string()
}

fn default_playbook() -> String {
    "cman.yml".to_string()
}

fn default_inventory_file() -> PathBuf {
    PathBuf::from("ansible.host")
}

fn default_variables_file() -> PathBuf {
    PathBuf::from("group_vars/all.yml")
}

fn default_phase_marker() -> String {
    "Gathering Facts".to_string()
}

fn default_progress_marker() -> String {
    "TASK".to_string()
}

fn default_event_capacity() -> usize {
    1000
}

impl Default for ProvisionerConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "hostwright-node".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: ProvisionerConfigSpec::default(),
        }
    }
}

impl ProvisionerConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. HOSTWRIGHT_CONFIG_PATH environment variable
    /// 2. ./hostwright-config.yaml (working directory)
    /// 3. ~/.hostwright/config.yaml (user home)
    /// 4. /etc/hostwright/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("HOSTWRIGHT_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./hostwright-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".hostwright").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/hostwright/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path (fail if missing/invalid)
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HOSTWRIGHT_WORKSPACE_ROOT") {
            tracing::info!("Environment override: HOSTWRIGHT_WORKSPACE_ROOT={}", val);
            self.spec.workspace.root = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("HOSTWRIGHT_TEMPLATE_DIR") {
            tracing::info!("Environment override: HOSTWRIGHT_TEMPLATE_DIR={}", val);
            self.spec.workspace.template_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("HOSTWRIGHT_AUTOMATION_EXECUTABLE") {
            tracing::info!("Environment override: HOSTWRIGHT_AUTOMATION_EXECUTABLE={}", val);
            self.spec.automation.executable = val;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let workspace = &self.spec.workspace;
        if workspace.root.as_os_str().is_empty() {
            anyhow::bail!("spec.workspace.root cannot be empty");
        }
        if workspace.template_dir.as_os_str().is_empty() {
            anyhow::bail!("spec.workspace.template_dir cannot be empty");
        }

        let automation = &self.spec.automation;
        if automation.executable.is_empty() {
            anyhow::bail!("spec.automation.executable cannot be empty");
        }
        if automation.playbook.is_empty() {
            anyhow::bail!("spec.automation.playbook cannot be empty");
        }
        if automation.inventory_file.as_os_str().is_empty()
            || automation.variables_file.as_os_str().is_empty()
        {
            anyhow::bail!("spec.automation inventory and variables files must be set");
        }
        if automation.phase_marker.is_empty() || automation.progress_marker.is_empty() {
            anyhow::bail!("spec.automation markers cannot be empty");
        }
        if automation.timeout == Some(Duration::ZERO) {
            anyhow::bail!("spec.automation.timeout must be greater than zero");
        }

        if self.spec.events.capacity == 0 {
            anyhow::bail!("spec.events.capacity must be greater than zero");
        }

        if let Some(store) = &self.spec.record_store {
            if store.url.is_empty() {
                anyhow::bail!("spec.record_store.url cannot be empty");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = ProvisionerConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert!(!manifest.metadata.name.is_empty());
        assert_eq!(manifest.spec.automation.executable, "ansible-playbook");
        assert_eq!(
            manifest.spec.automation.variables_file,
            PathBuf::from("group_vars/all.yml")
        );
        assert!(manifest.spec.record_store.is_none());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
apiVersion: hostwright.io/v1
kind: ProvisionerConfig
metadata:
  name: test-node
spec:
  workspace:
    root: /var/lib/hostwright
  automation:
    timeout: 45m
  record_store:
    url: http://localhost:3030
    token: env:HOSTWRIGHT_TEST_TOKEN_UNSET
"#;
        let parsed = ProvisionerConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(parsed.metadata.name, "test-node");
        assert_eq!(parsed.spec.workspace.root, PathBuf::from("/var/lib/hostwright"));
        assert_eq!(parsed.spec.workspace.template_dir, PathBuf::from("./automation"));
        assert_eq!(parsed.spec.automation.playbook, "cman.yml");
        assert_eq!(parsed.spec.automation.timeout, Some(Duration::from_secs(45 * 60)));
        assert_eq!(parsed.spec.events.capacity, 1000);
        assert!(parsed.validate().is_ok());

        let store = parsed.spec.record_store.unwrap();
        assert!(matches!(
            store.resolve_token(),
            Err(ConfigError::MissingEnv(ref var)) if var == "HOSTWRIGHT_TEST_TOKEN_UNSET"
        ));
    }

    #[test]
    fn test_literal_token() {
        let store = RecordStoreConfig {
            url: "http://localhost".to_string(),
            token: Some("abc".to_string()),
        };
        assert_eq!(store.resolve_token().unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn test_validation() {
        let mut manifest = ProvisionerConfigManifest::default();

        assert!(manifest.validate().is_ok());

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "NodeConfig".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.spec.automation.phase_marker = String::new();
        assert!(manifest.validate().is_err());
        manifest.spec.automation.phase_marker = "Gathering Facts".to_string();

        manifest.spec.events.capacity = 0;
        assert!(manifest.validate().is_err());
    }
}
