// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Variable Renderer
//!
//! Merges runtime parameters into a workspace's variable file and writes the
//! target host into the inventory file.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Render `group_vars/all.yml` and `ansible.host` for a run
//!
//! Each lifecycle step renders only the sections it knows about; everything
//! else already in the file is kept (see [`VariableSet::merge`]). A supplied
//! host login replaces the previous one whole. Host user passwords are
//! digested here and never written in clear.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::domain::credential::KeyId;
use crate::domain::variables::{param_case, VariableSet};
use crate::infrastructure::credentials::{CredentialError, CredentialGenerator};
use crate::infrastructure::workspace::Workspace;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Variable file not found: {0} (workspace not materialized?)")]
    Missing(PathBuf),

    #[error("Variable file {path} is malformed: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Login used by the automation to reach the host
#[derive(Debug, Clone, Default)]
pub struct AnsibleParams {
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssh_key: Option<KeyId>,
}

/// Ordinary user account created on the host
#[derive(Debug, Clone, Default)]
pub struct UserParams {
    pub username: Option<String>,
    /// Plaintext; rendered as a digest
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseParams {
    pub root_password: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AppParams {
    /// Display name; the database name is derived from it
    pub name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct WordpressParams {
    pub title: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
}

/// Parameters supplied by one lifecycle step
#[derive(Debug, Clone, Default)]
pub struct RenderParams {
    pub ansible: Option<AnsibleParams>,
    pub user: Option<UserParams>,
    pub database: Option<DatabaseParams>,
    pub app: Option<AppParams>,
    pub wordpress: Option<WordpressParams>,
}

impl RenderParams {
    /// Convert to the variable patch merged into the file
    pub fn to_patch(&self) -> Result<VariableSet, CredentialError> {
        let mut patch = VariableSet::default();

        if let Some(ansible) = &self.ansible {
            patch.ansible_user = ansible.username.clone();
            patch.ansible_ssh_pass = ansible.password.clone();
            patch.ansible_sudo_pass = ansible.password.clone();
            patch.ansible_ssh_private_key_file = ansible.ssh_key.as_ref().map(KeyId::relative_path);
        }

        if let Some(user) = &self.user {
            patch.username = user.username.clone();
            patch.password = match &user.password {
                Some(password) => Some(CredentialGenerator::digest(password)?.as_str().to_string()),
                None => None,
            };
        }

        if let Some(database) = &self.database {
            patch.mysql_root_password = database.root_password.clone();
        }

        if let Some(app) = &self.app {
            patch.app_database = app.name.as_deref().map(param_case);
            patch.app_username = app.username.clone();
            patch.app_password = app.password.clone();
            if let Some(domain) = &app.domain {
                patch.app_domain = Some(domain.clone());
                patch.app_config = Some(format!("{}.conf", domain));
                patch.wordpress_home_url = Some(format!("http://{}", domain));
            }
        }

        if let Some(wordpress) = &self.wordpress {
            patch.wordpress_site_title = wordpress.title.clone();
            patch.wordpress_admin_user = wordpress.username.clone();
            patch.wordpress_admin_user_pass = wordpress.password.clone();
            patch.wordpress_admin_email = wordpress.email.clone();
        }

        Ok(patch)
    }
}

#[derive(Debug, Clone)]
pub struct VariableRenderer {
    variables_file: PathBuf,
    inventory_file: PathBuf,
}

impl VariableRenderer {
    pub fn new(variables_file: impl Into<PathBuf>, inventory_file: impl Into<PathBuf>) -> Self {
        Self {
            variables_file: variables_file.into(),
            inventory_file: inventory_file.into(),
        }
    }

    pub fn variables_file(&self) -> &Path {
        &self.variables_file
    }

    pub fn inventory_file(&self) -> &Path {
        &self.inventory_file
    }

    /// Current contents of the workspace's variable file
    pub async fn read_variables(&self, workspace: &Workspace) -> Result<VariableSet, RenderError> {
        let path = workspace.join(&self.variables_file);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RenderError::Missing(path));
            }
            Err(source) => return Err(RenderError::Io { path, source }),
        };

        let malformed = |reason: String| RenderError::Malformed {
            path: path.clone(),
            reason,
        };

        let value: serde_yaml::Value =
            serde_yaml::from_str(&content).map_err(|e| malformed(e.to_string()))?;
        match value {
            serde_yaml::Value::Null => Ok(VariableSet::default()),
            serde_yaml::Value::Mapping(_) => {
                serde_yaml::from_value(value).map_err(|e| malformed(e.to_string()))
            }
            _ => Err(malformed("expected a flat map of variables".to_string())),
        }
    }

    /// Merge `params` into the variable file and point the inventory at `host`
    pub async fn render(
        &self,
        workspace: &Workspace,
        host: &str,
        params: &RenderParams,
    ) -> Result<VariableSet, RenderError> {
        let current = self.read_variables(workspace).await?;
        let patch = params.to_patch()?;
        let mut merged = current.merge(&patch);
        if params.ansible.is_some() {
            merged = merged.with_login(&patch);
        }
        let merged = merged.with_defaults();

        let path = workspace.join(&self.variables_file);
        let yaml = serde_yaml::to_string(&merged).map_err(|e| RenderError::Malformed {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        write_replacing(&path, yaml.as_bytes()).await?;
        debug!("Wrote {:?}", path);

        let inventory = workspace.join(&self.inventory_file);
        write_replacing(&inventory, format!("{}\n", host).as_bytes()).await?;

        info!(tenant = %workspace.tenant_id(), host = %host, "Rendered workspace variables");
        Ok(merged)
    }
}

/// Write through a sibling temp file so readers never see a torn file
async fn write_replacing(path: &Path, content: &[u8]) -> Result<(), RenderError> {
    let io_err = |source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, content).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tenant::TenantId;
    use crate::infrastructure::workspace::WorkspaceManager;
    use tempfile::TempDir;

    async fn workspace(vars: Option<&str>) -> (TempDir, Workspace) {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("template");
        std::fs::create_dir_all(template.join("group_vars")).unwrap();
        if let Some(vars) = vars {
            std::fs::write(template.join("group_vars/all.yml"), vars).unwrap();
        }
        let manager = WorkspaceManager::new(dir.path().join("ws"), &template);
        let ws = manager
            .ensure_workspace(&TenantId::parse("t1").unwrap())
            .await
            .unwrap();
        (dir, ws)
    }

    fn renderer() -> VariableRenderer {
        VariableRenderer::new("group_vars/all.yml", "ansible.host")
    }

    #[tokio::test]
    async fn test_connect_render() {
        let (_dir, ws) = workspace(Some("php_version: \"8.2\"\n")).await;
        let params = RenderParams {
            ansible: Some(AnsibleParams {
                username: Some("ops".to_string()),
                password: Some("P@ss1".to_string()),
                ssh_key: None,
            }),
            ..Default::default()
        };

        let vars = renderer().render(&ws, "10.0.0.5", &params).await.unwrap();
        assert_eq!(vars.ansible_user.as_deref(), Some("ops"));
        assert_eq!(vars.ansible_ssh_pass.as_deref(), Some("P@ss1"));
        assert_eq!(vars.ansible_sudo_pass.as_deref(), Some("P@ss1"));

        let inventory = std::fs::read_to_string(ws.join("ansible.host")).unwrap();
        assert_eq!(inventory.trim(), "10.0.0.5");

        let on_disk = renderer().read_variables(&ws).await.unwrap();
        assert_eq!(on_disk, vars);
        assert!(on_disk.extra.contains_key("php_version"));
    }

    #[tokio::test]
    async fn test_successive_renders_union() {
        let (_dir, ws) = workspace(Some("")).await;
        let r = renderer();

        r.render(
            &ws,
            "10.0.0.5",
            &RenderParams {
                ansible: Some(AnsibleParams {
                    username: Some("ops".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let vars = r
            .render(
                &ws,
                "10.0.0.5",
                &RenderParams {
                    app: Some(AppParams {
                        name: Some("My Shop".to_string()),
                        domain: Some("shop.example".to_string()),
                        ..Default::default()
                    }),
                    database: Some(DatabaseParams {
                        root_password: Some("r00t".to_string()),
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(vars.ansible_user.as_deref(), Some("ops"));
        assert_eq!(vars.app_database.as_deref(), Some("my-shop"));
        assert_eq!(vars.app_config.as_deref(), Some("shop.example.conf"));
        assert_eq!(vars.wordpress_home_url.as_deref(), Some("http://shop.example"));
        assert_eq!(vars.mysql_root_password.as_deref(), Some("r00t"));
    }

    #[tokio::test]
    async fn test_login_is_replaced_per_host() {
        let (_dir, ws) = workspace(Some("")).await;
        let r = renderer();

        r.render(
            &ws,
            "10.0.0.6",
            &RenderParams {
                ansible: Some(AnsibleParams {
                    username: Some("admin".to_string()),
                    password: Some("pwB".to_string()),
                    ssh_key: Some(KeyId::new("b0b0")),
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let vars = r
            .render(
                &ws,
                "10.0.0.5",
                &RenderParams {
                    ansible: Some(AnsibleParams {
                        username: Some("ops".to_string()),
                        password: Some("pwA".to_string()),
                        ssh_key: None,
                    }),
                    app: Some(AppParams {
                        name: Some("cache".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(vars.ansible_user.as_deref(), Some("ops"));
        assert_eq!(vars.ansible_ssh_pass.as_deref(), Some("pwA"));
        assert_eq!(vars.ansible_sudo_pass.as_deref(), Some("pwA"));
        assert!(vars.ansible_ssh_private_key_file.is_none());
        assert_eq!(vars.app_database.as_deref(), Some("cache"));
    }

    #[tokio::test]
    async fn test_user_password_is_digested() {
        let (_dir, ws) = workspace(Some("{}\n")).await;
        let params = RenderParams {
            user: Some(UserParams {
                username: Some("deploy".to_string()),
                password: Some("s3cret".to_string()),
            }),
            ..Default::default()
        };

        let vars = renderer().render(&ws, "10.0.0.9", &params).await.unwrap();
        let digest = vars.password.unwrap();
        assert!(digest.starts_with("$6$"));
        assert!(CredentialGenerator::verify_digest(
            "s3cret",
            &crate::domain::credential::Digest::new(digest.clone())
        ));
        let raw = std::fs::read_to_string(ws.join("group_vars/all.yml")).unwrap();
        assert!(!raw.contains("s3cret"));
    }

    #[tokio::test]
    async fn test_ssh_key_path() {
        let params = RenderParams {
            ansible: Some(AnsibleParams {
                ssh_key: Some(KeyId::new("ab12cd34")),
                ..Default::default()
            }),
            ..Default::default()
        };
        let patch = params.to_patch().unwrap();
        assert_eq!(
            patch.ansible_ssh_private_key_file.as_deref(),
            Some("files/ab12cd34.pem")
        );
        assert!(patch.ansible_user.is_none());
    }

    #[tokio::test]
    async fn test_missing_and_malformed_files() {
        let (_dir, ws) = workspace(None).await;
        assert!(matches!(
            renderer().render(&ws, "h", &RenderParams::default()).await,
            Err(RenderError::Missing(_))
        ));

        std::fs::write(ws.join("group_vars/all.yml"), "- a\n- b\n").unwrap();
        assert!(matches!(
            renderer().render(&ws, "h", &RenderParams::default()).await,
            Err(RenderError::Malformed { .. })
        ));
    }
}
