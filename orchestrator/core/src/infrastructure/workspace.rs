// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tenant Workspace Manager
//!
//! Materializes one directory per tenant holding a copy of the automation
//! template tree. The copy runs on every lifecycle action so template updates
//! reach existing tenants, and is overwrite-safe per file so a retried call
//! repairs a partial copy.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Per-tenant workspace directories and private-key staging
//!
//! # Layout
//!
//! ```text
//! {root}/{tenant_id}/
//! ├── cman.yml, roles/, ...    copied from the template tree
//! ├── group_vars/all.yml       rendered variables (kept once rendered)
//! ├── ansible.host             inventory (kept once rendered)
//! ├── .template-files          files the last refresh copied
//! └── files/<key-id>.pem       staged private keys, mode 0400
//! ```
//!
//! Version-control metadata and the template's own `files/` directory are
//! never copied, so staged keys are not clobbered. A file listed in
//! `.template-files` that the template no longer has is removed on the next
//! refresh; files the template never provided are left alone.

use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::domain::credential::KeyId;
use crate::domain::tenant::TenantId;
use crate::infrastructure::credentials::CredentialGenerator;

/// Directory (relative to the workspace) holding staged secret files
pub const SECRET_DIR: &str = "files";

/// Workspace-relative list of the files copied from the template
pub const TEMPLATE_MANIFEST: &str = ".template-files";

const VCS_DIRS: [&str; 3] = [".git", ".hg", ".svn"];

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("Template tree not found: {0}")]
    TemplateMissing(PathBuf),

    #[error("Failed to read template tree: {0}")]
    TemplateUnreadable(String),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Workspace task failed: {0}")]
    Task(String),
}

/// A materialized tenant workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    tenant_id: TenantId,
    path: PathBuf,
}

impl Workspace {
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve a path relative to the workspace root
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.path.join(relative)
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    template_dir: PathBuf,
    /// Rendered artifacts copied from the template only while absent
    preserved: Vec<PathBuf>,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>, template_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            template_dir: template_dir.into(),
            preserved: Vec::new(),
        }
    }

    /// Keep these workspace-relative files once they exist
    pub fn with_preserved<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.preserved.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Path of the tenant's workspace; does not touch disk
    pub fn workspace_path(&self, tenant_id: &TenantId) -> PathBuf {
        self.root.join(tenant_id.as_str())
    }

    /// Create or refresh the tenant workspace from the template tree
    pub async fn ensure_workspace(&self, tenant_id: &TenantId) -> Result<Workspace, WorkspaceError> {
        let destination = self.workspace_path(tenant_id);
        let template_dir = self.template_dir.clone();
        let preserved = self.preserved.clone();
        let target = destination.clone();

        let refresh = tokio::task::spawn_blocking(move || {
            copy_template_tree(&template_dir, &target, &preserved)
        })
        .await
        .map_err(|e| WorkspaceError::Task(e.to_string()))??;

        info!(
            tenant = %tenant_id,
            files = refresh.copied,
            pruned = refresh.pruned,
            "Workspace ready at {:?}",
            destination
        );

        Ok(Workspace {
            tenant_id: tenant_id.clone(),
            path: destination,
        })
    }

    /// Write private-key material to `files/<key-id>.pem` with mode 0400
    pub async fn stage_private_key(
        &self,
        workspace: &Workspace,
        content: &str,
    ) -> Result<KeyId, WorkspaceError> {
        let key_id = KeyId::new(CredentialGenerator::generate_suffix(8));
        let path = workspace.join(key_id.relative_path());
        let mut body = content.to_string();
        if !body.ends_with('\n') {
            body.push('\n');
        }

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_key_file(&target, body.as_bytes()))
            .await
            .map_err(|e| WorkspaceError::Task(e.to_string()))?
            .map_err(|source| WorkspaceError::Write { path, source })?;

        info!(tenant = %workspace.tenant_id(), key_id = %key_id, "Staged private key");
        Ok(key_id)
    }
}

fn is_excluded(entry: &DirEntry) -> bool {
    let name = entry.file_name();
    if entry.file_type().is_dir() && VCS_DIRS.iter().any(|vcs| name == OsStr::new(vcs)) {
        return true;
    }
    entry.depth() == 1 && name == OsStr::new(SECRET_DIR)
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Refresh {
    copied: usize,
    pruned: usize,
}

fn copy_template_tree(
    template_dir: &Path,
    destination: &Path,
    preserved: &[PathBuf],
) -> Result<Refresh, WorkspaceError> {
    if !template_dir.is_dir() {
        return Err(WorkspaceError::TemplateMissing(template_dir.to_path_buf()));
    }

    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| WorkspaceError::Write { path, source }
    };

    std::fs::create_dir_all(destination).map_err(write_err(destination))?;

    let previous = read_manifest(destination);
    let mut listed: Vec<PathBuf> = Vec::new();
    let mut copied = 0usize;
    let walker = WalkDir::new(template_dir)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| !is_excluded(entry));

    for entry in walker {
        let entry = entry.map_err(|e| WorkspaceError::TemplateUnreadable(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(template_dir)
            .map_err(|e| WorkspaceError::TemplateUnreadable(e.to_string()))?;
        let target = destination.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target).map_err(write_err(&target))?;
            continue;
        }

        listed.push(relative.to_path_buf());

        if preserved.iter().any(|p| p == relative) && target.exists() {
            debug!("Keeping rendered {:?}", relative);
            continue;
        }

        if file_type.is_symlink() {
            let link = std::fs::read_link(entry.path())
                .map_err(|e| WorkspaceError::TemplateUnreadable(e.to_string()))?;
            if target.symlink_metadata().is_ok() {
                std::fs::remove_file(&target).map_err(write_err(&target))?;
            }
            std::os::unix::fs::symlink(&link, &target).map_err(write_err(&target))?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(write_err(&target))?;
        }
        copied += 1;
    }

    let mut pruned = 0usize;
    for stale in previous.iter().filter(|p| !listed.contains(p)) {
        if preserved.contains(stale) || stale.starts_with(SECRET_DIR) {
            continue;
        }
        let target = destination.join(stale);
        match std::fs::remove_file(&target) {
            Ok(()) => {
                debug!("Pruned {:?}", stale);
                pruned += 1;
                remove_empty_parents(destination, &target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(WorkspaceError::Write { path: target, source }),
        }
    }

    let manifest = destination.join(TEMPLATE_MANIFEST);
    let body: String = listed
        .iter()
        .map(|p| format!("{}\n", p.display()))
        .collect();
    std::fs::write(&manifest, body).map_err(write_err(&manifest))?;

    let secrets = destination.join(SECRET_DIR);
    std::fs::create_dir_all(&secrets).map_err(write_err(&secrets))?;

    Ok(Refresh { copied, pruned })
}

fn read_manifest(destination: &Path) -> Vec<PathBuf> {
    std::fs::read_to_string(destination.join(TEMPLATE_MANIFEST))
        .map(|content| {
            content
                .lines()
                .filter(|line| !line.is_empty())
                .map(PathBuf::from)
                // A hand-edited manifest must not reach outside the workspace
                .filter(|p| p.components().all(|c| matches!(c, std::path::Component::Normal(_))))
                .collect()
        })
        .unwrap_or_default()
}

/// Drop directories a prune left empty, stopping at the workspace root
fn remove_empty_parents(root: &Path, removed: &Path) {
    let mut current = removed.parent();
    while let Some(dir) = current {
        if dir == root || std::fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

fn write_key_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(content)?;
    file.sync_all()?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o400))
}
