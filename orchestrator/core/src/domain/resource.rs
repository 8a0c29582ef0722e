// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Resource Records
//!
//! Typed views over the rows the engine reads and writes in the external
//! record store, plus the component catalogue that decides which automation
//! tags a host needs.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Server, app, database and system-user records; host
//!   component flags; full-install decision

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::tenant::TenantId;

/// A row type stored in one record-store table
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const TABLE: &'static str;

    fn id(&self) -> Option<&str>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Connecting,
    Connected,
    Provisioning,
    Active,
    Deleting,
    Failed,
}

/// Installed-component flags carried on a server row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFlags {
    #[serde(default)]
    pub apache: bool,
    #[serde(default)]
    pub nginx: bool,
    #[serde(default)]
    pub mysql: bool,
    #[serde(default)]
    pub mongodb: bool,
    #[serde(default)]
    pub docker: bool,
}

impl HostFlags {
    pub fn has(&self, component: Component) -> bool {
        match component {
            Component::Apache => self.apache,
            Component::Nginx => self.nginx,
            Component::Mysql => self.mysql,
            Component::Mongodb => self.mongodb,
            Component::Docker => self.docker,
        }
    }

    pub fn set(&mut self, component: Component, installed: bool) {
        match component {
            Component::Apache => self.apache = installed,
            Component::Nginx => self.nginx = installed,
            Component::Mysql => self.mysql = installed,
            Component::Mongodb => self.mongodb = installed,
            Component::Docker => self.docker = installed,
        }
    }

    pub fn has_web_server(&self) -> bool {
        self.apache || self.nginx
    }
}

/// A single installable host component with direct install/uninstall tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Apache,
    Nginx,
    Mysql,
    Mongodb,
    Docker,
}

impl Component {
    pub const ALL: [Component; 5] = [
        Component::Apache,
        Component::Nginx,
        Component::Mysql,
        Component::Mongodb,
        Component::Docker,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Apache => "apache",
            Component::Nginx => "nginx",
            Component::Mysql => "mysql",
            Component::Mongodb => "mongodb",
            Component::Docker => "docker",
        }
    }
}

/// A composite application stack built from several components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stack {
    Wordpress,
}

impl Stack {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stack::Wordpress => "wordpress",
        }
    }

    /// Components a full install provisions on the host
    pub fn full_install_components(&self) -> &'static [Component] {
        match self {
            Stack::Wordpress => &[Component::Nginx, Component::Mysql],
        }
    }

    pub fn needs_database(&self) -> bool {
        match self {
            Stack::Wordpress => true,
        }
    }
}

/// Decide whether creating an app of `stack` must provision the whole stack.
///
/// A stack needs a web server and its database engine on the host. Missing
/// either one means the host has not been prepared and a full install runs;
/// otherwise only the single app is added.
pub fn requires_full_install(flags: &HostFlags, stack: Stack) -> bool {
    match stack {
        Stack::Wordpress => !flags.has_web_server() || !flags.mysql,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AppType {
    Component(Component),
    Stack(Stack),
}

impl AppType {
    pub fn needs_database(&self) -> bool {
        match self {
            AppType::Component(component) => *component == Component::Mysql,
            AppType::Stack(stack) => stack.needs_database(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppType::Component(component) => component.as_str(),
            AppType::Stack(stack) => stack.as_str(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Unknown app type: {0}")]
pub struct UnknownAppType(pub String);

impl FromStr for AppType {
    type Err = UnknownAppType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(component) = Component::ALL.iter().find(|c| c.as_str() == s) {
            return Ok(AppType::Component(*component));
        }
        match s {
            "wordpress" => Ok(AppType::Stack(Stack::Wordpress)),
            other => Err(UnknownAppType(other.to_string())),
        }
    }
}

impl TryFrom<String> for AppType {
    type Error = UnknownAppType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AppType> for String {
    fn from(app_type: AppType) -> Self {
        app_type.as_str().to_string()
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecord {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub tenant_id: TenantId,
    pub name: String,
    pub ip: String,
    /// Login the automation uses on this host
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Staged private key (`files/<id>.pem` in the tenant workspace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key_id: Option<String>,
    #[serde(default)]
    pub reachable: bool,
    pub status: ResourceStatus,
    #[serde(flatten)]
    pub flags: HostFlags,
}

impl Record for ServerRecord {
    const TABLE: &'static str = "servers";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRecord {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub tenant_id: TenantId,
    pub name: String,
    #[serde(rename = "type")]
    pub app_type: AppType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub server_id: String,
    /// Whether this app's creation provisioned the whole stack
    #[serde(default)]
    pub init: bool,
    pub status: ResourceStatus,
}

impl Record for AppRecord {
    const TABLE: &'static str = "apps";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Username identifying a host's root database credential row
pub const ROOT_DB_USER: &str = "root";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseRecord {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub tenant_id: TenantId,
    pub name: String,
    pub username: String,
    pub password: String,
    pub server_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    pub status: ResourceStatus,
}

impl DatabaseRecord {
    pub fn is_root(&self) -> bool {
        self.username == ROOT_DB_USER
    }
}

impl Record for DatabaseRecord {
    const TABLE: &'static str = "databases";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemUserRecord {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub tenant_id: TenantId,
    pub username: String,
    pub server_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key_id: Option<String>,
    pub status: ResourceStatus,
}

impl Record for SystemUserRecord {
    const TABLE: &'static str = "system_users";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}
