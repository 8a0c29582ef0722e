// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::fmt;

use crate::domain::resource::{Component, Stack};

/// Tag selecting one unit of work in the automation template tree
/// (passed as `--tags <tag>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionTag {
    Connect,
    Install(Component),
    Uninstall(Component),
    StackFullInstall(Stack),
    StackCreateSingleApp(Stack),
    StackFullUninstall(Stack),
    StackDeleteSingleApp(Stack),
    MysqlCreateSingleDb,
    MysqlDeleteSingleDb,
    MysqlUninstall,
    CreateSystemUser,
    DeleteSystemUser,
    /// Operator-supplied tag passed through untouched
    Raw(String),
}

impl fmt::Display for ProvisionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionTag::Connect => f.write_str("connect"),
            ProvisionTag::Install(c) => write!(f, "{}-install", c.as_str()),
            ProvisionTag::Uninstall(c) => write!(f, "{}-uninstall", c.as_str()),
            ProvisionTag::StackFullInstall(s) => write!(f, "{}-full-install", s.as_str()),
            ProvisionTag::StackCreateSingleApp(s) => write!(f, "{}-create-single-app", s.as_str()),
            ProvisionTag::StackFullUninstall(s) => write!(f, "{}-full-uninstall", s.as_str()),
            ProvisionTag::StackDeleteSingleApp(s) => write!(f, "{}-delete-single-app", s.as_str()),
            ProvisionTag::MysqlCreateSingleDb => f.write_str("mysql-create-single-db"),
            ProvisionTag::MysqlDeleteSingleDb => f.write_str("mysql-delete-single-db"),
            ProvisionTag::MysqlUninstall => f.write_str("mysql-uninstall"),
            ProvisionTag::CreateSystemUser => f.write_str("create-system-user"),
            ProvisionTag::DeleteSystemUser => f.write_str("delete-system-user"),
            ProvisionTag::Raw(tag) => f.write_str(tag),
        }
    }
}
