// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Variable Set
//!
//! Typed view of the flat variable file the automation tree reads
//! (`group_vars/all.yml`). Known keys are typed; any other key the template
//! defines is carried through `extra` untouched.
//!
//! ## Merge Rule
//! | Incoming | Prior | Result |
//! |----------|-------|--------|
//! | `Some(x)` | any | `Some(x)` |
//! | `None` | `Some(y)` | `Some(y)` |
//! | `None` | `None` | `None` |
//!
//! A merge never clears a field. `merge(merge(v, a), b)` equals
//! `merge(v, merge(a, b))`, which is what lets several lifecycle steps narrow
//! or extend the same file without clobbering each other.
//!
//! The host login (`ansible_*`) is the one group replaced as a whole, through
//! [`VariableSet::with_login`], when a step targets a host: one workspace
//! serves every host of a tenant.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Login user used when nothing else has been rendered for a host
pub const DEFAULT_ANSIBLE_USER: &str = "ubuntu";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableSet {
    // Host login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ansible_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ansible_ssh_pass: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ansible_sudo_pass: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ansible_ssh_private_key_file: Option<String>,

    // Ordinary host user; `password` is always a digest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mysql_root_password: Option<String>,

    // Application identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_config: Option<String>,

    // CMS admin fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wordpress_home_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wordpress_site_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wordpress_admin_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wordpress_admin_user_pass: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wordpress_admin_email: Option<String>,

    /// Template-defined keys this engine does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl VariableSet {
    /// Overlay `patch` on top of `self`: present incoming fields win,
    /// absent ones keep the prior value.
    pub fn merge(&self, patch: &VariableSet) -> VariableSet {
        fn pick(incoming: &Option<String>, prior: &Option<String>) -> Option<String> {
            incoming.clone().or_else(|| prior.clone())
        }

        let mut extra = self.extra.clone();
        for (key, value) in &patch.extra {
            extra.insert(key.clone(), value.clone());
        }

        VariableSet {
            ansible_user: pick(&patch.ansible_user, &self.ansible_user),
            ansible_ssh_pass: pick(&patch.ansible_ssh_pass, &self.ansible_ssh_pass),
            ansible_sudo_pass: pick(&patch.ansible_sudo_pass, &self.ansible_sudo_pass),
            ansible_ssh_private_key_file: pick(
                &patch.ansible_ssh_private_key_file,
                &self.ansible_ssh_private_key_file,
            ),
            username: pick(&patch.username, &self.username),
            password: pick(&patch.password, &self.password),
            mysql_root_password: pick(&patch.mysql_root_password, &self.mysql_root_password),
            app_username: pick(&patch.app_username, &self.app_username),
            app_password: pick(&patch.app_password, &self.app_password),
            app_database: pick(&patch.app_database, &self.app_database),
            app_domain: pick(&patch.app_domain, &self.app_domain),
            app_config: pick(&patch.app_config, &self.app_config),
            wordpress_home_url: pick(&patch.wordpress_home_url, &self.wordpress_home_url),
            wordpress_site_title: pick(&patch.wordpress_site_title, &self.wordpress_site_title),
            wordpress_admin_user: pick(&patch.wordpress_admin_user, &self.wordpress_admin_user),
            wordpress_admin_user_pass: pick(
                &patch.wordpress_admin_user_pass,
                &self.wordpress_admin_user_pass,
            ),
            wordpress_admin_email: pick(&patch.wordpress_admin_email, &self.wordpress_admin_email),
            extra,
        }
    }

    /// Replace the host login fields with those of `login`; fields absent
    /// there are cleared.
    pub fn with_login(mut self, login: &VariableSet) -> VariableSet {
        self.ansible_user = login.ansible_user.clone();
        self.ansible_ssh_pass = login.ansible_ssh_pass.clone();
        self.ansible_sudo_pass = login.ansible_sudo_pass.clone();
        self.ansible_ssh_private_key_file = login.ansible_ssh_private_key_file.clone();
        self
    }

    /// Fill values the automation tree cannot run without
    pub fn with_defaults(mut self) -> VariableSet {
        if self.ansible_user.is_none() {
            self.ansible_user = Some(DEFAULT_ANSIBLE_USER.to_string());
        }
        self
    }
}

/// Convert a display name into the lowercase, dash-separated form used for
/// database names (`My Shop` → `my-shop`, `myShop` → `my-shop`).
pub fn param_case(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            // fooBar | XMLHttp
            if prev.is_lowercase() || prev.is_numeric() || (prev.is_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }

        current.extend(c.to_lowercase());
    }

    if !current.is_empty() {
        words.push(current);
    }

    words.join("-")
}
