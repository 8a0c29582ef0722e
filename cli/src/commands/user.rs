// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! System user commands
//!
//! Commands: create, delete

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use hostwright_core::application::{CreateSystemUser, SystemUserService};
use hostwright_core::domain::tenant::TenantId;

use crate::engine::Engine;
use crate::output;

#[derive(Subcommand)]
pub enum UserCommand {
    /// Create a login account on a host
    Create {
        #[arg(long, env = "HOSTWRIGHT_TENANT")]
        tenant: TenantId,

        /// Target server ID
        #[arg(long)]
        server: String,

        #[arg(long)]
        username: String,

        #[arg(long, env = "HOSTWRIGHT_USER_PASSWORD", hide_env_values = true)]
        password: String,

        /// SSH key record to authorize for the account
        #[arg(long)]
        ssh_key: Option<String>,
    },

    /// Remove a login account
    Delete {
        #[arg(long, env = "HOSTWRIGHT_TENANT")]
        tenant: TenantId,

        #[arg(value_name = "USER_ID")]
        user_id: String,
    },
}

pub async fn handle_command(command: UserCommand, config_path: Option<PathBuf>) -> Result<()> {
    let engine = Engine::new(config_path)?;
    let events = engine.event_bus.subscribe();
    let users = engine.system_users();

    match command {
        UserCommand::Create {
            tenant,
            server,
            username,
            password,
            ssh_key,
        } => {
            println!("{}", format!("👤 Creating user '{}'...", username).cyan());
            let ticket = users
                .create(
                    &tenant,
                    CreateSystemUser {
                        server_id: server,
                        username,
                        password,
                        ssh_key_id: ssh_key,
                    },
                )
                .await
                .context("Failed to start user creation")?;
            output::follow(ticket, events, "User created").await
        }
        UserCommand::Delete { tenant, user_id } => {
            println!("{}", format!("🗑  Deleting user {}...", user_id).cyan());
            let ticket = users
                .delete(&tenant, &user_id)
                .await
                .with_context(|| format!("Failed to start deletion of user {}", user_id))?;
            output::follow(ticket, events, "User deleted").await
        }
    }
}
