// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Server management commands
//!
//! Commands: connect, delete

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use hostwright_core::application::{ConnectServer, ServerService};
use hostwright_core::domain::tenant::TenantId;

use crate::engine::Engine;
use crate::output;

#[derive(Subcommand)]
pub enum ServerCommand {
    /// Register a host and verify the automation can reach it
    Connect {
        /// Tenant owning the host
        #[arg(long, env = "HOSTWRIGHT_TENANT")]
        tenant: TenantId,

        /// Display name
        #[arg(long)]
        name: String,

        /// Host address
        #[arg(long)]
        ip: String,

        /// Login used on the host
        #[arg(short, long, default_value = "ubuntu")]
        username: String,

        /// Login (and sudo) password
        #[arg(long, env = "HOSTWRIGHT_SSH_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// PEM private key file for key-based login
        #[arg(long, value_name = "FILE")]
        private_key: Option<PathBuf>,
    },

    /// Forget a host nothing references any more
    Delete {
        #[arg(long, env = "HOSTWRIGHT_TENANT")]
        tenant: TenantId,

        #[arg(value_name = "SERVER_ID")]
        server_id: String,
    },
}

pub async fn handle_command(command: ServerCommand, config_path: Option<PathBuf>) -> Result<()> {
    let engine = Engine::new(config_path)?;

    match command {
        ServerCommand::Connect {
            tenant,
            name,
            ip,
            username,
            password,
            private_key,
        } => {
            let private_key = match private_key {
                Some(path) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read private key {:?}", path))?,
                ),
                None => None,
            };

            println!("{}", format!("🔌 Connecting {} ({})...", name, ip).cyan());
            let events = engine.event_bus.subscribe();
            let ticket = engine
                .servers()
                .connect(
                    &tenant,
                    ConnectServer {
                        name,
                        ip,
                        username,
                        password,
                        private_key,
                    },
                )
                .await
                .context("Failed to start connect")?;
            output::follow(ticket, events, "Server connected").await
        }
        ServerCommand::Delete { tenant, server_id } => {
            engine
                .servers()
                .delete(&tenant, &server_id)
                .await
                .with_context(|| format!("Failed to delete server {}", server_id))?;
            println!("{}", format!("✓ Server {} deleted", server_id).green());
            Ok(())
        }
    }
}
