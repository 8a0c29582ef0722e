// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Database management commands
//!
//! Commands: create, delete, uninstall

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use hostwright_core::application::{CreateDatabase, DatabaseService};
use hostwright_core::domain::tenant::TenantId;

use crate::engine::Engine;
use crate::output;

#[derive(Subcommand)]
pub enum DatabaseCommand {
    /// Create a database on a host running mysql
    Create {
        #[arg(long, env = "HOSTWRIGHT_TENANT")]
        tenant: TenantId,

        /// Target server ID
        #[arg(long)]
        server: String,

        #[arg(long)]
        name: String,

        /// Database login (generated when omitted)
        #[arg(long)]
        username: Option<String>,

        #[arg(long, env = "HOSTWRIGHT_DB_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// App the database belongs to
        #[arg(long)]
        app: Option<String>,
    },

    /// Drop a database
    Delete {
        #[arg(long, env = "HOSTWRIGHT_TENANT")]
        tenant: TenantId,

        #[arg(value_name = "DATABASE_ID")]
        database_id: String,
    },

    /// Remove mysql and every database from a host
    Uninstall {
        #[arg(long, env = "HOSTWRIGHT_TENANT")]
        tenant: TenantId,

        #[arg(value_name = "SERVER_ID")]
        server_id: String,
    },
}

pub async fn handle_command(command: DatabaseCommand, config_path: Option<PathBuf>) -> Result<()> {
    let engine = Engine::new(config_path)?;
    let events = engine.event_bus.subscribe();
    let databases = engine.databases();

    match command {
        DatabaseCommand::Create {
            tenant,
            server,
            name,
            username,
            password,
            app,
        } => {
            println!("{}", format!("🛢  Creating database '{}'...", name).cyan());
            let ticket = databases
                .create(
                    &tenant,
                    CreateDatabase {
                        server_id: server,
                        name,
                        username,
                        password,
                        app_id: app,
                    },
                )
                .await
                .context("Failed to start database creation")?;
            output::follow(ticket, events, "Database created").await
        }
        DatabaseCommand::Delete {
            tenant,
            database_id,
        } => {
            println!("{}", format!("🗑  Deleting database {}...", database_id).cyan());
            let ticket = databases
                .delete(&tenant, &database_id)
                .await
                .with_context(|| format!("Failed to start deletion of database {}", database_id))?;
            output::follow(ticket, events, "Database deleted").await
        }
        DatabaseCommand::Uninstall { tenant, server_id } => {
            println!("{}", format!("🗑  Uninstalling mysql from {}...", server_id).cyan());
            let ticket = databases
                .uninstall(&tenant, &server_id)
                .await
                .with_context(|| format!("Failed to start mysql uninstall on {}", server_id))?;
            output::follow(ticket, events, "Mysql uninstalled").await
        }
    }
}
