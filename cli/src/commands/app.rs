// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! App management commands
//!
//! Commands: create, delete

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use hostwright_core::application::{AppService, CreateApp};
use hostwright_core::domain::resource::AppType;
use hostwright_core::domain::tenant::TenantId;
use hostwright_core::infrastructure::renderer::WordpressParams;

use crate::engine::Engine;
use crate::output;

/// Site settings for wordpress apps
#[derive(Args, Default)]
pub struct WordpressArgs {
    /// Site title
    #[arg(long)]
    wp_title: Option<String>,

    /// Admin account name
    #[arg(long)]
    wp_admin_user: Option<String>,

    #[arg(long, env = "HOSTWRIGHT_WP_ADMIN_PASSWORD", hide_env_values = true)]
    wp_admin_password: Option<String>,

    #[arg(long)]
    wp_admin_email: Option<String>,
}

impl WordpressArgs {
    fn into_params(self) -> Option<WordpressParams> {
        let params = WordpressParams {
            title: self.wp_title,
            username: self.wp_admin_user,
            password: self.wp_admin_password,
            email: self.wp_admin_email,
        };
        let empty = params.title.is_none()
            && params.username.is_none()
            && params.password.is_none()
            && params.email.is_none();
        (!empty).then_some(params)
    }
}

#[derive(Subcommand)]
pub enum AppCommand {
    /// Install a component or application stack on a host
    Create {
        #[arg(long, env = "HOSTWRIGHT_TENANT")]
        tenant: TenantId,

        /// Target server ID
        #[arg(long)]
        server: String,

        #[arg(long)]
        name: String,

        /// nginx, apache, mysql, mongodb, docker or wordpress
        #[arg(long = "type", value_name = "TYPE")]
        app_type: AppType,

        #[arg(long)]
        domain: Option<String>,

        /// Database login for the app (generated when omitted)
        #[arg(long)]
        db_user: Option<String>,

        #[arg(long, hide_env_values = true, env = "HOSTWRIGHT_APP_DB_PASSWORD")]
        db_password: Option<String>,

        #[command(flatten)]
        wordpress: WordpressArgs,
    },

    /// Remove an app from its host
    Delete {
        #[arg(long, env = "HOSTWRIGHT_TENANT")]
        tenant: TenantId,

        #[arg(value_name = "APP_ID")]
        app_id: String,
    },
}

pub async fn handle_command(command: AppCommand, config_path: Option<PathBuf>) -> Result<()> {
    let engine = Engine::new(config_path)?;

    match command {
        AppCommand::Create {
            tenant,
            server,
            name,
            app_type,
            domain,
            db_user,
            db_password,
            wordpress,
        } => {
            println!("{}", format!("📦 Creating {} app '{}'...", app_type, name).cyan());
            let events = engine.event_bus.subscribe();
            let ticket = engine
                .apps()
                .create(
                    &tenant,
                    CreateApp {
                        server_id: server,
                        name,
                        app_type,
                        domain,
                        app_username: db_user,
                        app_password: db_password,
                        wordpress: wordpress.into_params(),
                    },
                )
                .await
                .context("Failed to start app creation")?;
            output::follow(ticket, events, "App created").await
        }
        AppCommand::Delete { tenant, app_id } => {
            println!("{}", format!("🗑  Deleting app {}...", app_id).cyan());
            let events = engine.event_bus.subscribe();
            let ticket = engine
                .apps()
                .delete(&tenant, &app_id)
                .await
                .with_context(|| format!("Failed to start deletion of app {}", app_id))?;
            output::follow(ticket, events, "App deleted").await
        }
    }
}
