// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Hostwright CLI
//!
//! The `hostwright` binary drives provisioning runs against managed hosts.
//!
//! ## Architecture
//!
//! Every invocation wires the engine in-process from the discovered
//! configuration, starts one lifecycle run and streams its progress until
//! the run settles. Records persist in the configured record store.
//!
//! ## Commands
//!
//! - `hostwright server connect|delete` - Host registration
//! - `hostwright app create|delete` - Components and application stacks
//! - `hostwright database create|delete|uninstall` - Databases on mysql hosts
//! - `hostwright user create|delete` - Login accounts on hosts
//! - `hostwright run --tenant <id> --tag <tag>` - Raw tagged run
//! - `hostwright config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use hostwright::commands::{
    self, AppCommand, ConfigCommand, DatabaseCommand, RunCommand, ServerCommand, UserCommand,
};

/// Hostwright - provision hosts with tagged automation runs
#[derive(Parser)]
#[command(name = "hostwright")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "HOSTWRIGHT_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "HOSTWRIGHT_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Host management
    #[command(name = "server")]
    Server {
        #[command(subcommand)]
        command: ServerCommand,
    },

    /// Components and application stacks
    #[command(name = "app")]
    App {
        #[command(subcommand)]
        command: AppCommand,
    },

    /// Databases on mysql hosts
    #[command(name = "database")]
    Database {
        #[command(subcommand)]
        command: DatabaseCommand,
    },

    /// Login accounts on hosts
    #[command(name = "user")]
    User {
        #[command(subcommand)]
        command: UserCommand,
    },

    /// Run one automation tag against a tenant workspace
    #[command(name = "run")]
    Run {
        #[command(flatten)]
        command: RunCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Server { command }) => {
            commands::server::handle_command(command, cli.config).await
        }
        Some(Commands::App { command }) => commands::app::handle_command(command, cli.config).await,
        Some(Commands::Database { command }) => {
            commands::database::handle_command(command, cli.config).await
        }
        Some(Commands::User { command }) => commands::user::handle_command(command, cli.config).await,
        Some(Commands::Run { command }) => commands::run::execute(command, cli.config).await,
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    Ok(())
}
