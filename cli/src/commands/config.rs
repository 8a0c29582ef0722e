// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use hostwright_core::domain::node_config::ProvisionerConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./hostwright-config.yaml)
        #[arg(short, long, default_value = "./hostwright-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = ProvisionerConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. HOSTWRIGHT_CONFIG_PATH: {}",
            std::env::var("HOSTWRIGHT_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./hostwright-config.yaml");
        println!("  4. ~/.hostwright/config.yaml");
        println!("  5. /etc/hostwright/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Node:".bold());
    println!("  Name: {}", config.metadata.name);
    if let Some(version) = &config.metadata.version {
        println!("  Version: {}", version);
    }
    println!();

    let spec = &config.spec;
    println!("{}", "Workspaces:".bold());
    println!("  Root: {}", spec.workspace.root.display());
    println!("  Template: {}", spec.workspace.template_dir.display());
    println!();

    println!("{}", "Automation:".bold());
    println!("  Command: {} {} --tags <tag>", spec.automation.executable, spec.automation.playbook);
    println!("  Variables: {}", spec.automation.variables_file.display());
    println!("  Inventory: {}", spec.automation.inventory_file.display());
    println!(
        "  Markers: phase '{}', progress '{}'",
        spec.automation.phase_marker, spec.automation.progress_marker
    );
    match spec.automation.timeout {
        Some(timeout) => println!("  Timeout: {:?}", timeout),
        None => println!("  Timeout: {}", "(none)".dimmed()),
    }
    println!();

    println!("{}", "Record store:".bold());
    match &spec.record_store {
        Some(store) => {
            println!("  URL: {}", store.url);
            println!(
                "  Token: {}",
                if store.token.is_some() { "(set)" } else { "(none)" }
            );
        }
        None => println!("  {}", "in-memory (records are not persisted)".yellow()),
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = ProvisionerConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    if !config.spec.workspace.template_dir.is_dir() {
        println!(
            "{}",
            format!(
                "⚠ Template directory {} does not exist yet",
                config.spec.workspace.template_dir.display()
            )
            .yellow()
        );
    }

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
