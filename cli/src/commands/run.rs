// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Raw tagged automation run against a tenant workspace

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use hostwright_core::domain::job::JobId;
use hostwright_core::domain::tag::ProvisionTag;
use hostwright_core::domain::tenant::TenantId;
use hostwright_core::infrastructure::{RenderParams, RunOptions};

use crate::engine::Engine;
use crate::output;

#[derive(Args)]
pub struct RunCommand {
    #[arg(long, env = "HOSTWRIGHT_TENANT")]
    tenant: TenantId,

    /// Tag selecting the unit of work
    #[arg(long)]
    tag: String,

    /// Render this server's address and login before running
    #[arg(long)]
    server: Option<String>,
}

pub async fn execute(command: RunCommand, config_path: Option<PathBuf>) -> Result<()> {
    let engine = Engine::new(config_path)?;
    let ctx = &engine.context;

    // Same exclusivity as the lifecycle services
    let _guard = ctx.locks.acquire(&command.tenant).await;

    let workspace = match &command.server {
        Some(server_id) => {
            let server = ctx
                .load_server(&command.tenant, server_id)
                .await
                .with_context(|| format!("Failed to load server {}", server_id))?;
            ctx.prepare(&command.tenant, &server, &RenderParams::default())
                .await
                .context("Failed to render workspace variables")?
        }
        None => ctx
            .workspaces
            .ensure_workspace(&command.tenant)
            .await
            .context("Failed to prepare workspace")?,
    };

    println!(
        "{}",
        format!("▶ Running '{}' for tenant {}...", command.tag, command.tenant).cyan()
    );
    let mut events = engine.event_bus.subscribe();
    let job = ctx.supervisor.run(
        &workspace,
        ProvisionTag::Raw(command.tag.clone()),
        RunOptions::for_job(JobId::for_tenant(&command.tenant)),
    );

    let status = output::stream_run(&job, &mut events).await?;
    output::ensure_succeeded(&status, &format!("Run '{}'", command.tag))
}
