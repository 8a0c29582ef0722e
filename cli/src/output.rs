// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Terminal rendering of automation runs

use anyhow::{bail, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::warn;

use hostwright_core::{
    application::ProvisioningTicket,
    domain::{events::RunEvent, job::JobStatus},
    infrastructure::{
        event_bus::{EventBusError, EventReceiver},
        RunHandle,
    },
};

fn spinner(message: String) -> Result<ProgressBar> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(120));
    Ok(bar)
}

/// Print the run's progress lines until it finishes.
///
/// `events` must be subscribed before the run was started, otherwise the
/// first lines are missed.
pub async fn stream_run(job: &RunHandle, events: &mut EventReceiver) -> Result<JobStatus> {
    let job_id = job.job_id().clone();
    let waiting = spinner(format!("Waiting for '{}' to reach the host...", job.tag()))?;
    let mut phase_pending = true;

    loop {
        tokio::select! {
            _ = job.phase_started(), if phase_pending => {
                phase_pending = false;
                waiting.finish_and_clear();
            }
            received = events.recv() => {
                let event = match received {
                    Ok(event) if event.job_id() == &job_id => event,
                    Ok(_) => continue,
                    Err(EventBusError::Lagged(n)) => {
                        warn!("Dropped {} log lines", n);
                        continue;
                    }
                    Err(_) => break,
                };
                if phase_pending {
                    phase_pending = false;
                    waiting.finish_and_clear();
                }
                print_event(&event);
                if event.is_terminal() {
                    break;
                }
            }
        }
    }
    waiting.finish_and_clear();

    Ok(job.wait().await)
}

fn print_event(event: &RunEvent) {
    match event {
        RunEvent::Log { line, .. } => println!("  {}", line.dimmed()),
        RunEvent::Error { message, .. } => eprintln!("{} {}", "✗".red().bold(), message.red()),
        RunEvent::Done { .. } => println!("{}", "✓ Run completed".green()),
    }
}

/// Stream a lifecycle run, wait for its records to settle and fail the
/// command when the run failed.
pub async fn follow(ticket: ProvisioningTicket, mut events: EventReceiver, what: &str) -> Result<()> {
    println!("  Resource ID: {}", ticket.resource_id);
    println!("  Job:         {} ({})", ticket.job_id(), ticket.job.tag());
    println!();

    stream_run(&ticket.job, &mut events).await?;
    let status = ticket.settled().await?;
    ensure_succeeded(&status, what)?;

    println!("{}", format!("✓ {}", what).green().bold());
    Ok(())
}

pub fn ensure_succeeded(status: &JobStatus, what: &str) -> Result<()> {
    match status {
        JobStatus::Succeeded => Ok(()),
        JobStatus::Failed { exit_code, reason } => match exit_code {
            Some(code) => bail!("{} failed (exit code {}): {}", what, code, reason),
            None => bail!("{} failed: {}", what, reason),
        },
        other => bail!("{} ended in unexpected state {:?}", what, other),
    }
}
