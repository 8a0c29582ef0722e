// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Automation Run Supervisor
//!
//! Launches the automation executable for one tag inside a tenant workspace
//! and follows it to completion.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Spawn, stream, time-limit and settle automation runs
//!
//! # Signals
//!
//! A run is observed through a cloneable [`RunHandle`]:
//!
//! - `phase_started()` resolves once the phase marker appears in the output
//!   (`false` if the run ended first)
//! - `wait()` resolves with the terminal [`JobStatus`]
//! - `status()` is a non-blocking snapshot
//!
//! Progress lines are published on the [`EventBus`] as `logs:<id>`; every run
//! publishes exactly one `error:<id>` or `done:<id>`.
//!
//! The process runs in its own process group so a timeout or `terminate()`
//! takes down everything it forked (ssh multiplexers included).

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use dashmap::DashMap;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::events::RunEvent;
use crate::domain::job::{Job, JobId, JobStatus};
use crate::domain::node_config::AutomationConfig;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::workspace::Workspace;

/// How long to keep reading output after the process has exited
const DRAIN_GRACE: Duration = Duration::from_secs(2);

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("valid ANSI escape pattern"));

fn strip_ansi_codes(line: &str) -> String {
    ANSI_ESCAPE.replace_all(line, "").into_owned()
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Failed to spawn {executable}: {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for automation process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Automation exited with status {0}")]
    ExitStatus(i32),

    #[error("Automation killed by signal {0}")]
    Signal(i32),

    #[error("Automation timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Automation run terminated")]
    Terminated,
}

/// Per-run options
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Identity subscribers follow; defaults to the tenant id
    pub job_id: Option<JobId>,
}

impl RunOptions {
    pub fn for_job(job_id: JobId) -> Self {
        Self {
            job_id: Some(job_id),
        }
    }
}

/// Observer and control for one automation run
#[derive(Clone)]
pub struct RunHandle {
    run_id: Uuid,
    job_id: JobId,
    tag: String,
    status: watch::Receiver<JobStatus>,
    phase: watch::Receiver<Option<bool>>,
    cancel: CancellationToken,
}

impl RunHandle {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    /// `true` once the phase marker was seen, `false` if the run ended first
    pub async fn phase_started(&self) -> bool {
        let mut phase = self.phase.clone();
        let seen = phase
            .wait_for(Option::is_some)
            .await
            .map(|seen| seen.unwrap_or(false));
        seen.unwrap_or_else(|_| phase.borrow().unwrap_or(false))
    }

    /// Wait for the terminal status
    pub async fn wait(&self) -> JobStatus {
        let mut status = self.status.clone();
        let terminal = status
            .wait_for(JobStatus::is_terminal)
            .await
            .map(|terminal| terminal.clone());
        terminal.unwrap_or_else(|_| status.borrow().clone())
    }

    /// Kill the run's process group; the job fails as terminated
    pub fn terminate(&self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("job_id", &self.job_id)
            .field("tag", &self.tag)
            .field("status", &*self.status.borrow())
            .finish()
    }
}

enum Exit {
    Status(ExitStatus),
    WaitFailed(std::io::Error),
    TimedOut(Duration),
    Terminated,
}

pub struct RunSupervisor {
    config: AutomationConfig,
    event_bus: Arc<EventBus>,
    active: Arc<DashMap<JobId, RunHandle>>,
}

impl RunSupervisor {
    pub fn new(config: AutomationConfig, event_bus: Arc<EventBus>) -> Self {
        Self {
            config,
            event_bus,
            active: Arc::new(DashMap::new()),
        }
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Handle of a job that is still running
    pub fn job(&self, job_id: &JobId) -> Option<RunHandle> {
        self.active.get(job_id).map(|entry| entry.value().clone())
    }

    pub fn active_jobs(&self) -> Vec<JobId> {
        self.active.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Start `<executable> <playbook> --tags <tag>` in the workspace.
    ///
    /// Returns immediately; the run is driven by a background task.
    pub fn run(&self, workspace: &Workspace, tag: impl ToString, options: RunOptions) -> RunHandle {
        let tag = tag.to_string();
        let job_id = options
            .job_id
            .unwrap_or_else(|| JobId::for_tenant(workspace.tenant_id()));
        let job = Job::new(job_id.clone(), tag.clone());

        let (status_tx, status_rx) = watch::channel(job.status().clone());
        let (phase_tx, phase_rx) = watch::channel(None);
        let handle = RunHandle {
            run_id: Uuid::new_v4(),
            job_id: job_id.clone(),
            tag: tag.clone(),
            status: status_rx,
            phase: phase_rx,
            cancel: CancellationToken::new(),
        };

        self.active.insert(job_id.clone(), handle.clone());

        let driver = RunDriver {
            config: self.config.clone(),
            event_bus: self.event_bus.clone(),
            active: self.active.clone(),
            run_id: handle.run_id,
            cwd: workspace.path().to_path_buf(),
            cancel: handle.cancel.clone(),
            status_tx,
            phase_tx,
            phase_seen: false,
            job,
        };

        info!(job_id = %job_id, tag = %tag, "Starting automation run");
        tokio::spawn(driver.drive());

        handle
    }
}

struct RunDriver {
    config: AutomationConfig,
    event_bus: Arc<EventBus>,
    active: Arc<DashMap<JobId, RunHandle>>,
    run_id: Uuid,
    cwd: PathBuf,
    cancel: CancellationToken,
    status_tx: watch::Sender<JobStatus>,
    phase_tx: watch::Sender<Option<bool>>,
    phase_seen: bool,
    job: Job,
}

impl RunDriver {
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.executable);
        cmd.arg(&self.config.playbook)
            .arg("--tags")
            .arg(&self.job.tag)
            .current_dir(&self.cwd)
            .env("ANSIBLE_NOCOLOR", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);
        cmd
    }

    async fn drive(mut self) {
        let mut child = match self.command().spawn() {
            Ok(child) => child,
            Err(source) => {
                let err = RunError::Spawn {
                    executable: self.config.executable.clone(),
                    source,
                };
                self.settle(Err(err), None);
                return;
            }
        };

        if let Err(e) = self.job.start() {
            warn!(job_id = %self.job.id, "{}", e);
        }
        self.status_tx.send_replace(self.job.status().clone());

        let (line_tx, mut line_rx) = mpsc::channel::<String>(256);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, line_tx.clone()));
        }
        drop(line_tx);

        let timeout = self.config.timeout;
        let deadline = async move {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let cancel = self.cancel.clone();
        let exit = loop {
            tokio::select! {
                Some(line) = line_rx.recv() => self.handle_line(&line),
                status = child.wait() => break match status {
                    Ok(status) => Exit::Status(status),
                    Err(e) => Exit::WaitFailed(e),
                },
                _ = &mut deadline => break Exit::TimedOut(timeout.unwrap_or_default()),
                _ = cancel.cancelled() => break Exit::Terminated,
            }
        };

        if matches!(exit, Exit::TimedOut(_) | Exit::Terminated) {
            kill_process_group(&mut child).await;
        }

        while let Ok(Some(line)) = tokio::time::timeout(DRAIN_GRACE, line_rx.recv()).await {
            self.handle_line(&line);
        }

        let outcome = match exit {
            Exit::Status(status) if status.success() => Ok(()),
            Exit::Status(status) => Err(exit_status_error(status)),
            Exit::WaitFailed(e) => Err(RunError::Wait(e)),
            Exit::TimedOut(limit) => Err(RunError::TimedOut(limit)),
            Exit::Terminated => Err(RunError::Terminated),
        };
        let exit_code = match &outcome {
            Err(RunError::ExitStatus(code)) => Some(*code),
            _ => None,
        };
        self.settle(outcome, exit_code);
    }

    fn handle_line(&mut self, raw: &str) {
        let line = strip_ansi_codes(raw);
        debug!(job_id = %self.job.id, "{}", line);

        if !self.phase_seen && line.contains(&self.config.phase_marker) {
            self.phase_seen = true;
            self.phase_tx.send_replace(Some(true));
            info!(job_id = %self.job.id, "Automation phase started");
        }

        if line.contains(&self.config.progress_marker) {
            self.event_bus.publish(RunEvent::log(self.job.id.clone(), line));
        }
    }

    fn settle(mut self, outcome: Result<(), RunError>, exit_code: Option<i32>) {
        let job_id = self.job.id.clone();

        let event = match outcome {
            Ok(()) => {
                if let Err(e) = self.job.succeed() {
                    warn!(job_id = %job_id, "{}", e);
                }
                info!(job_id = %job_id, tag = %self.job.tag, "Automation run succeeded");
                RunEvent::done(job_id.clone())
            }
            Err(err) => {
                let reason = err.to_string();
                if let Err(e) = self.job.fail(exit_code, reason.clone()) {
                    warn!(job_id = %job_id, "{}", e);
                }
                error!(job_id = %job_id, tag = %self.job.tag, "Automation run failed: {}", reason);
                RunEvent::error(job_id.clone(), exit_code, reason)
            }
        };

        if !self.phase_seen {
            self.phase_tx.send_replace(Some(false));
        }

        let run_id = self.run_id;
        self.active.remove_if(&job_id, |_, handle| handle.run_id == run_id);
        self.event_bus.publish(event);
        self.status_tx.send_replace(self.job.status().clone());
    }
}

fn exit_status_error(status: ExitStatus) -> RunError {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => RunError::ExitStatus(code),
        (None, Some(signal)) => RunError::Signal(signal),
        (None, None) => RunError::ExitStatus(-1),
    }
}

async fn kill_process_group(child: &mut Child) {
    if let Some(pid) = child.id() {
        // Negative pid targets the whole group created by process_group(0)
        let rc = unsafe { libc::kill(-(pid as libc::pid_t), libc::SIGKILL) };
        if rc != 0 {
            debug!("Process group {} already gone", pid);
        }
    }
    if let Err(e) = child.kill().await {
        debug!("Automation process already exited: {}", e);
    }
}

async fn forward_lines<R>(stream: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\n', '\r'])
                    .to_string();
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("Output stream closed: {}", e);
                break;
            }
        }
    }
}
