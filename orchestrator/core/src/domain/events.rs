// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::JobId;

/// Events emitted while an automation job runs.
///
/// The real-time transport consumes these by channel name
/// (`logs:<id>`, `error:<id>`, `done:<id>`) with a raw text payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// A progress line forwarded verbatim from the automation output
    Log {
        job_id: JobId,
        line: String,
        emitted_at: DateTime<Utc>,
    },
    /// The run failed; published exactly once per failed job
    Error {
        job_id: JobId,
        exit_code: Option<i32>,
        message: String,
        failed_at: DateTime<Utc>,
    },
    /// The run completed with exit status 0; published exactly once
    Done {
        job_id: JobId,
        completed_at: DateTime<Utc>,
    },
}

impl RunEvent {
    pub fn log(job_id: JobId, line: impl Into<String>) -> Self {
        RunEvent::Log {
            job_id,
            line: line.into(),
            emitted_at: Utc::now(),
        }
    }

    pub fn error(job_id: JobId, exit_code: Option<i32>, message: impl Into<String>) -> Self {
        RunEvent::Error {
            job_id,
            exit_code,
            message: message.into(),
            failed_at: Utc::now(),
        }
    }

    pub fn done(job_id: JobId) -> Self {
        RunEvent::Done {
            job_id,
            completed_at: Utc::now(),
        }
    }

    pub fn job_id(&self) -> &JobId {
        match self {
            RunEvent::Log { job_id, .. }
            | RunEvent::Error { job_id, .. }
            | RunEvent::Done { job_id, .. } => job_id,
        }
    }

    /// Channel name on the subscription transport, e.g. `logs:srv-42`
    pub fn channel(&self) -> String {
        let prefix = match self {
            RunEvent::Log { .. } => "logs",
            RunEvent::Error { .. } => "error",
            RunEvent::Done { .. } => "done",
        };
        format!("{}:{}", prefix, self.job_id())
    }

    /// Raw text payload carried on the channel
    pub fn payload(&self) -> String {
        match self {
            RunEvent::Log { line, .. } => line.clone(),
            RunEvent::Error { exit_code: Some(code), .. } => code.to_string(),
            RunEvent::Error { message, .. } => message.clone(),
            RunEvent::Done { .. } => "done".to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunEvent::Log { .. })
    }
}
