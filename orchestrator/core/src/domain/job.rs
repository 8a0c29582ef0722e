// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Automation Job
//!
//! A job is one supervised run of the automation executable for a single tag.
//! Jobs are keyed by the identity of whatever they act on (a resource id, or
//! the tenant when no resource exists yet) so log subscribers can find them.
//!
//! ## State Machine
//! | From | To | Trigger |
//! |------|----|---------|
//! | `Pending` | `Running` | process spawned |
//! | `Pending` | `Failed` | spawn failure |
//! | `Running` | `Succeeded` | exit status 0 |
//! | `Running` | `Failed` | non-zero exit, timeout or termination |
//!
//! Terminal states never transition again. No automatic retries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::tenant::TenantId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Job keyed by a record-store resource id
    pub fn for_resource(resource_id: &str) -> Self {
        Self(resource_id.to_string())
    }

    /// Job keyed by the tenant when no resource id exists
    pub fn for_tenant(tenant_id: &TenantId) -> Self {
        Self(tenant_id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed {
        /// Process exit code; `None` for spawn failures and signal deaths
        exit_code: Option<i32>,
        reason: String,
    },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Succeeded)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("Invalid job transition from {from:?} to {to:?}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub tag: String,
    status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(id: JobId, tag: impl Into<String>) -> Self {
        Self {
            id,
            tag: tag.into(),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    pub fn start(&mut self) -> Result<(), JobError> {
        self.transition(JobStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn succeed(&mut self) -> Result<(), JobError> {
        self.transition(JobStatus::Succeeded)?;
        self.ended_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, exit_code: Option<i32>, reason: impl Into<String>) -> Result<(), JobError> {
        self.transition(JobStatus::Failed {
            exit_code,
            reason: reason.into(),
        })?;
        self.ended_at = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), JobError> {
        let allowed = matches!(
            (&self.status, &to),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed { .. })
                | (JobStatus::Running, JobStatus::Succeeded)
                | (JobStatus::Running, JobStatus::Failed { .. })
        );
        if !allowed {
            return Err(JobError::InvalidTransition {
                from: self.status.clone(),
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut job = Job::new(JobId::new("srv-1"), "connect");
        assert_eq!(job.status(), &JobStatus::Pending);
        job.start().unwrap();
        assert!(job.started_at.is_some());
        job.succeed().unwrap();
        assert!(job.status().is_success());
        assert!(job.ended_at.is_some());
    }

    #[test]
    fn test_spawn_failure_skips_running() {
        let mut job = Job::new(JobId::new("srv-1"), "connect");
        job.fail(None, "executable not found").unwrap();
        assert!(job.status().is_terminal());
        assert!(!job.status().is_success());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut job = Job::new(JobId::new("srv-1"), "connect");
        job.start().unwrap();
        job.fail(Some(2), "exit status 2").unwrap();
        assert!(job.succeed().is_err());
        assert!(job.start().is_err());
    }

    #[test]
    fn test_cannot_succeed_without_running() {
        let mut job = Job::new(JobId::new("srv-1"), "connect");
        assert!(matches!(
            job.succeed(),
            Err(JobError::InvalidTransition { .. })
        ));
    }
}
