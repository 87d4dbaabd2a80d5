//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage a step belongs to, used to attribute failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Search-path registration and other host preparation
    Setup,
    /// Environment creation
    Provision,
    /// Dependency installation
    Resolve,
    /// Package build
    Build,
    /// Test runner
    Test,
    /// Result publishing
    Report,
    /// Free-form shell script
    Script,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Setup => "setup",
            Phase::Provision => "provision",
            Phase::Resolve => "resolve",
            Phase::Build => "build",
            Phase::Test => "test",
            Phase::Report => "report",
            Phase::Script => "script",
        };
        f.write_str(name)
    }
}

/// State of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StepState {
    /// Step has not been reached yet
    Pending,
    /// Step is currently running
    Running {
        started_at: DateTime<Utc>,
    },
    /// Step exited successfully
    Succeeded {
        output: String,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Step failed
    Failed {
        error: String,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Step was not executed (disabled, filtered out, or condition not met)
    Skipped {
        reason: String,
    },
    /// Step was terminated by a cancellation
    Cancelled {
        started_at: DateTime<Utc>,
    },
}

impl StepState {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepState::Pending | StepState::Running { .. })
    }

    /// Whether the step actually invoked its action
    pub fn was_executed(&self) -> bool {
        matches!(
            self,
            StepState::Succeeded { .. } | StepState::Failed { .. } | StepState::Cancelled { .. }
        )
    }
}

/// Terminal (or in-flight) status of a platform job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    /// Failed, attributed to the first failing step and its phase
    Failed {
        phase: Phase,
        step: String,
    },
    Cancelled,
}

impl JobStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, JobStatus::Failed { .. })
    }

    /// Phase the job failed in, if it failed
    pub fn failed_phase(&self) -> Option<Phase> {
        match self {
            JobStatus::Failed { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

/// Overall pipeline run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run has not started
    Pending,
    /// Run is in progress
    Running,
    /// Every job succeeded
    Succeeded,
    /// Every job failed
    Failed,
    /// Some jobs succeeded and some failed
    Partial,
    /// Run was cancelled or superseded
    Cancelled,
}

impl RunStatus {
    /// Derive the run status from the terminal statuses of its jobs
    pub fn from_jobs<'a, I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = &'a JobStatus>,
    {
        let mut succeeded = 0;
        let mut failed = 0;
        let mut cancelled = 0;

        for status in statuses {
            match status {
                JobStatus::Succeeded => succeeded += 1,
                JobStatus::Failed { .. } => failed += 1,
                JobStatus::Cancelled => cancelled += 1,
                JobStatus::Pending | JobStatus::Running => {}
            }
        }

        if cancelled > 0 {
            RunStatus::Cancelled
        } else if failed > 0 && succeeded > 0 {
            RunStatus::Partial
        } else if failed > 0 {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        }
    }

    /// Whether the orchestrator should mark the run as failed
    pub fn is_failure(&self) -> bool {
        matches!(self, RunStatus::Failed | RunStatus::Partial | RunStatus::Cancelled)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
