//! Pipeline run model

use crate::core::{job::PlatformJob, state::RunStatus};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One execution of the whole pipeline
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Unique run ID
    pub run_id: Uuid,

    pub pipeline_name: String,

    /// Branch that triggered the run (None = manual)
    pub branch: Option<String>,

    pub status: RunStatus,

    pub started_at: Option<DateTime<Utc>>,

    pub completed_at: Option<DateTime<Utc>>,

    /// Independent sibling jobs
    pub jobs: Vec<PlatformJob>,
}

impl PipelineRun {
    pub fn new(pipeline_name: String, branch: Option<String>, jobs: Vec<PlatformJob>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline_name,
            branch,
            status: RunStatus::Pending,
            started_at: None,
            completed_at: None,
            jobs,
        }
    }

    /// Mark run as started
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Derive the final status from the jobs and mark the run finished
    pub fn finish(&mut self) -> RunStatus {
        self.status = RunStatus::from_jobs(self.jobs.iter().map(|j| &j.status));
        self.completed_at = Some(Utc::now());
        self.status
    }

    /// Get a job by name
    pub fn job(&self, name: &str) -> Option<&PlatformJob> {
        self.jobs.iter().find(|j| j.name == name)
    }

    pub fn failed_jobs(&self) -> Vec<&PlatformJob> {
        self.jobs.iter().filter(|j| j.status.is_failed()).collect()
    }
}
