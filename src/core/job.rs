//! Platform job domain model

use crate::core::{
    context::VariableScope,
    matrix::{binding_label, Binding},
    state::{JobStatus, StepState},
    step::Step,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating system family of a platform image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Linux,
    Macos,
    Windows,
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OsFamily::Linux => "Linux",
            OsFamily::Macos => "Darwin",
            OsFamily::Windows => "Windows_NT",
        };
        f.write_str(name)
    }
}

/// A platform image jobs can run on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub name: String,
    pub image: String,
    pub os: OsFamily,
}

/// One (platform, matrix binding) instance of the pipeline
#[derive(Debug, Clone)]
pub struct PlatformJob {
    /// `<platform>/<value>[/<value>...]`
    pub name: String,

    pub platform: Platform,

    /// Matrix values this job was expanded from
    pub binding: Binding,

    /// Pipeline variables, matrix bindings and built-ins
    pub variables: VariableScope,

    /// Ordered steps, executed strictly in sequence
    pub steps: Vec<Step>,

    pub status: JobStatus,

    pub started_at: Option<DateTime<Utc>>,

    pub completed_at: Option<DateTime<Utc>>,
}

impl PlatformJob {
    pub fn new(platform: Platform, binding: Binding, base: &VariableScope, steps: Vec<Step>) -> Self {
        let name = Self::job_name(&platform.name, &binding);

        let mut variables = base.clone();
        variables.extend(binding.clone());
        variables.set("platform.name", platform.name.clone());
        variables.set("platform.image", platform.image.clone());
        variables.set("agent.os", platform.os.to_string());
        variables.set("job.name", name.clone());

        Self {
            name,
            platform,
            binding,
            variables,
            steps,
            status: JobStatus::Pending,
            started_at: None,
            completed_at: None,
        }
    }

    /// Job name for a platform and binding
    pub fn job_name(platform: &str, binding: &Binding) -> String {
        if binding.is_empty() {
            platform.to_string()
        } else {
            format!("{}/{}", platform, binding_label(binding))
        }
    }

    /// Get a step by display name
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Names of the steps that actually ran, in execution order
    pub fn executed_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.state.was_executed())
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Error message of the step the job failed on
    pub fn failure_message(&self) -> Option<&str> {
        match &self.status {
            JobStatus::Failed { step, .. } => self.step(step).and_then(|s| match &s.state {
                StepState::Failed { error, .. } => Some(error.as_str()),
                _ => None,
            }),
            _ => None,
        }
    }
}
