//! Result reporting
//!
//! A publish step collects test result and coverage files by glob and hands
//! them, tagged with the job they came from, to a [`ResultSink`].

pub mod artifacts;

pub use artifacts::{collect_artifacts, glob_to_regex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid artifact pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode result manifest: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Artifacts of one job, tagged with where they came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultBundle {
    pub job: String,

    /// Display title, e.g. `Python 3.7`
    pub title: String,

    pub platform: String,

    /// Matrix values of the job
    pub binding: BTreeMap<String, String>,

    pub test_results: Vec<PathBuf>,

    pub coverage: Vec<PathBuf>,

    pub published_at: DateTime<Utc>,
}

impl ResultBundle {
    pub fn is_empty(&self) -> bool {
        self.test_results.is_empty() && self.coverage.is_empty()
    }
}

/// Destination for published results
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn publish(&self, bundle: &ResultBundle) -> Result<(), ReportError>;
}

/// Writes one JSON manifest per job into a directory
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl Default for JsonFileSink {
    fn default() -> Self {
        Self::new(PathBuf::from(".envpipe").join("results"))
    }
}

impl JsonFileSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Manifest path for a job; `/` in job names become `-`
    pub fn manifest_path(&self, job: &str) -> PathBuf {
        let file: String = job
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' { c } else { '-' })
            .collect();
        self.dir.join(format!("{}.json", file))
    }
}

#[async_trait]
impl ResultSink for JsonFileSink {
    async fn publish(&self, bundle: &ResultBundle) -> Result<(), ReportError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ReportError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.manifest_path(&bundle.job);
        let json = serde_json::to_vec_pretty(bundle)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| ReportError::Io {
                path: path.clone(),
                source,
            })?;

        info!("Wrote result manifest for {} to {}", bundle.job, path.display());
        Ok(())
    }
}
