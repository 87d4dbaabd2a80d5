//! envpipe - build and test a package across a platform matrix in isolated environments

pub mod bootstrap;
pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod provision;
pub mod report;

// Re-export commonly used types
pub use bootstrap::{BootstrapConfig, BootstrapError, Bootstrapper};
pub use core::{JobStatus, Phase, Pipeline, PipelineRun, PlatformJob, RunStatus, Step, StepState};
pub use execution::{CancelToken, CommandRunner, ExecutionEngine, ExecutionEvent, SchedulingStrategy, ShellRunner};
