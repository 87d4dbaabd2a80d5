//! Core domain models
//!
//! This module defines the pipeline, its platform jobs, their steps, and
//! the configuration they are loaded from.

pub mod condition;
pub mod config;
pub mod context;
pub mod job;
pub mod matrix;
pub mod pipeline;
pub mod run;
pub mod state;
pub mod step;

pub use condition::{Condition, JobHealth};
pub use context::VariableScope;
pub use job::{OsFamily, Platform, PlatformJob};
pub use matrix::{Binding, Matrix};
pub use pipeline::*;
pub use run::PipelineRun;
pub use state::*;
pub use step::*;
