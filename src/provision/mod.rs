//! Environment provisioning
//!
//! Environments are created and filled by the package manager. The crate
//! keeps a job-local record of what each environment holds so later steps
//! can check that the environment they need exists.

pub mod conda;
pub mod environment;

pub use conda::{shell_quote, Conda};
pub use environment::{Environment, EnvironmentSet, PackageSpec, PackageSpecError};
