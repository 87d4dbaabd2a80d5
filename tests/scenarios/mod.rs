//! Scenario tests, one module per behaviour

mod bootstrap;
mod cancellation;
mod environment_scope;
mod failure_phases;
mod matrix_jobs;
mod publish_conditions;
