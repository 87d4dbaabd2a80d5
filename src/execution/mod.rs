//! Pipeline execution engine

pub mod cancel;
pub mod engine;
pub mod executor;
pub mod runner;
pub mod scheduler;
pub mod shell;

pub use cancel::{cancel_pair, CancelHandle, CancelToken, RunRegistry};
pub use engine::{EventHandler, ExecutionEngine, ExecutionEvent};
pub use executor::{JobScope, StepError, StepExecutor};
pub use runner::{CommandOutput, CommandRunner, RunnerError, ShellRunner};
pub use scheduler::{ExecutionScheduler, SchedulingStrategy};
pub use shell::{Invocation, ShellEnv};
