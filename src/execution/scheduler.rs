//! Execution scheduler - decides how many jobs run at once

use tokio::sync::Semaphore;

/// Strategy for scheduling job execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// Execute jobs one at a time, in expansion order
    #[default]
    Sequential,

    /// Execute all jobs concurrently
    Parallel,

    /// Limited parallelism (max N concurrent jobs)
    LimitedParallel(usize),
}

/// Hands out job slots according to a strategy
#[derive(Debug, Clone)]
pub struct ExecutionScheduler {
    strategy: SchedulingStrategy,
}

impl ExecutionScheduler {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self { strategy }
    }

    /// How many of `total` jobs may run at the same time
    pub fn max_concurrent(&self, total: usize) -> usize {
        let limit = match self.strategy {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::Parallel => total,
            SchedulingStrategy::LimitedParallel(max) => max.min(total),
        };
        limit.max(1)
    }

    /// Semaphore a run's jobs acquire a permit from before starting
    pub fn slots(&self, total: usize) -> Semaphore {
        Semaphore::new(self.max_concurrent(total))
    }
}
