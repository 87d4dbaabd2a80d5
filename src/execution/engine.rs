//! Main execution engine - orchestrates the entire pipeline run

use crate::{
    core::{Condition, JobHealth, JobStatus, Phase, PipelineRun, PlatformJob, RunStatus, StepState},
    execution::{
        cancel::CancelToken,
        executor::{JobScope, StepError, StepExecutor},
        runner::CommandRunner,
        scheduler::{ExecutionScheduler, SchedulingStrategy},
    },
    provision::Conda,
    report::ResultSink,
};
use chrono::Utc;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        pipeline_name: String,
        jobs: usize,
    },
    JobStarted {
        job: String,
    },
    StepStarted {
        job: String,
        step: String,
    },
    StepSucceeded {
        job: String,
        step: String,
        output: String,
    },
    StepFailed {
        job: String,
        step: String,
        phase: Phase,
        error: String,
    },
    StepSkipped {
        job: String,
        step: String,
        reason: String,
    },
    StepCancelled {
        job: String,
        step: String,
    },
    JobFinished {
        job: String,
        status: JobStatus,
    },
    RunFinished {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Main pipeline execution engine
pub struct ExecutionEngine<R> {
    scheduler: ExecutionScheduler,
    executor: StepExecutor<R>,
    working_dir: PathBuf,
    event_handlers: Mutex<Vec<EventHandler>>,
}

impl<R: CommandRunner> ExecutionEngine<R> {
    pub fn new(runner: R, strategy: SchedulingStrategy) -> Self {
        Self {
            scheduler: ExecutionScheduler::new(strategy),
            executor: StepExecutor::new(runner),
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            event_handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_conda(mut self, conda: Conda) -> Self {
        self.executor = self.executor.with_conda(conda);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.executor = self.executor.with_sink(sink);
        self
    }

    /// Directory commands run in and artifacts are collected from
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: ExecutionEvent) {
        let handlers = self.event_handlers.lock().unwrap_or_else(|e| e.into_inner());
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Execute every job of the run and return the derived run status
    pub async fn execute(&self, run: &mut PipelineRun, cancel: &CancelToken) -> RunStatus {
        info!(
            "Starting pipeline run: {} ({}, {} jobs)",
            run.pipeline_name,
            run.run_id,
            run.jobs.len()
        );
        run.start();
        self.emit_event(ExecutionEvent::RunStarted {
            run_id: run.run_id,
            pipeline_name: run.pipeline_name.clone(),
            jobs: run.jobs.len(),
        });

        let slots = self.scheduler.slots(run.jobs.len());
        let jobs = run.jobs.iter_mut().map(|job| {
            let slots = &slots;
            async move {
                // The semaphore is never closed
                let _permit = slots.acquire().await.ok();
                self.execute_job(job, cancel).await;
            }
        });
        join_all(jobs).await;

        let status = run.finish();
        info!("Pipeline run {} finished: {}", run.run_id, status);
        self.emit_event(ExecutionEvent::RunFinished {
            run_id: run.run_id,
            status,
        });
        status
    }

    /// Run one job's steps strictly in order
    async fn execute_job(&self, job: &mut PlatformJob, cancel: &CancelToken) {
        info!("Starting job: {}", job.name);
        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
        self.emit_event(ExecutionEvent::JobStarted {
            job: job.name.clone(),
        });

        let mut scope = JobScope::for_job(job, self.working_dir.clone());
        let mut health = JobHealth::Healthy;
        let mut first_failure: Option<(Phase, String)> = None;
        let never = CancelToken::never();

        for step in job.steps.iter_mut() {
            if health != JobHealth::Cancelled && cancel.is_cancelled() {
                warn!("[{}] Run cancelled", job.name);
                health = JobHealth::Cancelled;
            }

            let skip_reason = if !step.enabled {
                Some("disabled".to_string())
            } else if !step.applies_to(&job.platform.name) {
                Some(format!("not run on {}", job.platform.name))
            } else if !step.condition.should_run(health) {
                Some(format!("condition {} not met", step.condition))
            } else {
                None
            };

            if let Some(reason) = skip_reason {
                info!("[{}] Skipping step {}: {}", job.name, step.name, reason);
                self.emit_event(ExecutionEvent::StepSkipped {
                    job: job.name.clone(),
                    step: step.name.clone(),
                    reason: reason.clone(),
                });
                step.state = StepState::Skipped { reason };
                continue;
            }

            let started_at = Utc::now();
            step.state = StepState::Running { started_at };
            self.emit_event(ExecutionEvent::StepStarted {
                job: job.name.clone(),
                step: step.name.clone(),
            });

            // always() steps run to completion even once the run is cancelled
            let token = if step.condition == Condition::Always { &never } else { cancel };

            match self.executor.execute(step, &mut scope, token).await {
                Ok(output) => {
                    step.state = StepState::Succeeded {
                        output: output.clone(),
                        started_at,
                        completed_at: Utc::now(),
                    };
                    self.emit_event(ExecutionEvent::StepSucceeded {
                        job: job.name.clone(),
                        step: step.name.clone(),
                        output,
                    });
                }
                Err(StepError::Cancelled) => {
                    warn!("[{}] Step {} cancelled", job.name, step.name);
                    step.state = StepState::Cancelled { started_at };
                    health = JobHealth::Cancelled;
                    self.emit_event(ExecutionEvent::StepCancelled {
                        job: job.name.clone(),
                        step: step.name.clone(),
                    });
                }
                Err(e) => {
                    let phase = step.phase();
                    error!("[{}] Step {} failed ({}): {}", job.name, step.name, phase, e);
                    step.state = StepState::Failed {
                        error: e.to_string(),
                        started_at,
                        failed_at: Utc::now(),
                    };
                    if first_failure.is_none() {
                        first_failure = Some((phase, step.name.clone()));
                    }
                    if health == JobHealth::Healthy {
                        health = JobHealth::Failed;
                    }
                    self.emit_event(ExecutionEvent::StepFailed {
                        job: job.name.clone(),
                        step: step.name.clone(),
                        phase,
                        error: e.to_string(),
                    });
                }
            }
        }

        job.status = match (health, first_failure) {
            (JobHealth::Cancelled, _) => JobStatus::Cancelled,
            (_, Some((phase, step))) => JobStatus::Failed { phase, step },
            _ => JobStatus::Succeeded,
        };
        job.completed_at = Some(Utc::now());

        info!("Job {} finished: {:?}", job.name, job.status);
        self.emit_event(ExecutionEvent::JobFinished {
            job: job.name.clone(),
            status: job.status.clone(),
        });
    }
}
