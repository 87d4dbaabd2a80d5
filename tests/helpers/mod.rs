//! Test utility functions for envpipe scenarios

use async_trait::async_trait;
use envpipe::core::config::PipelineConfig;
use envpipe::core::{JobStatus, Phase, Pipeline, PipelineRun, StepState};
use envpipe::execution::{
    CancelToken, CommandOutput, CommandRunner, ExecutionEngine, Invocation, RunnerError,
    SchedulingStrategy,
};
use envpipe::report::{ReportError, ResultBundle, ResultSink};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// The demo pipeline: linux and macos enabled, windows and publishing disabled
pub const SWOT_PIPELINE: &str = include_str!("../../demos/pipeline.yml");

pub const SWOT_BOOTSTRAP: &str = include_str!("../../demos/bootstrap.yml");

pub const LINUX_STEPS: &[&str] = &[
    "Add conda to PATH",
    "Create conda environment",
    "Install dependencies",
    "Build",
    "Test",
];

/// Mock runner that records every invocation and fails commands containing a pattern
#[derive(Clone, Default)]
pub struct MockRunner {
    invocations: Arc<Mutex<Vec<Invocation>>>,
    fail_on: Vec<String>,
    delay: Option<Duration>,
    slow_on: Vec<(String, Duration)>,
    create_clone_targets: bool,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, pattern: &str) -> Self {
        self.fail_on.push(pattern.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Delay only commands containing `pattern`
    pub fn slow_on(mut self, pattern: &str, delay: Duration) -> Self {
        self.slow_on.push((pattern.to_string(), delay));
        self
    }

    /// Make `git clone` commands create their target directory
    pub fn creating_clone_targets(mut self) -> Self {
        self.create_clone_targets = true;
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.invocations().into_iter().map(|i| i.command).collect()
    }

    pub fn count_matching(&self, pattern: &str) -> usize {
        self.commands().iter().filter(|c| c.contains(pattern)).count()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunnerError> {
        self.invocations.lock().unwrap().push(invocation.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        for (pattern, delay) in &self.slow_on {
            if invocation.command.contains(pattern.as_str()) {
                tokio::time::sleep(*delay).await;
            }
        }

        if self.create_clone_targets && invocation.command.starts_with("git clone ") {
            if let Some(target) = invocation.command.split_whitespace().last() {
                std::fs::create_dir_all(invocation.env.working_dir.join(target))
                    .map_err(|e| RunnerError::Internal(e.to_string()))?;
            }
        }

        let failed = self
            .fail_on
            .iter()
            .any(|p| invocation.command.contains(p.as_str()));

        Ok(CommandOutput {
            exit_code: if failed { 1 } else { 0 },
            stdout: format!("ran {}", invocation.step),
            stderr: if failed {
                format!("{} failed", invocation.step)
            } else {
                String::new()
            },
            duration_ms: 1,
        })
    }
}

/// Result sink that keeps published bundles in memory
#[derive(Clone, Default)]
pub struct MemorySink {
    bundles: Arc<Mutex<Vec<ResultBundle>>>,
}

impl MemorySink {
    pub fn bundles(&self) -> Vec<ResultBundle> {
        self.bundles.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn publish(&self, bundle: &ResultBundle) -> Result<(), ReportError> {
        self.bundles.lock().unwrap().push(bundle.clone());
        Ok(())
    }
}

/// Parse a pipeline, panicking on invalid YAML
pub fn load_pipeline(yaml: &str) -> Pipeline {
    PipelineConfig::from_yaml(yaml).unwrap().to_pipeline()
}

/// Run every job of a pipeline sequentially against a mock runner
pub async fn run_pipeline_with_mock(pipeline: &Pipeline, runner: MockRunner) -> PipelineRun {
    let mut run = pipeline.plan_run(Some("develop".to_string()));
    let engine = ExecutionEngine::new(runner, SchedulingStrategy::Sequential);
    engine.execute(&mut run, &CancelToken::never()).await;
    run
}

/// Run a pipeline with results published to `sink`, relative to `working_dir`
pub async fn run_pipeline_publishing(
    pipeline: &Pipeline,
    runner: MockRunner,
    sink: MemorySink,
    working_dir: &Path,
    cancel: &CancelToken,
) -> PipelineRun {
    let mut run = pipeline.plan_run(Some("develop".to_string()));
    let engine = ExecutionEngine::new(runner, SchedulingStrategy::Parallel)
        .with_sink(Arc::new(sink))
        .with_working_dir(working_dir.to_path_buf());
    engine.execute(&mut run, cancel).await;
    run
}

/// Assert the exact sequence of steps a job executed
pub fn assert_executed_steps(run: &PipelineRun, job: &str, expected: &[&str]) {
    let job = run
        .job(job)
        .unwrap_or_else(|| panic!("Job '{}' not found", job));
    assert_eq!(
        job.executed_steps(),
        expected,
        "Job '{}' executed an unexpected step sequence",
        job.name
    );
}

/// Assert a job failed and that the failure is attributed to `phase`
pub fn assert_job_failed_in(run: &PipelineRun, job: &str, phase: Phase) {
    let job = run
        .job(job)
        .unwrap_or_else(|| panic!("Job '{}' not found", job));
    assert_eq!(
        job.status.failed_phase(),
        Some(phase),
        "Job '{}' should have failed in {}, status: {:?}",
        job.name,
        phase,
        job.status
    );
}

pub fn assert_job_succeeded(run: &PipelineRun, job: &str) {
    let job = run
        .job(job)
        .unwrap_or_else(|| panic!("Job '{}' not found", job));
    assert_eq!(job.status, JobStatus::Succeeded, "Job '{}' should have succeeded", job.name);
}

/// Assert a step never ran in a job
pub fn assert_step_skipped(run: &PipelineRun, job: &str, step: &str) {
    let state = &run
        .job(job)
        .and_then(|j| j.step(step))
        .unwrap_or_else(|| panic!("Step '{}' not found in job '{}'", step, job))
        .state;
    assert!(
        matches!(state, StepState::Skipped { .. }),
        "Step '{}' in job '{}' should have been skipped, state: {:?}",
        step,
        job,
        state
    );
}
