//! Step executor - runs individual steps of a job

use crate::{
    core::{
        step::{PublishSpec, StepAction},
        Binding, PlatformJob, Step,
    },
    core::context::VariableScope,
    execution::{
        cancel::CancelToken,
        runner::{CommandRunner, RunnerError},
        shell::{Invocation, ShellEnv},
    },
    provision::{Conda, EnvironmentSet, PackageSpec, PackageSpecError},
    report::{collect_artifacts, JsonFileSink, ReportError, ResultBundle, ResultSink},
};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// Lines of stderr kept in a failure message
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Error)]
pub enum StepError {
    #[error("environment '{0}' has not been created")]
    MissingEnvironment(String),

    #[error(transparent)]
    InvalidPackage(#[from] PackageSpecError),

    #[error("command exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("artifact collection did not finish: {0}")]
    Collect(#[from] tokio::task::JoinError),
}

/// Mutable state a job's steps share: search path, variables and environments
#[derive(Debug, Clone)]
pub struct JobScope {
    pub job_name: String,
    pub platform: String,
    pub binding: Binding,
    pub variables: VariableScope,
    pub shell: ShellEnv,
    pub environments: EnvironmentSet,
}

impl JobScope {
    pub fn for_job(job: &PlatformJob, working_dir: PathBuf) -> Self {
        let mut shell = ShellEnv::new(working_dir);
        shell.vars = job.variables.as_env_vars();

        Self {
            job_name: job.name.clone(),
            platform: job.platform.name.clone(),
            binding: job.binding.clone(),
            variables: job.variables.clone(),
            shell,
            environments: EnvironmentSet::new(),
        }
    }
}

/// Executes a single step
pub struct StepExecutor<R> {
    runner: R,
    conda: Conda,
    sink: Arc<dyn ResultSink>,
}

impl<R: CommandRunner> StepExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            conda: Conda::default(),
            sink: Arc::new(JsonFileSink::default()),
        }
    }

    pub fn with_conda(mut self, conda: Conda) -> Self {
        self.conda = conda;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Execute a step and return its output
    pub async fn execute(
        &self,
        step: &Step,
        scope: &mut JobScope,
        cancel: &CancelToken,
    ) -> Result<String, StepError> {
        info!("[{}] Executing step: {}", scope.job_name, step.name);

        match step.action.render(&scope.variables) {
            StepAction::AddPath(dir) => {
                if scope.shell.prepend_path(&dir) {
                    Ok(format!("Added {} to the search path", dir))
                } else {
                    debug!("[{}] {} already on the search path", scope.job_name, dir);
                    Ok(format!("{} already on the search path", dir))
                }
            }
            StepAction::Script(script) => self.run(step, scope, script, cancel).await,
            StepAction::CreateEnv(spec) => {
                let command = self.conda.create_command(&spec.name, spec.python.as_deref());
                let output = self.run(step, scope, command, cancel).await?;
                scope.environments.create(&spec.name, spec.python);
                Ok(output)
            }
            StepAction::Install(spec) => {
                require_environment(scope, &spec.env)?;
                let packages = spec
                    .packages
                    .iter()
                    .map(|p| p.parse::<PackageSpec>())
                    .collect::<Result<Vec<_>, _>>()?;

                let command =
                    self.conda
                        .install_command(&spec.env, spec.channel.as_deref(), &packages);
                let output = self.run(step, scope, command, cancel).await?;

                // Only a successful transaction changes the environment
                if let Some(env) = scope.environments.get_mut(&spec.env) {
                    env.record_install(&packages);
                }
                Ok(output)
            }
            StepAction::Build(spec) => {
                require_environment(scope, &spec.env)?;
                let command = self.conda.activated(&spec.env, &spec.command);
                self.run(step, scope, command, cancel).await
            }
            StepAction::Test(spec) => {
                require_environment(scope, &spec.env)?;
                let command = self.conda.activated(&spec.env, &Conda::test_command(&spec));
                self.run(step, scope, command, cancel).await
            }
            StepAction::PublishResults(spec) => self.publish(scope, spec).await,
        }
    }

    /// Run one command under the step's timeout, racing cancellation
    async fn run(
        &self,
        step: &Step,
        scope: &JobScope,
        command: String,
        cancel: &CancelToken,
    ) -> Result<String, StepError> {
        let invocation = Invocation {
            step: step.name.clone(),
            command,
            env: scope.shell.clone(),
        };
        debug!("[{}] {}", scope.job_name, invocation.command);

        // Dropping the runner future kills the child process
        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StepError::Cancelled),
            result = timeout(Duration::from_secs(step.timeout_secs), self.runner.run(&invocation)) => {
                result.map_err(|_| StepError::Timeout(step.timeout_secs))??
            }
        };

        if !output.success() {
            return Err(StepError::NonZeroExit {
                code: output.exit_code,
                stderr: tail(&output.stderr, STDERR_TAIL_LINES),
            });
        }

        Ok(output.stdout)
    }

    async fn publish(&self, scope: &JobScope, spec: PublishSpec) -> Result<String, StepError> {
        let root = scope.shell.working_dir.clone();
        let results_pattern = spec.test_results.clone();
        let coverage_pattern = spec.coverage.clone();
        // The walk is blocking filesystem work; keep it off the runtime threads
        let (test_results, coverage) = tokio::task::spawn_blocking(move || {
            let test_results = collect_artifacts(&root, &results_pattern)?;
            let coverage = match &coverage_pattern {
                Some(pattern) => collect_artifacts(&root, pattern)?,
                None => Vec::new(),
            };
            Ok::<_, ReportError>((test_results, coverage))
        })
        .await??;

        if test_results.is_empty() {
            warn!(
                "[{}] No test result files match {}",
                scope.job_name, spec.test_results
            );
        }
        if let (Some(pattern), true) = (&spec.coverage, coverage.is_empty()) {
            warn!("[{}] No coverage files match {}", scope.job_name, pattern);
        }

        let bundle = ResultBundle {
            job: scope.job_name.clone(),
            title: spec.title.unwrap_or_else(|| scope.job_name.clone()),
            platform: scope.platform.clone(),
            binding: scope.binding.clone(),
            test_results,
            coverage,
            published_at: Utc::now(),
        };
        self.sink.publish(&bundle).await?;

        Ok(format!(
            "Published {} test result file(s) and {} coverage file(s) as '{}'",
            bundle.test_results.len(),
            bundle.coverage.len(),
            bundle.title
        ))
    }
}

fn require_environment(scope: &JobScope, env: &str) -> Result<(), StepError> {
    if scope.environments.contains(env) {
        Ok(())
    } else {
        Err(StepError::MissingEnvironment(env.to_string()))
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}
