//! Test: Environment Scope - search path and environments shared by a job's steps

use crate::helpers::*;
use envpipe::execution::{CancelToken, JobScope, StepExecutor};

const REPEATED: &str = r#"
name: repeated
variables:
  conda.root: /opt/conda
platforms:
  - { name: linux, image: ubuntu-16.04, os: linux }
steps:
  - name: Add conda to PATH
    add_path: $(conda.root)/bin
  - name: Add conda to PATH again
    add_path: $(conda.root)/bin
  - name: Create
    create_env: { name: swot, python: 3.7 }
  - name: Install
    install: { env: swot, channel: conda-forge, packages: [numpy, "dask>=2.0"] }
  - name: Create again
    create_env: { name: swot, python: 3.7 }
  - name: Install again
    install: { env: swot, channel: conda-forge, packages: [numpy, "dask>=2.0"] }
"#;

#[tokio::test]
async fn test_search_path_registered_once() {
    let pipeline = load_pipeline(REPEATED);
    let runner = MockRunner::new();

    let run = run_pipeline_with_mock(&pipeline, runner.clone()).await;

    assert_job_succeeded(&run, "linux");
    let invocations = runner.invocations();
    assert_eq!(invocations.len(), 4);
    for invocation in invocations {
        assert_eq!(invocation.env.path_prefixes, vec!["/opt/conda/bin".to_string()]);
    }
}

#[tokio::test]
async fn test_recreate_and_reinstall_is_idempotent() {
    let pipeline = load_pipeline(REPEATED);
    let job = pipeline.expand_jobs().remove(0);
    let executor = StepExecutor::new(MockRunner::new());
    let mut scope = JobScope::for_job(&job, std::env::temp_dir());
    let cancel = CancelToken::never();

    let mut installed = Vec::new();
    for step in &job.steps {
        executor.execute(step, &mut scope, &cancel).await.unwrap();

        let env = scope.environments.get("swot");
        match step.name.as_str() {
            "Create again" => assert!(env.unwrap().installed.is_empty()),
            "Install" | "Install again" => installed.push(env.unwrap().installed.clone()),
            _ => {}
        }
    }

    assert_eq!(installed.len(), 2);
    assert_eq!(installed[0], installed[1]);

    let env = scope.environments.get("swot").unwrap();
    assert_eq!(env.python.as_deref(), Some("3.7"));
    assert!(env.is_installed("numpy"));
    assert!(env.is_installed("dask"));
}
