//! Test: Failure Phases - which steps run, and where a job's failure is attributed

use crate::helpers::*;
use envpipe::core::{JobStatus, Phase, RunStatus};
use std::time::Duration;

#[tokio::test]
async fn test_successful_job_runs_steps_in_order() {
    let pipeline = load_pipeline(SWOT_PIPELINE);
    let runner = MockRunner::new();

    let run = run_pipeline_with_mock(&pipeline, runner.clone()).await;

    assert_eq!(run.status, RunStatus::Succeeded);
    assert_job_succeeded(&run, "linux/3.7");
    assert_executed_steps(&run, "linux/3.7", LINUX_STEPS);

    // Build and test run with the environment activated
    let commands = runner.commands();
    assert!(commands
        .iter()
        .any(|c| c == "conda run --no-capture-output --name swot python setup.py build"));
    assert!(commands
        .iter()
        .any(|c| c == "conda run --no-capture-output --name swot python -m pytest tests"));
}

#[tokio::test]
async fn test_install_failure_stops_before_build() {
    let pipeline = load_pipeline(SWOT_PIPELINE);
    let runner = MockRunner::new().failing_on("conda install");

    let run = run_pipeline_with_mock(&pipeline, runner.clone()).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_job_failed_in(&run, "linux/3.7", Phase::Resolve);
    assert_executed_steps(
        &run,
        "linux/3.7",
        &["Add conda to PATH", "Create conda environment", "Install dependencies"],
    );
    assert_step_skipped(&run, "linux/3.7", "Build");
    assert_eq!(runner.count_matching("setup.py build"), 0);
    assert_eq!(runner.count_matching("-m pytest"), 0);

    let job = run.job("linux/3.7").unwrap();
    assert!(job
        .failure_message()
        .unwrap()
        .contains("Install dependencies failed"));
}

#[tokio::test]
async fn test_provisioning_failure_runs_nothing_in_the_environment() {
    let pipeline = load_pipeline(SWOT_PIPELINE);
    let runner = MockRunner::new().failing_on("conda create");

    let run = run_pipeline_with_mock(&pipeline, runner.clone()).await;

    assert_job_failed_in(&run, "linux/3.7", Phase::Provision);
    assert_executed_steps(&run, "linux/3.7", &["Add conda to PATH", "Create conda environment"]);
    assert_eq!(runner.count_matching("conda install"), 0);
    assert_eq!(runner.count_matching("conda run"), 0);
}

#[tokio::test]
async fn test_build_failure_skips_test() {
    let pipeline = load_pipeline(SWOT_PIPELINE);
    let runner = MockRunner::new().failing_on("setup.py build");

    let run = run_pipeline_with_mock(&pipeline, runner.clone()).await;

    assert_job_failed_in(&run, "linux/3.7", Phase::Build);
    assert_step_skipped(&run, "linux/3.7", "Test");
    assert_eq!(runner.count_matching("-m pytest"), 0);
    assert_eq!(
        run.job("linux/3.7").unwrap().status,
        JobStatus::Failed {
            phase: Phase::Build,
            step: "Build".to_string(),
        }
    );
}

#[tokio::test]
async fn test_test_failure_is_attributed_to_test_phase() {
    let pipeline = load_pipeline(SWOT_PIPELINE);
    let runner = MockRunner::new().failing_on("-m pytest");

    let run = run_pipeline_with_mock(&pipeline, runner).await;

    assert_job_failed_in(&run, "linux/3.7", Phase::Test);
    assert_job_failed_in(&run, "macos/3.7", Phase::Test);
    assert_executed_steps(&run, "linux/3.7", LINUX_STEPS);
    assert_eq!(run.status, RunStatus::Failed);
}

#[tokio::test]
async fn test_step_timeout_fails_the_job_in_its_phase() {
    let yaml = SWOT_PIPELINE.replace(
        "      command: python setup.py build\n",
        "      command: python setup.py build\n    timeout_secs: 1\n",
    );
    let pipeline = load_pipeline(&yaml);
    let runner = MockRunner::new().slow_on("setup.py build", Duration::from_secs(5));

    let run = run_pipeline_with_mock(&pipeline, runner.clone()).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_job_failed_in(&run, "linux/3.7", Phase::Build);
    assert_step_skipped(&run, "linux/3.7", "Test");
    assert_eq!(runner.count_matching("-m pytest"), 0);

    let job = run.job("linux/3.7").unwrap();
    assert!(job
        .failure_message()
        .unwrap()
        .contains("Timeout after 1 seconds"));
}
