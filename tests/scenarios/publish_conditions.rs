//! Test: Publish Conditions - succeededOrFailed() result publishing

use crate::helpers::*;
use envpipe::core::{JobStatus, Phase, Pipeline, RunStatus, StepState};
use envpipe::execution::{cancel_pair, CancelToken};
use tempfile::TempDir;

const PUBLISH: &str = "Publish test results";

fn publishing_pipeline() -> Pipeline {
    let mut pipeline = load_pipeline(SWOT_PIPELINE);
    assert!(pipeline.enable(&[PUBLISH.to_string()]).is_empty());
    pipeline
}

/// A checkout with one JUnit report and one coverage report
fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("reports")).unwrap();
    std::fs::write(dir.path().join("reports").join("test-results.xml"), "<testsuite/>").unwrap();
    std::fs::write(dir.path().join("coverage.xml"), "<coverage/>").unwrap();
    dir
}

#[tokio::test]
async fn test_publish_is_disabled_by_default() {
    let pipeline = load_pipeline(SWOT_PIPELINE);
    let dir = workspace();
    let sink = MemorySink::default();

    let run = run_pipeline_publishing(
        &pipeline,
        MockRunner::new(),
        sink.clone(),
        dir.path(),
        &CancelToken::never(),
    )
    .await;

    assert_eq!(run.status, RunStatus::Succeeded);
    assert_step_skipped(&run, "linux/3.7", PUBLISH);
    assert!(sink.bundles().is_empty());
}

#[tokio::test]
async fn test_publish_runs_after_test_failure() {
    let pipeline = publishing_pipeline();
    let dir = workspace();
    let sink = MemorySink::default();

    let run = run_pipeline_publishing(
        &pipeline,
        MockRunner::new().failing_on("-m pytest"),
        sink.clone(),
        dir.path(),
        &CancelToken::never(),
    )
    .await;

    // Publishing does not clear the test failure
    assert_eq!(run.status, RunStatus::Failed);
    assert_job_failed_in(&run, "linux/3.7", Phase::Test);
    let publish = run.job("linux/3.7").unwrap().step(PUBLISH).unwrap();
    assert!(matches!(publish.state, StepState::Succeeded { .. }));

    let mut bundles = sink.bundles();
    bundles.sort_by(|a, b| a.job.cmp(&b.job));
    assert_eq!(bundles.len(), 2);
    assert_eq!(bundles[0].job, "linux/3.7");
    assert_eq!(bundles[0].title, "Python 3.7");
    assert_eq!(bundles[0].platform, "linux");
    assert_eq!(
        bundles[0].test_results,
        vec![dir.path().join("reports").join("test-results.xml")]
    );
    assert_eq!(bundles[0].coverage, vec![dir.path().join("coverage.xml")]);
    assert_eq!(bundles[1].job, "macos/3.7");
}

#[tokio::test]
async fn test_publish_with_no_artifacts_still_succeeds() {
    let pipeline = publishing_pipeline();
    let dir = tempfile::tempdir().unwrap();
    let sink = MemorySink::default();

    let run = run_pipeline_publishing(
        &pipeline,
        MockRunner::new(),
        sink.clone(),
        dir.path(),
        &CancelToken::never(),
    )
    .await;

    assert_eq!(run.status, RunStatus::Succeeded);
    assert!(sink.bundles().iter().all(|b| b.is_empty()));
}

#[tokio::test]
async fn test_publish_skipped_after_cancellation() {
    let pipeline = publishing_pipeline();
    let dir = workspace();
    let sink = MemorySink::default();
    let runner = MockRunner::new();

    let (handle, token) = cancel_pair();
    handle.cancel();

    let run = run_pipeline_publishing(&pipeline, runner.clone(), sink.clone(), dir.path(), &token)
        .await;

    assert_eq!(run.status, RunStatus::Cancelled);
    assert_eq!(run.job("linux/3.7").unwrap().status, JobStatus::Cancelled);
    assert_step_skipped(&run, "linux/3.7", PUBLISH);
    assert!(runner.invocations().is_empty());
    assert!(sink.bundles().is_empty());
}
