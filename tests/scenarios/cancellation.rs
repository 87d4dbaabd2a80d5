//! Test: Cancellation - a newer run on the same branch supersedes the active one

use crate::helpers::*;
use envpipe::core::{JobStatus, RunStatus};
use envpipe::execution::{ExecutionEngine, RunRegistry, SchedulingStrategy};
use std::time::Duration;

#[tokio::test]
async fn test_newer_run_supersedes_active_run() {
    let pipeline = load_pipeline(SWOT_PIPELINE);
    let registry = RunRegistry::new();

    let (first_handle, first_token) = registry.register("develop");
    let slow = MockRunner::new().with_delay(Duration::from_millis(200));
    let mut first_run = pipeline.plan_run(Some("develop".to_string()));
    let first = tokio::spawn(async move {
        let engine = ExecutionEngine::new(slow, SchedulingStrategy::Parallel);
        let status = engine.execute(&mut first_run, &first_token).await;
        (status, first_run)
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let (second_handle, second_token) = registry.register("develop");
    assert!(first_handle.is_cancelled());

    let (status, first_run) = first.await.unwrap();
    assert_eq!(status, RunStatus::Cancelled);
    assert!(first_run.jobs.iter().all(|j| j.status == JobStatus::Cancelled));
    // Nothing runs after the in-flight step
    assert_step_skipped(&first_run, "linux/3.7", "Build");

    let mut second_run = pipeline.plan_run(Some("develop".to_string()));
    let engine = ExecutionEngine::new(MockRunner::new(), SchedulingStrategy::Parallel);
    let status = engine.execute(&mut second_run, &second_token).await;
    assert_eq!(status, RunStatus::Succeeded);

    // The superseded run finishing late leaves the newer one registered
    registry.complete("develop", &first_handle);
    assert!(registry.cancel("develop"));
    assert!(second_handle.is_cancelled());

    registry.complete("develop", &second_handle);
    assert!(!registry.cancel("develop"));
}

#[tokio::test]
async fn test_runs_on_other_branches_are_independent() {
    let registry = RunRegistry::new();

    let (master, _) = registry.register("master");
    let (develop, _) = registry.register("develop");

    assert!(!master.is_cancelled());
    assert!(!develop.is_cancelled());
}
