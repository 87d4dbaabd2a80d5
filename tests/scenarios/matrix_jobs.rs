//! Test: Matrix Jobs - expansion, platform filters, variables and isolation

use crate::helpers::*;
use envpipe::core::{Phase, RunStatus};

fn two_versions() -> String {
    SWOT_PIPELINE.replace(
        r#"python.version: ["3.7"]"#,
        r#"python.version: ["3.7", "3.8"]"#,
    )
}

#[test]
fn test_jobs_per_enabled_platform_and_version() {
    let mut pipeline = load_pipeline(&two_versions());

    let names: Vec<String> = pipeline.expand_jobs().into_iter().map(|j| j.name).collect();
    assert_eq!(names, vec!["linux/3.7", "linux/3.8", "macos/3.7", "macos/3.8"]);

    let names = vec!["windows".to_string()];
    assert!(pipeline.enable(&names).is_empty());
    assert_eq!(pipeline.job_count(), 6);
    assert_eq!(pipeline.expand_jobs().len(), 6);
}

#[tokio::test]
async fn test_ownership_step_only_runs_on_macos() {
    let pipeline = load_pipeline(SWOT_PIPELINE);
    let runner = MockRunner::new();

    let run = run_pipeline_with_mock(&pipeline, runner.clone()).await;

    assert_step_skipped(&run, "linux/3.7", "Take ownership of conda installation");
    assert_executed_steps(
        &run,
        "macos/3.7",
        &[
            "Add conda to PATH",
            "Take ownership of conda installation",
            "Create conda environment",
            "Install dependencies",
            "Build",
            "Test",
        ],
    );
    assert_eq!(runner.count_matching("chown"), 1);
}

#[tokio::test]
async fn test_variables_reach_commands_and_environment() {
    let pipeline = load_pipeline(&two_versions());
    let runner = MockRunner::new();

    run_pipeline_with_mock(&pipeline, runner.clone()).await;

    let commands = runner.commands();
    assert!(commands.contains(&"conda create --yes --quiet --name swot python=3.8".to_string()));
    assert!(commands.contains(
        &"conda install --yes --quiet --name swot --channel conda-forge python=3.7 dask numpy pytest"
            .to_string()
    ));

    for invocation in runner.invocations() {
        let version = invocation.env.vars.get("PYTHON_VERSION").unwrap();
        assert!(version == "3.7" || version == "3.8");
        assert_eq!(
            invocation.env.vars.get("CONDA_ROOT").map(String::as_str),
            Some("/usr/share/miniconda")
        );
    }
}

#[tokio::test]
async fn test_failing_job_does_not_affect_siblings() {
    let pipeline = load_pipeline(SWOT_PIPELINE);
    // Only the macos job runs the ownership script
    let runner = MockRunner::new().failing_on("chown");

    let run = run_pipeline_with_mock(&pipeline, runner).await;

    assert_eq!(run.status, RunStatus::Partial);
    assert_job_failed_in(&run, "macos/3.7", Phase::Script);
    assert_job_succeeded(&run, "linux/3.7");
    assert_executed_steps(&run, "linux/3.7", LINUX_STEPS);
    assert_eq!(run.failed_jobs().len(), 1);
}
