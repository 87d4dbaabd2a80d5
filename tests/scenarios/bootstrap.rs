//! Test: Bootstrap - notebook extensions and vendored install

use crate::helpers::*;
use envpipe::bootstrap::{BootstrapConfig, BootstrapError, BootstrapStage, Bootstrapper};

fn config(cleanup: bool) -> BootstrapConfig {
    let mut config = BootstrapConfig::from_yaml(SWOT_BOOTSTRAP).unwrap();
    config.vendor.cleanup = cleanup;
    config
}

#[tokio::test]
async fn test_bootstrap_installs_and_cleans_up() {
    let root = tempfile::tempdir().unwrap();
    let runner = MockRunner::new().creating_clone_targets();
    let bootstrapper = Bootstrapper::new(runner.clone(), root.path().to_path_buf());

    let report = bootstrapper.bootstrap(&config(true)).await.unwrap();

    assert_eq!(report.extensions_installed, 1);
    assert!(report.cleaned_up);
    assert!(!root.path().join("pyinterp-src").exists());

    let invocations = runner.invocations();
    let commands: Vec<&str> = invocations.iter().map(|i| i.command.as_str()).collect();
    assert_eq!(
        commands,
        vec![
            "jupyter labextension install @jupyter-widgets/jupyterlab-manager",
            "git clone https://github.com/CNES/pangeo-pyinterp pyinterp-src",
            "python setup.py install",
        ]
    );
    // The install runs inside the checkout
    assert_eq!(invocations[2].env.working_dir, root.path().join("pyinterp-src"));

    // A cleaned-up bootstrap can run again
    bootstrapper.bootstrap(&config(true)).await.unwrap();
}

#[tokio::test]
async fn test_second_bootstrap_without_cleanup_fails_at_clone() {
    let root = tempfile::tempdir().unwrap();
    let runner = MockRunner::new().creating_clone_targets();
    let bootstrapper = Bootstrapper::new(runner.clone(), root.path().to_path_buf());

    bootstrapper.bootstrap(&config(false)).await.unwrap();
    assert!(root.path().join("pyinterp-src").exists());

    let err = bootstrapper.bootstrap(&config(false)).await.unwrap_err();
    assert!(matches!(&err, BootstrapError::TargetExists(path) if path == &root.path().join("pyinterp-src")));
    assert_eq!(err.stage(), BootstrapStage::Clone);
    assert_eq!(runner.count_matching("git clone"), 1);
    assert_eq!(runner.count_matching("setup.py install"), 1);
}

#[tokio::test]
async fn test_failed_install_stops_without_rollback() {
    let root = tempfile::tempdir().unwrap();
    let runner = MockRunner::new()
        .creating_clone_targets()
        .failing_on("setup.py install");
    let bootstrapper = Bootstrapper::new(runner, root.path().to_path_buf());

    let err = bootstrapper.bootstrap(&config(true)).await.unwrap_err();

    assert_eq!(err.stage(), BootstrapStage::Install);
    assert!(root.path().join("pyinterp-src").exists());
}

#[tokio::test]
async fn test_failed_extension_stops_before_clone() {
    let root = tempfile::tempdir().unwrap();
    let runner = MockRunner::new().failing_on("labextension");
    let bootstrapper = Bootstrapper::new(runner.clone(), root.path().to_path_buf());

    let err = bootstrapper.bootstrap(&config(true)).await.unwrap_err();

    assert_eq!(err.stage(), BootstrapStage::Extensions);
    assert_eq!(runner.count_matching("git clone"), 0);
}
