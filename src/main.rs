use anyhow::{Context, Result};
use envpipe::bootstrap::{BootstrapConfig, Bootstrapper};
use envpipe::cli::commands::{
    BootstrapCommand, HistoryCommand, MatrixCommand, RunCommand, ValidateCommand,
};
use envpipe::cli::output::*;
use envpipe::cli::{Cli, Command};
use envpipe::core::config::PipelineConfig;
use envpipe::core::{matrix::binding_label, Pipeline, PipelineRun};
use envpipe::execution::{cancel_pair, ExecutionEngine, ExecutionEvent, ShellRunner};
use envpipe::persistence::{create_summary, PersistenceBackend, RunSummary};
use envpipe::provision::Conda;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over -v
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let succeeded = match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, &cli).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Matrix(cmd) => show_matrix(cmd)?,
        Command::Bootstrap(cmd) => bootstrap(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    };

    if !succeeded {
        std::process::exit(1);
    }

    Ok(())
}

async fn run_pipeline(cmd: &RunCommand, cli: &Cli) -> Result<bool> {
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;

    println!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());

    if let Some(branch) = &cmd.branch {
        if !config.trigger.triggers_on(branch) {
            if !cmd.force {
                println!(
                    "{} Branch {} does not trigger {} (use --force to run anyway)",
                    INFO,
                    style(branch).cyan(),
                    style(&config.name).bold()
                );
                return Ok(true);
            }
            println!("{}Forcing run on untriggered branch {}", WARN, style(branch).cyan());
        }
    }

    let mut pipeline = config.to_pipeline();

    for name in pipeline.enable(&cmd.enable) {
        println!("{}No platform or step named {}", WARN, style(name).yellow());
    }

    for (key, value) in &cmd.variable {
        pipeline.variables.set(key, value);
        println!(
            "{} Variable override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    let mut run = pipeline.plan_run(cmd.branch.clone());
    if run.jobs.is_empty() {
        println!("{}No enabled platforms, nothing to run", WARN);
        return Ok(true);
    }

    if cmd.dry_run {
        print_plan(&pipeline, &run);
        return Ok(true);
    }

    let engine = ExecutionEngine::new(ShellRunner::new(), cmd.strategy.to_strategy(cmd.max_jobs))
        .with_conda(Conda::new(pipeline.conda.clone()));

    let progress = create_progress_bar(run.jobs.len());
    {
        let progress = progress.clone();
        let stream = cli.stream;
        engine.add_event_handler(move |event| {
            progress.println(format_execution_event(&event));

            if stream {
                if let ExecutionEvent::StepSucceeded { output, .. } = &event {
                    if !output.trim().is_empty() {
                        progress.println(format_output(output, 5));
                    }
                }
            }
            if let ExecutionEvent::JobFinished { job, .. } = &event {
                progress.inc(1);
                progress.set_message(job.clone());
            }
        });
    }

    // ctrl-c cancels the run
    let (handle, token) = cancel_pair();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    println!("{}", separator());
    let status = engine.execute(&mut run, &token).await;
    progress.finish_and_clear();
    interrupt.abort();
    println!("{}", separator());

    for job in &run.jobs {
        println!("  {} {}", style(&job.name).bold(), format_job_status(&job.status));
        if let Some(message) = job.failure_message() {
            println!("      {}", style(message).dim());
        }
    }

    if !cmd.no_history {
        let summary = create_summary(&run);
        match open_store().await {
            Ok(store) => {
                store.save_run(&summary).await?;
                println!(
                    "\n{} Run saved to history (ID: {})",
                    INFO,
                    style(&summary.run_id.to_string()[..8]).dim()
                );
            }
            Err(e) => error!("Run history unavailable: {:#}", e),
        }
    }

    if status.is_failure() {
        println!(
            "\n{} {} {}",
            CROSS,
            style(&pipeline.name).bold(),
            format_status(status)
        );
        return Ok(false);
    }

    println!(
        "\n{} {} completed {}",
        CHECK,
        style(&pipeline.name).bold(),
        style("successfully").green()
    );
    Ok(true)
}

fn print_plan(pipeline: &Pipeline, run: &PipelineRun) {
    let conda = Conda::new(pipeline.conda.clone());

    println!("{} Dry run: {} job(s)", INFO, run.jobs.len());
    for job in &run.jobs {
        println!("\n{} {} ({})", ROCKET, style(&job.name).bold(), style(&job.platform.image).dim());
        for step in &job.steps {
            println!("  {}", format_step_plan(step, job, &conda));
        }
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<bool> {
    println!("{} Validating pipeline...", INFO);

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            let pipeline = config.to_pipeline();

            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Triggers: {}", style(config.trigger.branches.join(", ")).cyan());
            for entry in &pipeline.platforms {
                let state = if entry.enabled {
                    style("enabled").green()
                } else {
                    style("disabled").dim()
                };
                println!("  Platform: {} ({})", style(&entry.platform.name).bold(), state);
            }
            println!("  Steps: {}", style(config.steps.len()).cyan());
            println!("  Matrix combinations: {}", style(pipeline.matrix.cardinality()).cyan());
            println!("  Jobs: {}", style(pipeline.job_count()).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(true)
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            Ok(false)
        }
    }
}

fn show_matrix(cmd: &MatrixCommand) -> Result<bool> {
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;
    let mut pipeline = config.to_pipeline();

    if cmd.all {
        let names: Vec<String> = pipeline.platforms.iter().map(|e| e.platform.name.clone()).collect();
        pipeline.enable(&names);
    }

    let jobs = pipeline.expand_jobs();

    if cmd.json {
        let data: Vec<_> = jobs
            .iter()
            .map(|job| {
                serde_json::json!({
                    "name": job.name,
                    "platform": job.platform.name,
                    "image": job.platform.image,
                    "binding": job.binding,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "jobs": data }))?);
        return Ok(true);
    }

    println!("{} {} expands to {} job(s):", INFO, style(&pipeline.name).bold(), jobs.len());
    for job in &jobs {
        println!(
            "  {} {} {}",
            style(&job.name).bold(),
            style(&job.platform.image).dim(),
            style(binding_label(&job.binding)).cyan()
        );
    }

    Ok(true)
}

async fn bootstrap(cmd: &BootstrapCommand) -> Result<bool> {
    let config = BootstrapConfig::from_file(&cmd.file).context("Failed to load bootstrap config")?;
    let root = match &cmd.root {
        Some(root) => PathBuf::from(root),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    debug!("Bootstrapping in {}", root.display());

    let bootstrapper = Bootstrapper::new(ShellRunner::new(), root);
    match bootstrapper.bootstrap(&config).await {
        Ok(report) => {
            println!(
                "{} Installed {} extension(s) and {}",
                CHECK,
                report.extensions_installed,
                style(&config.vendor.repository).bold()
            );
            if report.cleaned_up {
                println!("  Removed {}", style(report.checkout.display()).dim());
            }
            Ok(true)
        }
        Err(e) => {
            println!("{} Bootstrap failed during {}:", CROSS, style(e.stage()).bold());
            println!("  {}", style(e).red());
            Ok(false)
        }
    }
}

async fn show_history(cmd: &HistoryCommand) -> Result<bool> {
    let store = open_store().await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) if cmd.json => {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Some(summary) => print_run_details(&summary),
            None => println!("{}Run not found", WARN),
        }
        return Ok(true);
    }

    let runs: Vec<RunSummary> = match &cmd.pipeline {
        Some(pipeline_name) => store
            .list_runs(pipeline_name)
            .await?
            .into_iter()
            .take(cmd.limit)
            .collect(),
        None => store.recent_runs(cmd.limit).await?,
    };

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(true);
    }

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{} Run history (showing latest {}):", INFO, cmd.limit);
        for summary in &runs {
            println!("  {}", format_run_summary(summary));
        }
    }

    Ok(true)
}

fn print_run_details(summary: &RunSummary) {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Branch: {}", summary.branch.as_deref().unwrap_or("manual"));
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }

    println!("  Jobs:");
    for job in &summary.jobs {
        println!(
            "    {} {} ({} steps run)",
            style(&job.name).bold(),
            format_job_status(&job.status),
            job.executed_steps
        );
        if let Some(error) = &job.error {
            println!("      {}", style(error).dim());
        }
    }
}

fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(feature = "sqlite")]
async fn open_store() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(envpipe::persistence::SqliteRunStore::with_default_path().await?))
}

#[cfg(not(feature = "sqlite"))]
async fn open_store() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(envpipe::persistence::InMemoryPersistence::new()))
}
