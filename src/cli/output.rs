//! CLI output formatting

use crate::{
    core::{step::StepAction, JobStatus, PlatformJob, RunStatus, Step},
    execution::ExecutionEvent,
    persistence::RunSummary,
    provision::{Conda, PackageSpec},
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Create a progress bar over the jobs of a run
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    if let Ok(bar_style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} jobs {msg}")
    {
        progress.set_style(bar_style.progress_chars("#>-"));
    }
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// A horizontal rule as wide as the terminal
pub fn separator() -> String {
    let width = term_size::dimensions().map(|(w, _)| w).unwrap_or(80).min(120);
    style("─".repeat(width)).dim().to_string()
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
        RunStatus::Partial => style("PARTIAL").red().to_string(),
        RunStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format a job status for display
pub fn format_job_status(status: &JobStatus) -> String {
    match status {
        JobStatus::Pending => style("PENDING").dim().to_string(),
        JobStatus::Running => style("RUNNING").yellow().to_string(),
        JobStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        JobStatus::Failed { phase, step } => {
            format!("{} in {} ({})", style("FAILED").red(), style(phase).bold(), step)
        }
        JobStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format run summary for display
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        RunStatus::Succeeded => CHECK,
        RunStatus::Failed | RunStatus::Partial => CROSS,
        RunStatus::Running => SPINNER,
        _ => INFO,
    };
    let failed = summary.failed_jobs().count();

    format!(
        "{} {} - {} - {} - {} ({}/{} jobs failed)",
        status_icon,
        style(&summary.run_id.to_string()[..8]).dim(),
        style(&summary.pipeline_name).bold(),
        summary.branch.as_deref().unwrap_or("manual"),
        format_status(summary.status),
        failed,
        summary.jobs.len()
    )
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted {
            run_id,
            pipeline_name,
            jobs,
        } => format!(
            "{} Starting pipeline {} with {} job(s) ({})",
            ROCKET,
            style(pipeline_name).bold(),
            jobs,
            style(&run_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::JobStarted { job } => {
            format!("{} Job {}", ROCKET, style(job).bold())
        }
        ExecutionEvent::StepStarted { job, step } => {
            format!("{} [{}] {}", SPINNER, style(job).dim(), style(step).cyan())
        }
        ExecutionEvent::StepSucceeded { job, step, .. } => {
            format!("{} [{}] {}", CHECK, style(job).dim(), style(step).green())
        }
        ExecutionEvent::StepFailed {
            job,
            step,
            phase,
            error,
        } => format!(
            "{} [{}] {} ({}): {}",
            CROSS,
            style(job).dim(),
            style(step).red(),
            phase,
            style(error).dim()
        ),
        ExecutionEvent::StepSkipped { job, step, reason } => format!(
            "{} [{}] {} ({})",
            SKIP,
            style(job).dim(),
            style(step).dim(),
            reason
        ),
        ExecutionEvent::StepCancelled { job, step } => {
            format!("{} [{}] {} cancelled", WARN, style(job).dim(), style(step).yellow())
        }
        ExecutionEvent::JobFinished { job, status } => {
            format!("{} Job {} {}", INFO, style(job).bold(), format_job_status(status))
        }
        ExecutionEvent::RunFinished { run_id, status } => format!(
            "{} Run ({}) {}",
            INFO,
            style(&run_id.to_string()[..8]).dim(),
            format_status(*status)
        ),
    }
}

/// Describe what a step would do in a job, for dry runs
pub fn format_step_plan(step: &Step, job: &PlatformJob, conda: &Conda) -> String {
    if !step.enabled {
        return format!("{} {} {}", SKIP, style(&step.name).dim(), style("(disabled)").dim());
    }
    if !step.applies_to(&job.platform.name) {
        return format!(
            "{} {} {}",
            SKIP,
            style(&step.name).dim(),
            style(format!("(not run on {})", job.platform.name)).dim()
        );
    }

    let detail = match step.action.render(&job.variables) {
        StepAction::AddPath(dir) => format!("PATH += {}", dir),
        StepAction::Script(script) => script,
        StepAction::CreateEnv(spec) => conda.create_command(&spec.name, spec.python.as_deref()),
        StepAction::Install(spec) => {
            let packages: Result<Vec<PackageSpec>, _> = spec.packages.iter().map(|p| p.parse()).collect();
            match packages {
                Ok(packages) => conda.install_command(&spec.env, spec.channel.as_deref(), &packages),
                Err(e) => format!("invalid package list: {}", e),
            }
        }
        StepAction::Build(spec) => conda.activated(&spec.env, &spec.command),
        StepAction::Test(spec) => conda.activated(&spec.env, &Conda::test_command(&spec)),
        StepAction::PublishResults(spec) => match spec.coverage {
            Some(coverage) => format!("publish {} and {}", spec.test_results, coverage),
            None => format!("publish {}", spec.test_results),
        },
    };

    format!(
        "{} {} [{}]\n      {}",
        SPINNER,
        style(&step.name).cyan(),
        step.condition,
        style(detail).dim()
    )
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}
