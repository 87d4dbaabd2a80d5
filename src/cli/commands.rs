//! CLI command definitions

use crate::execution::SchedulingStrategy;
use clap::Args;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Branch the run is for; must be one of the pipeline's trigger branches
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Run even if the branch does not trigger the pipeline
    #[arg(long)]
    pub force: bool,

    /// Variable overrides (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub variable: Vec<(String, String)>,

    /// Enable a disabled platform or step by name
    #[arg(long)]
    pub enable: Vec<String>,

    /// Scheduling strategy
    #[arg(long, value_enum, default_value_t = SchedulingStrategyArg::Sequential)]
    pub strategy: SchedulingStrategyArg,

    /// Maximum concurrent jobs for parallel-limited
    #[arg(long, default_value_t = 4)]
    pub max_jobs: usize,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,

    /// Print the expanded jobs and their commands without running anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List the jobs a pipeline expands to
#[derive(Debug, Args, Clone)]
pub struct MatrixCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Include disabled platforms
    #[arg(long)]
    pub all: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Prepare a notebook environment
#[derive(Debug, Args, Clone)]
pub struct BootstrapCommand {
    /// Path to bootstrap YAML file
    #[arg(short, long)]
    pub file: String,

    /// Directory to bootstrap in (defaults to the current directory)
    #[arg(long)]
    pub root: Option<String>,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline name to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a specific run
    #[arg(long)]
    pub run_id: Option<String>,
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
    #[clap(name = "parallel-limited")]
    ParallelLimited,
}

impl SchedulingStrategyArg {
    pub fn to_strategy(self, max_jobs: usize) -> SchedulingStrategy {
        match self {
            SchedulingStrategyArg::Sequential => SchedulingStrategy::Sequential,
            SchedulingStrategyArg::Parallel => SchedulingStrategy::Parallel,
            SchedulingStrategyArg::ParallelLimited => SchedulingStrategy::LimitedParallel(max_jobs),
        }
    }
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
