//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{BootstrapCommand, HistoryCommand, MatrixCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Build-and-test matrix runner for isolated package-manager environments
#[derive(Debug, Parser, Clone)]
#[command(name = "envpipe")]
#[command(author = "envpipe Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Build and test a package across a platform matrix in isolated environments", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Show step output as steps finish
    #[arg(short, long, global = true)]
    pub stream: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline
    Run(RunCommand),

    /// Validate a pipeline configuration
    Validate(ValidateCommand),

    /// List the jobs a pipeline expands to
    Matrix(MatrixCommand),

    /// Install notebook extensions and a vendored package
    Bootstrap(BootstrapCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
