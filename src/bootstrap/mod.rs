//! Notebook environment bootstrap
//!
//! Installs notebook extensions, then clones a vendored package, installs it
//! from source and removes the checkout. Every stage is fail-fast and nothing
//! is rolled back. The clone refuses to reuse an existing directory, so a
//! second run without cleanup fails.

use crate::execution::{CommandRunner, Invocation, RunnerError, ShellEnv};
use crate::provision::shell_quote;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Bootstrap configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Notebook extensions, installed in order
    #[serde(default)]
    pub extensions: Vec<String>,

    #[serde(default = "default_extension_command")]
    pub extension_command: String,

    pub vendor: VendorConfig,
}

/// Package installed from a fresh source checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorConfig {
    pub repository: String,

    /// Checkout directory, relative to the bootstrap root
    pub workdir: String,

    #[serde(default = "default_install_command")]
    pub install_command: String,

    /// Remove the checkout after installing
    #[serde(default = "default_cleanup")]
    pub cleanup: bool,
}

fn default_extension_command() -> String {
    "jupyter labextension install".to_string()
}

fn default_install_command() -> String {
    "python setup.py install".to_string()
}

fn default_cleanup() -> bool {
    true
}

impl BootstrapConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: BootstrapConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.extensions.iter().any(|e| e.trim().is_empty()) {
            anyhow::bail!("Extension names must not be empty");
        }
        if self.vendor.repository.trim().is_empty() {
            anyhow::bail!("Vendor repository must not be empty");
        }
        let workdir = Path::new(&self.vendor.workdir);
        if self.vendor.workdir.trim().is_empty()
            || workdir.is_absolute()
            || workdir.components().any(|c| matches!(c, std::path::Component::ParentDir))
        {
            anyhow::bail!(
                "Vendor workdir '{}' must be a relative path inside the bootstrap root",
                self.vendor.workdir
            );
        }
        Ok(())
    }
}

/// Stage a bootstrap failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStage {
    Extensions,
    Clone,
    Install,
    Cleanup,
}

impl fmt::Display for BootstrapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootstrapStage::Extensions => "extensions",
            BootstrapStage::Clone => "clone",
            BootstrapStage::Install => "install",
            BootstrapStage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("{stage} failed: '{command}' exited with code {code}: {stderr}")]
    CommandFailed {
        stage: BootstrapStage,
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("clone target {0} already exists")]
    TargetExists(PathBuf),

    #[error("failed to remove {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} failed: {source}")]
    Launch {
        stage: BootstrapStage,
        #[source]
        source: RunnerError,
    },
}

impl BootstrapError {
    pub fn stage(&self) -> BootstrapStage {
        match self {
            BootstrapError::CommandFailed { stage, .. } => *stage,
            BootstrapError::TargetExists(_) => BootstrapStage::Clone,
            BootstrapError::Cleanup { .. } => BootstrapStage::Cleanup,
            BootstrapError::Launch { stage, .. } => *stage,
        }
    }
}

/// What a successful bootstrap did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub extensions_installed: usize,
    pub checkout: PathBuf,
    pub cleaned_up: bool,
}

pub struct Bootstrapper<R> {
    runner: R,
    root: PathBuf,
}

impl<R: CommandRunner> Bootstrapper<R> {
    /// Bootstrap relative to `root`
    pub fn new(runner: R, root: PathBuf) -> Self {
        Self { runner, root }
    }

    pub async fn bootstrap(&self, config: &BootstrapConfig) -> Result<BootstrapReport, BootstrapError> {
        for extension in &config.extensions {
            info!("Installing notebook extension {}", extension);
            let command = format!("{} {}", config.extension_command, shell_quote(extension));
            self.run(BootstrapStage::Extensions, command, &self.root).await?;
        }

        let checkout = self.root.join(&config.vendor.workdir);
        if checkout.exists() {
            return Err(BootstrapError::TargetExists(checkout));
        }

        info!("Cloning {} into {}", config.vendor.repository, checkout.display());
        let command = format!(
            "git clone {} {}",
            shell_quote(&config.vendor.repository),
            shell_quote(&config.vendor.workdir)
        );
        self.run(BootstrapStage::Clone, command, &self.root).await?;

        info!("Installing {}", config.vendor.repository);
        self.run(BootstrapStage::Install, config.vendor.install_command.clone(), &checkout)
            .await?;

        if config.vendor.cleanup {
            debug!("Removing {}", checkout.display());
            tokio::fs::remove_dir_all(&checkout)
                .await
                .map_err(|source| BootstrapError::Cleanup {
                    path: checkout.clone(),
                    source,
                })?;
        }

        Ok(BootstrapReport {
            extensions_installed: config.extensions.len(),
            checkout,
            cleaned_up: config.vendor.cleanup,
        })
    }

    async fn run(&self, stage: BootstrapStage, command: String, dir: &Path) -> Result<(), BootstrapError> {
        let invocation = Invocation {
            step: stage.to_string(),
            command,
            env: ShellEnv::new(dir.to_path_buf()),
        };

        let output = self
            .runner
            .run(&invocation)
            .await
            .map_err(|source| BootstrapError::Launch { stage, source })?;
        if !output.success() {
            return Err(BootstrapError::CommandFailed {
                stage,
                command: invocation.command,
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}
