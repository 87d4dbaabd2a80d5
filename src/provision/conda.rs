//! Command lines for the conda package manager

use crate::core::step::TestSpec;
use crate::provision::PackageSpec;

/// Builds the shell commands that provision and use conda environments
#[derive(Debug, Clone)]
pub struct Conda {
    executable: String,
}

impl Default for Conda {
    fn default() -> Self {
        Self::new("conda")
    }
}

impl Conda {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// `conda create` for a named environment. Re-creating an existing
    /// environment replaces it.
    pub fn create_command(&self, name: &str, python: Option<&str>) -> String {
        let mut command = format!(
            "{} create --yes --quiet --name {}",
            self.executable,
            shell_quote(name)
        );
        if let Some(version) = python {
            command.push(' ');
            command.push_str(&shell_quote(&format!("python={}", version)));
        }
        command
    }

    /// One `conda install` transaction for every package of a step
    pub fn install_command(&self, env: &str, channel: Option<&str>, packages: &[PackageSpec]) -> String {
        let mut command = format!(
            "{} install --yes --quiet --name {}",
            self.executable,
            shell_quote(env)
        );
        if let Some(channel) = channel {
            command.push_str(" --channel ");
            command.push_str(&shell_quote(channel));
        }
        for package in packages {
            command.push(' ');
            command.push_str(&shell_quote(&package.to_string()));
        }
        command
    }

    /// Wrap `command` so it runs with `env` activated
    pub fn activated(&self, env: &str, command: &str) -> String {
        format!(
            "{} run --no-capture-output --name {} {}",
            self.executable,
            shell_quote(env),
            command
        )
    }

    /// The test runner invocation for a test step
    pub fn test_command(spec: &TestSpec) -> String {
        let mut command = format!("{} {}", spec.runner, shell_quote(&spec.target));
        if let Some(junit) = &spec.junit_xml {
            command.push_str(&format!(" --junitxml={}", shell_quote(junit)));
        }
        if let Some(coverage) = &spec.coverage {
            command.push_str(&format!(" --cov --cov-report=xml:{}", shell_quote(coverage)));
        }
        command
    }
}

/// Quote `value` for a POSIX shell when it contains anything but safe characters
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.,/:=+@%".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
