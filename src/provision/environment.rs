//! Environments and package specifications

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const OPERATORS: &[&str] = &["==", ">=", "<=", "!=", "~=", "=", ">", "<"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PackageSpecError {
    #[error("empty package specification")]
    Empty,
    #[error("invalid package specification '{0}'")]
    Invalid(String),
}

/// A package name with an optional version constraint and source channel
///
/// Accepts the resolver's string form: `numpy`, `python=3.7`,
/// `xarray>=0.15`, `conda-forge::pyinterp`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageSpec {
    pub channel: Option<String>,
    pub name: String,
    /// Operator and version, e.g. `=3.7` or `>=0.15`
    pub constraint: Option<String>,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            channel: None,
            name: name.into(),
            constraint: None,
        }
    }

    pub fn pinned(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            channel: None,
            name: name.into(),
            constraint: Some(format!("={}", version.into())),
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.constraint.is_some()
    }
}

impl FromStr for PackageSpec {
    type Err = PackageSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PackageSpecError::Empty);
        }

        let (channel, rest) = match s.split_once("::") {
            Some((channel, rest)) => (Some(channel.trim().to_string()), rest.trim()),
            None => (None, s),
        };
        if channel.as_deref() == Some("") {
            return Err(PackageSpecError::Invalid(s.to_string()));
        }

        let split_at = rest.find(|c: char| "=<>!~".contains(c));
        let (name, constraint) = match split_at {
            Some(idx) => {
                let (name, constraint) = rest.split_at(idx);
                let version = OPERATORS
                    .iter()
                    .find_map(|op| constraint.strip_prefix(op))
                    .ok_or_else(|| PackageSpecError::Invalid(s.to_string()))?;
                if version.trim().is_empty() {
                    return Err(PackageSpecError::Invalid(s.to_string()));
                }
                (name.trim(), Some(constraint.trim().to_string()))
            }
            None => (rest, None),
        };

        let valid_name = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-_.".contains(c));
        if !valid_name {
            return Err(PackageSpecError::Invalid(s.to_string()));
        }

        Ok(PackageSpec {
            channel,
            name: name.to_string(),
            constraint,
        })
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(channel) = &self.channel {
            write!(f, "{}::", channel)?;
        }
        f.write_str(&self.name)?;
        if let Some(constraint) = &self.constraint {
            f.write_str(constraint)?;
        }
        Ok(())
    }
}

/// An isolated dependency sandbox owned by one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    pub python: Option<String>,
    /// Installed package specifications
    pub installed: BTreeSet<PackageSpec>,
}

impl Environment {
    pub fn new(name: impl Into<String>, python: Option<String>) -> Self {
        Self {
            name: name.into(),
            python,
            installed: BTreeSet::new(),
        }
    }

    /// Record a successful install. A spec replaces any spec with the same name.
    pub fn record_install(&mut self, specs: &[PackageSpec]) {
        for spec in specs {
            self.installed.retain(|existing| existing.name != spec.name);
            self.installed.insert(spec.clone());
        }
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.installed.iter().any(|spec| spec.name == name)
    }
}

/// The environments created so far by one job
#[derive(Debug, Clone, Default)]
pub struct EnvironmentSet {
    environments: HashMap<String, Environment>,
}

impl EnvironmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a created environment, replacing one with the same name
    pub fn create(&mut self, name: &str, python: Option<String>) -> &Environment {
        self.environments
            .insert(name.to_string(), Environment::new(name, python));
        &self.environments[name]
    }

    pub fn get(&self, name: &str) -> Option<&Environment> {
        self.environments.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Environment> {
        self.environments.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.environments.contains_key(name)
    }
}
