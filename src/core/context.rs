//! Job variables and `$(name)` substitution

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\(\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\)").expect("placeholder pattern is valid")
    })
}

/// Variables visible to the steps of one platform job
///
/// Contains pipeline variables, the job's matrix bindings and built-in
/// variables describing the platform. Later layers override earlier ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableScope {
    variables: HashMap<String, String>,
}

impl VariableScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    /// Get a variable
    pub fn get(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    /// Merge another layer of variables on top of this one
    pub fn extend<I, K, V>(&mut self, layer: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in layer {
            self.set(key, value);
        }
    }

    /// Replace every `$(name)` with its value. Unknown names are left as-is.
    pub fn render(&self, template: &str) -> String {
        placeholder_pattern()
            .replace_all(template, |caps: &Captures| match self.variables.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Names referenced by `template` that have no value in this scope
    pub fn unresolved(&self, template: &str) -> Vec<String> {
        placeholders(template)
            .into_iter()
            .filter(|name| !self.variables.contains_key(name))
            .collect()
    }

    /// Variables exported to child processes, e.g. `python.version` -> `PYTHON_VERSION`
    pub fn as_env_vars(&self) -> BTreeMap<String, String> {
        self.variables
            .iter()
            .map(|(key, value)| (env_var_name(key), value.clone()))
            .collect()
    }
}

/// Every variable name referenced by `template`
pub fn placeholders(template: &str) -> Vec<String> {
    placeholder_pattern()
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Convert a variable name to the environment variable it is exported as
pub fn env_var_name(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}
