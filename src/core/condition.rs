//! Step execution conditions
//!
//! A condition is a predicate over the outcome of the steps that ran before
//! it in the same job. The expression syntax follows the hosted CI
//! orchestrators: `succeeded()`, `succeededOrFailed()`, `failed()`, `always()`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// Aggregate health of a job at the point a step is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobHealth {
    /// Every executed step so far succeeded
    Healthy,
    /// At least one executed step failed
    Failed,
    /// The run was cancelled
    Cancelled,
}

/// When a step is allowed to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Condition {
    /// Only if every previous step succeeded
    #[default]
    Succeeded,
    /// Whenever the job reached a determinate state (not cancelled)
    SucceededOrFailed,
    /// Only if a previous step failed
    Failed,
    /// Unconditionally, even after cancellation
    Always,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown condition expression '{0}'")]
pub struct ConditionError(pub String);

fn expression_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z]+)\s*(\(\s*\))?\s*$").expect("condition pattern is valid")
    })
}

impl Condition {
    /// Parse a condition expression such as `succeededOrFailed()`
    pub fn parse(expr: &str) -> Result<Self, ConditionError> {
        let captures = expression_pattern()
            .captures(expr)
            .ok_or_else(|| ConditionError(expr.to_string()))?;

        match captures[1].to_ascii_lowercase().as_str() {
            "succeeded" => Ok(Condition::Succeeded),
            "succeededorfailed" => Ok(Condition::SucceededOrFailed),
            "failed" => Ok(Condition::Failed),
            "always" => Ok(Condition::Always),
            _ => Err(ConditionError(expr.to_string())),
        }
    }

    /// Decide whether a step with this condition runs given the job's health
    pub fn should_run(&self, health: JobHealth) -> bool {
        match self {
            Condition::Succeeded => health == JobHealth::Healthy,
            Condition::SucceededOrFailed => health != JobHealth::Cancelled,
            Condition::Failed => health == JobHealth::Failed,
            Condition::Always => true,
        }
    }

    pub fn expression(&self) -> &'static str {
        match self {
            Condition::Succeeded => "succeeded()",
            Condition::SucceededOrFailed => "succeededOrFailed()",
            Condition::Failed => "failed()",
            Condition::Always => "always()",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.expression())
    }
}

impl TryFrom<String> for Condition {
    type Error = ConditionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Condition::parse(&value)
    }
}

impl From<Condition> for String {
    fn from(condition: Condition) -> Self {
        condition.expression().to_string()
    }
}
