//! Step domain model

use crate::core::{
    condition::Condition,
    config::StepConfig,
    context::VariableScope,
    state::{Phase, StepState},
};
use serde::{Deserialize, Serialize};

/// Create a named environment with an optional interpreter version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEnvSpec {
    pub name: String,
    #[serde(default)]
    pub python: Option<String>,
}

/// Install packages into an existing environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallSpec {
    pub env: String,
    #[serde(default)]
    pub channel: Option<String>,
    pub packages: Vec<String>,
}

/// Run the package build inside an environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    pub env: String,
    #[serde(default = "default_build_command")]
    pub command: String,
}

/// Run the test runner against a test directory inside an environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSpec {
    pub env: String,
    pub target: String,
    #[serde(default = "default_test_runner")]
    pub runner: String,
    /// Write JUnit XML results to this path
    #[serde(default)]
    pub junit_xml: Option<String>,
    /// Write an XML coverage report to this path
    #[serde(default)]
    pub coverage: Option<String>,
}

/// Collect result artifacts and hand them to the result sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishSpec {
    pub test_results: String,
    #[serde(default)]
    pub coverage: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

fn default_build_command() -> String {
    "python setup.py build".to_string()
}

fn default_test_runner() -> String {
    "python -m pytest".to_string()
}

/// What a step does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Register a directory on the search path of all later steps
    AddPath(String),
    /// Free-form shell command
    Script(String),
    CreateEnv(CreateEnvSpec),
    Install(InstallSpec),
    Build(BuildSpec),
    Test(TestSpec),
    PublishResults(PublishSpec),
}

impl StepAction {
    /// The phase failures of this action are attributed to
    pub fn phase(&self) -> Phase {
        match self {
            StepAction::AddPath(_) => Phase::Setup,
            StepAction::Script(_) => Phase::Script,
            StepAction::CreateEnv(_) => Phase::Provision,
            StepAction::Install(_) => Phase::Resolve,
            StepAction::Build(_) => Phase::Build,
            StepAction::Test(_) => Phase::Test,
            StepAction::PublishResults(_) => Phase::Report,
        }
    }

    /// Condition used when the step does not declare one
    pub fn default_condition(&self) -> Condition {
        match self {
            StepAction::PublishResults(_) => Condition::SucceededOrFailed,
            _ => Condition::Succeeded,
        }
    }

    /// Name of the environment this action operates in, if any
    pub fn environment(&self) -> Option<&str> {
        match self {
            StepAction::CreateEnv(spec) => Some(&spec.name),
            StepAction::Install(spec) => Some(&spec.env),
            StepAction::Build(spec) => Some(&spec.env),
            StepAction::Test(spec) => Some(&spec.env),
            _ => None,
        }
    }

    /// Every user-supplied string of the action, for validation
    pub fn templates(&self) -> Vec<&str> {
        match self {
            StepAction::AddPath(path) => vec![path.as_str()],
            StepAction::Script(script) => vec![script.as_str()],
            StepAction::CreateEnv(spec) => {
                let mut out = vec![spec.name.as_str()];
                out.extend(spec.python.as_deref());
                out
            }
            StepAction::Install(spec) => {
                let mut out = vec![spec.env.as_str()];
                out.extend(spec.channel.as_deref());
                out.extend(spec.packages.iter().map(String::as_str));
                out
            }
            StepAction::Build(spec) => vec![spec.env.as_str(), spec.command.as_str()],
            StepAction::Test(spec) => {
                let mut out = vec![spec.env.as_str(), spec.target.as_str(), spec.runner.as_str()];
                out.extend(spec.junit_xml.as_deref());
                out.extend(spec.coverage.as_deref());
                out
            }
            StepAction::PublishResults(spec) => {
                let mut out = vec![spec.test_results.as_str()];
                out.extend(spec.coverage.as_deref());
                out.extend(spec.title.as_deref());
                out
            }
        }
    }

    /// Substitute `$(name)` variables in every string of the action
    pub fn render(&self, scope: &VariableScope) -> StepAction {
        let r = |s: &String| scope.render(s);
        let ro = |s: &Option<String>| s.as_ref().map(|v| scope.render(v));

        match self {
            StepAction::AddPath(path) => StepAction::AddPath(r(path)),
            StepAction::Script(script) => StepAction::Script(r(script)),
            StepAction::CreateEnv(spec) => StepAction::CreateEnv(CreateEnvSpec {
                name: r(&spec.name),
                python: ro(&spec.python),
            }),
            StepAction::Install(spec) => StepAction::Install(InstallSpec {
                env: r(&spec.env),
                channel: ro(&spec.channel),
                packages: spec.packages.iter().map(r).collect(),
            }),
            StepAction::Build(spec) => StepAction::Build(BuildSpec {
                env: r(&spec.env),
                command: r(&spec.command),
            }),
            StepAction::Test(spec) => StepAction::Test(TestSpec {
                env: r(&spec.env),
                target: r(&spec.target),
                runner: r(&spec.runner),
                junit_xml: ro(&spec.junit_xml),
                coverage: ro(&spec.coverage),
            }),
            StepAction::PublishResults(spec) => StepAction::PublishResults(PublishSpec {
                test_results: r(&spec.test_results),
                coverage: ro(&spec.coverage),
                title: ro(&spec.title),
            }),
        }
    }
}

/// A single step of a platform job
#[derive(Debug, Clone)]
pub struct Step {
    /// Display name, surfaced in logs only
    pub name: String,

    pub action: StepAction,

    pub condition: Condition,

    /// Disabled steps are kept in the job but never run
    pub enabled: bool,

    /// Platforms this step applies to (None = all)
    pub platforms: Option<Vec<String>>,

    /// Timeout in seconds
    pub timeout_secs: u64,

    /// Runtime state
    pub state: StepState,
}

#[derive(Debug, Clone)]
pub struct StepDefaults {
    pub timeout_secs: u64,
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: 3600, // 1 hour
        }
    }
}

impl Step {
    /// Create a step from a step config
    pub fn from_config(config: &StepConfig, defaults: &StepDefaults) -> Self {
        Step {
            name: config.name.clone(),
            action: config.action.clone(),
            condition: config
                .condition
                .unwrap_or_else(|| config.action.default_condition()),
            enabled: config.enabled,
            platforms: config.platforms.clone(),
            timeout_secs: config.timeout_secs.unwrap_or(defaults.timeout_secs),
            state: StepState::Pending,
        }
    }

    pub fn phase(&self) -> Phase {
        self.action.phase()
    }

    /// Whether the step runs on the named platform
    pub fn applies_to(&self, platform: &str) -> bool {
        match &self.platforms {
            Some(platforms) => platforms.iter().any(|p| p == platform),
            None => true,
        }
    }
}
