//! Pipeline configuration from YAML

use crate::core::{
    condition::Condition,
    context::placeholders,
    job::OsFamily,
    step::{BuildSpec, CreateEnvSpec, InstallSpec, PublishSpec, StepAction, TestSpec},
    Pipeline,
};
use crate::provision::PackageSpec;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Variables every job defines in addition to the pipeline's own
pub const BUILTIN_VARIABLES: &[&str] = &["platform.name", "platform.image", "agent.os", "job.name"];

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Pipeline version (optional)
    #[serde(default)]
    pub version: Option<String>,

    /// Branches whose pushes start the pipeline
    #[serde(default)]
    pub trigger: TriggerConfig,

    /// Global variables available to all steps
    #[serde(default)]
    variables: HashMap<String, String>,

    /// Matrix axes: variable name -> values
    #[serde(default)]
    matrix: BTreeMap<String, Vec<String>>,

    /// Platform images to run on
    pub platforms: Vec<PlatformConfig>,

    /// Steps run, in order, by every job
    pub steps: Vec<StepConfig>,

    /// Package manager executable (defaults to `conda` on the search path)
    #[serde(default)]
    pub conda: Option<String>,

    /// Default timeout for steps (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default)]
    pub branches: Vec<String>,
}

impl TriggerConfig {
    /// Whether a push to `branch` starts the pipeline. No branches = any.
    pub fn triggers_on(&self, branch: &str) -> bool {
        self.branches.is_empty() || self.branches.iter().any(|b| b == branch)
    }
}

/// Platform configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub name: String,
    pub image: String,
    pub os: OsFamily,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "StepDocument")]
pub struct StepConfig {
    /// Human-readable step name
    pub name: String,

    #[serde(flatten)]
    pub action: StepAction,

    /// Execution condition; defaults depend on the action
    #[serde(default)]
    pub condition: Option<Condition>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Restrict the step to these platforms
    #[serde(default)]
    pub platforms: Option<Vec<String>>,

    /// Timeout for this step (overrides global)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_enabled() -> bool {
    true
}

/// A step as written: the common fields next to exactly one action key.
///
/// Scalars are read as strings straight from the document, so `python: 3.10`
/// stays `3.10` instead of going through a float.
#[derive(Debug, Deserialize)]
struct StepDocument {
    name: String,
    #[serde(default)]
    add_path: Option<String>,
    #[serde(default)]
    script: Option<String>,
    #[serde(default)]
    create_env: Option<CreateEnvSpec>,
    #[serde(default)]
    install: Option<InstallSpec>,
    #[serde(default)]
    build: Option<BuildSpec>,
    #[serde(default)]
    test: Option<TestSpec>,
    #[serde(default)]
    publish_results: Option<PublishSpec>,
    #[serde(default)]
    condition: Option<Condition>,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    platforms: Option<Vec<String>>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

impl TryFrom<StepDocument> for StepConfig {
    type Error = String;

    fn try_from(doc: StepDocument) -> Result<Self, Self::Error> {
        let mut actions: Vec<StepAction> = [
            doc.add_path.map(StepAction::AddPath),
            doc.script.map(StepAction::Script),
            doc.create_env.map(StepAction::CreateEnv),
            doc.install.map(StepAction::Install),
            doc.build.map(StepAction::Build),
            doc.test.map(StepAction::Test),
            doc.publish_results.map(StepAction::PublishResults),
        ]
        .into_iter()
        .flatten()
        .collect();

        let action = match actions.len() {
            1 => actions.remove(0),
            0 => {
                return Err(format!(
                    "step '{}' has no action (add_path, script, create_env, install, build, test or publish_results)",
                    doc.name
                ))
            }
            _ => return Err(format!("step '{}' declares more than one action", doc.name)),
        };

        Ok(StepConfig {
            name: doc.name,
            action,
            condition: doc.condition,
            enabled: doc.enabled,
            platforms: doc.platforms,
            timeout_secs: doc.timeout_secs,
        })
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Pipeline name must not be empty");
        }

        if self.platforms.is_empty() {
            anyhow::bail!("Pipeline '{}' declares no platforms", self.name);
        }

        let mut platform_names = HashSet::new();
        for platform in &self.platforms {
            if !platform_names.insert(platform.name.as_str()) {
                anyhow::bail!("Duplicate platform name: {}", platform.name);
            }
        }

        if self.default_timeout_secs == Some(0) {
            anyhow::bail!("default_timeout_secs must be greater than zero");
        }

        for (axis, values) in &self.matrix {
            if values.is_empty() {
                anyhow::bail!("Matrix axis '{}' has no values", axis);
            }
        }

        let known_variables: HashSet<String> = self
            .variables
            .keys()
            .chain(self.matrix.keys())
            .cloned()
            .chain(BUILTIN_VARIABLES.iter().map(|s| s.to_string()))
            .collect();

        let mut seen_names = HashSet::new();
        let mut created_envs = HashSet::new();
        for step in &self.steps {
            if !seen_names.insert(&step.name) {
                anyhow::bail!("Duplicate step name: {}", step.name);
            }

            if step.timeout_secs == Some(0) {
                anyhow::bail!("Step '{}' has a zero timeout", step.name);
            }

            if let Some(platforms) = &step.platforms {
                for platform in platforms {
                    if !platform_names.contains(platform.as_str()) {
                        anyhow::bail!(
                            "Step '{}' is restricted to unknown platform '{}'",
                            step.name,
                            platform
                        );
                    }
                }
            }

            for template in step.action.templates() {
                for name in placeholders(template) {
                    if !known_variables.contains(&name) {
                        anyhow::bail!(
                            "Step '{}' references undefined variable '{}'",
                            step.name,
                            name
                        );
                    }
                }
            }

            self.validate_action(step, &mut created_envs)?;
        }

        Ok(())
    }

    fn validate_action<'a>(&self, step: &'a StepConfig, created_envs: &mut HashSet<&'a str>) -> Result<()> {
        match &step.action {
            StepAction::AddPath(path) if path.trim().is_empty() => {
                anyhow::bail!("Step '{}' registers an empty path", step.name)
            }
            StepAction::Script(script) if script.trim().is_empty() => {
                anyhow::bail!("Step '{}' has an empty script", step.name)
            }
            StepAction::CreateEnv(spec) => {
                if spec.name.trim().is_empty() {
                    anyhow::bail!("Step '{}' creates an environment without a name", step.name);
                }
                created_envs.insert(spec.name.as_str());
            }
            StepAction::Install(spec) => {
                if spec.packages.is_empty() {
                    anyhow::bail!("Step '{}' installs no packages", step.name);
                }
                for package in &spec.packages {
                    package
                        .parse::<PackageSpec>()
                        .map_err(|e| anyhow::anyhow!("Step '{}': {}", step.name, e))?;
                }
            }
            StepAction::Build(spec) if spec.command.trim().is_empty() => {
                anyhow::bail!("Step '{}' has an empty build command", step.name)
            }
            StepAction::Test(spec) if spec.target.trim().is_empty() => {
                anyhow::bail!("Step '{}' has no test target", step.name)
            }
            _ => {}
        }

        // Environments must be created by an earlier step before they are used
        if let StepAction::Install(_) | StepAction::Build(_) | StepAction::Test(_) = &step.action {
            if let Some(env) = step.action.environment() {
                if !created_envs.contains(env) {
                    anyhow::bail!(
                        "Step '{}' uses environment '{}' before any step creates it",
                        step.name,
                        env
                    );
                }
            }
        }

        Ok(())
    }

    /// Get variables as string map
    pub fn variables_as_string_map(&self) -> HashMap<String, String> {
        self.variables.clone()
    }

    /// Matrix axes, sorted by axis name
    pub fn matrix_axes(&self) -> BTreeMap<String, Vec<String>> {
        self.matrix.clone()
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Pipeline {
        Pipeline::from_config(self)
    }
}
