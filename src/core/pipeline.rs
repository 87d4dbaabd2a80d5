//! Pipeline domain model

use crate::core::{
    config::{PipelineConfig, StepConfig, TriggerConfig},
    context::VariableScope,
    job::{Platform, PlatformJob},
    matrix::Matrix,
    run::PipelineRun,
    step::{Step, StepDefaults},
};

/// A platform and whether jobs are generated for it
#[derive(Debug, Clone)]
pub struct PlatformEntry {
    pub platform: Platform,
    pub enabled: bool,
}

/// A pipeline definition
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    pub trigger: TriggerConfig,

    /// Global variables available to all steps
    pub variables: VariableScope,

    pub matrix: Matrix,

    pub platforms: Vec<PlatformEntry>,

    /// Step templates instantiated once per job
    steps: Vec<StepConfig>,

    defaults: StepDefaults,

    /// Package manager executable
    pub conda: String,
}

impl Pipeline {
    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut variables = VariableScope::new();
        variables.extend(config.variables_as_string_map());

        let platforms = config
            .platforms
            .iter()
            .map(|p| PlatformEntry {
                platform: Platform {
                    name: p.name.clone(),
                    image: p.image.clone(),
                    os: p.os,
                },
                enabled: p.enabled,
            })
            .collect();

        Pipeline {
            name: config.name.clone(),
            trigger: config.trigger.clone(),
            variables,
            matrix: Matrix::new(config.matrix_axes()),
            platforms,
            steps: config.steps.clone(),
            defaults: StepDefaults {
                timeout_secs: config
                    .default_timeout_secs
                    .unwrap_or(StepDefaults::default().timeout_secs),
            },
            conda: config.conda.clone().unwrap_or_else(|| "conda".to_string()),
        }
    }

    /// Turn on disabled platforms or steps by name. Returns names that matched nothing.
    pub fn enable<'a>(&mut self, names: &'a [String]) -> Vec<&'a str> {
        let mut unmatched = Vec::new();

        for name in names {
            let mut matched = false;
            for entry in self.platforms.iter_mut().filter(|e| &e.platform.name == name) {
                entry.enabled = true;
                matched = true;
            }
            for step in self.steps.iter_mut().filter(|s| &s.name == name) {
                step.enabled = true;
                matched = true;
            }
            if !matched {
                unmatched.push(name.as_str());
            }
        }

        unmatched
    }

    /// Platforms jobs will be generated for
    pub fn enabled_platforms(&self) -> impl Iterator<Item = &Platform> {
        self.platforms.iter().filter(|e| e.enabled).map(|e| &e.platform)
    }

    /// Expand the pipeline into one job per (enabled platform, matrix combination)
    pub fn expand_jobs(&self) -> Vec<PlatformJob> {
        let combinations = self.matrix.combinations();
        let mut jobs = Vec::new();

        for platform in self.enabled_platforms() {
            for binding in &combinations {
                let steps = self
                    .steps
                    .iter()
                    .map(|config| Step::from_config(config, &self.defaults))
                    .collect();
                jobs.push(PlatformJob::new(
                    platform.clone(),
                    binding.clone(),
                    &self.variables,
                    steps,
                ));
            }
        }

        jobs
    }

    /// Create a run for this pipeline with freshly expanded jobs
    pub fn plan_run(&self, branch: Option<String>) -> PipelineRun {
        PipelineRun::new(self.name.clone(), branch, self.expand_jobs())
    }

    /// Number of jobs a run would contain
    pub fn job_count(&self) -> usize {
        self.enabled_platforms().count() * self.matrix.cardinality()
    }
}
