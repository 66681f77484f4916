//! Scale scenario shape configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};

/// Scale scenario shape configuration
///
/// Describes the fleet a run builds: how many projects, how many guests per
/// project, and the run key timings are recorded under.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Number of projects (namespaces) to create
    #[serde(default = "default_project_count")]
    pub project_count: usize,

    /// Number of guests per project
    #[serde(default = "default_vms_per_project")]
    pub vms_per_project: usize,

    /// Number of quota objects per project
    #[serde(default = "default_quotas_per_project")]
    pub quotas_per_project: usize,

    /// Diskless guests boot faster and never reach the running phase the
    /// report tracks, so that phase is dropped for them
    #[serde(default = "crate::domains::utils::default_true")]
    pub diskless: bool,

    /// Run key this scenario records timings under; keys ending with the
    /// report's baseline suffix become the variance baseline
    #[serde(default = "default_run_key")]
    pub run_key: String,
}

impl ScenarioConfig {
    /// Total guest count across all projects.
    pub fn total_vms(&self) -> usize {
        self.project_count * self.vms_per_project
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            project_count: default_project_count(),
            vms_per_project: default_vms_per_project(),
            quotas_per_project: default_quotas_per_project(),
            diskless: true,
            run_key: default_run_key(),
        }
    }
}

impl Validatable for ScenarioConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.project_count, "project_count", self.domain_name())?;
        validate_positive(self.vms_per_project, "vms_per_project", self.domain_name())?;
        validate_required_string(&self.run_key, "run_key", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "scenario"
    }
}

// Default value functions
fn default_project_count() -> usize {
    1
}

fn default_vms_per_project() -> usize {
    2000
}

fn default_quotas_per_project() -> usize {
    2
}

fn default_run_key() -> String {
    "scale-baseline".to_string()
}
