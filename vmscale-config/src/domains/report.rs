//! Timing report and variance gate configuration

use crate::error::ConfigResult;
use crate::validation::{validate_fraction, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};

/// Timing report and variance gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// YAML file accumulating one report document per run; `None` keeps the
    /// report in memory only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,

    /// Run keys ending with this suffix are the variance baseline
    #[serde(default = "default_baseline_suffix")]
    pub baseline_suffix: String,

    /// Allowed elapsed-time overhead over the baseline before a run fails
    /// the gate (0.10 = 10%)
    #[serde(default = "default_allowed_overhead")]
    pub allowed_overhead: f64,

    /// Phase the variance gate compares across runs
    #[serde(default = "default_gate_phase")]
    pub gate_phase: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_file: None,
            baseline_suffix: default_baseline_suffix(),
            allowed_overhead: default_allowed_overhead(),
            gate_phase: default_gate_phase(),
        }
    }
}

impl Validatable for ReportConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(
            &self.baseline_suffix,
            "baseline_suffix",
            self.domain_name(),
        )?;
        validate_required_string(&self.gate_phase, "gate_phase", self.domain_name())?;
        validate_fraction(self.allowed_overhead, "allowed_overhead", self.domain_name())?;

        if let Some(path) = &self.output_file {
            validate_required_string(path, "output_file", self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "report"
    }
}

// Default value functions
fn default_baseline_suffix() -> String {
    "baseline".to_string()
}

fn default_allowed_overhead() -> f64 {
    0.10
}

fn default_gate_phase() -> String {
    "scheduled".to_string()
}
