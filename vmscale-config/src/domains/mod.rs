//! Domain-specific configuration modules

pub mod concurrency;
pub mod diagnostics;
pub mod guest;
pub mod logging;
pub mod report;
pub mod scenario;
pub mod utils;
pub mod wait;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main vmscale configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VmScaleConfig {
    /// Fan-out concurrency configuration
    #[serde(default)]
    pub concurrency: concurrency::ConcurrencyConfig,

    /// Fleet wait and polling configuration
    #[serde(default)]
    pub wait: wait::WaitConfig,

    /// Guest command execution configuration
    #[serde(default)]
    pub guest: guest::GuestConfig,

    /// Failure diagnostics configuration
    #[serde(default)]
    pub diagnostics: diagnostics::DiagnosticsConfig,

    /// Timing report and variance gate configuration
    #[serde(default)]
    pub report: report::ReportConfig,

    /// Scale scenario shape configuration
    #[serde(default)]
    pub scenario: scenario::ScenarioConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl VmScaleConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.concurrency.validate()?;
        self.wait.validate()?;
        self.guest.validate()?;
        self.diagnostics.validate()?;
        self.report.validate()?;
        self.scenario.validate()?;
        self.logging.validate()?;

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = VmScaleConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
