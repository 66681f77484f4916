//! Failure diagnostics configuration

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};
use serde::{Deserialize, Serialize};

/// Failure diagnostics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Capture diagnostics when a batch's active phase fails
    #[serde(default = "crate::domains::utils::default_true")]
    pub enabled: bool,

    /// Directory receiving per-batch diagnostic bundles
    #[serde(default = "default_target_dir")]
    pub target_dir: String,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_dir: default_target_dir(),
        }
    }
}

impl Validatable for DiagnosticsConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.enabled {
            validate_required_string(&self.target_dir, "target_dir", self.domain_name())?;
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "diagnostics"
    }
}

// Default value functions
fn default_target_dir() -> String {
    "/tmp/vmscale-diagnostics".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_config_defaults() {
        let config = DiagnosticsConfig::default();
        assert!(config.enabled);
        assert_eq!(config.target_dir, "/tmp/vmscale-diagnostics");
    }

    #[test]
    fn test_diagnostics_config_validation() {
        let mut config = DiagnosticsConfig::default();
        assert!(config.validate().is_ok());

        config.target_dir = String::new();
        assert!(config.validate().is_err());

        // An empty dir is fine when capture is disabled
        config.enabled = false;
        assert!(config.validate().is_ok());
    }
}
