//! Guest command execution configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Guest command execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuestConfig {
    /// Timeout for a single command battery round trip
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_command_timeout"
    )]
    pub command_timeout: Duration,
}

impl Default for GuestConfig {
    fn default() -> Self {
        Self {
            command_timeout: default_command_timeout(),
        }
    }
}

impl Validatable for GuestConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(
            self.command_timeout.as_secs(),
            "command_timeout",
            self.domain_name(),
        )?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "guest"
    }
}

// Default value functions
fn default_command_timeout() -> Duration {
    Duration::from_secs(60)
}
