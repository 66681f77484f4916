//! Fleet wait and polling configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fleet wait and polling configuration
///
/// Timeouts mirror what scale runs against real clusters need: status
/// convergence inside minutes, guest accessibility inside half an hour,
/// bulk deletion somewhere in between.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// Delay between condition probes
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_poll_interval"
    )]
    pub poll_interval: Duration,

    /// Timeout for a fleet to reach a requested status (scheduled, ready)
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_status_timeout"
    )]
    pub status_timeout: Duration,

    /// Timeout for guests to reach the running state
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_running_timeout"
    )]
    pub running_timeout: Duration,

    /// Timeout for guests to answer over the shell
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_accessible_timeout"
    )]
    pub accessible_timeout: Duration,

    /// Timeout for bulk deletion to finish
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_delete_timeout"
    )]
    pub delete_timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            status_timeout: default_status_timeout(),
            running_timeout: default_running_timeout(),
            accessible_timeout: default_accessible_timeout(),
            delete_timeout: default_delete_timeout(),
        }
    }
}

impl Validatable for WaitConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(
            self.poll_interval.as_secs(),
            "poll_interval",
            self.domain_name(),
        )?;
        validate_positive(
            self.status_timeout.as_secs(),
            "status_timeout",
            self.domain_name(),
        )?;
        validate_positive(
            self.running_timeout.as_secs(),
            "running_timeout",
            self.domain_name(),
        )?;
        validate_positive(
            self.accessible_timeout.as_secs(),
            "accessible_timeout",
            self.domain_name(),
        )?;
        validate_positive(
            self.delete_timeout.as_secs(),
            "delete_timeout",
            self.domain_name(),
        )?;

        if self.poll_interval > self.status_timeout {
            return Err(self.validation_error("poll_interval cannot exceed status_timeout"));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "wait"
    }
}

// Default value functions
fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_status_timeout() -> Duration {
    Duration::from_secs(8 * 60)
}

fn default_running_timeout() -> Duration {
    Duration::from_secs(8 * 60)
}

fn default_accessible_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_delete_timeout() -> Duration {
    Duration::from_secs(20 * 60)
}
