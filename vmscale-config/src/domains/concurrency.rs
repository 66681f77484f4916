//! Fan-out concurrency configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};

/// Fan-out concurrency configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Upper bound on concurrently running workers; fleets larger than this
    /// share the pool instead of getting one worker each
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Cancel sibling workers as soon as one fails
    #[serde(default = "crate::domains::utils::default_true")]
    pub cancel_on_failure: bool,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            cancel_on_failure: true,
        }
    }
}

impl Validatable for ConcurrencyConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.max_workers, "max_workers", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "concurrency"
    }
}

// Default value functions
fn default_max_workers() -> usize {
    64
}
