//! Control-plane idle detection.
//!
//! Bulk create and delete phases leave a tail of reconciliation traffic on
//! the platform API; measuring the next phase before it drains skews the
//! numbers. [`IdleMonitor`] polls a request-rate probe until the rate drops
//! to an idle threshold.

use std::sync::Arc;
use tracing::info;

use vmscale_interfaces::{ProbeError, RequestRateProbe};

use crate::poll::{PollError, Poller};

/// Per-handler request rate still considered idle, in requests per second.
/// Scaled by the handler count for fleet-wide thresholds.
pub const IDLE_RATE_PER_HANDLER: f64 = 0.067;

/// Waits for the platform API request rate to drain to an idle level.
pub struct IdleMonitor {
    probe: Arc<dyn RequestRateProbe>,
    poller: Poller,
    idle_threshold: f64,
}

impl IdleMonitor {
    pub fn new(probe: Arc<dyn RequestRateProbe>, poller: Poller, idle_threshold: f64) -> Self {
        Self {
            probe,
            poller,
            idle_threshold,
        }
    }

    /// Threshold derived from the number of API handler processes.
    pub fn for_handler_count(
        probe: Arc<dyn RequestRateProbe>,
        poller: Poller,
        handlers: usize,
    ) -> Self {
        Self::new(probe, poller, IDLE_RATE_PER_HANDLER * handlers as f64)
    }

    pub fn idle_threshold(&self) -> f64 {
        self.idle_threshold
    }

    /// Poll until the request rate drops to the idle threshold.
    ///
    /// Returns the first idle sample observed.
    pub async fn wait_for_idle(&self) -> Result<f64, PollError<f64, ProbeError>> {
        let threshold = self.idle_threshold;
        let probe = self.probe.clone();
        let rate = self
            .poller
            .wait_until(
                move || {
                    let probe = probe.clone();
                    async move { probe.requests_per_second().await }
                },
                move |rate| *rate <= threshold,
            )
            .await?;
        info!(rate, threshold, "platform API idle");
        Ok(rate)
    }
}
