//! Condition polling with a fixed interval and an overall deadline.
//!
//! A [`Poller`] repeatedly samples an async probe until a predicate accepts
//! the sample or the deadline passes. The first satisfying sample is returned
//! immediately, so a condition that already holds costs no sleeps at all.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Policy for condition polling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Overall deadline for the condition to hold.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Pause between consecutive probe calls.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(480),
            interval: Duration::from_secs(1),
        }
    }
}

impl PollPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Default interval with a caller-chosen deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Policy for status convergence waits.
    pub fn for_status(config: &vmscale_config::WaitConfig) -> Self {
        Self::new(config.status_timeout, config.poll_interval)
    }

    /// Policy for running-state waits.
    pub fn for_running(config: &vmscale_config::WaitConfig) -> Self {
        Self::new(config.running_timeout, config.poll_interval)
    }

    /// Policy for guest accessibility waits.
    pub fn for_accessible(config: &vmscale_config::WaitConfig) -> Self {
        Self::new(config.accessible_timeout, config.poll_interval)
    }

    /// Policy for deletion waits.
    pub fn for_deletion(config: &vmscale_config::WaitConfig) -> Self {
        Self::new(config.delete_timeout, config.poll_interval)
    }
}

/// Poll error types
#[derive(Debug, thiserror::Error)]
pub enum PollError<T, E> {
    /// The deadline passed; carries the last sample seen, if any.
    #[error("condition not met within {timeout:?} (last sample: {last:?})")]
    Timeout { timeout: Duration, last: Option<T> },

    /// The probe itself failed; polling stops immediately.
    #[error("probe failed: {0}")]
    Probe(E),
}

impl<T, E> PollError<T, E> {
    /// The last sample observed before a timeout.
    pub fn last_sample(&self) -> Option<&T> {
        match self {
            PollError::Timeout { last, .. } => last.as_ref(),
            PollError::Probe(_) => None,
        }
    }
}

/// Samples an async probe until a predicate holds or the deadline passes.
#[derive(Debug, Clone, Default)]
pub struct Poller {
    policy: PollPolicy,
}

impl Poller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Poll `probe` until `satisfied` accepts a sample.
    ///
    /// A probe error aborts the wait and is returned as [`PollError::Probe`];
    /// an unmet deadline returns [`PollError::Timeout`] carrying the last
    /// sample for diagnostics.
    pub async fn wait_until<F, Fut, T, E>(
        &self,
        mut probe: F,
        satisfied: impl Fn(&T) -> bool,
    ) -> Result<T, PollError<T, E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = tokio::time::Instant::now();
        let mut last = None;
        let mut attempts = 0u64;

        loop {
            let sample = probe().await.map_err(PollError::Probe)?;
            attempts += 1;

            if satisfied(&sample) {
                debug!(attempts, "condition met");
                return Ok(sample);
            }
            last = Some(sample);

            if started.elapsed() >= self.policy.timeout {
                debug!(attempts, timeout = ?self.policy.timeout, "condition timed out");
                return Err(PollError::Timeout {
                    timeout: self.policy.timeout,
                    last,
                });
            }
            tokio::time::sleep(self.policy.interval).await;
        }
    }
}
