//! Timed operation capture.
//!
//! Wraps an async operation and records its wall-clock start, stop and
//! elapsed seconds into a timing store. Failed operations leave no trace, so
//! a populated store always describes completed work.

use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use vmscale_interfaces::{StoreError, TimingStore};

/// Canonical phase names recorded for a scale run.
pub mod phase {
    /// Fleet request submission and status convergence.
    pub const DEPLOY: &str = "deploy";
    /// All guests scheduled onto nodes.
    pub const SCHEDULED: &str = "scheduled";
    /// All guests running.
    pub const RUNNING: &str = "running";
    /// All guests answering over the shell.
    pub const ACCESSIBLE: &str = "accessible";
    /// Fleet teardown.
    pub const DELETE: &str = "delete";
}

/// Store key prefix for one phase of a run: `{run_key}-{phase}`.
pub fn phase_key(run_key: &str, phase: &str) -> String {
    format!("{run_key}-{phase}")
}

/// Wall-clock source, in seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// System wall clock.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|since_epoch| since_epoch.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Capture error types
#[derive(Debug, thiserror::Error)]
pub enum CaptureError<E> {
    /// The captured operation failed; no timings were written.
    #[error("captured operation failed: {0}")]
    Operation(E),

    /// The operation succeeded but recording its timing did not.
    #[error("failed to record timing: {0}")]
    Store(#[from] StoreError),
}

impl<E> CaptureError<E> {
    /// The underlying operation error, when that is what failed.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            CaptureError::Operation(error) => Some(error),
            CaptureError::Store(_) => None,
        }
    }
}

/// Records wall-clock timings of successful operations.
///
/// Each capture under key `k` writes `k-start`, `k-stop` and `k-elapsed`
/// (all in seconds) to the configured store, but only when the wrapped
/// operation succeeds.
#[derive(Clone)]
pub struct TimedCapture {
    store: Arc<dyn TimingStore>,
    clock: Arc<dyn Clock>,
}

impl TimedCapture {
    pub fn new(store: Arc<dyn TimingStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// Capture with an injected clock, for deterministic tests.
    pub fn with_clock(store: Arc<dyn TimingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<dyn TimingStore> {
        &self.store
    }

    /// Run `op` and record its timing under `key` when it succeeds.
    pub async fn capture<F, Fut, T, E>(&self, key: &str, op: F) -> Result<T, CaptureError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let start = self.clock.now();
        let value = op().await.map_err(CaptureError::Operation)?;
        let stop = self.clock.now();
        let elapsed = stop - start;

        self.store.set(&format!("{key}-start"), json!(start)).await?;
        self.store.set(&format!("{key}-stop"), json!(stop)).await?;
        self.store
            .set(&format!("{key}-elapsed"), json!(elapsed))
            .await?;

        debug!(key, elapsed, "captured operation timing");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use vmscale_interfaces::TimingStoreExt;
    use vmscale_store::MemoryTimingStore;

    struct SequenceClock {
        readings: Mutex<VecDeque<f64>>,
    }

    impl SequenceClock {
        fn new(readings: &[f64]) -> Arc<Self> {
            Arc::new(Self {
                readings: Mutex::new(readings.iter().copied().collect()),
            })
        }
    }

    impl Clock for SequenceClock {
        fn now(&self) -> f64 {
            self.readings
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default()
        }
    }

    #[tokio::test]
    async fn successful_capture_writes_start_stop_elapsed() {
        let store = Arc::new(MemoryTimingStore::new());
        let capture = TimedCapture::with_clock(store.clone(), SequenceClock::new(&[100.0, 160.5]));

        let value = capture
            .capture("scale-deploy", || async { Ok::<_, String>(7) })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(store.get_f64("scale-deploy-start").await.unwrap(), Some(100.0));
        assert_eq!(store.get_f64("scale-deploy-stop").await.unwrap(), Some(160.5));
        assert_eq!(store.get_f64("scale-deploy-elapsed").await.unwrap(), Some(60.5));
    }

    #[tokio::test]
    async fn failed_operation_leaves_no_trace() {
        let store = Arc::new(MemoryTimingStore::new());
        let capture = TimedCapture::with_clock(store.clone(), SequenceClock::new(&[100.0, 160.5]));

        let error = capture
            .capture("scale-deploy", || async { Err::<u32, _>("api down") })
            .await
            .unwrap_err();

        assert!(matches!(error, CaptureError::Operation("api down")));
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn system_clock_is_epoch_seconds() {
        let clock = SystemClock;
        let now = clock.now();
        // 2020-01-01 as a sanity floor.
        assert!(now > 1_577_836_800.0);
    }

    #[test]
    fn phase_keys_compose_run_key_and_phase() {
        assert_eq!(phase_key("scale-2k", phase::DEPLOY), "scale-2k-deploy");
        assert_eq!(phase_key("scale-2k", phase::DELETE), "scale-2k-delete");
    }
}
