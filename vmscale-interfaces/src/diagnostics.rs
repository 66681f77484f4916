//! Failure diagnostics seam.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

/// Errors from diagnostic capture.
#[derive(Debug, thiserror::Error)]
pub enum DiagnosticsError {
    #[error("diagnostics capture failed: {message}")]
    Capture { message: String },

    #[error("diagnostics io failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Collects post-mortem evidence when a batch's active phase fails.
///
/// The batch manager invokes the three captures in order and logs their
/// failures without propagating them, so diagnostics can never mask the
/// error that triggered them. `since` is the wall-clock window back to when
/// the batch opened.
#[async_trait]
pub trait DiagnosticsCollector: Send + Sync {
    /// Snapshot the alerts currently firing.
    async fn capture_alerts(&self) -> Result<(), DiagnosticsError>;

    /// Capture a cluster-level support bundle covering the last `since`.
    async fn capture_cluster_bundle(&self, since: Duration) -> Result<(), DiagnosticsError>;

    /// Capture the application support bundle covering the last `since`
    /// into `target_dir`.
    async fn capture_app_bundle(
        &self,
        since: Duration,
        target_dir: &Path,
    ) -> Result<(), DiagnosticsError>;
}
