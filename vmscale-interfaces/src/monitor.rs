//! Control-plane request-rate probe seam.

use async_trait::async_trait;

/// Errors from querying the request rate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    #[error("request rate query failed: {message}")]
    Query { message: String },
}

/// Samples the request rate the application under test is generating
/// against the platform API, in requests per second.
///
/// Production implementations query the metrics backend; the idle monitor
/// polls this until the fleet has settled.
#[async_trait]
pub trait RequestRateProbe: Send + Sync {
    async fn requests_per_second(&self) -> Result<f64, ProbeError>;
}
