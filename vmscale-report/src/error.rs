//! Report error types

use vmscale_interfaces::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Reading the timing store failed.
    #[error("failed to read timings: {0}")]
    Store(#[from] StoreError),

    /// No run key carries the baseline suffix; the gate cannot judge.
    #[error("no run key ends with the baseline suffix {suffix:?}")]
    MissingBaseline { suffix: String },

    /// Reading or writing a report file failed.
    #[error("report io failed: {0}")]
    Io(#[from] std::io::Error),

    /// YAML (de)serialization failed.
    #[error("report serialization failed: {0}")]
    Serialization(#[from] serde_yaml::Error),

    /// The request itself was malformed.
    #[error("invalid report request: {0}")]
    InvalidArgument(String),
}

pub type ReportResult<T> = Result<T, ReportError>;
