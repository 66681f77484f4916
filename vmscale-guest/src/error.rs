//! Guest error types

use std::fmt;

use vmscale_interfaces::{ResourceId, ShellError};

/// One guest's probe failure.
#[derive(Debug)]
pub struct ProbeFailure {
    pub resource: ResourceId,
    pub kind: ProbeFailureKind,
}

#[derive(Debug)]
pub enum ProbeFailureKind {
    /// The shell call itself failed.
    Shell(ShellError),
    /// Output came back but did not match the command's pattern.
    Parse { command: String, segment: String },
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ProbeFailureKind::Shell(error) => write!(f, "{}: {}", self.resource, error),
            ProbeFailureKind::Parse { command, segment } => write!(
                f,
                "{}: output of `{}` did not match: {:?}",
                self.resource, command, segment
            ),
        }
    }
}

/// One field that broke its verification rule on one guest.
#[derive(Debug)]
pub struct Violation {
    pub resource: ResourceId,
    pub field: String,
    pub before: Option<String>,
    pub after: Option<String>,
    pub reason: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} field {}: {} (before: {}, after: {})",
            self.resource,
            self.field,
            self.reason,
            value_or_absent(&self.before),
            value_or_absent(&self.after)
        )
    }
}

fn value_or_absent(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("<absent>")
}

/// Guest error types
#[derive(Debug, thiserror::Error)]
pub enum GuestError {
    /// The request itself was malformed.
    #[error("invalid guest request: {0}")]
    InvalidArgument(String),

    /// One or more guests failed the probe; every failure is listed.
    #[error("guest probe failed for {} resource(s): {}", .failures.len(), format_list(.failures))]
    Probe { failures: Vec<ProbeFailure> },

    /// One or more fields broke their rule; every violation is listed.
    #[error("guest verification failed with {} violation(s): {}", .violations.len(), format_list(.violations))]
    Verification { violations: Vec<Violation> },

    /// A probe worker panicked.
    #[error("guest worker panicked: {0}")]
    Panicked(String),
}

fn format_list<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
