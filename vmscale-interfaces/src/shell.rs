//! Guest command execution seam.

use std::time::Duration;

use async_trait::async_trait;

use crate::resource::ResourceId;

/// Errors from running a command inside a guest.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ShellError {
    /// The guest did not answer within the allowed time.
    #[error("command on {id} timed out after {timeout:?}")]
    Timeout { id: ResourceId, timeout: Duration },

    /// No session could be established with the guest.
    #[error("guest {id} is unreachable: {message}")]
    Unreachable { id: ResourceId, message: String },

    /// The command ran but failed.
    #[error("command on {id} failed: {message}")]
    Execution { id: ResourceId, message: String },
}

/// Executes a command inside a guest and returns its combined stdout.
///
/// Production implementations wrap SSH or a serial console. Commands are
/// argv-style vectors; the guest probe builds a single `sh -c` invocation
/// so a whole command battery travels in one round trip.
#[async_trait]
pub trait GuestShell: Send + Sync {
    async fn run(
        &self,
        target: &ResourceId,
        command: &[String],
        timeout: Duration,
    ) -> Result<String, ShellError>;
}
