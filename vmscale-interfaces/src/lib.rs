//! Core interfaces and traits for the vmscale harness.
//!
//! This crate defines the seams between the orchestration engine and the
//! platform under test: managed resources, guest command execution, the
//! durable timing store, failure diagnostics and the API request-rate probe.
//! Production implementations (Kubernetes clients, SSH transports, metrics
//! queries) live outside the harness; the engine and the scenario suites
//! only ever see these traits.

pub mod diagnostics;
pub mod monitor;
pub mod resource;
pub mod shell;
pub mod store;

#[cfg(feature = "testing")]
pub mod testing;

// Re-export commonly used types
pub use diagnostics::{DiagnosticsCollector, DiagnosticsError};
pub use monitor::{ProbeError, RequestRateProbe};
pub use resource::{ManagedResource, ResourceError, ResourceId, ResourceStatus};
pub use shell::{GuestShell, ShellError};
pub use store::{StoreError, TimingStore, TimingStoreExt};
