//! Guest data probe and verifier for the vmscale harness.
//!
//! A scale run is only meaningful if the guests themselves stay healthy
//! through it. This crate runs a small command battery inside every guest
//! over the shell seam ([`battery`], [`probe`]) and verifies before/after
//! sweeps against per-field rules ([`verify`]): the clock must keep
//! advancing, the boot time must not change.

pub mod battery;
pub mod error;
pub mod probe;
pub mod verify;

// Re-export commonly used types
pub use battery::{shell_command, GuestCommand, OUTPUT_SEPARATOR, STANDARD_BATTERY};
pub use error::{GuestError, ProbeFailure, ProbeFailureKind, Violation};
pub use probe::{GuestProbe, GuestSnapshot};
pub use verify::{standard_rules, FieldRule, GuestVerifier};
