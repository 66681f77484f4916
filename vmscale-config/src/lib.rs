//! Domain-driven configuration management for the vmscale harness
//!
//! This crate provides modular configuration split by functional domains,
//! with validation, defaults, and environment variable support. A run is
//! fully described by a YAML file plus `VMSCALE_*` overrides.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    concurrency::ConcurrencyConfig, diagnostics::DiagnosticsConfig, guest::GuestConfig,
    logging::LoggingConfig, report::ReportConfig, scenario::ScenarioConfig, wait::WaitConfig,
    VmScaleConfig,
};

// Re-export utilities
pub use domains::utils::serde_duration;
