//! Timing report assembly for scale runs.
//!
//! Pulls the raw phase samples a run wrote into the timing store, derives
//! per-phase elapsed values, applies the baseline variance gate, and persists
//! the result as an append-only multi-document YAML file.

pub mod assemble;
pub mod error;
pub mod model;
pub mod variance;
pub mod writer;

// Re-export commonly used types
pub use assemble::{diskless_phases, standard_phases, ReportAssembler};
pub use error::{ReportError, ReportResult};
pub use model::{PhaseTiming, TimingReport};
pub use variance::VarianceGate;
pub use writer::{append_document, read_documents};
