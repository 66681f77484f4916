//! Timing report model.
//!
//! The report serializes to one YAML document shaped like
//! `{phase: {run_key: {start, stop, elapsed}}, pass, errors}`, with the
//! phase tables flattened to the top level.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One phase's timing for one run key. Holes stay holes: a missing reading
/// is `None`, never a fabricated zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseTiming {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<f64>,
}

/// A full timing report across phases and run keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingReport {
    /// `phase -> run_key -> timing`, flattened into the document root.
    #[serde(flatten)]
    pub operations: BTreeMap<String, BTreeMap<String, PhaseTiming>>,

    pub pass: bool,

    /// Newline-joined error lines; empty when the report is clean.
    #[serde(default)]
    pub errors: String,
}

impl TimingReport {
    /// An empty, passing report to assemble into.
    pub fn new() -> Self {
        Self {
            operations: BTreeMap::new(),
            pass: true,
            errors: String::new(),
        }
    }

    /// Record an error line and drop the report to failing.
    pub fn push_error(&mut self, message: impl AsRef<str>) {
        if !self.errors.is_empty() {
            self.errors.push('\n');
        }
        self.errors.push_str(message.as_ref());
        self.pass = false;
    }

    /// The timing recorded for one phase and run key, if any.
    pub fn timing(&self, phase: &str, run_key: &str) -> Option<&PhaseTiming> {
        self.operations.get(phase)?.get(run_key)
    }

    pub fn error_lines(&self) -> impl Iterator<Item = &str> {
        self.errors.lines()
    }
}
