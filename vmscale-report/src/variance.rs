//! Variance gating against a baseline run.
//!
//! A scale scenario is judged on one phase (scheduling by default): every
//! non-baseline run must land within an allowed overhead of the baseline's
//! elapsed time. The gate appends its findings to the report's error lines
//! and recomputes the pass flag, so a gated report carries its own verdict.

use tracing::{info, warn};

use crate::error::ReportError;
use crate::model::TimingReport;

pub struct VarianceGate {
    phase: String,
    baseline_suffix: String,
    allowed_overhead: f64,
}

impl Default for VarianceGate {
    fn default() -> Self {
        Self {
            phase: "scheduled".to_string(),
            baseline_suffix: "baseline".to_string(),
            allowed_overhead: 0.10,
        }
    }
}

impl VarianceGate {
    pub fn new(
        phase: impl Into<String>,
        baseline_suffix: impl Into<String>,
        allowed_overhead: f64,
    ) -> Self {
        Self {
            phase: phase.into(),
            baseline_suffix: baseline_suffix.into(),
            allowed_overhead,
        }
    }

    pub fn from_config(config: &vmscale_config::ReportConfig) -> Self {
        Self::new(
            config.gate_phase.clone(),
            config.baseline_suffix.clone(),
            config.allowed_overhead,
        )
    }

    /// Gate `report` in place.
    ///
    /// A missing baseline run key is a hard error; anything else the gate
    /// finds becomes error lines on the report itself.
    pub fn apply(&self, report: &mut TimingReport) -> Result<(), ReportError> {
        let timings = report.operations.get(&self.phase).cloned().ok_or_else(|| {
            ReportError::InvalidArgument(format!("report has no phase {:?}", self.phase))
        })?;

        let baseline_key = timings
            .keys()
            .find(|key| key.ends_with(&self.baseline_suffix))
            .cloned()
            .ok_or_else(|| ReportError::MissingBaseline {
                suffix: self.baseline_suffix.clone(),
            })?;

        let Some(baseline_elapsed) = timings[&baseline_key].elapsed else {
            report.push_error(format!(
                "baseline {baseline_key} has no elapsed value for phase {}",
                self.phase
            ));
            return Ok(());
        };
        let limit = baseline_elapsed * (1.0 + self.allowed_overhead);

        for (run_key, timing) in &timings {
            if run_key == &baseline_key {
                continue;
            }
            match timing.elapsed {
                None => {
                    report.push_error(format!(
                        "run {run_key} has no elapsed value for phase {}",
                        self.phase
                    ));
                }
                Some(elapsed) if elapsed > limit => {
                    warn!(
                        run_key = %run_key,
                        elapsed,
                        baseline = baseline_elapsed,
                        limit,
                        "variance gate violation"
                    );
                    report.push_error(format!(
                        "run {run_key} phase {} elapsed {elapsed:.3}s exceeds baseline \
                         {baseline_elapsed:.3}s by more than {:.0}%",
                        self.phase,
                        self.allowed_overhead * 100.0
                    ));
                }
                Some(_) => {}
            }
        }

        if report.pass {
            info!(
                phase = %self.phase,
                baseline = %baseline_key,
                "variance gate passed"
            );
        }
        Ok(())
    }
}
