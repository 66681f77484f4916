//! Report assembly from the timing store.

use std::sync::Arc;
use tracing::{debug, warn};

use vmscale_engine::timing::{phase, phase_key};
use vmscale_interfaces::{TimingStore, TimingStoreExt};

use crate::error::ReportError;
use crate::model::{PhaseTiming, TimingReport};

/// The phases a standard scenario records, in report order.
pub fn standard_phases() -> Vec<String> {
    vec![
        phase::DEPLOY.to_string(),
        phase::SCHEDULED.to_string(),
        phase::RUNNING.to_string(),
        phase::DELETE.to_string(),
    ]
}

/// Diskless guests skip the running wait, so their reports drop that phase.
pub fn diskless_phases() -> Vec<String> {
    vec![
        phase::DEPLOY.to_string(),
        phase::SCHEDULED.to_string(),
        phase::DELETE.to_string(),
    ]
}

/// Builds a [`TimingReport`] out of the raw store keys.
///
/// Elapsed values are recomputed from start/stop rather than trusting the
/// stored elapsed, and a phase with either reading missing is recorded as an
/// error datum with its holes left in place.
pub struct ReportAssembler {
    store: Arc<dyn TimingStore>,
    phases: Vec<String>,
}

impl ReportAssembler {
    pub fn new(store: Arc<dyn TimingStore>) -> Self {
        Self {
            store,
            phases: standard_phases(),
        }
    }

    /// Phase list matching the scenario shape.
    pub fn for_scenario(
        store: Arc<dyn TimingStore>,
        scenario: &vmscale_config::ScenarioConfig,
    ) -> Self {
        let phases = if scenario.diskless {
            diskless_phases()
        } else {
            standard_phases()
        };
        Self::new(store).with_phases(phases)
    }

    pub fn with_phases(mut self, phases: Vec<String>) -> Self {
        self.phases = phases;
        self
    }

    pub async fn assemble(&self, run_keys: &[String]) -> Result<TimingReport, ReportError> {
        if run_keys.is_empty() {
            return Err(ReportError::InvalidArgument(
                "no run keys to assemble".to_string(),
            ));
        }

        let mut report = TimingReport::new();
        for phase_name in &self.phases {
            let mut row = std::collections::BTreeMap::new();
            for run_key in run_keys {
                let key = phase_key(run_key, phase_name);
                let start = self.store.get_f64(&format!("{key}-start")).await?;
                let stop = self.store.get_f64(&format!("{key}-stop")).await?;

                let elapsed = match (start, stop) {
                    (Some(start), Some(stop)) => Some(stop - start),
                    _ => {
                        warn!(key = %key, "incomplete timing data");
                        report.push_error(format!("cache key {key} has incomplete data"));
                        None
                    }
                };
                row.insert(
                    run_key.clone(),
                    PhaseTiming {
                        start,
                        stop,
                        elapsed,
                    },
                );
            }
            report.operations.insert(phase_name.clone(), row);
        }

        debug!(
            phases = self.phases.len(),
            run_keys = run_keys.len(),
            pass = report.pass,
            "report assembled"
        );
        Ok(report)
    }
}
