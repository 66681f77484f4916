//! Scripted fakes and mocks for exercising the harness without a platform.
//!
//! This module provides mockall-based mocks for the thin probe traits and
//! hand-scripted fakes for the stateful ones, so the engine and the
//! integration scenarios can run entire batch lifecycles against canned
//! behavior. Enabled with the `testing` feature.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;
use parking_lot::Mutex;

use crate::diagnostics::{DiagnosticsCollector, DiagnosticsError};
use crate::monitor::{ProbeError, RequestRateProbe};
use crate::resource::{ManagedResource, ResourceError, ResourceId, ResourceStatus};
use crate::shell::{GuestShell, ShellError};

// Mocks for the thin probe traits

mock! {
    pub Shell {}

    #[async_trait]
    impl GuestShell for Shell {
        async fn run(
            &self,
            target: &ResourceId,
            command: &[String],
            timeout: Duration,
        ) -> Result<String, ShellError>;
    }
}

mock! {
    pub RateProbe {}

    #[async_trait]
    impl RequestRateProbe for RateProbe {
        async fn requests_per_second(&self) -> Result<f64, ProbeError>;
    }
}

/// Behavior script for one [`ScriptedResource`].
#[derive(Debug, Clone, Default)]
pub struct ResourceScript {
    /// Error returned by `create`, if any.
    pub create_error: Option<ResourceError>,
    /// Error returned by `delete`, if any.
    pub delete_error: Option<ResourceError>,
    /// Delay before `create` returns, for ordering and concurrency tests.
    pub create_delay: Duration,
    /// Status sequence replayed by `current_status`; the last entry repeats.
    /// Empty means the resource reports `Ok(None)` forever.
    pub statuses: Vec<Option<ResourceStatus>>,
}

impl ResourceScript {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn with_create_error(mut self, error: ResourceError) -> Self {
        self.create_error = Some(error);
        self
    }

    pub fn with_delete_error(mut self, error: ResourceError) -> Self {
        self.delete_error = Some(error);
        self
    }

    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    /// Replay these statuses in order; the last one repeats forever.
    pub fn with_statuses<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        self.statuses = statuses
            .into_iter()
            .map(|status| status.map(|s| ResourceStatus::new(s)))
            .collect();
        self
    }
}

#[derive(Debug, Default)]
struct ScriptedState {
    created: bool,
    deleted: bool,
    creates: usize,
    deletes: usize,
    status_checks: usize,
    status_cursor: usize,
}

/// A [`ManagedResource`] driven by a [`ResourceScript`], recording every call.
pub struct ScriptedResource {
    id: ResourceId,
    kind: String,
    script: ResourceScript,
    state: Mutex<ScriptedState>,
}

impl ScriptedResource {
    /// A resource that does not exist yet; `create` brings it to life.
    pub fn new(id: ResourceId, script: ResourceScript) -> Arc<Self> {
        Arc::new(Self {
            id,
            kind: "ScriptedResource".to_string(),
            script,
            state: Mutex::new(ScriptedState::default()),
        })
    }

    /// A resource that already exists, as if created by an earlier run.
    pub fn started(id: ResourceId, script: ResourceScript) -> Arc<Self> {
        let resource = Self::new(id, script);
        resource.state.lock().created = true;
        resource
    }

    /// Like [`ScriptedResource::new`] with an explicit kind label.
    pub fn with_kind(id: ResourceId, kind: impl Into<String>, script: ResourceScript) -> Arc<Self> {
        Arc::new(Self {
            id,
            kind: kind.into(),
            script,
            state: Mutex::new(ScriptedState::default()),
        })
    }

    pub fn creates(&self) -> usize {
        self.state.lock().creates
    }

    pub fn deletes(&self) -> usize {
        self.state.lock().deletes
    }

    pub fn status_checks(&self) -> usize {
        self.state.lock().status_checks
    }

    pub fn was_deleted(&self) -> bool {
        self.state.lock().deleted
    }
}

#[async_trait]
impl ManagedResource for ScriptedResource {
    fn id(&self) -> ResourceId {
        self.id.clone()
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    async fn create(&self) -> Result<(), ResourceError> {
        if !self.script.create_delay.is_zero() {
            tokio::time::sleep(self.script.create_delay).await;
        }
        let mut state = self.state.lock();
        state.creates += 1;
        if let Some(error) = &self.script.create_error {
            return Err(error.clone());
        }
        state.created = true;
        Ok(())
    }

    async fn current_status(&self) -> Result<Option<ResourceStatus>, ResourceError> {
        let mut state = self.state.lock();
        state.status_checks += 1;
        if state.deleted || !state.created {
            return Err(ResourceError::NotFound(self.id.clone()));
        }
        if self.script.statuses.is_empty() {
            return Ok(None);
        }
        let index = state.status_cursor.min(self.script.statuses.len() - 1);
        state.status_cursor += 1;
        Ok(self.script.statuses[index].clone())
    }

    async fn delete(&self) -> Result<(), ResourceError> {
        let mut state = self.state.lock();
        state.deletes += 1;
        if let Some(error) = &self.script.delete_error {
            return Err(error.clone());
        }
        state.deleted = true;
        Ok(())
    }
}

/// A [`GuestShell`] replaying queued outputs per resource.
///
/// Each `run` pops the next queued output for the target; a single
/// remaining entry repeats forever. Every invocation is recorded for
/// assertions on the command actually sent.
#[derive(Default)]
pub struct ScriptedShell {
    outputs: Mutex<HashMap<ResourceId, VecDeque<Result<String, ShellError>>>>,
    invocations: Mutex<Vec<(ResourceId, Vec<String>)>>,
}

impl ScriptedShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful output for `target`.
    pub fn enqueue(&self, target: &ResourceId, output: impl Into<String>) {
        self.outputs
            .lock()
            .entry(target.clone())
            .or_default()
            .push_back(Ok(output.into()));
    }

    /// Queue a failure for `target`.
    pub fn enqueue_error(&self, target: &ResourceId, error: ShellError) {
        self.outputs
            .lock()
            .entry(target.clone())
            .or_default()
            .push_back(Err(error));
    }

    /// Every `(target, command)` pair seen so far, in call order.
    pub fn invocations(&self) -> Vec<(ResourceId, Vec<String>)> {
        self.invocations.lock().clone()
    }
}

#[async_trait]
impl GuestShell for ScriptedShell {
    async fn run(
        &self,
        target: &ResourceId,
        command: &[String],
        _timeout: Duration,
    ) -> Result<String, ShellError> {
        self.invocations
            .lock()
            .push((target.clone(), command.to_vec()));
        let mut outputs = self.outputs.lock();
        let queue = outputs.entry(target.clone()).or_default();
        if queue.is_empty() {
            return Err(ShellError::Unreachable {
                id: target.clone(),
                message: "no scripted output".to_string(),
            });
        }
        // A single remaining entry repeats; longer queues advance.
        if queue.len() == 1 {
            queue.front().cloned().unwrap()
        } else {
            queue.pop_front().unwrap()
        }
    }
}

/// A [`DiagnosticsCollector`] that records invocations and optionally fails.
#[derive(Default)]
pub struct CountingDiagnostics {
    alerts: Mutex<usize>,
    cluster_bundles: Mutex<Vec<Duration>>,
    app_bundles: Mutex<Vec<(Duration, PathBuf)>>,
    fail_alerts: bool,
}

impl CountingDiagnostics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A collector whose alert capture always fails, for masking tests.
    pub fn failing_alerts() -> Arc<Self> {
        Arc::new(Self {
            fail_alerts: true,
            ..Self::default()
        })
    }

    pub fn alert_captures(&self) -> usize {
        *self.alerts.lock()
    }

    pub fn cluster_bundle_captures(&self) -> Vec<Duration> {
        self.cluster_bundles.lock().clone()
    }

    pub fn app_bundle_captures(&self) -> Vec<(Duration, PathBuf)> {
        self.app_bundles.lock().clone()
    }

    pub fn total_captures(&self) -> usize {
        *self.alerts.lock() + self.cluster_bundles.lock().len() + self.app_bundles.lock().len()
    }
}

#[async_trait]
impl DiagnosticsCollector for CountingDiagnostics {
    async fn capture_alerts(&self) -> Result<(), DiagnosticsError> {
        *self.alerts.lock() += 1;
        if self.fail_alerts {
            return Err(DiagnosticsError::Capture {
                message: "alert endpoint unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn capture_cluster_bundle(&self, since: Duration) -> Result<(), DiagnosticsError> {
        self.cluster_bundles.lock().push(since);
        Ok(())
    }

    async fn capture_app_bundle(
        &self,
        since: Duration,
        target_dir: &Path,
    ) -> Result<(), DiagnosticsError> {
        self.app_bundles
            .lock()
            .push((since, target_dir.to_path_buf()));
        Ok(())
    }
}

/// A [`RequestRateProbe`] replaying a fixed sample sequence; the last
/// sample repeats forever.
pub struct ScriptedRateProbe {
    samples: Mutex<VecDeque<f64>>,
}

impl ScriptedRateProbe {
    pub fn new<I: IntoIterator<Item = f64>>(samples: I) -> Arc<Self> {
        Arc::new(Self {
            samples: Mutex::new(samples.into_iter().collect()),
        })
    }
}

#[async_trait]
impl RequestRateProbe for ScriptedRateProbe {
    async fn requests_per_second(&self) -> Result<f64, ProbeError> {
        let mut samples = self.samples.lock();
        match samples.len() {
            0 => Err(ProbeError::Query {
                message: "no scripted samples".to_string(),
            }),
            1 => Ok(samples[0]),
            _ => Ok(samples.pop_front().unwrap_or_default()),
        }
    }
}
