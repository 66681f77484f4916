//! Bulk resource batch lifecycle.
//!
//! A [`ScaleBatch`] drives one fleet of platform resources through
//! create → active → teardown. Creation failures are partial by nature at
//! scale, so the batch remembers exactly which resources it brought into
//! existence and tears down that subset and nothing else. Active-phase
//! failures trigger diagnostics capture before teardown, and diagnostics
//! problems are logged rather than allowed to replace the original error.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use vmscale_interfaces::{
    DiagnosticsCollector, ManagedResource, ResourceError, ResourceId, ResourceStatus,
};

use crate::fanout::{FanOutError, FanOutExecutor};
use crate::poll::Poller;
use crate::timing::{phase, phase_key, CaptureError, TimedCapture};
use crate::waits::{BatchWaiter, WaitError};

/// Lifecycle states of a [`ScaleBatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Pending,
    Creating,
    Ready,
    CreateFailed,
    Active,
    TearingDown,
    TornDown,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BatchState::Pending => "pending",
            BatchState::Creating => "creating",
            BatchState::Ready => "ready",
            BatchState::CreateFailed => "create-failed",
            BatchState::Active => "active",
            BatchState::TearingDown => "tearing-down",
            BatchState::TornDown => "torn-down",
        };
        f.write_str(label)
    }
}

/// One resource's failure during bulk create or delete.
#[derive(Debug)]
pub struct ResourceFailure {
    pub id: ResourceId,
    pub error: ResourceError,
}

impl fmt::Display for ResourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.error)
    }
}

/// Batch error types
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The batch was assembled inconsistently.
    #[error("invalid batch: {0}")]
    InvalidArgument(String),

    /// An operation was called in a state that does not allow it.
    #[error("batch is {state}, cannot {operation}")]
    InvalidState {
        state: BatchState,
        operation: &'static str,
    },

    /// Some resources could not be created; the rest are tracked for teardown.
    #[error("creating {failed} of {total} resources failed", failed = .failures.len())]
    CreateFailed {
        total: usize,
        failures: Vec<ResourceFailure>,
    },

    /// A fleet wait failed after creation.
    #[error("waiting for the fleet failed: {0}")]
    Wait(#[from] WaitError),

    /// Some created resources could not be deleted.
    #[error("tearing down {failed} of {total} resources failed", failed = .failures.len())]
    TeardownFailed {
        total: usize,
        failures: Vec<ResourceFailure>,
    },

    /// Recording batch timings failed.
    #[error("recording batch timing failed: {0}")]
    Store(#[from] vmscale_interfaces::StoreError),

    /// A batch worker panicked.
    #[error("batch worker panicked: {0}")]
    Panicked(String),
}

/// Error of an active-phase run: either the harness failed or the body did.
#[derive(Debug, thiserror::Error)]
pub enum RunError<E> {
    /// Create, state or teardown failure in the batch itself.
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// The active-phase body failed.
    #[error("{0}")]
    Body(E),
}

impl<E> RunError<E> {
    /// The body's error, when that is what failed.
    pub fn into_body_error(self) -> Option<E> {
        match self {
            RunError::Body(error) => Some(error),
            RunError::Batch(_) => None,
        }
    }
}

/// Builder for [`ScaleBatch`].
pub struct ScaleBatchBuilder {
    resources: Vec<Arc<dyn ManagedResource>>,
    request_resources: Option<Vec<Arc<dyn ManagedResource>>>,
    wait_for_status: Option<ResourceStatus>,
    executor: FanOutExecutor,
    status_poller: Poller,
    deletion_poller: Poller,
    wait_for_deletion: bool,
    timing: Option<(TimedCapture, String)>,
    diagnostics: Option<(Arc<dyn DiagnosticsCollector>, PathBuf)>,
    batch_id: Option<String>,
}

impl ScaleBatchBuilder {
    fn new(resources: Vec<Arc<dyn ManagedResource>>) -> Self {
        Self {
            resources,
            request_resources: None,
            wait_for_status: None,
            executor: FanOutExecutor::default(),
            status_poller: Poller::default(),
            deletion_poller: Poller::default(),
            wait_for_deletion: false,
            timing: None,
            diagnostics: None,
            batch_id: None,
        }
    }

    /// Create these request objects instead of the resources themselves.
    ///
    /// Platforms that materialize resources through request objects (a
    /// project request begets a project) create the request and observe the
    /// resource. Must match the resource list one to one.
    pub fn request_resources(mut self, requests: Vec<Arc<dyn ManagedResource>>) -> Self {
        self.request_resources = Some(requests);
        self
    }

    /// After creation, wait until every resource reports this status.
    pub fn wait_for_status(mut self, status: impl Into<ResourceStatus>) -> Self {
        self.wait_for_status = Some(status.into());
        self
    }

    pub fn executor(mut self, executor: FanOutExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn status_poller(mut self, poller: Poller) -> Self {
        self.status_poller = poller;
        self
    }

    pub fn deletion_poller(mut self, poller: Poller) -> Self {
        self.deletion_poller = poller;
        self
    }

    /// After deletion, wait until every deleted resource is actually gone.
    pub fn wait_for_deletion(mut self, wait: bool) -> Self {
        self.wait_for_deletion = wait;
        self
    }

    /// Record deploy and delete phase timings under `run_key`.
    pub fn timing(mut self, capture: TimedCapture, run_key: impl Into<String>) -> Self {
        self.timing = Some((capture, run_key.into()));
        self
    }

    /// Capture diagnostics under `target_root/{batch_id}` when the active
    /// phase fails.
    pub fn diagnostics(
        mut self,
        collector: Arc<dyn DiagnosticsCollector>,
        target_root: impl Into<PathBuf>,
    ) -> Self {
        self.diagnostics = Some((collector, target_root.into()));
        self
    }

    pub fn batch_id(mut self, id: impl Into<String>) -> Self {
        self.batch_id = Some(id.into());
        self
    }

    pub fn build(self) -> Result<ScaleBatch, BatchError> {
        if self.resources.is_empty() {
            return Err(BatchError::InvalidArgument(
                "batch needs at least one resource".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for resource in &self.resources {
            if !seen.insert(resource.id()) {
                return Err(BatchError::InvalidArgument(format!(
                    "duplicate resource identity {}",
                    resource.id()
                )));
            }
        }
        if let Some(requests) = &self.request_resources {
            if requests.len() != self.resources.len() {
                return Err(BatchError::InvalidArgument(format!(
                    "{} request resources for {} resources",
                    requests.len(),
                    self.resources.len()
                )));
            }
        }

        Ok(ScaleBatch {
            resources: self.resources,
            request_resources: self.request_resources,
            wait_for_status: self.wait_for_status,
            executor: self.executor,
            status_poller: self.status_poller,
            deletion_poller: self.deletion_poller,
            wait_for_deletion: self.wait_for_deletion,
            timing: self.timing,
            diagnostics: self.diagnostics,
            batch_id: self
                .batch_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            state: BatchState::Pending,
            created: Vec::new(),
            opened_at: None,
        })
    }
}

/// One fleet of resources managed as a unit.
pub struct ScaleBatch {
    resources: Vec<Arc<dyn ManagedResource>>,
    request_resources: Option<Vec<Arc<dyn ManagedResource>>>,
    wait_for_status: Option<ResourceStatus>,
    executor: FanOutExecutor,
    status_poller: Poller,
    deletion_poller: Poller,
    wait_for_deletion: bool,
    timing: Option<(TimedCapture, String)>,
    diagnostics: Option<(Arc<dyn DiagnosticsCollector>, PathBuf)>,
    batch_id: String,
    state: BatchState,
    /// Indices into `resources` whose creation succeeded; the teardown set.
    created: Vec<usize>,
    opened_at: Option<Instant>,
}

impl fmt::Debug for ScaleBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScaleBatch")
            .field("batch_id", &self.batch_id)
            .field("state", &self.state)
            .field("resources", &self.resources.len())
            .field("created", &self.created)
            .finish_non_exhaustive()
    }
}

impl ScaleBatch {
    pub fn builder(resources: Vec<Arc<dyn ManagedResource>>) -> ScaleBatchBuilder {
        ScaleBatchBuilder::new(resources)
    }

    pub fn id(&self) -> &str {
        &self.batch_id
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn resources(&self) -> &[Arc<dyn ManagedResource>] {
        &self.resources
    }

    /// Identities of the resources created so far.
    pub fn created_ids(&self) -> Vec<ResourceId> {
        self.created
            .iter()
            .map(|&index| self.resources[index].id())
            .collect()
    }

    /// Create the fleet and, when configured, wait for its target status.
    ///
    /// On partial failure the successfully created subset stays tracked so
    /// [`ScaleBatch::close`] can tear it down.
    pub async fn open(&mut self) -> Result<(), BatchError> {
        if self.state != BatchState::Pending {
            return Err(BatchError::InvalidState {
                state: self.state,
                operation: "open",
            });
        }
        self.state = BatchState::Creating;
        self.opened_at = Some(Instant::now());

        let result = match self.timing.clone() {
            Some((capture, run_key)) => {
                let key = phase_key(&run_key, phase::DEPLOY);
                match capture.capture(&key, || self.create_all()).await {
                    Ok(()) => Ok(()),
                    Err(CaptureError::Operation(error)) => Err(error),
                    Err(CaptureError::Store(error)) => Err(BatchError::Store(error)),
                }
            }
            None => self.create_all().await,
        };

        match result {
            Ok(()) => {
                self.state = BatchState::Ready;
                info!(
                    batch_id = %self.batch_id,
                    count = self.resources.len(),
                    "batch ready"
                );
                Ok(())
            }
            Err(batch_error) => {
                self.state = BatchState::CreateFailed;
                Err(batch_error)
            }
        }
    }

    async fn create_all(&mut self) -> Result<(), BatchError> {
        let to_create = self
            .request_resources
            .as_ref()
            .unwrap_or(&self.resources)
            .clone();
        info!(
            batch_id = %self.batch_id,
            count = to_create.len(),
            "creating resource batch"
        );

        let results = self
            .executor
            .execute_collect(to_create, |resource| async move {
                let id = resource.id();
                resource
                    .create()
                    .await
                    .map_err(|error| ResourceFailure { id, error })
            })
            .await
            .map_err(flatten_collect_error)?;

        let total = results.len();
        let mut failures = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(()) => self.created.push(index),
                Err(failure) => failures.push(failure),
            }
        }

        if !failures.is_empty() {
            warn!(
                batch_id = %self.batch_id,
                failed = failures.len(),
                total,
                "partial create failure"
            );
            return Err(BatchError::CreateFailed { total, failures });
        }

        if let Some(target) = self.wait_for_status.clone() {
            let waiter = BatchWaiter::new(self.executor.clone(), self.status_poller.clone());
            waiter.all_reach_status(&self.resources, &target).await?;
        }
        Ok(())
    }

    /// Run the active-phase body over the fleet.
    ///
    /// A body failure captures diagnostics (when configured) before
    /// returning; diagnostics trouble is logged, never substituted for the
    /// body's own error.
    pub async fn run<F, Fut, T, E>(&mut self, body: F) -> Result<T, RunError<E>>
    where
        F: FnOnce(Vec<Arc<dyn ManagedResource>>) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        if self.state != BatchState::Ready && self.state != BatchState::Active {
            return Err(RunError::Batch(BatchError::InvalidState {
                state: self.state,
                operation: "run",
            }));
        }
        self.state = BatchState::Active;

        match body(self.resources.clone()).await {
            Ok(value) => Ok(value),
            Err(body_error) => {
                error!(
                    batch_id = %self.batch_id,
                    error = %body_error,
                    "active phase failed"
                );
                self.collect_diagnostics().await;
                Err(RunError::Body(body_error))
            }
        }
    }

    async fn collect_diagnostics(&self) {
        let Some((collector, target_root)) = &self.diagnostics else {
            return;
        };
        let since = self.opened_at.map(|at| at.elapsed()).unwrap_or_default();
        let target_dir = target_root.join(&self.batch_id);
        info!(
            batch_id = %self.batch_id,
            since = ?since,
            target = %target_dir.display(),
            "collecting failure diagnostics"
        );

        if let Err(diag_error) = collector.capture_alerts().await {
            warn!(batch_id = %self.batch_id, error = %diag_error, "alert capture failed");
        }
        if let Err(diag_error) = collector.capture_cluster_bundle(since).await {
            warn!(batch_id = %self.batch_id, error = %diag_error, "cluster bundle capture failed");
        }
        if let Err(diag_error) = collector.capture_app_bundle(since, &target_dir).await {
            warn!(batch_id = %self.batch_id, error = %diag_error, "app bundle capture failed");
        }
    }

    /// Tear down exactly the resources this batch created.
    pub async fn close(&mut self) -> Result<(), BatchError> {
        match self.state {
            BatchState::Ready | BatchState::Active | BatchState::CreateFailed => {}
            state => {
                return Err(BatchError::InvalidState {
                    state,
                    operation: "close",
                });
            }
        }
        self.state = BatchState::TearingDown;

        let result = match self.timing.clone() {
            Some((capture, run_key)) if !self.created.is_empty() => {
                let key = phase_key(&run_key, phase::DELETE);
                match capture.capture(&key, || self.teardown()).await {
                    Ok(()) => Ok(()),
                    Err(CaptureError::Operation(error)) => Err(error),
                    Err(CaptureError::Store(error)) => Err(BatchError::Store(error)),
                }
            }
            _ => self.teardown().await,
        };

        self.state = BatchState::TornDown;
        result
    }

    async fn teardown(&self) -> Result<(), BatchError> {
        if self.created.is_empty() {
            info!(batch_id = %self.batch_id, "nothing created, teardown is a no-op");
            return Ok(());
        }
        let targets: Vec<Arc<dyn ManagedResource>> = self
            .created
            .iter()
            .map(|&index| self.resources[index].clone())
            .collect();
        let total = targets.len();
        info!(batch_id = %self.batch_id, count = total, "tearing down created resources");

        let results = self
            .executor
            .execute_collect(targets.clone(), |resource| async move {
                let id = resource.id();
                resource
                    .delete()
                    .await
                    .map_err(|error| ResourceFailure { id, error })
            })
            .await
            .map_err(flatten_collect_error)?;

        let failures: Vec<ResourceFailure> =
            results.into_iter().filter_map(Result::err).collect();
        if !failures.is_empty() {
            return Err(BatchError::TeardownFailed { total, failures });
        }

        if self.wait_for_deletion {
            let waiter = BatchWaiter::new(self.executor.clone(), self.deletion_poller.clone());
            waiter.all_deleted(&targets).await?;
        }
        Ok(())
    }

    /// Open, run the body, always close.
    ///
    /// The first real failure wins: an open error outranks anything later,
    /// a body error outranks a teardown error, and teardown errors after an
    /// earlier failure are logged rather than returned.
    pub async fn scoped<F, Fut, T, E>(mut self, body: F) -> Result<T, RunError<E>>
    where
        F: FnOnce(Vec<Arc<dyn ManagedResource>>) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        match self.open().await {
            Ok(()) => {
                let outcome = self.run(body).await;
                let close_result = self.close().await;
                match outcome {
                    Ok(value) => match close_result {
                        Ok(()) => Ok(value),
                        Err(close_error) => Err(RunError::Batch(close_error)),
                    },
                    Err(run_error) => {
                        if let Err(close_error) = close_result {
                            warn!(
                                batch_id = %self.batch_id,
                                error = %close_error,
                                "teardown failed after active-phase error"
                            );
                        }
                        Err(run_error)
                    }
                }
            }
            Err(open_error) => {
                if let Err(close_error) = self.close().await {
                    warn!(
                        batch_id = %self.batch_id,
                        error = %close_error,
                        "teardown failed after create error"
                    );
                }
                Err(RunError::Batch(open_error))
            }
        }
    }
}

/// `execute_collect` only fails on empty input or a panic; per-item errors
/// come back in the result vector.
fn flatten_collect_error(error: FanOutError<ResourceFailure>) -> BatchError {
    match error {
        FanOutError::EmptyInput => {
            BatchError::InvalidArgument("fan-out over an empty resource set".to_string())
        }
        FanOutError::Worker { source, .. } => BatchError::CreateFailed {
            total: 1,
            failures: vec![source],
        },
        FanOutError::Panicked(message) => BatchError::Panicked(message),
    }
}
