//! Bounded fan-out over homogeneous async operations.
//!
//! [`FanOutExecutor`] runs one worker per input item under a concurrency
//! bound, preserves input order in the results, and on the fail-fast path
//! cancels still-running siblings once any worker fails.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::debug;

/// Policy for bounded fan-out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FanOutPolicy {
    /// Upper bound on concurrently running workers.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Cancel still-running siblings once any worker fails.
    #[serde(default = "default_cancel_on_failure")]
    pub cancel_on_failure: bool,
}

impl Default for FanOutPolicy {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            cancel_on_failure: default_cancel_on_failure(),
        }
    }
}

impl FanOutPolicy {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers,
            ..Self::default()
        }
    }
}

impl From<&vmscale_config::ConcurrencyConfig> for FanOutPolicy {
    fn from(config: &vmscale_config::ConcurrencyConfig) -> Self {
        Self {
            max_workers: config.max_workers,
            cancel_on_failure: config.cancel_on_failure,
        }
    }
}

fn default_max_workers() -> usize {
    64
}

fn default_cancel_on_failure() -> bool {
    true
}

/// Fan-out error types
#[derive(Debug, thiserror::Error)]
pub enum FanOutError<E> {
    /// Fanning out over nothing is a caller bug, not a trivial success.
    #[error("fan-out over an empty input set")]
    EmptyInput,

    /// A worker failed; `index` is the lowest failing input index.
    #[error("worker {index} failed: {source}")]
    Worker { index: usize, source: E },

    /// A worker panicked; carries the join error text.
    #[error("worker panicked: {0}")]
    Panicked(String),
}

impl<E> FanOutError<E> {
    /// The per-item error, when one exists.
    pub fn into_worker_error(self) -> Option<E> {
        match self {
            FanOutError::Worker { source, .. } => Some(source),
            _ => None,
        }
    }
}

enum WorkerOutcome<R, E> {
    Done(R),
    Failed(E),
    Cancelled,
}

/// Resolves once the cancel flag flips to true.
///
/// A dropped sender means no cancellation will ever arrive, so this parks
/// forever instead of resolving; the worker branch racing against it then
/// wins unconditionally.
async fn wait_cancelled(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Runs one async operation per input item under a concurrency bound.
#[derive(Debug, Clone, Default)]
pub struct FanOutExecutor {
    policy: FanOutPolicy,
}

impl FanOutExecutor {
    pub fn new(policy: FanOutPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &FanOutPolicy {
        &self.policy
    }

    fn worker_bound(&self, total: usize) -> usize {
        self.policy.max_workers.min(total).max(1)
    }

    /// Run `op` over every item; all-or-nothing result.
    ///
    /// Results come back in input order. On failure the error of the lowest
    /// failing input index is reported, regardless of completion order, and
    /// with `cancel_on_failure` still-running siblings are cancelled.
    pub async fn execute<T, R, E, F, Fut>(
        &self,
        items: Vec<T>,
        op: F,
    ) -> Result<Vec<R>, FanOutError<E>>
    where
        T: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        if items.is_empty() {
            return Err(FanOutError::EmptyInput);
        }
        let total = items.len();
        let bound = self.worker_bound(total);
        debug!(total, bound, "fanning out");

        let semaphore = Arc::new(Semaphore::new(bound));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let op = Arc::new(op);
        let mut join_set = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let cancel_rx = cancel_rx.clone();
            let op = op.clone();
            join_set.spawn(async move {
                let _permit = tokio::select! {
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        // The semaphore is never closed while workers run.
                        Err(_) => return (index, WorkerOutcome::Cancelled),
                    },
                    _ = wait_cancelled(cancel_rx.clone()) => {
                        return (index, WorkerOutcome::Cancelled);
                    }
                };
                tokio::select! {
                    result = (*op)(item) => match result {
                        Ok(value) => (index, WorkerOutcome::Done(value)),
                        Err(error) => (index, WorkerOutcome::Failed(error)),
                    },
                    _ = wait_cancelled(cancel_rx) => (index, WorkerOutcome::Cancelled),
                }
            });
        }

        let mut slots: Vec<Option<R>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);
        let mut failures: Vec<(usize, E)> = Vec::new();
        let mut panic_message: Option<String> = None;
        let mut cancelled = false;

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, WorkerOutcome::Done(value))) => slots[index] = Some(value),
                Ok((index, WorkerOutcome::Failed(error))) => {
                    debug!(index, "worker failed");
                    failures.push((index, error));
                    if self.policy.cancel_on_failure && !cancelled {
                        let _ = cancel_tx.send(true);
                        cancelled = true;
                    }
                }
                Ok((_, WorkerOutcome::Cancelled)) => {}
                Err(join_error) => {
                    if panic_message.is_none() {
                        panic_message = Some(join_error.to_string());
                    }
                    if self.policy.cancel_on_failure && !cancelled {
                        let _ = cancel_tx.send(true);
                        cancelled = true;
                    }
                }
            }
        }

        if let Some(message) = panic_message {
            return Err(FanOutError::Panicked(message));
        }
        if let Some((index, source)) = failures.into_iter().min_by_key(|(index, _)| *index) {
            return Err(FanOutError::Worker { index, source });
        }

        let results: Vec<R> = slots.into_iter().flatten().collect();
        debug_assert_eq!(results.len(), total);
        Ok(results)
    }

    /// Run `op` over every item and keep each item's outcome.
    ///
    /// Every item is attempted even when some fail; nothing is cancelled.
    /// The outer error is reserved for empty input and worker panics.
    pub async fn execute_collect<T, R, E, F, Fut>(
        &self,
        items: Vec<T>,
        op: F,
    ) -> Result<Vec<Result<R, E>>, FanOutError<E>>
    where
        T: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        if items.is_empty() {
            return Err(FanOutError::EmptyInput);
        }
        let total = items.len();
        let bound = self.worker_bound(total);
        debug!(total, bound, "fanning out (collecting outcomes)");

        let semaphore = Arc::new(Semaphore::new(bound));
        let op = Arc::new(op);
        let mut join_set = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let op = op.clone();
            join_set.spawn(async move {
                // The semaphore is never closed while workers run.
                let _permit = semaphore.acquire_owned().await.ok();
                (index, (*op)(item).await)
            });
        }

        let mut slots: Vec<Option<Result<R, E>>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);
        let mut panic_message: Option<String> = None;

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(join_error) => {
                    if panic_message.is_none() {
                        panic_message = Some(join_error.to_string());
                    }
                }
            }
        }

        if let Some(message) = panic_message {
            return Err(FanOutError::Panicked(message));
        }
        let results: Vec<Result<R, E>> = slots.into_iter().flatten().collect();
        debug_assert_eq!(results.len(), total);
        Ok(results)
    }
}
