//! Whole-fleet waits composed from the fan-out executor and the poller.
//!
//! Each wait runs one poll loop per resource under the executor's
//! concurrency bound, so a 2000-guest fleet converges in parallel while a
//! single straggler still produces a precise, per-resource error.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use vmscale_interfaces::{
    GuestShell, ManagedResource, ResourceError, ResourceId, ResourceStatus, ShellError,
};

use crate::fanout::{FanOutError, FanOutExecutor};
use crate::poll::{PollError, Poller};

/// Wait error types
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    /// A resource never reported the target status.
    #[error("{id} did not reach the target status within {timeout:?} (last: {last:?})")]
    Timeout {
        id: ResourceId,
        timeout: Duration,
        last: Option<ResourceStatus>,
    },

    /// A resource still existed when the deletion deadline passed.
    #[error("{id} still exists after {timeout:?}")]
    NotDeleted { id: ResourceId, timeout: Duration },

    /// A guest never answered over the shell.
    #[error("{id} not accessible within {timeout:?} (last error: {last:?})")]
    NotAccessible {
        id: ResourceId,
        timeout: Duration,
        last: Option<ShellError>,
    },

    /// The platform failed while probing a resource; the wait aborts.
    #[error("wait aborted by {id}: {source}")]
    Resource {
        id: ResourceId,
        #[source]
        source: ResourceError,
    },

    /// Waiting on an empty resource set.
    #[error("wait over an empty resource set")]
    Empty,

    /// A wait worker panicked.
    #[error("wait worker panicked: {0}")]
    Panicked(String),
}

fn flatten_fanout(error: FanOutError<WaitError>) -> WaitError {
    match error {
        FanOutError::EmptyInput => WaitError::Empty,
        FanOutError::Worker { source, .. } => source,
        FanOutError::Panicked(message) => WaitError::Panicked(message),
    }
}

/// Fleet-wide condition waits.
#[derive(Clone)]
pub struct BatchWaiter {
    executor: FanOutExecutor,
    poller: Poller,
}

impl BatchWaiter {
    pub fn new(executor: FanOutExecutor, poller: Poller) -> Self {
        Self { executor, poller }
    }

    /// Wait until every resource reports `target` as its current status.
    pub async fn all_reach_status(
        &self,
        resources: &[Arc<dyn ManagedResource>],
        target: &ResourceStatus,
    ) -> Result<(), WaitError> {
        info!(
            count = resources.len(),
            target = %target,
            "waiting for fleet status"
        );
        let poller = self.poller.clone();
        let target = target.clone();

        self.executor
            .execute(resources.to_vec(), move |resource| {
                let poller = poller.clone();
                let target = target.clone();
                async move {
                    let id = resource.id();
                    let probe_resource = resource.clone();
                    poller
                        .wait_until(
                            move || {
                                let resource = probe_resource.clone();
                                async move { resource.current_status().await }
                            },
                            move |status| status.as_ref() == Some(&target),
                        )
                        .await
                        .map(|_| ())
                        .map_err(|error| match error {
                            PollError::Timeout { timeout, last } => WaitError::Timeout {
                                id: id.clone(),
                                timeout,
                                last: last.flatten(),
                            },
                            PollError::Probe(source) => WaitError::Resource {
                                id: id.clone(),
                                source,
                            },
                        })
                }
            })
            .await
            .map(|_| ())
            .map_err(flatten_fanout)
    }

    /// Wait until every resource is gone. A not-found answer counts as gone.
    pub async fn all_deleted(
        &self,
        resources: &[Arc<dyn ManagedResource>],
    ) -> Result<(), WaitError> {
        info!(count = resources.len(), "waiting for fleet deletion");
        let poller = self.poller.clone();

        self.executor
            .execute(resources.to_vec(), move |resource| {
                let poller = poller.clone();
                async move {
                    let id = resource.id();
                    let probe_resource = resource.clone();
                    poller
                        .wait_until(
                            move || {
                                let resource = probe_resource.clone();
                                async move {
                                    match resource.exists().await {
                                        Ok(exists) => Ok(exists),
                                        Err(ResourceError::NotFound(_)) => Ok(false),
                                        Err(error) => Err(error),
                                    }
                                }
                            },
                            |exists| !exists,
                        )
                        .await
                        .map(|_| ())
                        .map_err(|error| match error {
                            PollError::Timeout { timeout, .. } => WaitError::NotDeleted {
                                id: id.clone(),
                                timeout,
                            },
                            PollError::Probe(source) => WaitError::Resource {
                                id: id.clone(),
                                source,
                            },
                        })
                }
            })
            .await
            .map(|_| ())
            .map_err(flatten_fanout)
    }

    /// Wait until every guest answers `command` over the shell.
    ///
    /// Shell failures are the condition being waited out, so they keep the
    /// poll loop going instead of aborting it.
    pub async fn all_accessible(
        &self,
        resources: &[Arc<dyn ManagedResource>],
        shell: Arc<dyn GuestShell>,
        command: &[String],
        command_timeout: Duration,
    ) -> Result<(), WaitError> {
        info!(count = resources.len(), "waiting for guest accessibility");
        let poller = self.poller.clone();
        let command = Arc::new(command.to_vec());

        self.executor
            .execute(resources.to_vec(), move |resource| {
                let poller = poller.clone();
                let shell = shell.clone();
                let command = command.clone();
                async move {
                    let id = resource.id();
                    let probe_id = id.clone();
                    poller
                        .wait_until(
                            move || {
                                let shell = shell.clone();
                                let command = command.clone();
                                let id = probe_id.clone();
                                async move {
                                    match shell.run(&id, &command, command_timeout).await {
                                        Ok(_) => Ok::<_, Infallible>(None),
                                        Err(error) => Ok(Some(error)),
                                    }
                                }
                            },
                            |last_error| last_error.is_none(),
                        )
                        .await
                        .map(|_| ())
                        .map_err(|error| match error {
                            PollError::Timeout { timeout, last } => WaitError::NotAccessible {
                                id: id.clone(),
                                timeout,
                                last: last.flatten(),
                            },
                            PollError::Probe(never) => match never {},
                        })
                }
            })
            .await
            .map(|_| ())
            .map_err(flatten_fanout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::FanOutPolicy;
    use crate::poll::PollPolicy;
    use vmscale_interfaces::testing::{ResourceScript, ScriptedResource, ScriptedShell};

    fn waiter(timeout: Duration) -> BatchWaiter {
        BatchWaiter::new(
            FanOutExecutor::new(FanOutPolicy::new(8)),
            Poller::new(PollPolicy::new(timeout, Duration::from_secs(1))),
        )
    }

    fn as_resources(scripted: &[Arc<ScriptedResource>]) -> Vec<Arc<dyn ManagedResource>> {
        scripted
            .iter()
            .map(|resource| resource.clone() as Arc<dyn ManagedResource>)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn fleet_converges_on_target_status() {
        let scripted: Vec<_> = (0..3)
            .map(|index| {
                ScriptedResource::started(
                    ResourceId::namespaced(format!("vm-{index}"), "scale-test"),
                    ResourceScript::succeeding().with_statuses(vec![
                        None,
                        Some(ResourceStatus::new("Pending")),
                        Some(ResourceStatus::new("Active")),
                    ]),
                )
            })
            .collect();
        let resources = as_resources(&scripted);

        waiter(Duration::from_secs(30))
            .all_reach_status(&resources, &ResourceStatus::new("Active"))
            .await
            .unwrap();

        for resource in &scripted {
            assert!(resource.status_checks() >= 3);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_resource_times_out_with_last_status() {
        let stuck = ScriptedResource::started(
            ResourceId::namespaced("vm-stuck", "scale-test"),
            ResourceScript::succeeding()
                .with_statuses(vec![Some(ResourceStatus::new("Pending"))]),
        );
        let resources = as_resources(&[stuck]);

        let error = waiter(Duration::from_secs(3))
            .all_reach_status(&resources, &ResourceStatus::new("Active"))
            .await
            .unwrap_err();

        match error {
            WaitError::Timeout { id, last, .. } => {
                assert_eq!(id.name, "vm-stuck");
                assert_eq!(last, Some(ResourceStatus::new("Pending")));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_resource_aborts_the_wait() {
        // Never created, so the status probe answers not-found.
        let absent = ScriptedResource::new(
            ResourceId::namespaced("vm-ghost", "scale-test"),
            ResourceScript::succeeding(),
        );
        let resources = as_resources(&[absent]);

        let error = waiter(Duration::from_secs(30))
            .all_reach_status(&resources, &ResourceStatus::new("Active"))
            .await
            .unwrap_err();

        match error {
            WaitError::Resource { id, source } => {
                assert_eq!(id.name, "vm-ghost");
                assert!(matches!(source, ResourceError::NotFound(_)));
            }
            other => panic!("expected resource error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn deletion_wait_passes_once_gone() {
        let scripted: Vec<_> = (0..2)
            .map(|index| {
                ScriptedResource::started(
                    ResourceId::namespaced(format!("vm-{index}"), "scale-test"),
                    ResourceScript::succeeding(),
                )
            })
            .collect();
        let resources = as_resources(&scripted);

        for resource in &scripted {
            resource.delete().await.unwrap();
        }
        waiter(Duration::from_secs(30))
            .all_deleted(&resources)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn deletion_wait_follows_late_deletion() {
        let lingering = ScriptedResource::started(
            ResourceId::namespaced("vm-slow", "scale-test"),
            ResourceScript::succeeding(),
        );
        let resources = as_resources(&[lingering.clone()]);

        let deleter = lingering.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            deleter.delete().await.unwrap();
        });

        waiter(Duration::from_secs(30))
            .all_deleted(&resources)
            .await
            .unwrap();
        assert!(lingering.was_deleted());
    }

    #[tokio::test(start_paused = true)]
    async fn lingering_resource_fails_the_deletion_wait() {
        let lingering = ScriptedResource::started(
            ResourceId::namespaced("vm-stuck", "scale-test"),
            ResourceScript::succeeding(),
        );
        let resources = as_resources(&[lingering]);

        let error = waiter(Duration::from_secs(3))
            .all_deleted(&resources)
            .await
            .unwrap_err();

        assert!(
            matches!(error, WaitError::NotDeleted { ref id, .. } if id.name == "vm-stuck")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn accessibility_wait_retries_through_shell_errors() {
        let guest = ScriptedResource::started(
            ResourceId::namespaced("vm-0", "scale-test"),
            ResourceScript::succeeding(),
        );
        let id = guest.id();
        let resources = as_resources(&[guest]);

        let shell = Arc::new(ScriptedShell::new());
        for _ in 0..2 {
            shell.enqueue_error(
                &id,
                ShellError::Unreachable {
                    id: id.clone(),
                    message: "connection refused".to_string(),
                },
            );
        }
        shell.enqueue(&id, "ok");

        waiter(Duration::from_secs(30))
            .all_accessible(
                &resources,
                shell.clone(),
                &["true".to_string()],
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(shell.invocations().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_guest_times_out_with_last_shell_error() {
        let guest = ScriptedResource::started(
            ResourceId::namespaced("vm-0", "scale-test"),
            ResourceScript::succeeding(),
        );
        let id = guest.id();
        let resources = as_resources(&[guest]);

        let shell = Arc::new(ScriptedShell::new());
        shell.enqueue_error(
            &id,
            ShellError::Unreachable {
                id: id.clone(),
                message: "no route to host".to_string(),
            },
        );

        let error = waiter(Duration::from_secs(3))
            .all_accessible(
                &resources,
                shell,
                &["true".to_string()],
                Duration::from_secs(5),
            )
            .await
            .unwrap_err();

        match error {
            WaitError::NotAccessible { id, last, .. } => {
                assert_eq!(id.name, "vm-0");
                assert!(matches!(last, Some(ShellError::Unreachable { .. })));
            }
            other => panic!("expected accessibility timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_fleet_is_an_error() {
        let error = waiter(Duration::from_secs(5))
            .all_reach_status(&[], &ResourceStatus::new("Active"))
            .await
            .unwrap_err();
        assert!(matches!(error, WaitError::Empty));
    }
}
