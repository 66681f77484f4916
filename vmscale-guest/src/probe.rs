//! Fleet-wide guest data collection.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use vmscale_engine::{FanOutError, FanOutExecutor};
use vmscale_interfaces::{GuestShell, ManagedResource, ResourceId};

use crate::battery::{shell_command, GuestCommand, OUTPUT_SEPARATOR, STANDARD_BATTERY};
use crate::error::{GuestError, ProbeFailure, ProbeFailureKind};

/// One guest's parsed battery output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestSnapshot {
    pub resource: ResourceId,
    pub fields: BTreeMap<String, String>,
}

impl GuestSnapshot {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Collects structured guest data across a fleet.
///
/// Probing is collect-all rather than fail-fast: a scale run needs the full
/// census of broken guests, not the first victim, so every resource is
/// attempted and all failures come back together.
pub struct GuestProbe {
    shell: Arc<dyn GuestShell>,
    executor: FanOutExecutor,
    battery: Vec<GuestCommand>,
    command_timeout: Duration,
}

impl GuestProbe {
    pub fn new(
        shell: Arc<dyn GuestShell>,
        executor: FanOutExecutor,
        command_timeout: Duration,
    ) -> Self {
        Self {
            shell,
            executor,
            battery: STANDARD_BATTERY.clone(),
            command_timeout,
        }
    }

    /// Replace the standard battery.
    pub fn with_battery(mut self, battery: Vec<GuestCommand>) -> Self {
        self.battery = battery;
        self
    }

    /// Run the battery on every guest and parse the output into snapshots.
    ///
    /// Snapshots come back aligned with the input order. Any shell or parse
    /// failure fails the whole call with the full failure list.
    pub async fn collect(
        &self,
        resources: &[Arc<dyn ManagedResource>],
    ) -> Result<Vec<GuestSnapshot>, GuestError> {
        if resources.is_empty() {
            return Err(GuestError::InvalidArgument(
                "no resources to probe".to_string(),
            ));
        }
        info!(count = resources.len(), "collecting guest data");

        let ids: Vec<ResourceId> = resources.iter().map(|resource| resource.id()).collect();
        let outputs = self
            .run_shell(ids.clone(), shell_command(&self.battery), self.command_timeout)
            .await?;

        let mut snapshots = Vec::with_capacity(outputs.len());
        let mut failures = Vec::new();
        for (id, outcome) in ids.into_iter().zip(outputs) {
            match outcome {
                Ok(stdout) => match parse_battery_output(&self.battery, &id, &stdout) {
                    Ok(fields) => snapshots.push(GuestSnapshot {
                        resource: id,
                        fields,
                    }),
                    Err(failure) => failures.push(failure),
                },
                Err(failure) => failures.push(failure),
            }
        }

        if !failures.is_empty() {
            return Err(GuestError::Probe { failures });
        }
        debug!(count = snapshots.len(), "guest data parsed");
        Ok(snapshots)
    }

    /// Run an arbitrary command on every guest.
    ///
    /// Outputs come back aligned with the input order; failures are
    /// aggregated the same way `collect` aggregates them.
    pub async fn run_on_all(
        &self,
        resources: &[Arc<dyn ManagedResource>],
        command: &[String],
        timeout: Duration,
    ) -> Result<Vec<String>, GuestError> {
        if resources.is_empty() {
            return Err(GuestError::InvalidArgument(
                "no resources to run on".to_string(),
            ));
        }
        info!(count = resources.len(), command = ?command, "running command on fleet");

        let ids: Vec<ResourceId> = resources.iter().map(|resource| resource.id()).collect();
        let outputs = self.run_shell(ids, command.to_vec(), timeout).await?;

        let mut stdout = Vec::with_capacity(outputs.len());
        let mut failures = Vec::new();
        for outcome in outputs {
            match outcome {
                Ok(output) => stdout.push(output),
                Err(failure) => failures.push(failure),
            }
        }
        if !failures.is_empty() {
            return Err(GuestError::Probe { failures });
        }
        Ok(stdout)
    }

    async fn run_shell(
        &self,
        ids: Vec<ResourceId>,
        command: Vec<String>,
        timeout: Duration,
    ) -> Result<Vec<Result<String, ProbeFailure>>, GuestError> {
        let shell = self.shell.clone();
        let command = Arc::new(command);

        self.executor
            .execute_collect(ids, move |id| {
                let shell = shell.clone();
                let command = command.clone();
                async move {
                    shell
                        .run(&id, &command, timeout)
                        .await
                        .map_err(|error| ProbeFailure {
                            resource: id.clone(),
                            kind: ProbeFailureKind::Shell(error),
                        })
                }
            })
            .await
            .map_err(|error| match error {
                FanOutError::EmptyInput => {
                    GuestError::InvalidArgument("no resources to probe".to_string())
                }
                FanOutError::Worker { source, .. } => GuestError::Probe {
                    failures: vec![source],
                },
                FanOutError::Panicked(message) => GuestError::Panicked(message),
            })
    }
}

/// Split combined stdout on the separator and match each segment against its
/// command's pattern; the named captures become the snapshot fields.
fn parse_battery_output(
    battery: &[GuestCommand],
    resource: &ResourceId,
    stdout: &str,
) -> Result<BTreeMap<String, String>, ProbeFailure> {
    let segments: Vec<&str> = stdout.split(OUTPUT_SEPARATOR).map(str::trim).collect();
    if segments.len() != battery.len() {
        let joined = battery
            .iter()
            .map(|entry| entry.command)
            .collect::<Vec<_>>()
            .join(" && ");
        return Err(ProbeFailure {
            resource: resource.clone(),
            kind: ProbeFailureKind::Parse {
                command: joined,
                segment: stdout.to_string(),
            },
        });
    }

    let mut fields = BTreeMap::new();
    for (entry, segment) in battery.iter().zip(segments) {
        let captures = entry.pattern.captures(segment).ok_or_else(|| ProbeFailure {
            resource: resource.clone(),
            kind: ProbeFailureKind::Parse {
                command: entry.command.to_string(),
                segment: segment.to_string(),
            },
        })?;
        for name in entry.pattern.capture_names().flatten() {
            if let Some(value) = captures.name(name) {
                fields.insert(name.to_string(), value.as_str().to_string());
            }
        }
    }
    Ok(fields)
}
