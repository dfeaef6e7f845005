//! Submits command batches to a device-under-test and interprets the results.
//!
//! The device reports one raw integer per command. Success is asymmetric and
//! depends on the operation: a `create` returns the new object id (non-zero),
//! while a `remove` returns status `0`.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Command, CommandBatch, Operation};
use crate::error::{BatchError, DeviceError, RejectedCommand};

/// The device-under-test, as seen by the harness.
#[async_trait]
pub trait Device: Send + Sync {
    /// Processes `commands` in order and returns one status per command.
    async fn process_commands(
        &self,
        commands: &[Command],
    ) -> Result<Vec<CommandStatus>, DeviceError>;
}

/// Raw result returned by the device for a single command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandStatus(pub i64);

impl CommandStatus {
    /// `create` succeeds on any non-zero value, `remove` only on `0`.
    pub fn is_success_for(self, op: Operation) -> bool {
        match op {
            Operation::Create => self.0 != 0,
            Operation::Remove => self.0 == 0,
        }
    }
}

/// Result of one command within an applied batch.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub command: Command,
    pub status: CommandStatus,
    pub succeeded: bool,
}

/// Every result of an applied batch, in submission order.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    batch: String,
    outcomes: Vec<CommandOutcome>,
}

impl ApplyReport {
    pub fn batch(&self) -> &str {
        &self.batch
    }

    pub fn outcomes(&self) -> &[CommandOutcome] {
        &self.outcomes
    }

    pub fn statuses(&self) -> Vec<i64> {
        self.outcomes.iter().map(|o| o.status.0).collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.succeeded)
    }

    pub fn rejected(&self) -> Vec<RejectedCommand> {
        self.outcomes
            .iter()
            .filter(|o| !o.succeeded)
            .map(|o| RejectedCommand {
                name: o.command.name.clone(),
                op: o.command.op,
                status: o.status.0,
            })
            .collect()
    }

    /// The commands the device accepted, in submission order.
    pub fn succeeded_commands(&self) -> CommandBatch {
        CommandBatch::new(
            self.batch.clone(),
            self.outcomes
                .iter()
                .filter(|o| o.succeeded)
                .map(|o| o.command.clone())
                .collect(),
        )
    }

    /// Turns a report with rejected commands into [`BatchError::Rejected`].
    pub fn into_checked(self) -> Result<Self, BatchError> {
        if self.all_succeeded() {
            Ok(self)
        } else {
            Err(BatchError::Rejected {
                batch: self.batch.clone(),
                total: self.outcomes.len(),
                rejected: self.rejected(),
            })
        }
    }
}

/// Applies and reverts command batches against a [`Device`].
///
/// Application never stops at the first rejected command: the whole batch is
/// submitted and every result is collected.
pub struct ConfigBatchApplier<'a, D: Device + ?Sized> {
    device: &'a D,
}

impl<'a, D: Device + ?Sized> ConfigBatchApplier<'a, D> {
    pub fn new(device: &'a D) -> Self {
        Self { device }
    }

    pub async fn apply(&self, batch: &CommandBatch) -> Result<ApplyReport, BatchError> {
        info!(batch = batch.name(), commands = batch.len(), "Applying command batch");
        if batch.is_empty() {
            return Ok(ApplyReport {
                batch: batch.name().to_string(),
                outcomes: Vec::new(),
            });
        }

        let statuses = self.device.process_commands(batch.commands()).await?;
        if statuses.len() != batch.len() {
            return Err(DeviceError::ResultCountMismatch {
                sent: batch.len(),
                got: statuses.len(),
            }
            .into());
        }

        let outcomes: Vec<CommandOutcome> = batch
            .iter()
            .zip(statuses)
            .map(|(command, status)| {
                let succeeded = status.is_success_for(command.op);
                if succeeded {
                    debug!(batch = batch.name(), name = %command.name, op = %command.op, status = status.0, "Command accepted");
                } else {
                    warn!(batch = batch.name(), name = %command.name, op = %command.op, status = status.0, "Command rejected");
                }
                CommandOutcome {
                    command: command.clone(),
                    status,
                    succeeded,
                }
            })
            .collect();

        Ok(ApplyReport {
            batch: batch.name().to_string(),
            outcomes,
        })
    }

    /// Like [`apply`](Self::apply) but fails if any command was rejected.
    pub async fn apply_checked(&self, batch: &CommandBatch) -> Result<ApplyReport, BatchError> {
        self.apply(batch).await?.into_checked()
    }

    /// Applies the teardown image of `batch`.
    pub async fn revert(&self, batch: &CommandBatch) -> Result<ApplyReport, BatchError> {
        self.apply(&batch.reverted()).await
    }

    /// Like [`revert`](Self::revert) but fails if any removal was rejected.
    pub async fn revert_checked(&self, batch: &CommandBatch) -> Result<ApplyReport, BatchError> {
        self.revert(batch).await?.into_checked()
    }
}
