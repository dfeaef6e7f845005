use std::path::PathBuf;

use thiserror::Error;

use crate::batch::Operation;

/// Address parsing and arithmetic errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AddrError {
    #[error("MAC address has too few octets: {0}")]
    MacTooShort(String),

    #[error("MAC address has too many octets: {0}")]
    MacTooLong(String),

    #[error("MAC address has an invalid octet: {0}")]
    InvalidOctet(String),

    #[error("value {0:#x} does not fit in a 48-bit MAC address")]
    MacOutOfRange(u64),

    #[error("{kind} address overflow: {start:#x} + {index} * {step:#x}")]
    Overflow {
        kind: String,
        start: u64,
        step: u64,
        index: u64,
    },

    #[error("invalid prefix length /{0}")]
    InvalidPrefix(u8),
}

/// Failure talking to the device-under-test itself, as opposed to the device
/// rejecting an individual command.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device unreachable: {0}")]
    Unreachable(String),

    #[error("device returned {got} results for {sent} commands")]
    ResultCountMismatch { sent: usize, got: usize },

    #[error("device error: {0}")]
    Other(String),
}

impl DeviceError {
    /// Whether the device may have executed some of the submitted commands.
    /// Only an unreachable device is known to have seen none of them.
    pub fn may_have_applied(&self) -> bool {
        !matches!(self, DeviceError::Unreachable(_))
    }
}

/// A single command the device did not accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedCommand {
    pub name: String,
    pub op: Operation,
    pub status: i64,
}

/// Errors raised while loading or applying command batches.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("command batch file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("command batch I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed command batch: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("device rejected {} of {total} commands in batch '{batch}': {}", .rejected.len(), format_rejected(.rejected))]
    Rejected {
        batch: String,
        total: usize,
        rejected: Vec<RejectedCommand>,
    },

    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl BatchError {
    /// Whether the device state after this error is unknown, so the whole
    /// batch has to be treated as applied.
    pub fn may_have_applied(&self) -> bool {
        match self {
            BatchError::Device(err) => err.may_have_applied(),
            _ => false,
        }
    }
}

fn format_rejected(rejected: &[RejectedCommand]) -> String {
    rejected
        .iter()
        .map(|r| format!("{} {} -> {}", r.op, r.name, r.status))
        .collect::<Vec<_>>()
        .join(", ")
}
