//! # dash-core
//!
//! Foundation layer for the DASH scenario harness.
//!
//! ### Key Submodules:
//! - `addr`: MAC/IPv4 address types and carry-correct address arithmetic
//! - `batch`: SAI-style command batches, their reversal, and the
//!   `ConfigBatchApplier` that submits them to a device-under-test
//! - `error`: error types shared by the device-facing code

pub mod addr;
pub mod batch;
pub mod error;

pub mod prelude {
    pub use crate::addr::*;
    pub use crate::batch::*;
    pub use crate::error::*;
}

pub use addr::{ip_list, AddressArith, MacAddr};
pub use batch::applier::{
    ApplyReport, CommandOutcome, CommandStatus, ConfigBatchApplier, Device,
};
pub use batch::{Command, CommandBatch, Operation};
pub use error::{AddrError, BatchError, DeviceError, RejectedCommand};
