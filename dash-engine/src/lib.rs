//! # dash-engine
//!
//! Scenario execution for the DASH harness: timing policy, the traffic
//! runner, flow verdicts and the orchestrator that ties a device-under-test
//! and a traffic generator together with guaranteed cleanup.

pub mod engine;

pub use engine::*;
