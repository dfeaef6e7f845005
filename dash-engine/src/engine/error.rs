use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use dash_config::ConfigError;
use dash_core::{BatchError, DeviceError};
use dash_flows::{FlowError, TrafficError};
use thiserror::Error;

use super::orchestrator::ScenarioState;
use super::verdict::FlowVerdict;

/// A cleanup step that did not complete.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CleanupFailure {
    pub step: CleanupStep,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupStep {
    StopTraffic,
    StopProtocols,
    ClearGeneratorConfig,
    RevertDeviceConfig,
}

impl fmt::Display for CleanupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            CleanupStep::StopTraffic => "stop traffic",
            CleanupStep::StopProtocols => "stop protocols",
            CleanupStep::ClearGeneratorConfig => "clear generator config",
            CleanupStep::RevertDeviceConfig => "revert device config",
        };
        f.write_str(step)
    }
}

#[derive(Debug, Error)]
pub enum HarnessError {
    /// The device refused one or more setup commands.
    #[error("configuration apply failed: {0}")]
    ConfigurationApply(#[source] BatchError),

    #[error("scenario '{scenario}': {} flow(s) did not meet expectation: {}", .failures.len(), format_mismatches(.failures))]
    VerificationMismatch {
        scenario: String,
        failures: Vec<FlowVerdict>,
    },

    #[error("cleanup of scenario '{scenario}' failed: {}", format_cleanup(.failures))]
    Cleanup {
        scenario: String,
        failures: Vec<CleanupFailure>,
        report: Option<PathBuf>,
    },

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("traffic generator error: {0}")]
    Traffic(#[from] TrafficError),

    #[error("flow '{flow}' has a rate of 0 packets per second")]
    ZeroRate { flow: String },

    #[error("invalid flow: {0}")]
    InvalidFlow(#[from] FlowError),

    #[error("invalid traffic run: {0}")]
    InvalidRun(String),

    #[error("cannot {operation} while {from}")]
    InvalidTransition {
        from: ScenarioState,
        operation: &'static str,
    },

    #[error("BGP peers not established after {waited:?}: {}", .down.join(", "))]
    ProtocolTimeout { waited: Duration, down: Vec<String> },

    #[error("cannot load command batch: {0}")]
    BatchLoad(#[source] BatchError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("teardown report error: {0}")]
    Report(String),
}

impl From<BatchError> for HarnessError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::Rejected { .. } => HarnessError::ConfigurationApply(err),
            BatchError::Device(device) => HarnessError::Device(device),
            other => HarnessError::BatchLoad(other),
        }
    }
}

impl From<serde_yaml::Error> for HarnessError {
    fn from(err: serde_yaml::Error) -> Self {
        HarnessError::Report(err.to_string())
    }
}

impl From<std::io::Error> for HarnessError {
    fn from(err: std::io::Error) -> Self {
        HarnessError::Report(err.to_string())
    }
}

fn format_mismatches(failures: &[FlowVerdict]) -> String {
    failures
        .iter()
        .map(|v| {
            format!(
                "{} expected {} (tx {}, rx {})",
                v.flow, v.expectation, v.tx_frames, v.rx_frames
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_cleanup(failures: &[CleanupFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.step, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}
