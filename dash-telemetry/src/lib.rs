//! # DASH Harness Telemetry
//!
//! Logging setup and Prometheus metrics for scenario runs.

pub mod logging;
pub mod metrics;

pub use logging::{EventLogger, HarnessEvent, Phase};
pub use metrics::{MetricsRecorder, ScenarioOutcomeLabel};
