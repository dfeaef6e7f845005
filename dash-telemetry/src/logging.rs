//! ## dash-telemetry::logging
//! **Structured scenario events with tracing and OpenTelemetry attributes**
//!
//! Every event belongs to one scenario and one lifecycle phase. Both are
//! recorded as fields of a `harness_event` span so a log collector can group
//! a whole scenario run, and the phase outcome decides the log level.

use std::fmt;

use opentelemetry::KeyValue;
use tracing::{info, info_span, warn, Instrument};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt as subscriber_fmt, EnvFilter};

/// Lifecycle phase a [`HarnessEvent`] reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Configure,
    Run,
    Verify,
    Cleanup,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Configure => "configure",
            Phase::Run => "run",
            Phase::Verify => "verify",
            Phase::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The end of one scenario phase, with its attributes.
#[derive(Debug, Clone)]
pub struct HarnessEvent {
    pub scenario: String,
    pub phase: Phase,
    pub succeeded: bool,
    pub attributes: Vec<KeyValue>,
}

impl HarnessEvent {
    pub fn completed(scenario: impl Into<String>, phase: Phase) -> Self {
        Self {
            scenario: scenario.into(),
            phase,
            succeeded: true,
            attributes: Vec::new(),
        }
    }

    pub fn failed(scenario: impl Into<String>, phase: Phase) -> Self {
        Self {
            succeeded: false,
            ..Self::completed(scenario, phase)
        }
    }

    pub fn with(mut self, attribute: KeyValue) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Attributes as `key=value` pairs, in insertion order.
    pub fn render_attributes(&self) -> String {
        self.attributes
            .iter()
            .map(|kv| format!("{}={}", kv.key, kv.value))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global fmt subscriber. `RUST_LOG` overrides the default
    /// `info` filter. Calling it again after a subscriber is set is a no-op.
    pub fn init() {
        let _ = subscriber_fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .with_span_events(FmtSpan::CLOSE)
            .try_init();
    }

    /// Emits `event` inside a `harness_event` span carrying its scenario and
    /// phase. Failed phases are logged at `warn`.
    pub async fn log(event: HarnessEvent) {
        let span = info_span!(
            "harness_event",
            scenario = %event.scenario,
            phase = %event.phase,
            otel.kind = "INTERNAL"
        );
        let attributes = event.render_attributes();

        async move {
            if event.succeeded {
                info!(%attributes, "Scenario phase completed");
            } else {
                warn!(%attributes, "Scenario phase failed");
            }
        }
        .instrument(span)
        .await
    }
}
