//! ## dash-telemetry::metrics
//! **Prometheus counters for flows and scenarios**

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry};

/// Label value of `dash_scenarios_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioOutcomeLabel {
    Passed,
    Failed,
    CleanupFailed,
}

impl ScenarioOutcomeLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioOutcomeLabel::Passed => "passed",
            ScenarioOutcomeLabel::Failed => "failed",
            ScenarioOutcomeLabel::CleanupFailed => "cleanup_failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub flow_tx_frames: IntCounterVec,
    pub flow_rx_frames: IntCounterVec,
    pub scenarios: IntCounterVec,
    pub traffic_run_seconds: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let flow_tx_frames = IntCounterVec::new(
            Opts::new("dash_flow_tx_frames_total", "Frames transmitted per flow"),
            &["flow"],
        )?;
        let flow_rx_frames = IntCounterVec::new(
            Opts::new("dash_flow_rx_frames_total", "Frames received per flow"),
            &["flow"],
        )?;
        let scenarios = IntCounterVec::new(
            Opts::new("dash_scenarios_total", "Scenarios executed by outcome"),
            &["outcome"],
        )?;
        let traffic_run_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "dash_traffic_run_seconds",
                "Wall time from first flow start to counter collection",
            )
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]),
        )?;

        registry.register(Box::new(flow_tx_frames.clone()))?;
        registry.register(Box::new(flow_rx_frames.clone()))?;
        registry.register(Box::new(scenarios.clone()))?;
        registry.register(Box::new(traffic_run_seconds.clone()))?;

        Ok(Self {
            registry,
            flow_tx_frames,
            flow_rx_frames,
            scenarios,
            traffic_run_seconds,
        })
    }

    pub fn record_flow(&self, flow: &str, tx_frames: u64, rx_frames: u64) {
        self.flow_tx_frames.with_label_values(&[flow]).inc_by(tx_frames);
        self.flow_rx_frames.with_label_values(&[flow]).inc_by(rx_frames);
    }

    pub fn record_scenario(&self, outcome: ScenarioOutcomeLabel) {
        self.scenarios.with_label_values(&[outcome.as_str()]).inc();
    }

    pub fn observe_traffic_run(&self, seconds: f64) {
        self.traffic_run_seconds.observe(seconds);
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
