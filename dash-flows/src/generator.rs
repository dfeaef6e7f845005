//! The traffic generator, as seen by the harness.
//!
//! A generator is configured once per run with every port, flow and protocol
//! device, then driven flow by flow. Counters are read per flow by name.

use async_trait::async_trait;
use dash_config::TopologyConfig;
use serde::Serialize;

use crate::error::TrafficError;
use crate::flow::FlowSpec;
use crate::protocol::ProtocolDevice;

/// Everything pushed to the generator in one `set_config` call.
#[derive(Debug, Clone, Default)]
pub struct GeneratorConfig {
    pub ports: Vec<String>,
    pub speed: String,
    pub flows: Vec<FlowSpec>,
    pub devices: Vec<ProtocolDevice>,
}

impl GeneratorConfig {
    pub fn new(topology: &TopologyConfig) -> Self {
        Self {
            ports: topology.ports.clone(),
            speed: topology.speed.clone(),
            flows: Vec::new(),
            devices: Vec::new(),
        }
    }

    pub fn with_flows(mut self, flows: Vec<FlowSpec>) -> Self {
        self.flows = flows;
        self
    }

    pub fn with_devices(mut self, devices: Vec<ProtocolDevice>) -> Self {
        self.devices = devices;
        self
    }

    pub fn flow(&self, name: &str) -> Option<&FlowSpec> {
        self.flows.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransmitState {
    Started,
    Stopped,
}

/// Per-flow counters as reported by the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowCounters {
    pub name: String,
    pub tx_frames: u64,
    pub rx_frames: u64,
    pub transmit: TransmitState,
}

impl FlowCounters {
    pub fn stopped(&self) -> bool {
        self.transmit == TransmitState::Stopped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BgpPeerMetrics {
    pub name: String,
    pub session_state: SessionState,
    pub routes_advertised: u64,
    pub routes_received: u64,
}

#[async_trait]
pub trait TrafficGenerator: Send + Sync {
    /// Replaces the generator configuration.
    async fn set_config(&self, config: &GeneratorConfig) -> Result<(), TrafficError>;

    /// Removes every flow and device. Succeeds on an already empty generator.
    async fn clear_config(&self) -> Result<(), TrafficError>;

    async fn start_traffic(&self, flow: &str) -> Result<(), TrafficError>;

    /// Stops every running flow.
    async fn stop_traffic(&self) -> Result<(), TrafficError>;

    async fn flow_metrics(&self, flow: &str) -> Result<FlowCounters, TrafficError>;

    /// True when every transmitted frame of `flow` was received.
    async fn check_flow_tx_rx_frames_stats(&self, flow: &str) -> Result<bool, TrafficError> {
        let counters = self.flow_metrics(flow).await?;
        Ok(counters.tx_frames == counters.rx_frames)
    }

    async fn start_protocols(&self) -> Result<(), TrafficError>;

    async fn stop_protocols(&self) -> Result<(), TrafficError>;

    async fn bgp_metrics(&self) -> Result<Vec<BgpPeerMetrics>, TrafficError>;
}
