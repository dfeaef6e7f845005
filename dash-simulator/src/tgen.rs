//! Simulated traffic generator wired to a [`SimulatedDpu`].
//!
//! Transmission runs on `tokio::time`, so under a paused test clock a flow of
//! 1000 packets at 100 pps completes after ten seconds of virtual time. A flow
//! has sent `floor(elapsed * pps)` frames, capped at its packet count. Each
//! frame is evaluated once against the DPU forwarding rules captured when the
//! flow started, then against the loss model.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dash_config::SimulatorConfig;
use dash_flows::{
    BgpPeerMetrics, FlowCounters, FlowSpec, GeneratorConfig, SessionState, TrafficError,
    TrafficGenerator, TransmitState,
};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::dpu::{DpuState, ForwardingSnapshot, FrameView, SimulatedDpu};
use crate::network_simulation::packet_loss::{loss_model, PacketLossModel};

/// Virtual time a BGP session needs to reach Established.
pub const BGP_ESTABLISH_DELAY: Duration = Duration::from_secs(3);

struct FlowRun {
    started_at: Instant,
    stopped_at: Option<Instant>,
    rules: ForwardingSnapshot,
    evaluated: u64,
    delivered: u64,
}

struct GenState {
    config: Option<GeneratorConfig>,
    runs: HashMap<String, FlowRun>,
    protocols_started_at: Option<Instant>,
    loss: Box<dyn PacketLossModel>,
}

pub struct SimulatedTrafficGenerator {
    dpu: Arc<Mutex<DpuState>>,
    state: Mutex<GenState>,
}

impl SimulatedTrafficGenerator {
    pub fn new(dpu: &SimulatedDpu, config: &SimulatorConfig) -> Self {
        Self {
            dpu: dpu.shared_state(),
            state: Mutex::new(GenState {
                config: None,
                runs: HashMap::new(),
                protocols_started_at: None,
                loss: loss_model(config.loss_probability, config.seed),
            }),
        }
    }

    /// Whether a configuration is currently loaded.
    pub fn is_configured(&self) -> bool {
        self.state.lock().config.is_some()
    }

    pub fn running_flows(&self) -> usize {
        self.state
            .lock()
            .runs
            .values()
            .filter(|r| r.stopped_at.is_none())
            .count()
    }
}

fn frames_sent(flow: &FlowSpec, run: &FlowRun, now: Instant) -> u64 {
    let end = run.stopped_at.unwrap_or(now);
    let elapsed = end.saturating_duration_since(run.started_at);
    let sent = elapsed.as_nanos() * u128::from(flow.pps) / 1_000_000_000;
    u64::try_from(sent).unwrap_or(u64::MAX).min(flow.packets)
}

fn frame_at(flow: &FlowSpec, index: u64) -> Option<FrameView> {
    let inner = &flow.headers.inner_ipv4;
    Some(FrameView {
        vni: flow.headers.vxlan.vni,
        inner_src: inner.src.value_at(index).ok()?,
        inner_dst: inner.dst.value_at(index).ok()?,
    })
}

fn counters(state: &mut GenState, name: &str, now: Instant) -> Result<FlowCounters, TrafficError> {
    let GenState {
        config, runs, loss, ..
    } = state;
    let flow = config
        .as_ref()
        .and_then(|c| c.flow(name))
        .ok_or_else(|| TrafficError::UnknownFlow(name.to_string()))?;

    let Some(run) = runs.get_mut(name) else {
        return Ok(FlowCounters {
            name: name.to_string(),
            tx_frames: 0,
            rx_frames: 0,
            transmit: TransmitState::Stopped,
        });
    };

    let tx = frames_sent(flow, run, now);
    while run.evaluated < tx {
        let forwarded = frame_at(flow, run.evaluated)
            .map(|f| run.rules.forwards(&f))
            .unwrap_or(false);
        if forwarded && !loss.should_drop() {
            run.delivered += 1;
        }
        run.evaluated += 1;
    }

    let transmit = if run.stopped_at.is_some() || tx >= flow.packets {
        TransmitState::Stopped
    } else {
        TransmitState::Started
    };
    Ok(FlowCounters {
        name: name.to_string(),
        tx_frames: tx,
        rx_frames: run.delivered,
        transmit,
    })
}

#[async_trait]
impl TrafficGenerator for SimulatedTrafficGenerator {
    async fn set_config(&self, config: &GeneratorConfig) -> Result<(), TrafficError> {
        for flow in &config.flows {
            for port in [&flow.tx_port, &flow.rx_port] {
                if !config.ports.contains(port) {
                    return Err(TrafficError::Rejected(format!(
                        "flow '{}' uses unknown port '{}'",
                        flow.name, port
                    )));
                }
            }
        }
        let mut state = self.state.lock();
        state.runs.clear();
        state.protocols_started_at = None;
        state.config = Some(config.clone());
        info!(
            flows = config.flows.len(),
            devices = config.devices.len(),
            "Simulated generator configured"
        );
        Ok(())
    }

    async fn clear_config(&self) -> Result<(), TrafficError> {
        let mut state = self.state.lock();
        state.config = None;
        state.runs.clear();
        state.protocols_started_at = None;
        Ok(())
    }

    async fn start_traffic(&self, flow: &str) -> Result<(), TrafficError> {
        let rules = self.dpu.lock().snapshot();
        let mut state = self.state.lock();
        let spec = state
            .config
            .as_ref()
            .and_then(|c| c.flow(flow))
            .ok_or_else(|| TrafficError::UnknownFlow(flow.to_string()))?;
        if !spec.enabled {
            return Err(TrafficError::Rejected(format!("flow '{}' is disabled", flow)));
        }
        debug!(flow, "Simulated generator starting flow");
        state.runs.insert(
            flow.to_string(),
            FlowRun {
                started_at: Instant::now(),
                stopped_at: None,
                rules,
                evaluated: 0,
                delivered: 0,
            },
        );
        Ok(())
    }

    async fn stop_traffic(&self) -> Result<(), TrafficError> {
        let now = Instant::now();
        let mut state = self.state.lock();
        for run in state.runs.values_mut() {
            run.stopped_at.get_or_insert(now);
        }
        Ok(())
    }

    async fn flow_metrics(&self, flow: &str) -> Result<FlowCounters, TrafficError> {
        let now = Instant::now();
        counters(&mut self.state.lock(), flow, now)
    }

    async fn start_protocols(&self) -> Result<(), TrafficError> {
        let mut state = self.state.lock();
        if state.config.is_none() {
            return Err(TrafficError::Rejected("no configuration loaded".into()));
        }
        state.protocols_started_at = Some(Instant::now());
        Ok(())
    }

    async fn stop_protocols(&self) -> Result<(), TrafficError> {
        self.state.lock().protocols_started_at = None;
        Ok(())
    }

    async fn bgp_metrics(&self) -> Result<Vec<BgpPeerMetrics>, TrafficError> {
        let state = self.state.lock();
        let Some(config) = state.config.as_ref() else {
            return Ok(Vec::new());
        };
        let timer_done = state
            .protocols_started_at
            .map(|t| Instant::now().saturating_duration_since(t) >= BGP_ESTABLISH_DELAY)
            .unwrap_or(false);

        let metrics = config
            .devices
            .iter()
            .filter_map(|device| device.bgp.as_ref().map(|bgp| (device, bgp)))
            .map(|(device, bgp)| {
                // A session needs a device answering on the configured peer address.
                let neighbour = config
                    .devices
                    .iter()
                    .find(|d| d.name != device.name && d.ipv4.ip() == bgp.peer_address);
                let up = timer_done && neighbour.is_some();
                let advertised: u64 = bgp.routes.iter().map(|r| u64::from(r.count)).sum();
                let received: u64 = neighbour
                    .and_then(|n| n.bgp.as_ref())
                    .map(|n| n.routes.iter().map(|r| u64::from(r.count)).sum())
                    .unwrap_or(0);
                BgpPeerMetrics {
                    name: bgp.name.clone(),
                    session_state: if up {
                        SessionState::Up
                    } else {
                        SessionState::Down
                    },
                    routes_advertised: if up { advertised } else { 0 },
                    routes_received: if up { received } else { 0 },
                }
            })
            .collect();
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dash_config::{HarnessConfig, TopologyConfig};
    use dash_core::{Command, Device};
    use dash_flows::VxlanFlowTemplate;
    use serde_json::json;

    async fn permit_all(dpu: &SimulatedDpu) {
        dpu.process_commands(&[Command::create("allow_all")
            .with_type("SAI_OBJECT_TYPE_DASH_ACL_RULE")
            .with_attributes(json!([
                "SAI_DASH_ACL_RULE_ATTR_ACTION", "SAI_DASH_ACL_RULE_ACTION_PERMIT"
            ]))])
            .await
            .unwrap();
    }

    fn generator_config(flows: Vec<FlowSpec>) -> GeneratorConfig {
        GeneratorConfig::new(&TopologyConfig::default()).with_flows(flows)
    }

    fn flow(name: &str) -> FlowSpec {
        VxlanFlowTemplate::new(&HarnessConfig::default())
            .eni_to_network(name)
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn transmits_at_configured_rate() {
        let dpu = SimulatedDpu::new();
        permit_all(&dpu).await;
        let tgen = SimulatedTrafficGenerator::new(&dpu, &SimulatorConfig::default());
        tgen.set_config(&generator_config(vec![flow("f1")])).await.unwrap();
        tgen.start_traffic("f1").await.unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let c = tgen.flow_metrics("f1").await.unwrap();
        assert_eq!(c.tx_frames, 250);
        assert_eq!(c.rx_frames, 250);
        assert_eq!(c.transmit, TransmitState::Started);

        tokio::time::sleep(Duration::from_secs(10)).await;
        let c = tgen.flow_metrics("f1").await.unwrap();
        assert_eq!(c.tx_frames, 1000);
        assert!(c.stopped());
        assert!(tgen.check_flow_tx_rx_frames_stats("f1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn unconfigured_dpu_drops_everything() {
        let dpu = SimulatedDpu::new();
        let tgen = SimulatedTrafficGenerator::new(&dpu, &SimulatorConfig::default());
        tgen.set_config(&generator_config(vec![flow("f1")])).await.unwrap();
        tgen.start_traffic("f1").await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        tgen.stop_traffic().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        let c = tgen.flow_metrics("f1").await.unwrap();
        assert_eq!(c.tx_frames, 100, "stop freezes transmission");
        assert_eq!(c.rx_frames, 0);
        assert!(!tgen.check_flow_tx_rx_frames_stats("f1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn loss_model_drops_some_frames() {
        let dpu = SimulatedDpu::new();
        permit_all(&dpu).await;
        let config = SimulatorConfig {
            loss_probability: 0.5,
            ..Default::default()
        };
        let tgen = SimulatedTrafficGenerator::new(&dpu, &config);
        tgen.set_config(&generator_config(vec![flow("f1")])).await.unwrap();
        tgen.start_traffic("f1").await.unwrap();
        tokio::time::sleep(Duration::from_secs(11)).await;

        let c = tgen.flow_metrics("f1").await.unwrap();
        assert_eq!(c.tx_frames, 1000);
        assert!(c.rx_frames > 350 && c.rx_frames < 650);
    }

    #[tokio::test]
    async fn rejects_unknown_flows_and_ports() {
        let dpu = SimulatedDpu::new();
        let tgen = SimulatedTrafficGenerator::new(&dpu, &SimulatorConfig::default());
        assert!(matches!(
            tgen.start_traffic("missing").await,
            Err(TrafficError::UnknownFlow(_))
        ));

        let mut bad = flow("f1");
        bad.rx_port = "Port 9".into();
        assert!(matches!(
            tgen.set_config(&generator_config(vec![bad])).await,
            Err(TrafficError::Rejected(_))
        ));
        assert!(!tgen.is_configured());
    }

    #[tokio::test(start_paused = true)]
    async fn bgp_sessions_come_up_after_delay() {
        use dash_flows::{ProtocolDevice, RouteRange};
        use std::net::Ipv4Addr;

        let dpu = SimulatedDpu::new();
        let tgen = SimulatedTrafficGenerator::new(&dpu, &SimulatorConfig::default());
        let a = ProtocolDevice::new(
            "a",
            "Port 1",
            "80:09:02:01:00:01".parse().unwrap(),
            Ipv4Addr::new(220, 0, 1, 2),
            24,
            Ipv4Addr::new(220, 0, 1, 1),
        )
        .unwrap()
        .with_ebgp(
            200,
            vec![RouteRange::new("r", Ipv4Addr::new(221, 0, 1, 1), 32, 8).unwrap()],
        )
        .unwrap();
        let b = ProtocolDevice::new(
            "b",
            "Port 2",
            "80:09:02:01:00:03".parse().unwrap(),
            Ipv4Addr::new(220, 0, 1, 1),
            24,
            Ipv4Addr::new(220, 0, 1, 2),
        )
        .unwrap()
        .with_ebgp(100, Vec::new())
        .unwrap();

        let config = GeneratorConfig::new(&TopologyConfig::default()).with_devices(vec![a, b]);
        tgen.set_config(&config).await.unwrap();
        tgen.start_protocols().await.unwrap();

        let early = tgen.bgp_metrics().await.unwrap();
        assert!(early.iter().all(|m| m.session_state == SessionState::Down));

        tokio::time::sleep(BGP_ESTABLISH_DELAY).await;
        let up = tgen.bgp_metrics().await.unwrap();
        assert_eq!(up.len(), 2);
        assert!(up.iter().all(|m| m.session_state == SessionState::Up));
        assert_eq!(up[0].routes_advertised, 8);
        assert_eq!(up[1].routes_received, 8);
    }
}
