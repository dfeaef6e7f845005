#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::path::PathBuf;

use dash_config::HarnessConfig;
use dash_core::CommandBatch;
use dash_flows::{FlowSpec, VxlanFlowTemplate};
use dash_simulator::{simulated_pair, SimulatedDpu, SimulatedTrafficGenerator};

pub const ALLOWED_NETWORK_IP: Ipv4Addr = Ipv4Addr::new(1, 128, 0, 1);
pub const DENIED_INBOUND_SRC: Ipv4Addr = Ipv4Addr::new(1, 128, 0, 2);
pub const DENIED_OUTBOUND_DST: Ipv4Addr = Ipv4Addr::new(1, 140, 0, 2);

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn fixture(name: &str) -> anyhow::Result<CommandBatch> {
    Ok(CommandBatch::from_json_file(fixture_path(name))?)
}

pub fn lab() -> (HarnessConfig, SimulatedDpu, SimulatedTrafficGenerator) {
    let config = HarnessConfig::default();
    let (dpu, tgen) = simulated_pair(&config.simulator);
    (config, dpu, tgen)
}

pub fn template(config: &HarnessConfig) -> VxlanFlowTemplate {
    VxlanFlowTemplate::new(config)
}

/// 100 packets at 10 pps, as the ACL scenarios send.
pub fn short(builder: dash_flows::FlowBuilder) -> anyhow::Result<FlowSpec> {
    Ok(builder.packets(100).pps(10).build()?)
}
