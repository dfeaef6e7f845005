//! Preloaded flow builders for the ENI <-> network VXLAN scenarios.

use dash_config::HarnessConfig;

use crate::flow::FlowBuilder;

/// Produces [`FlowBuilder`]s carrying the harness addressing plan.
///
/// Scenario code only overrides what differs from the plan, such as the inner
/// source IP of a deny flow or an increment on the inner destination.
#[derive(Debug, Clone)]
pub struct VxlanFlowTemplate {
    config: HarnessConfig,
}

impl VxlanFlowTemplate {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Traffic sent by the ENI towards the first network endpoint.
    pub fn eni_to_network(&self, name: impl Into<String>) -> FlowBuilder {
        let topo = &self.config.topology;
        let addr = &self.config.addressing;
        wire(self.with_traffic_defaults(FlowBuilder::new(name)), topo.eni_port(), topo.network_port())
            .outer_eth(addr.eni_outer_src_mac, addr.eni_outer_dst_mac)
            .outer_ipv4(addr.eni_vtep_ip, addr.dpu_vtep_ip)
            .outer_udp(addr.vxlan_src_port, addr.vxlan_dst_port)
            .vni(addr.eni_vni)
            .inner_src_mac(addr.eni_mac)
            .inner_dst_mac(addr.network_mac)
            .inner_src_ip(addr.eni_ip)
            .inner_dst_ip(addr.network_ip)
            .inner_udp(addr.eni_udp_port, addr.network_udp_port)
    }

    /// Traffic sent by the first network endpoint towards the ENI.
    pub fn network_to_eni(&self, name: impl Into<String>) -> FlowBuilder {
        let topo = &self.config.topology;
        let addr = &self.config.addressing;
        wire(self.with_traffic_defaults(FlowBuilder::new(name)), topo.network_port(), topo.eni_port())
            .outer_eth(addr.network_outer_src_mac, addr.network_outer_dst_mac)
            .outer_ipv4(addr.network_vtep_ip, addr.dpu_vtep_ip)
            .outer_udp(addr.vxlan_src_port, addr.vxlan_dst_port)
            .vni(addr.network_vni)
            .inner_src_mac(addr.network_mac)
            .inner_dst_mac(addr.eni_mac)
            .inner_src_ip(addr.network_ip)
            .inner_dst_ip(addr.eni_ip)
            .inner_udp(addr.network_udp_port, addr.eni_udp_port)
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    fn with_traffic_defaults(&self, builder: FlowBuilder) -> FlowBuilder {
        let traffic = &self.config.traffic;
        builder
            .size(traffic.packet_length)
            .packets(traffic.total_packets)
            .pps(traffic.pps)
    }
}

/// Sets whichever ports the topology has. A missing one surfaces as
/// [`FlowError::MissingPort`](crate::FlowError::MissingPort) at build time.
fn wire(mut builder: FlowBuilder, tx: Option<&str>, rx: Option<&str>) -> FlowBuilder {
    if let Some(tx) = tx {
        builder = builder.tx_port(tx);
    }
    if let Some(rx) = rx {
        builder = builder.rx_port(rx);
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use crate::pattern::FieldPattern;
    use std::net::Ipv4Addr;

    #[test]
    fn eni_to_network_uses_addressing_plan() {
        let template = VxlanFlowTemplate::new(&HarnessConfig::default());
        let flow = template.eni_to_network("vm_to_vm").build().unwrap();

        assert_eq!(flow.tx_port, "Port 1");
        assert_eq!(flow.rx_port, "Port 2");
        assert_eq!(flow.size, 128);
        assert_eq!(flow.packets, 1000);
        assert_eq!(flow.pps, 100);
        assert_eq!(flow.headers.vxlan.vni, 11);
        assert_eq!(
            flow.headers.outer_ipv4.dst,
            FieldPattern::Fixed(Ipv4Addr::new(221, 0, 0, 2))
        );
        assert_eq!(
            flow.headers.outer_eth.src.first().to_string(),
            "80:09:02:01:00:01"
        );
        assert_eq!(
            flow.headers.inner_ipv4.src,
            FieldPattern::Fixed(Ipv4Addr::new(1, 1, 0, 1))
        );
        assert_eq!(flow.headers.inner_udp.dst_port, FieldPattern::Fixed(20000));
    }

    #[test]
    fn missing_topology_port_fails_build() {
        let mut config = HarnessConfig::default();
        config.topology.ports.truncate(1);
        let template = VxlanFlowTemplate::new(&config);
        assert!(matches!(
            template.eni_to_network("one_port").build(),
            Err(FlowError::MissingPort { which: "rx", .. })
        ));
        assert!(matches!(
            template.network_to_eni("one_port").build(),
            Err(FlowError::MissingPort { which: "tx", .. })
        ));
    }

    #[test]
    fn network_to_eni_mirrors_endpoints() {
        let template = VxlanFlowTemplate::new(&HarnessConfig::default());
        let flow = template.network_to_eni("back").build().unwrap();

        assert_eq!(flow.tx_port, "Port 2");
        assert_eq!(flow.rx_port, "Port 1");
        assert_eq!(flow.headers.vxlan.vni, 101);
        assert_eq!(
            flow.headers.outer_ipv4.src,
            FieldPattern::Fixed(Ipv4Addr::new(221, 0, 2, 101))
        );
        assert_eq!(
            flow.headers.inner_ipv4.dst,
            FieldPattern::Fixed(Ipv4Addr::new(1, 1, 0, 1))
        );
    }
}
