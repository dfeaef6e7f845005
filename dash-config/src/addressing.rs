//! Addressing plan shared by every scenario.
//!
//! One ENI (VM side) talks to one or two network endpoints through the DPU.
//! Traffic from either side is VXLAN encapsulated towards the DPU VTEP.

use std::net::Ipv4Addr;

use dash_core::MacAddr;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Addresses, VNIs and UDP ports used to build scenario flows.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(default)]
pub struct AddressingConfig {
    /// Inner IP of the ENI.
    pub eni_ip: Ipv4Addr,
    /// Inner IP of the first network endpoint.
    pub network_ip: Ipv4Addr,
    /// Inner IP of the second network endpoint (bidirectional scenarios).
    pub network_ip2: Ipv4Addr,

    pub dpu_vtep_ip: Ipv4Addr,
    pub eni_vtep_ip: Ipv4Addr,
    pub network_vtep_ip: Ipv4Addr,

    /// Outer MACs on the ENI-facing generator port.
    pub eni_outer_src_mac: MacAddr,
    pub eni_outer_dst_mac: MacAddr,
    /// Outer MACs on the network-facing generator port.
    pub network_outer_src_mac: MacAddr,
    pub network_outer_dst_mac: MacAddr,

    /// Inner MAC of the ENI.
    pub eni_mac: MacAddr,
    /// Inner MACs of the network endpoints.
    pub network_mac: MacAddr,
    pub network_mac2: MacAddr,

    #[validate(range(max = 16_777_215))]
    pub eni_vni: u32,
    #[validate(range(max = 16_777_215))]
    pub network_vni: u32,

    pub vxlan_src_port: u16,
    #[validate(range(min = 1))]
    pub vxlan_dst_port: u16,

    /// Inner UDP port on the ENI side.
    pub eni_udp_port: u16,
    /// Inner UDP port on the network side.
    pub network_udp_port: u16,
}

impl Default for AddressingConfig {
    fn default() -> Self {
        Self {
            eni_ip: Ipv4Addr::new(1, 1, 0, 1),
            network_ip: Ipv4Addr::new(1, 128, 0, 1),
            network_ip2: Ipv4Addr::new(1, 128, 0, 3),
            dpu_vtep_ip: Ipv4Addr::new(221, 0, 0, 2),
            eni_vtep_ip: Ipv4Addr::new(221, 0, 1, 11),
            network_vtep_ip: Ipv4Addr::new(221, 0, 2, 101),
            eni_outer_src_mac: MacAddr::new(0x80, 0x09, 0x02, 0x01, 0x00, 0x01),
            eni_outer_dst_mac: MacAddr::new(0xc8, 0x2c, 0x2b, 0x00, 0xd1, 0x30),
            network_outer_src_mac: MacAddr::new(0x80, 0x09, 0x02, 0x02, 0x00, 0x01),
            network_outer_dst_mac: MacAddr::new(0xc8, 0x2c, 0x2b, 0x00, 0xd1, 0x34),
            eni_mac: MacAddr::new(0x00, 0x1a, 0xc5, 0x00, 0x00, 0x01),
            network_mac: MacAddr::new(0x00, 0x1b, 0x6e, 0x00, 0x00, 0x01),
            network_mac2: MacAddr::new(0x00, 0x1b, 0x6e, 0x00, 0x00, 0x03),
            eni_vni: 11,
            network_vni: 101,
            vxlan_src_port: 11638,
            vxlan_dst_port: 4789,
            eni_udp_port: 10000,
            network_udp_port: 20000,
        }
    }
}
