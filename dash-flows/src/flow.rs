//! ## dash-flows::flow
//! **Flow descriptors and their builder**
//!
//! [`FlowBuilder`] is pure construction: it never talks to a generator. All
//! checks that can be made without hardware happen in [`FlowBuilder::build`],
//! so a bad flow fails before any device has been configured.

use std::net::Ipv4Addr;

use dash_core::{AddrError, AddressArith, MacAddr};
use tracing::debug;

use crate::error::FlowError;
use crate::headers::{HeaderStack, UdpHeader, VxlanHeader, MIN_FRAME_LEN, VNI_MAX};
use crate::pattern::FieldPattern;

/// A validated traffic flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSpec {
    pub name: String,
    pub tx_port: String,
    pub rx_port: String,
    /// Frame size in bytes.
    pub size: u32,
    /// Packets sent before the flow stops on its own.
    pub packets: u64,
    pub pps: u64,
    /// Disabled flows are configured on the generator but never started.
    pub enabled: bool,
    pub metrics_enabled: bool,
    pub headers: HeaderStack,
}

impl FlowSpec {
    pub fn builder(name: impl Into<String>) -> FlowBuilder {
        FlowBuilder::new(name)
    }
}

/// Builds a [`FlowSpec`] field by field.
#[derive(Debug, Clone)]
pub struct FlowBuilder {
    name: String,
    tx_port: Option<String>,
    rx_port: Option<String>,
    size: u32,
    packets: u64,
    pps: u64,
    enabled: bool,
    headers: HeaderStack,
}

impl FlowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tx_port: None,
            rx_port: None,
            size: 128,
            packets: 1000,
            pps: 100,
            enabled: true,
            headers: HeaderStack::default(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn ports(mut self, tx: impl Into<String>, rx: impl Into<String>) -> Self {
        self.tx_port = Some(tx.into());
        self.rx_port = Some(rx.into());
        self
    }

    pub fn tx_port(mut self, port: impl Into<String>) -> Self {
        self.tx_port = Some(port.into());
        self
    }

    pub fn rx_port(mut self, port: impl Into<String>) -> Self {
        self.rx_port = Some(port.into());
        self
    }

    pub fn size(mut self, bytes: u32) -> Self {
        self.size = bytes;
        self
    }

    pub fn packets(mut self, packets: u64) -> Self {
        self.packets = packets;
        self
    }

    pub fn pps(mut self, pps: u64) -> Self {
        self.pps = pps;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn outer_eth(
        mut self,
        src: impl Into<FieldPattern<MacAddr>>,
        dst: impl Into<FieldPattern<MacAddr>>,
    ) -> Self {
        self.headers.outer_eth.src = src.into();
        self.headers.outer_eth.dst = dst.into();
        self
    }

    /// Ether type of the outer Ethernet header.
    pub fn ether_type(mut self, ether_type: u16) -> Self {
        self.headers.outer_eth.ether_type = ether_type;
        self
    }

    pub fn outer_ipv4(
        mut self,
        src: impl Into<FieldPattern<Ipv4Addr>>,
        dst: impl Into<FieldPattern<Ipv4Addr>>,
    ) -> Self {
        self.headers.outer_ipv4.src = src.into();
        self.headers.outer_ipv4.dst = dst.into();
        self
    }

    pub fn outer_udp(
        mut self,
        src_port: impl Into<FieldPattern<u16>>,
        dst_port: impl Into<FieldPattern<u16>>,
    ) -> Self {
        self.headers.outer_udp = UdpHeader {
            src_port: src_port.into(),
            dst_port: dst_port.into(),
        };
        self
    }

    pub fn vni(mut self, vni: u32) -> Self {
        self.headers.vxlan.vni = vni;
        self
    }

    pub fn vxlan(mut self, header: VxlanHeader) -> Self {
        self.headers.vxlan = header;
        self
    }

    pub fn inner_src_mac(mut self, pattern: impl Into<FieldPattern<MacAddr>>) -> Self {
        self.headers.inner_eth.src = pattern.into();
        self
    }

    pub fn inner_dst_mac(mut self, pattern: impl Into<FieldPattern<MacAddr>>) -> Self {
        self.headers.inner_eth.dst = pattern.into();
        self
    }

    pub fn inner_src_ip(mut self, pattern: impl Into<FieldPattern<Ipv4Addr>>) -> Self {
        self.headers.inner_ipv4.src = pattern.into();
        self
    }

    pub fn inner_dst_ip(mut self, pattern: impl Into<FieldPattern<Ipv4Addr>>) -> Self {
        self.headers.inner_ipv4.dst = pattern.into();
        self
    }

    pub fn inner_udp(
        mut self,
        src_port: impl Into<FieldPattern<u16>>,
        dst_port: impl Into<FieldPattern<u16>>,
    ) -> Self {
        self.headers.inner_udp = UdpHeader {
            src_port: src_port.into(),
            dst_port: dst_port.into(),
        };
        self
    }

    pub fn build(self) -> Result<FlowSpec, FlowError> {
        if self.name.trim().is_empty() {
            return Err(FlowError::EmptyName);
        }
        let name = self.name;
        let tx_port = self.tx_port.ok_or_else(|| FlowError::MissingPort {
            name: name.clone(),
            which: "tx",
        })?;
        let rx_port = self.rx_port.ok_or_else(|| FlowError::MissingPort {
            name: name.clone(),
            which: "rx",
        })?;
        if tx_port == rx_port {
            return Err(FlowError::SamePort {
                name,
                port: tx_port,
            });
        }
        if self.size < MIN_FRAME_LEN {
            return Err(FlowError::PacketTooSmall {
                name,
                size: self.size,
                min: MIN_FRAME_LEN,
            });
        }
        if self.pps == 0 {
            return Err(FlowError::ZeroRate { name });
        }
        if self.headers.vxlan.vni > VNI_MAX {
            return Err(FlowError::VniTooWide {
                name,
                vni: self.headers.vxlan.vni,
            });
        }

        let h = &self.headers;
        check_pattern(&name, "outer_eth.src", &h.outer_eth.src)?;
        check_pattern(&name, "outer_eth.dst", &h.outer_eth.dst)?;
        check_pattern(&name, "outer_ipv4.src", &h.outer_ipv4.src)?;
        check_pattern(&name, "outer_ipv4.dst", &h.outer_ipv4.dst)?;
        check_pattern(&name, "outer_udp.src_port", &h.outer_udp.src_port)?;
        check_pattern(&name, "outer_udp.dst_port", &h.outer_udp.dst_port)?;
        check_pattern(&name, "inner_eth.src", &h.inner_eth.src)?;
        check_pattern(&name, "inner_eth.dst", &h.inner_eth.dst)?;
        check_pattern(&name, "inner_ipv4.src", &h.inner_ipv4.src)?;
        check_pattern(&name, "inner_ipv4.dst", &h.inner_ipv4.dst)?;
        check_pattern(&name, "inner_udp.src_port", &h.inner_udp.src_port)?;
        check_pattern(&name, "inner_udp.dst_port", &h.inner_udp.dst_port)?;

        debug!(
            flow = %name,
            tx = %tx_port,
            rx = %rx_port,
            packets = self.packets,
            pps = self.pps,
            inner_addresses = h.inner_address_count(),
            "Flow built"
        );
        Ok(FlowSpec {
            name,
            tx_port,
            rx_port,
            size: self.size,
            packets: self.packets,
            pps: self.pps,
            enabled: self.enabled,
            metrics_enabled: true,
            headers: self.headers,
        })
    }
}

fn check_pattern<T: AddressArith>(
    name: &str,
    field: &'static str,
    pattern: &FieldPattern<T>,
) -> Result<(), FlowError> {
    if pattern.count() == 0 {
        return Err(FlowError::EmptyPattern {
            name: name.to_string(),
            field,
        });
    }
    pattern
        .last()
        .map(|_| ())
        .map_err(|source: AddrError| FlowError::Pattern {
            name: name.to_string(),
            field,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> FlowBuilder {
        FlowBuilder::new("vxlan_eni_to_network")
            .ports("Port 1", "Port 2")
            .outer_eth(
                "80:09:02:01:00:01".parse::<MacAddr>().unwrap(),
                "c8:2c:2b:00:d1:30".parse::<MacAddr>().unwrap(),
            )
            .outer_ipv4(Ipv4Addr::new(221, 0, 1, 11), Ipv4Addr::new(221, 0, 0, 2))
            .outer_udp(11638u16, 4789u16)
            .vni(11)
            .inner_src_ip(Ipv4Addr::new(1, 1, 0, 1))
            .inner_dst_ip(Ipv4Addr::new(1, 128, 0, 1))
            .inner_udp(10000u16, 20000u16)
    }

    #[test]
    fn builds_with_defaults() {
        let flow = base().build().unwrap();
        assert_eq!(flow.size, 128);
        assert_eq!(flow.packets, 1000);
        assert_eq!(flow.pps, 100);
        assert!(flow.enabled);
        assert!(flow.metrics_enabled);
        assert_eq!(flow.headers.vxlan.flags, 0x08);
        assert_eq!(flow.headers.vxlan.vni, 11);
    }

    #[test]
    fn rejects_zero_rate() {
        assert!(matches!(
            base().pps(0).build(),
            Err(FlowError::ZeroRate { .. })
        ));
    }

    #[test]
    fn rejects_same_port_and_missing_port() {
        assert!(matches!(
            base().ports("Port 1", "Port 1").build(),
            Err(FlowError::SamePort { .. })
        ));
        assert!(matches!(
            FlowBuilder::new("f").build(),
            Err(FlowError::MissingPort { which: "tx", .. })
        ));
    }

    #[test]
    fn rejects_runt_frames_and_wide_vni() {
        assert!(matches!(
            base().size(64).build(),
            Err(FlowError::PacketTooSmall { min: 96, .. })
        ));
        assert!(matches!(
            base().vni(1 << 24).build(),
            Err(FlowError::VniTooWide { .. })
        ));
    }

    #[test]
    fn rejects_empty_name() {
        assert_eq!(base().name(" ").build().unwrap_err(), FlowError::EmptyName);
    }

    #[test]
    fn validates_increment_patterns() {
        let empty = base().inner_dst_ip(FieldPattern::increment(
            Ipv4Addr::new(1, 128, 0, 1),
            Ipv4Addr::new(0, 0, 2, 0),
            0,
        ));
        assert!(matches!(
            empty.build(),
            Err(FlowError::EmptyPattern {
                field: "inner_ipv4.dst",
                ..
            })
        ));

        let overflow = base().inner_dst_mac(FieldPattern::increment(
            "ff:ff:ff:ff:ff:00".parse().unwrap(),
            "00:00:00:00:00:10".parse().unwrap(),
            100,
        ));
        assert!(matches!(
            overflow.build(),
            Err(FlowError::Pattern {
                field: "inner_eth.dst",
                ..
            })
        ));
    }

    #[test]
    fn outer_fields_take_increment_patterns() {
        let flow = base()
            .outer_ipv4(
                FieldPattern::increment(Ipv4Addr::new(221, 0, 1, 11), Ipv4Addr::new(0, 0, 0, 1), 8),
                Ipv4Addr::new(221, 0, 0, 2),
            )
            .outer_udp(FieldPattern::increment(11638u16, 1, 16), 4789u16)
            .ether_type(0x86dd)
            .build()
            .unwrap();
        let h = &flow.headers;
        assert_eq!(h.outer_ipv4.src.count(), 8);
        assert_eq!(h.outer_ipv4.src.last().unwrap(), Ipv4Addr::new(221, 0, 1, 18));
        assert_eq!(h.outer_ipv4.dst, FieldPattern::Fixed(Ipv4Addr::new(221, 0, 0, 2)));
        assert_eq!(h.outer_udp.src_port.value_at(15).unwrap(), 11653);
        assert_eq!(h.outer_eth.ether_type, 0x86dd);
    }

    #[test]
    fn outer_pattern_overflow_fails_build() {
        let overflow = base().outer_udp(FieldPattern::increment(65530u16, 1, 10), 4789u16);
        assert!(matches!(
            overflow.build(),
            Err(FlowError::Pattern {
                field: "outer_udp.src_port",
                ..
            })
        ));
    }

    #[test]
    fn scale_flow_sweeps_3000_destinations() {
        let flow = base()
            .inner_dst_ip(FieldPattern::increment(
                Ipv4Addr::new(1, 128, 0, 1),
                Ipv4Addr::new(0, 0, 2, 0),
                3000,
            ))
            .build()
            .unwrap();
        assert_eq!(flow.headers.inner_address_count(), 3000);
        assert_eq!(
            flow.headers.inner_ipv4.dst.value_at(2999).unwrap(),
            Ipv4Addr::new(1, 151, 110, 1)
        );
    }
}
