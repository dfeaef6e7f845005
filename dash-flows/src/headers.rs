//! ## dash-flows::headers
//! **VXLAN header stack**
//!
//! Every harness flow is a VXLAN-encapsulated UDP packet with the fixed layer
//! order `Eth -> IPv4 -> UDP -> VXLAN -> Eth -> IPv4 -> UDP`. Addresses and
//! ports are [`FieldPattern`]s so one flow can sweep thousands of endpoints.

use std::fmt;
use std::net::Ipv4Addr;

use dash_core::MacAddr;

use crate::pattern::FieldPattern;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const VXLAN_UDP_PORT: u16 = 4789;
/// VXLAN flags with only the I bit (valid VNI) set.
pub const VXLAN_FLAGS_VNI: u8 = 0x08;
pub const VNI_MAX: u32 = (1 << 24) - 1;

pub const ETH_LEN: u32 = 14;
pub const IPV4_LEN: u32 = 20;
pub const UDP_LEN: u32 = 8;
pub const VXLAN_LEN: u32 = 8;
pub const FCS_LEN: u32 = 4;

/// Smallest frame that can carry the full header stack.
pub const MIN_FRAME_LEN: u32 =
    ETH_LEN + IPV4_LEN + UDP_LEN + VXLAN_LEN + ETH_LEN + IPV4_LEN + UDP_LEN + FCS_LEN;

/// Layers of the stack, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    Ethernet,
    Ipv4,
    Udp,
    Vxlan,
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HeaderKind::Ethernet => "ethernet",
            HeaderKind::Ipv4 => "ipv4",
            HeaderKind::Udp => "udp",
            HeaderKind::Vxlan => "vxlan",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetHeader {
    pub src: FieldPattern<MacAddr>,
    pub dst: FieldPattern<MacAddr>,
    pub ether_type: u16,
}

impl Default for EthernetHeader {
    fn default() -> Self {
        Self {
            src: FieldPattern::Fixed(MacAddr::ZERO),
            dst: FieldPattern::Fixed(MacAddr::ZERO),
            ether_type: ETHERTYPE_IPV4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    pub src: FieldPattern<Ipv4Addr>,
    pub dst: FieldPattern<Ipv4Addr>,
}

impl Default for Ipv4Header {
    fn default() -> Self {
        Self {
            src: FieldPattern::Fixed(Ipv4Addr::UNSPECIFIED),
            dst: FieldPattern::Fixed(Ipv4Addr::UNSPECIFIED),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpHeader {
    pub src_port: FieldPattern<u16>,
    pub dst_port: FieldPattern<u16>,
}

impl UdpHeader {
    pub fn fixed(src_port: u16, dst_port: u16) -> Self {
        Self {
            src_port: FieldPattern::Fixed(src_port),
            dst_port: FieldPattern::Fixed(dst_port),
        }
    }
}

impl Default for UdpHeader {
    fn default() -> Self {
        Self::fixed(0, 0)
    }
}

/// RFC 7348 VXLAN header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VxlanHeader {
    pub flags: u8,
    pub vni: u32,
    /// 24 reserved bits between the flags and the VNI.
    pub reserved0: u32,
    /// 8 reserved bits after the VNI.
    pub reserved1: u8,
}

impl VxlanHeader {
    pub fn new(vni: u32) -> Self {
        Self {
            flags: VXLAN_FLAGS_VNI,
            vni,
            reserved0: 0,
            reserved1: 0,
        }
    }

    /// Wire encoding. Bits of `vni` and `reserved0` above 24 are dropped, so
    /// validate the VNI first.
    pub fn to_bytes(&self) -> [u8; 8] {
        let r = self.reserved0.to_be_bytes();
        let v = self.vni.to_be_bytes();
        [self.flags, r[1], r[2], r[3], v[1], v[2], v[3], self.reserved1]
    }
}

impl Default for VxlanHeader {
    fn default() -> Self {
        Self::new(0)
    }
}

/// The full encapsulated header stack of a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderStack {
    pub outer_eth: EthernetHeader,
    pub outer_ipv4: Ipv4Header,
    pub outer_udp: UdpHeader,
    pub vxlan: VxlanHeader,
    pub inner_eth: EthernetHeader,
    pub inner_ipv4: Ipv4Header,
    pub inner_udp: UdpHeader,
}

impl HeaderStack {
    pub const ORDER: [HeaderKind; 7] = [
        HeaderKind::Ethernet,
        HeaderKind::Ipv4,
        HeaderKind::Udp,
        HeaderKind::Vxlan,
        HeaderKind::Ethernet,
        HeaderKind::Ipv4,
        HeaderKind::Udp,
    ];

    /// Number of distinct inner endpoints the flow sweeps.
    pub fn inner_address_count(&self) -> u32 {
        [
            self.inner_eth.src.count(),
            self.inner_eth.dst.count(),
            self.inner_ipv4.src.count(),
            self.inner_ipv4.dst.count(),
        ]
        .into_iter()
        .max()
        .unwrap_or(1)
    }
}

impl Default for HeaderStack {
    fn default() -> Self {
        Self {
            outer_eth: EthernetHeader::default(),
            outer_ipv4: Ipv4Header::default(),
            outer_udp: UdpHeader::fixed(0, VXLAN_UDP_PORT),
            vxlan: VxlanHeader::default(),
            inner_eth: EthernetHeader::default(),
            inner_ipv4: Ipv4Header::default(),
            inner_udp: UdpHeader::default(),
        }
    }
}
