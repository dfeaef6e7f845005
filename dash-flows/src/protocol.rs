//! ## dash-flows::protocol
//! **Emulated protocol devices on the generator ports**
//!
//! Scale scenarios stand up an eBGP session on each side of the DPU and
//! advertise the VTEP routes before any traffic is sent. A device is an
//! Ethernet interface, an IPv4 address with its gateway, and optionally one
//! BGP peer with the route ranges it advertises.

use std::fmt;
use std::net::Ipv4Addr;

use dash_core::{ip_list, MacAddr};
use ipnetwork::Ipv4Network;

use crate::error::FlowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BgpPeerType {
    Ebgp,
    Ibgp,
}

impl fmt::Display for BgpPeerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BgpPeerType::Ebgp => f.write_str("ebgp"),
            BgpPeerType::Ibgp => f.write_str("ibgp"),
        }
    }
}

/// `count` consecutive prefixes starting at `network`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRange {
    pub name: String,
    pub network: Ipv4Network,
    pub count: u32,
}

impl RouteRange {
    pub fn new(
        name: impl Into<String>,
        address: Ipv4Addr,
        prefix: u8,
        count: u32,
    ) -> Result<Self, FlowError> {
        let name = name.into();
        let network = Ipv4Network::new(address, prefix).map_err(|e| FlowError::InvalidDevice {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            name,
            network,
            count,
        })
    }

    /// Base address of every advertised prefix.
    pub fn addresses(&self) -> Result<Vec<Ipv4Addr>, FlowError> {
        ip_list(
            self.network.ip(),
            self.count as usize,
            self.network.prefix(),
            1,
        )
        .map_err(|e| FlowError::InvalidDevice {
            name: self.name.clone(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgpPeer {
    pub name: String,
    pub peer_type: BgpPeerType,
    pub peer_address: Ipv4Addr,
    pub as_number: u32,
    pub routes: Vec<RouteRange>,
}

/// An emulated host on one generator port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolDevice {
    pub name: String,
    pub port: String,
    pub mac: MacAddr,
    /// Interface address and prefix.
    pub ipv4: Ipv4Network,
    pub gateway: Ipv4Addr,
    pub bgp: Option<BgpPeer>,
}

impl ProtocolDevice {
    pub fn new(
        name: impl Into<String>,
        port: impl Into<String>,
        mac: MacAddr,
        address: Ipv4Addr,
        prefix: u8,
        gateway: Ipv4Addr,
    ) -> Result<Self, FlowError> {
        let name = name.into();
        let ipv4 = Ipv4Network::new(address, prefix).map_err(|e| FlowError::InvalidDevice {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        if mac == MacAddr::ZERO {
            return Err(FlowError::InvalidDevice {
                name,
                reason: "MAC address must not be zero".into(),
            });
        }
        Ok(Self {
            name,
            port: port.into(),
            mac,
            ipv4,
            gateway,
            bgp: None,
        })
    }

    /// Attaches an eBGP peer towards this device's gateway.
    pub fn with_ebgp(
        mut self,
        as_number: u32,
        routes: Vec<RouteRange>,
    ) -> Result<Self, FlowError> {
        if as_number == 0 {
            return Err(FlowError::InvalidDevice {
                name: self.name,
                reason: "AS number 0 is reserved".into(),
            });
        }
        self.bgp = Some(BgpPeer {
            name: format!("{}_bgp", self.name),
            peer_type: BgpPeerType::Ebgp,
            peer_address: self.gateway,
            as_number,
            routes,
        });
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_range_enumerates_host_routes() {
        let range = RouteRange::new("eni_vteps", Ipv4Addr::new(221, 0, 1, 1), 32, 8).unwrap();
        let addrs = range.addresses().unwrap();
        assert_eq!(addrs.len(), 8);
        assert_eq!(addrs[7], Ipv4Addr::new(221, 0, 1, 8));
    }

    #[test]
    fn ebgp_device_peers_with_gateway() {
        let device = ProtocolDevice::new(
            "eni_side",
            "Port 1",
            "80:09:02:01:00:01".parse().unwrap(),
            Ipv4Addr::new(220, 0, 1, 2),
            24,
            Ipv4Addr::new(220, 0, 1, 1),
        )
        .unwrap()
        .with_ebgp(200, Vec::new())
        .unwrap();

        let bgp = device.bgp.unwrap();
        assert_eq!(bgp.peer_address, Ipv4Addr::new(220, 0, 1, 1));
        assert_eq!(bgp.peer_type.to_string(), "ebgp");
        assert_eq!(device.ipv4.prefix(), 24);
    }

    #[test]
    fn rejects_bad_prefix_and_reserved_as() {
        let mac = "80:09:02:01:00:01".parse().unwrap();
        assert!(ProtocolDevice::new("d", "Port 1", mac, Ipv4Addr::LOCALHOST, 40, Ipv4Addr::LOCALHOST).is_err());
        let device =
            ProtocolDevice::new("d", "Port 1", mac, Ipv4Addr::LOCALHOST, 8, Ipv4Addr::LOCALHOST)
                .unwrap();
        assert!(device.with_ebgp(0, Vec::new()).is_err());
    }
}
