//! ## dash-core::addr
//! **Address types and address arithmetic**
//!
//! Scale scenarios enumerate thousands of inner MAC/IPv4 addresses per flow by
//! describing them as `start + i * step`. The arithmetic here is done in the
//! full integer width of the address so that carries propagate across octets
//! (`1.128.0.255 + 0.0.0.1 == 1.128.1.0`). Running off the end of the address
//! space is reported as [`AddrError::Overflow`], never wrapped or truncated.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AddrError;

const MAC_MAX: u64 = (1 << 48) - 1;

/// An EUI-48 MAC address.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    pub const ZERO: Self = MacAddr([0; 6]);

    /// Create a new MAC address from octets in network byte order.
    pub const fn new(o0: u8, o1: u8, o2: u8, o3: u8, o4: u8, o5: u8) -> Self {
        MacAddr([o0, o1, o2, o3, o4, o5])
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Returns the address as a 48-bit integer.
    pub fn to_u64(self) -> u64 {
        self.0
            .iter()
            .fold(0u64, |acc, octet| (acc << 8) | u64::from(*octet))
    }

    /// Builds an address from the low 48 bits of `value`.
    ///
    /// Fails if any of the upper 16 bits are set.
    pub fn try_from_u64(value: u64) -> Result<Self, AddrError> {
        if value > MAC_MAX {
            return Err(AddrError::MacOutOfRange(value));
        }
        let b = value.to_be_bytes();
        Ok(MacAddr([b[2], b[3], b[4], b[5], b[6], b[7]]))
    }
}

impl FromStr for MacAddr {
    type Err = AddrError;

    fn from_str(s: &str) -> Result<Self, AddrError> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.len().cmp(&6) {
            std::cmp::Ordering::Less => Err(AddrError::MacTooShort(s.to_string())),
            std::cmp::Ordering::Greater => Err(AddrError::MacTooLong(s.to_string())),
            std::cmp::Ordering::Equal => {
                let mut octets = [0u8; 6];
                for (i, part) in parts.iter().enumerate() {
                    if part.is_empty() || part.len() > 2 {
                        return Err(AddrError::InvalidOctet(s.to_string()));
                    }
                    octets[i] = u8::from_str_radix(part, 16)
                        .map_err(|_| AddrError::InvalidOctet(s.to_string()))?;
                }
                Ok(MacAddr(octets))
            }
        }
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let a = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a[0], a[1], a[2], a[3], a[4], a[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(a: [u8; 6]) -> Self {
        MacAddr(a)
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Values that can be enumerated as `start + index * step`.
///
/// `step` has the same type as the value: for IPv4 a step of `0.0.2.0` means
/// "add 512", for MACs `00:00:00:00:00:02` means "add 2".
pub trait AddressArith: Copy + fmt::Display {
    /// Returns `self + index * step`, failing instead of wrapping.
    fn checked_step(self, step: Self, index: u64) -> Result<Self, AddrError>;
}

fn offset(start: u64, step: u64, index: u64, max: u64, what: &str) -> Result<u64, AddrError> {
    step.checked_mul(index)
        .and_then(|delta| start.checked_add(delta))
        .filter(|value| *value <= max)
        .ok_or_else(|| AddrError::Overflow {
            kind: what.to_string(),
            start,
            step,
            index,
        })
}

impl AddressArith for Ipv4Addr {
    fn checked_step(self, step: Self, index: u64) -> Result<Self, AddrError> {
        let value = offset(
            u64::from(u32::from(self)),
            u64::from(u32::from(step)),
            index,
            u64::from(u32::MAX),
            "ipv4",
        )?;
        Ok(Ipv4Addr::from(value as u32))
    }
}

impl AddressArith for MacAddr {
    fn checked_step(self, step: Self, index: u64) -> Result<Self, AddrError> {
        let value = offset(self.to_u64(), step.to_u64(), index, MAC_MAX, "mac")?;
        MacAddr::try_from_u64(value)
    }
}

impl AddressArith for u16 {
    fn checked_step(self, step: Self, index: u64) -> Result<Self, AddrError> {
        let value = offset(
            u64::from(self),
            u64::from(step),
            index,
            u64::from(u16::MAX),
            "u16",
        )?;
        Ok(value as u16)
    }
}

/// Generates `count` addresses starting at `start`, each `incr` subnets of
/// size `2^(32 - prefix_len)` after the previous one.
///
/// With `prefix_len = 16, incr = 4` this walks the second octet in steps of 4:
/// `1.128.0.1, 1.132.0.1, 1.136.0.1, ...`.
pub fn ip_list(
    start: Ipv4Addr,
    count: usize,
    prefix_len: u8,
    incr: u32,
) -> Result<Vec<Ipv4Addr>, AddrError> {
    if prefix_len == 0 || prefix_len > 32 {
        return Err(AddrError::InvalidPrefix(prefix_len));
    }
    let subnet = 1u64 << (32 - u32::from(prefix_len));
    let step = subnet
        .checked_mul(u64::from(incr))
        .ok_or(AddrError::InvalidPrefix(prefix_len))?;

    (0..count as u64)
        .map(|i| {
            offset(
                u64::from(u32::from(start)),
                step,
                i,
                u64::from(u32::MAX),
                "ipv4",
            )
            .map(|v| Ipv4Addr::from(v as u32))
        })
        .collect()
}
