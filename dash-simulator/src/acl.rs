//! ACL rules as the simulated DPU reads them from SAI-style commands.
//!
//! A rule command has type `SAI_OBJECT_TYPE_DASH_ACL_RULE` and a flat
//! attribute list of `name, value` pairs:
//!
//! ```json
//! ["SAI_DASH_ACL_RULE_ATTR_PRIORITY", "10",
//!  "SAI_DASH_ACL_RULE_ATTR_ACTION", "SAI_DASH_ACL_RULE_ACTION_PERMIT",
//!  "SAI_DASH_ACL_RULE_ATTR_SIP", "1.128.0.1/32,1.128.0.3/32"]
//! ```
//!
//! Missing SIP/DIP attributes match any address.

use std::net::Ipv4Addr;

use dash_core::Command;
use ipnetwork::Ipv4Network;
use serde_json::Value;

pub const ACL_RULE_TYPE: &str = "SAI_OBJECT_TYPE_DASH_ACL_RULE";
pub const VNET_TYPE: &str = "SAI_OBJECT_TYPE_VNET";

const ATTR_PRIORITY: &str = "SAI_DASH_ACL_RULE_ATTR_PRIORITY";
const ATTR_ACTION: &str = "SAI_DASH_ACL_RULE_ATTR_ACTION";
const ATTR_SIP: &str = "SAI_DASH_ACL_RULE_ATTR_SIP";
const ATTR_DIP: &str = "SAI_DASH_ACL_RULE_ATTR_DIP";
const ATTR_VNI: &str = "SAI_VNET_ATTR_VNI";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclAction {
    Permit,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclRule {
    pub priority: u32,
    pub action: AclAction,
    pub sip: Vec<Ipv4Network>,
    pub dip: Vec<Ipv4Network>,
}

impl AclRule {
    /// Reads a rule from a create command. `None` if the command is not a
    /// well-formed ACL rule.
    pub fn from_command(command: &Command) -> Option<Self> {
        if command.object_type.as_deref() != Some(ACL_RULE_TYPE) {
            return None;
        }
        let attrs = attribute_pairs(&command.attributes)?;
        let mut priority = u32::MAX;
        let mut action = None;
        let mut sip = Vec::new();
        let mut dip = Vec::new();
        for (name, value) in attrs {
            match name {
                ATTR_PRIORITY => priority = value.parse().ok()?,
                ATTR_ACTION => {
                    action = Some(if value.contains("PERMIT") {
                        AclAction::Permit
                    } else if value.contains("DENY") {
                        AclAction::Deny
                    } else {
                        return None;
                    })
                }
                ATTR_SIP => sip = parse_prefixes(value)?,
                ATTR_DIP => dip = parse_prefixes(value)?,
                _ => {}
            }
        }
        Some(Self {
            priority,
            action: action?,
            sip,
            dip,
        })
    }

    pub fn matches(&self, src: Ipv4Addr, dst: Ipv4Addr) -> bool {
        let hit = |nets: &[Ipv4Network], ip: Ipv4Addr| {
            nets.is_empty() || nets.iter().any(|n| n.contains(ip))
        };
        hit(&self.sip[..], src) && hit(&self.dip[..], dst)
    }
}

/// VNI carried by a VNET create command.
pub fn vnet_vni(command: &Command) -> Option<u32> {
    if command.object_type.as_deref() != Some(VNET_TYPE) {
        return None;
    }
    attribute_pairs(&command.attributes)?
        .into_iter()
        .find(|(name, _)| *name == ATTR_VNI)
        .and_then(|(_, value)| value.parse().ok())
}

fn attribute_pairs(attributes: &Value) -> Option<Vec<(&str, &str)>> {
    let list = attributes.as_array()?;
    if list.len() % 2 != 0 {
        return None;
    }
    list.chunks(2)
        .map(|pair| Some((pair[0].as_str()?, pair[1].as_str()?)))
        .collect()
}

fn parse_prefixes(value: &str) -> Option<Vec<Ipv4Network>> {
    value
        .split(',')
        .map(|p| p.trim().parse::<Ipv4Network>().ok())
        .collect()
}
