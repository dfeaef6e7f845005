//! Test bed topology: the traffic generator ports wired to the DPU.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Traffic generator ports and their L1 settings.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct TopologyConfig {
    /// Generator port names. The first port faces the ENI side, the second
    /// the network side.
    #[validate(custom(function = validation::validate_port_names))]
    #[serde(default = "default_ports")]
    pub ports: Vec<String>,

    /// L1 speed applied to every port.
    #[validate(custom(function = validation::validate_speed))]
    #[serde(default = "default_speed")]
    pub speed: String,
}

fn default_ports() -> Vec<String> {
    vec!["Port 1".into(), "Port 2".into()]
}

fn default_speed() -> String {
    "SPEED_100_GBPS".into()
}

impl TopologyConfig {
    /// `None` on a hand-built topology with no ports.
    pub fn eni_port(&self) -> Option<&str> {
        self.ports.first().map(String::as_str)
    }

    pub fn network_port(&self) -> Option<&str> {
        self.ports.get(1).map(String::as_str)
    }
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            ports: default_ports(),
            speed: default_speed(),
        }
    }
}
