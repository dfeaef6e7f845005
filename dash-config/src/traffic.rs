//! Traffic run defaults: packet counts, rates and timing policy.
//!
//! Timing values are stored in milliseconds so they can be overridden from
//! YAML or `DASH_TRAFFIC__*` environment variables without a duration syntax.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

/// Default per-flow traffic parameters and run timing.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(default)]
pub struct TrafficConfig {
    /// Packets sent by each flow before it stops.
    #[validate(range(max = 100_000_000))]
    pub total_packets: u64,

    /// Packets per second for each flow.
    #[validate(range(min = 1, max = 100_000_000))]
    pub pps: u64,

    /// Frame size in bytes, including the VXLAN encapsulation.
    #[validate(range(min = 96, max = 9216))]
    pub packet_length: u32,

    /// Added to `packets / pps` to get the traffic wait deadline.
    #[validate(range(max = 600_000))]
    pub wait_margin_ms: u64,

    /// Interval between flow metric polls while traffic is running.
    #[validate(range(min = 1, max = 60_000))]
    pub poll_interval_ms: u64,

    /// Delay between start waves when flows are staggered.
    #[validate(range(max = 60_000))]
    pub stagger_ms: u64,

    /// A denied flow may deliver at most this fraction of its transmitted frames.
    #[validate(range(min = 0.0, max = 1.0))]
    pub deny_tolerance: f64,

    /// Deadline for emulated protocol sessions (BGP) to come up.
    #[validate(range(min = 1, max = 600_000))]
    pub protocol_timeout_ms: u64,

    /// Directory for teardown failure reports. No report is written when unset.
    pub report_dir: Option<PathBuf>,
}

impl TrafficConfig {
    pub fn wait_margin(&self) -> Duration {
        Duration::from_millis(self.wait_margin_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    pub fn protocol_timeout(&self) -> Duration {
        Duration::from_millis(self.protocol_timeout_ms)
    }
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            total_packets: 1000,
            pps: 100,
            packet_length: 128,
            wait_margin_ms: 2000,
            poll_interval_ms: 100,
            stagger_ms: 500,
            deny_tolerance: 0.01,
            protocol_timeout_ms: 30_000,
            report_dir: None,
        }
    }
}
