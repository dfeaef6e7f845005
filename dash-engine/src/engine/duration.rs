//! Deterministic traffic timing: how long to wait, how often to poll, and
//! how far apart start waves are.

use std::time::Duration;

use dash_config::TrafficConfig;
use dash_flows::FlowSpec;
use tokio::time::{sleep, Instant};

use super::error::HarnessError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationPolicy {
    /// Added on top of the nominal transmit time.
    pub margin: Duration,
    pub poll_interval: Duration,
    /// Delay between start waves.
    pub stagger: Duration,
}

impl DurationPolicy {
    pub fn from_config(traffic: &TrafficConfig) -> Self {
        Self {
            margin: traffic.wait_margin(),
            poll_interval: traffic.poll_interval(),
            stagger: traffic.stagger(),
        }
    }

    /// Nominal transmit time of `packets` at `pps`, without the margin.
    pub fn transmit_time(packets: u64, pps: u64) -> Option<Duration> {
        if pps == 0 {
            return None;
        }
        let nanos = u128::from(packets) * 1_000_000_000 / u128::from(pps);
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }

    /// `packets / pps + margin` for one flow.
    pub fn wait_time(&self, flow: &FlowSpec) -> Result<Duration, HarnessError> {
        Self::transmit_time(flow.packets, flow.pps)
            .map(|t| t + self.margin)
            .ok_or_else(|| HarnessError::ZeroRate {
                flow: flow.name.clone(),
            })
    }

    /// Deadline of a run starting `flows` in `waves` waves:
    /// `max(packets / pps) + (waves - 1) * stagger + margin`.
    pub fn run_deadline<'a, I>(&self, flows: I, waves: usize) -> Result<Duration, HarnessError>
    where
        I: IntoIterator<Item = &'a FlowSpec>,
    {
        let mut longest = Duration::ZERO;
        for flow in flows {
            let t = Self::transmit_time(flow.packets, flow.pps).ok_or_else(|| {
                HarnessError::ZeroRate {
                    flow: flow.name.clone(),
                }
            })?;
            longest = longest.max(t);
        }
        let extra_waves = u32::try_from(waves.saturating_sub(1)).unwrap_or(u32::MAX);
        Ok(longest + self.stagger.saturating_mul(extra_waves) + self.margin)
    }
}

impl Default for DurationPolicy {
    fn default() -> Self {
        Self::from_config(&TrafficConfig::default())
    }
}

/// Sleeps in `interval` steps until a deadline.
#[derive(Debug)]
pub struct Poller {
    interval: Duration,
    deadline: Instant,
}

impl Poller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            deadline: Instant::now() + timeout,
        }
    }

    /// Waits one interval, shortened to end at the deadline. Returns `false`
    /// without sleeping once the deadline has passed.
    pub async fn tick(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.deadline {
            return false;
        }
        sleep(self.interval.min(self.deadline - now)).await;
        true
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}
