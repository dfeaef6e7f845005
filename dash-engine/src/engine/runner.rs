//! Starts flows, waits for them to finish and collects their counters.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dash_flows::{FlowCounters, FlowSpec, GeneratorConfig, TrafficGenerator};
use dash_telemetry::MetricsRecorder;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};

use super::duration::{DurationPolicy, Poller};
use super::error::HarnessError;

/// Order in which flows are started.
///
/// Flows in one wave are started back to back; consecutive waves are
/// separated by the policy's stagger delay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartSchedule {
    waves: Option<Vec<Vec<String>>>,
}

impl StartSchedule {
    /// One wave with every enabled flow.
    pub fn all() -> Self {
        Self { waves: None }
    }

    pub fn waves<W, S>(waves: W) -> Self
    where
        W: IntoIterator,
        W::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            waves: Some(
                waves
                    .into_iter()
                    .map(|w| w.into_iter().map(Into::into).collect())
                    .collect(),
            ),
        }
    }

    /// Resolves the schedule against `flows`. Disabled flows are skipped,
    /// unknown names are an error and empty waves are dropped.
    pub fn resolve(&self, flows: &[FlowSpec]) -> Result<Vec<Vec<String>>, HarnessError> {
        let Some(waves) = &self.waves else {
            let wave: Vec<String> = flows
                .iter()
                .filter(|f| f.enabled)
                .map(|f| f.name.clone())
                .collect();
            return Ok(if wave.is_empty() { Vec::new() } else { vec![wave] });
        };

        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(waves.len());
        for wave in waves {
            let mut names = Vec::with_capacity(wave.len());
            for name in wave {
                let flow = flows
                    .iter()
                    .find(|f| &f.name == name)
                    .ok_or_else(|| {
                        HarnessError::InvalidRun(format!("schedule names unknown flow '{}'", name))
                    })?;
                if !seen.insert(name.as_str()) {
                    return Err(HarnessError::InvalidRun(format!(
                        "flow '{}' is scheduled twice",
                        name
                    )));
                }
                if flow.enabled {
                    names.push(name.clone());
                } else {
                    debug!(flow = %name, "Skipping disabled flow");
                }
            }
            if !names.is_empty() {
                resolved.push(names);
            }
        }
        Ok(resolved)
    }
}

/// Counters of one traffic run, in start order.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub counters: Vec<FlowCounters>,
    /// True if some flow was still transmitting when the deadline hit.
    pub deadline_reached: bool,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn get(&self, flow: &str) -> Option<&FlowCounters> {
        self.counters.iter().find(|c| c.name == flow)
    }
}

/// Checks that `flows` can be sent: unique names and non-zero rates.
pub fn validate_flows(flows: &[FlowSpec]) -> Result<(), HarnessError> {
    let mut names = HashSet::new();
    for flow in flows {
        if !names.insert(flow.name.as_str()) {
            return Err(HarnessError::InvalidRun(format!(
                "duplicate flow name '{}'",
                flow.name
            )));
        }
        if flow.pps == 0 {
            return Err(HarnessError::ZeroRate {
                flow: flow.name.clone(),
            });
        }
    }
    Ok(())
}

pub struct TrafficRunner<'a, G: TrafficGenerator + ?Sized> {
    generator: &'a G,
    policy: DurationPolicy,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl<'a, G: TrafficGenerator + ?Sized> TrafficRunner<'a, G> {
    pub fn new(generator: &'a G, policy: DurationPolicy) -> Self {
        Self {
            generator,
            policy,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn policy(&self) -> &DurationPolicy {
        &self.policy
    }

    /// Validates, pushes `config` to the generator, then runs its flows.
    pub async fn run(
        &self,
        config: &GeneratorConfig,
        schedule: &StartSchedule,
    ) -> Result<RunReport, HarnessError> {
        validate_flows(&config.flows)?;
        schedule.resolve(&config.flows)?;
        self.generator.set_config(config).await?;
        self.run_configured(&config.flows, schedule).await
    }

    /// Runs `flows` on a generator that already holds their configuration.
    #[instrument(skip_all, fields(flows = flows.len()))]
    pub async fn run_configured(
        &self,
        flows: &[FlowSpec],
        schedule: &StartSchedule,
    ) -> Result<RunReport, HarnessError> {
        validate_flows(flows)?;
        let waves = schedule.resolve(flows)?;
        let started: Vec<&FlowSpec> = waves
            .iter()
            .flatten()
            .filter_map(|name| flows.iter().find(|f| &f.name == name))
            .collect();
        let deadline = self.policy.run_deadline(started.iter().copied(), waves.len())?;

        info!(
            waves = waves.len(),
            started = started.len(),
            deadline_ms = deadline.as_millis() as u64,
            "Starting traffic"
        );
        let begin = Instant::now();
        let mut poller = Poller::new(self.policy.poll_interval, deadline);
        for (i, wave) in waves.iter().enumerate() {
            if i > 0 {
                sleep(self.policy.stagger).await;
            }
            for name in wave {
                debug!(flow = %name, wave = i, "Starting flow");
                self.generator.start_traffic(name).await?;
            }
        }

        let deadline_reached = loop {
            let mut pending = Vec::new();
            for flow in &started {
                let counters = self.generator.flow_metrics(&flow.name).await?;
                if !counters.stopped() && counters.tx_frames < flow.packets {
                    pending.push(flow.name.as_str());
                }
            }
            if pending.is_empty() {
                debug!("All flows stopped transmitting");
                break false;
            }
            debug!(pending = ?pending, "Waiting for flows");
            if !poller.tick().await {
                warn!(
                    pending = ?pending,
                    deadline_ms = deadline.as_millis() as u64,
                    "Traffic deadline reached with flows still transmitting"
                );
                break true;
            }
        };

        self.generator.stop_traffic().await?;

        let mut counters = Vec::with_capacity(started.len());
        for flow in &started {
            let c = self.generator.flow_metrics(&flow.name).await?;
            info!(flow = %c.name, tx = c.tx_frames, rx = c.rx_frames, "Flow counters");
            if let Some(metrics) = &self.metrics {
                metrics.record_flow(&c.name, c.tx_frames, c.rx_frames);
            }
            counters.push(c);
        }
        let elapsed = begin.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.observe_traffic_run(elapsed.as_secs_f64());
        }

        Ok(RunReport {
            counters,
            deadline_reached,
            elapsed,
        })
    }
}
