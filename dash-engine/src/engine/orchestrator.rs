//! Drives one scenario through configure, run, verify and cleanup.
//!
//! ```text
//! Idle -> Configured -> Running -> Verified -> CleanedUp
//!   \________\____________\__________\______-> Failed
//! ```
//!
//! Every operation called out of order returns
//! [`HarnessError::InvalidTransition`] and leaves the state untouched.
//! `cleanup` is accepted in any state and only undoes what was actually done.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dash_config::{HarnessConfig, TopologyConfig};
use dash_core::{CommandBatch, ConfigBatchApplier, Device, RejectedCommand};
use dash_flows::{FlowSpec, GeneratorConfig, ProtocolDevice, SessionState, TrafficGenerator};
use dash_telemetry::{EventLogger, HarnessEvent, MetricsRecorder, Phase, ScenarioOutcomeLabel};
use opentelemetry::KeyValue;
use tracing::{debug, error, info, instrument, warn};

use super::diagnostics::DiagnosticsCollector;
use super::duration::{DurationPolicy, Poller};
use super::error::{CleanupFailure, CleanupStep, HarnessError};
use super::runner::{validate_flows, RunReport, StartSchedule, TrafficRunner};
use super::verdict::{Expectation, ScenarioResult, VerdictPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioState {
    Idle,
    Configured,
    Running,
    Verified,
    CleanedUp,
    Failed,
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            ScenarioState::Idle => "idle",
            ScenarioState::Configured => "configured",
            ScenarioState::Running => "running",
            ScenarioState::Verified => "verified",
            ScenarioState::CleanedUp => "cleaned up",
            ScenarioState::Failed => "failed",
        };
        f.write_str(state)
    }
}

/// A flow together with what the DPU is expected to do with it.
#[derive(Debug, Clone)]
pub struct ExpectedFlow {
    pub spec: FlowSpec,
    pub expectation: Expectation,
}

/// Everything a scenario pushes to the device and the generator.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub setup: CommandBatch,
    pub flows: Vec<ExpectedFlow>,
    pub devices: Vec<ProtocolDevice>,
    pub schedule: StartSchedule,
}

impl Scenario {
    pub fn builder(name: impl Into<String>) -> ScenarioBuilder {
        ScenarioBuilder::new(name)
    }

    pub fn flow_specs(&self) -> Vec<FlowSpec> {
        self.flows.iter().map(|f| f.spec.clone()).collect()
    }

    pub fn has_bgp(&self) -> bool {
        self.devices.iter().any(|d| d.bgp.is_some())
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    name: String,
    setup: Option<CommandBatch>,
    flows: Vec<ExpectedFlow>,
    devices: Vec<ProtocolDevice>,
    schedule: StartSchedule,
}

impl ScenarioBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            setup: None,
            flows: Vec::new(),
            devices: Vec::new(),
            schedule: StartSchedule::all(),
        }
    }

    pub fn setup(mut self, batch: CommandBatch) -> Self {
        self.setup = Some(batch);
        self
    }

    pub fn flow(mut self, spec: FlowSpec, expectation: Expectation) -> Self {
        self.flows.push(ExpectedFlow { spec, expectation });
        self
    }

    pub fn allow(self, spec: FlowSpec) -> Self {
        self.flow(spec, Expectation::Allow)
    }

    pub fn deny(self, spec: FlowSpec) -> Self {
        self.flow(spec, Expectation::Deny)
    }

    pub fn device(mut self, device: ProtocolDevice) -> Self {
        self.devices.push(device);
        self
    }

    pub fn devices(mut self, devices: impl IntoIterator<Item = ProtocolDevice>) -> Self {
        self.devices.extend(devices);
        self
    }

    pub fn schedule(mut self, schedule: StartSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Checks flow names, rates and the start schedule.
    pub fn build(self) -> Result<Scenario, HarnessError> {
        let specs: Vec<FlowSpec> = self.flows.iter().map(|f| f.spec.clone()).collect();
        validate_flows(&specs)?;
        self.schedule.resolve(&specs)?;
        let setup = self
            .setup
            .unwrap_or_else(|| CommandBatch::new(format!("{}-setup", self.name), Vec::new()));
        Ok(Scenario {
            name: self.name,
            setup,
            flows: self.flows,
            devices: self.devices,
            schedule: self.schedule,
        })
    }
}

/// Result of [`ScenarioOrchestrator::execute`]: the scenario result and the
/// cleanup result, kept apart so neither hides the other.
#[derive(Debug)]
pub struct ScenarioOutcome {
    pub result: Result<ScenarioResult, HarnessError>,
    pub cleanup: Result<(), HarnessError>,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok() && self.cleanup.is_ok()
    }

    /// The scenario error if there is one, otherwise the cleanup error.
    pub fn into_result(self) -> Result<ScenarioResult, HarnessError> {
        match (self.result, self.cleanup) {
            (Err(primary), Err(cleanup)) => {
                debug!(%cleanup, "Cleanup error superseded by scenario error");
                Err(primary)
            }
            (Err(primary), Ok(())) => Err(primary),
            (Ok(_), Err(cleanup)) => Err(cleanup),
            (Ok(result), Ok(())) => Ok(result),
        }
    }
}

pub struct ScenarioOrchestrator<'a, D: Device + ?Sized, G: TrafficGenerator + ?Sized> {
    device: &'a D,
    generator: &'a G,
    scenario: Scenario,
    topology: TopologyConfig,
    policy: DurationPolicy,
    verdicts: VerdictPolicy,
    protocol_timeout: Duration,
    metrics: Option<Arc<MetricsRecorder>>,
    diagnostics: DiagnosticsCollector,
    state: ScenarioState,
    applied: Option<CommandBatch>,
    generator_configured: bool,
    protocols_started: bool,
    traffic_started: bool,
    cleaned: bool,
    run_report: Option<RunReport>,
    result: Option<ScenarioResult>,
}

impl<'a, D: Device + ?Sized, G: TrafficGenerator + ?Sized> ScenarioOrchestrator<'a, D, G> {
    pub fn new(device: &'a D, generator: &'a G, scenario: Scenario, config: &HarnessConfig) -> Self {
        Self {
            device,
            generator,
            scenario,
            topology: config.topology.clone(),
            policy: DurationPolicy::from_config(&config.traffic),
            verdicts: VerdictPolicy::new(config.traffic.deny_tolerance),
            protocol_timeout: config.traffic.protocol_timeout(),
            metrics: None,
            diagnostics: DiagnosticsCollector::new(config.traffic.report_dir.clone()),
            state: ScenarioState::Idle,
            applied: None,
            generator_configured: false,
            protocols_started: false,
            traffic_started: false,
            cleaned: false,
            run_report: None,
            result: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> ScenarioState {
        self.state
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn run_report(&self) -> Option<&RunReport> {
        self.run_report.as_ref()
    }

    pub fn result(&self) -> Option<&ScenarioResult> {
        self.result.as_ref()
    }

    /// Teardown reports written so far.
    pub fn teardown_reports(&self) -> &[PathBuf] {
        self.diagnostics.written()
    }

    /// True while the device or the generator may still carry scenario state.
    pub fn holds_state(&self) -> bool {
        self.applied.is_some()
            || self.generator_configured
            || self.protocols_started
            || self.traffic_started
    }

    fn expect_state(&self, expected: ScenarioState, operation: &'static str) -> Result<(), HarnessError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(HarnessError::InvalidTransition {
                from: self.state,
                operation,
            })
        }
    }

    fn fail(&mut self, phase: &str, err: HarnessError) -> HarnessError {
        warn!(scenario = %self.scenario.name, phase, error = %err, "Scenario phase failed");
        self.state = ScenarioState::Failed;
        err
    }

    /// Applies the setup batch, loads the generator and brings up BGP.
    #[instrument(skip_all, fields(scenario = %self.scenario.name))]
    pub async fn configure(&mut self) -> Result<(), HarnessError> {
        self.expect_state(ScenarioState::Idle, "configure")?;
        match self.configure_inner().await {
            Ok(()) => {
                self.state = ScenarioState::Configured;
                info!("Scenario configured");
                EventLogger::log(
                    HarnessEvent::completed(&self.scenario.name, Phase::Configure)
                        .with(KeyValue::new("commands", self.scenario.setup.len() as i64)),
                )
                .await;
                Ok(())
            }
            Err(err) => Err(self.fail("configure", err)),
        }
    }

    async fn configure_inner(&mut self) -> Result<(), HarnessError> {
        let applier = ConfigBatchApplier::new(self.device);
        let applied = applier.apply(&self.scenario.setup).await;
        let report = match applied {
            Ok(report) => report,
            Err(err) => {
                if err.may_have_applied() {
                    warn!(error = %err, "Device state unknown, whole setup batch will be reverted");
                    self.applied = Some(self.scenario.setup.clone());
                }
                return Err(err.into());
            }
        };
        let accepted = report.succeeded_commands();
        if !accepted.is_empty() {
            self.applied = Some(accepted);
        }
        report.into_checked()?;

        let config = GeneratorConfig::new(&self.topology)
            .with_flows(self.scenario.flow_specs())
            .with_devices(self.scenario.devices.clone());
        self.generator_configured = true;
        self.generator.set_config(&config).await?;

        if !self.scenario.devices.is_empty() {
            self.protocols_started = true;
            self.generator.start_protocols().await?;
            if self.scenario.has_bgp() {
                self.wait_for_bgp().await?;
            }
        }
        Ok(())
    }

    async fn wait_for_bgp(&self) -> Result<(), HarnessError> {
        let mut poller = Poller::new(self.policy.poll_interval, self.protocol_timeout);
        loop {
            let down: Vec<String> = self
                .generator
                .bgp_metrics()
                .await?
                .into_iter()
                .filter(|m| m.session_state != SessionState::Up)
                .map(|m| m.name)
                .collect();
            if down.is_empty() {
                info!("All BGP peers established");
                return Ok(());
            }
            debug!(down = ?down, "Waiting for BGP peers");
            if !poller.tick().await {
                return Err(HarnessError::ProtocolTimeout {
                    waited: self.protocol_timeout,
                    down,
                });
            }
        }
    }

    /// Sends the scenario traffic and collects counters.
    #[instrument(skip_all, fields(scenario = %self.scenario.name))]
    pub async fn run(&mut self) -> Result<&RunReport, HarnessError> {
        self.expect_state(ScenarioState::Configured, "run")?;
        self.state = ScenarioState::Running;
        self.traffic_started = true;

        let flows = self.scenario.flow_specs();
        let mut runner = TrafficRunner::new(self.generator, self.policy);
        if let Some(metrics) = &self.metrics {
            runner = runner.with_metrics(Arc::clone(metrics));
        }
        match runner.run_configured(&flows, &self.scenario.schedule).await {
            Ok(report) => {
                info!(
                    flows = report.counters.len(),
                    deadline_reached = report.deadline_reached,
                    "Traffic run complete"
                );
                EventLogger::log(
                    HarnessEvent::completed(&self.scenario.name, Phase::Run)
                        .with(KeyValue::new("flows", report.counters.len() as i64))
                        .with(KeyValue::new("deadline_reached", report.deadline_reached)),
                )
                .await;
                let report: &RunReport = self.run_report.insert(report);
                Ok(report)
            }
            Err(err) => Err(self.fail("run", err)),
        }
    }

    /// Evaluates every flow against its expectation.
    #[instrument(skip_all, fields(scenario = %self.scenario.name))]
    pub async fn verify(&mut self) -> Result<ScenarioResult, HarnessError> {
        self.expect_state(ScenarioState::Running, "verify")?;
        let Some(report) = &self.run_report else {
            return Err(HarnessError::InvalidTransition {
                from: self.state,
                operation: "verify",
            });
        };

        let mut result = ScenarioResult::default();
        for flow in &self.scenario.flows {
            let Some(counters) = report.get(&flow.spec.name) else {
                debug!(flow = %flow.spec.name, "Flow was not started, no verdict");
                continue;
            };
            let verdict = self.verdicts.evaluate(flow.expectation, counters);
            if verdict.matched {
                info!(flow = %verdict.flow, expectation = %verdict.expectation, tx = verdict.tx_frames, rx = verdict.rx_frames, "Flow verified");
            } else {
                warn!(flow = %verdict.flow, expectation = %verdict.expectation, tx = verdict.tx_frames, rx = verdict.rx_frames, "Flow missed expectation");
            }
            result.verdicts.push(verdict);
        }
        self.result = Some(result.clone());

        match result.into_checked(&self.scenario.name) {
            Ok(result) => {
                self.state = ScenarioState::Verified;
                EventLogger::log(
                    HarnessEvent::completed(&self.scenario.name, Phase::Verify)
                        .with(KeyValue::new("flows", result.verdicts.len() as i64)),
                )
                .await;
                Ok(result)
            }
            Err(err) => Err(self.fail("verify", err)),
        }
    }

    /// Undoes everything the scenario did. A second call does nothing.
    pub async fn cleanup(&mut self) -> Result<(), HarnessError> {
        self.cleanup_after(None).await
    }

    #[instrument(skip_all, fields(scenario = %self.scenario.name))]
    async fn cleanup_after(&mut self, primary: Option<&HarnessError>) -> Result<(), HarnessError> {
        if self.cleaned {
            debug!("Scenario already cleaned up");
            return Ok(());
        }
        self.cleaned = true;

        let mut failures = Vec::new();
        let mut rejected: Vec<RejectedCommand> = Vec::new();

        if std::mem::take(&mut self.traffic_started) {
            if let Err(e) = self.generator.stop_traffic().await {
                failures.push(step_failed(CleanupStep::StopTraffic, e));
            }
        }
        if std::mem::take(&mut self.protocols_started) {
            if let Err(e) = self.generator.stop_protocols().await {
                failures.push(step_failed(CleanupStep::StopProtocols, e));
            }
        }
        if std::mem::take(&mut self.generator_configured) {
            if let Err(e) = self.generator.clear_config().await {
                failures.push(step_failed(CleanupStep::ClearGeneratorConfig, e));
            }
        }
        if let Some(applied) = self.applied.take() {
            info!(commands = applied.len(), "Reverting device configuration");
            match ConfigBatchApplier::new(self.device).revert(&applied).await {
                Ok(report) if report.all_succeeded() => {}
                Ok(report) => {
                    rejected = report.rejected();
                    if let Err(e) = report.into_checked() {
                        failures.push(step_failed(CleanupStep::RevertDeviceConfig, e));
                    }
                }
                Err(e) => failures.push(step_failed(CleanupStep::RevertDeviceConfig, e)),
            }
        }

        if failures.is_empty() {
            if self.state != ScenarioState::Failed {
                self.state = ScenarioState::CleanedUp;
            }
            info!(state = %self.state, "Scenario cleaned up");
            return Ok(());
        }

        self.state = ScenarioState::Failed;
        for failure in &failures {
            error!(step = %failure.step, message = %failure.message, "Cleanup step failed");
        }
        let report = DiagnosticsCollector::build_report(&self.scenario.name, primary, &failures, &rejected);
        let path = match self.diagnostics.record_teardown_report(&report) {
            Ok(path) => path,
            Err(e) => {
                error!(error = %e, "Could not write teardown report");
                None
            }
        };
        if let Some(path) = &path {
            error!(report = %path.display(), "Teardown incomplete, manual intervention required");
        }
        EventLogger::log(
            HarnessEvent::failed(&self.scenario.name, Phase::Cleanup)
                .with(KeyValue::new("failed_steps", failures.len() as i64)),
        )
        .await;
        Err(HarnessError::Cleanup {
            scenario: self.scenario.name.clone(),
            failures,
            report: path,
        })
    }

    /// Runs configure, run and verify, then always cleans up.
    pub async fn execute(&mut self) -> ScenarioOutcome {
        let result = self.execute_phases().await;
        let cleanup = self.cleanup_after(result.as_ref().err()).await;

        if let Some(metrics) = &self.metrics {
            let label = match (&result, &cleanup) {
                (Ok(_), Ok(())) => ScenarioOutcomeLabel::Passed,
                (_, Err(_)) => ScenarioOutcomeLabel::CleanupFailed,
                (Err(_), Ok(())) => ScenarioOutcomeLabel::Failed,
            };
            metrics.record_scenario(label);
        }
        ScenarioOutcome { result, cleanup }
    }

    async fn execute_phases(&mut self) -> Result<ScenarioResult, HarnessError> {
        self.configure().await?;
        self.run().await?;
        self.verify().await
    }
}

fn step_failed(step: CleanupStep, err: impl fmt::Display) -> CleanupFailure {
    CleanupFailure {
        step,
        message: err.to_string(),
    }
}

impl<'a, D: Device + ?Sized, G: TrafficGenerator + ?Sized> Drop for ScenarioOrchestrator<'a, D, G> {
    fn drop(&mut self) {
        if !self.cleaned && self.holds_state() {
            error!(
                scenario = %self.scenario.name,
                state = %self.state,
                "Scenario dropped without cleanup; device and generator state left behind"
            );
        }
    }
}
