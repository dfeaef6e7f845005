mod common;

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use common::*;
use dash_core::{Command, CommandStatus, Device, DeviceError, Operation};
use dash_engine::{
    CleanupStep, DurationPolicy, HarnessError, Scenario, ScenarioOrchestrator, ScenarioState,
    StartSchedule, TrafficRunner,
};
use dash_flows::{
    BgpPeerMetrics, FlowCounters, GeneratorConfig, ProtocolDevice, TrafficError,
    TrafficGenerator, TransmitState,
};
use dash_simulator::{FaultPlan, SimulatedDpu};
use dash_telemetry::MetricsRecorder;
use parking_lot::Mutex;
use tracing_test::traced_test;

fn mismatching_scenario(config: &dash_config::HarnessConfig) -> anyhow::Result<Scenario> {
    // The flow is permitted, so expecting a deny fails verification.
    Ok(Scenario::builder("expect_deny_on_allowed")
        .setup(fixture("vnet_setup_commands.json")?)
        .deny(short(template(config).eni_to_network("vm_to_vm"))?)
        .build()?)
}

#[tokio::test(start_paused = true)]
async fn failed_verification_still_reverts_device() -> anyhow::Result<()> {
    let (config, dpu, tgen) = lab();
    let mut orchestrator =
        ScenarioOrchestrator::new(&dpu, &tgen, mismatching_scenario(&config)?, &config);

    let outcome = orchestrator.execute().await;
    assert!(matches!(
        outcome.result,
        Err(HarnessError::VerificationMismatch { .. })
    ));
    assert!(outcome.cleanup.is_ok());
    assert_eq!(orchestrator.state(), ScenarioState::Failed);
    assert_eq!(dpu.object_count(), 0);
    assert!(!tgen.is_configured());
    assert!(!orchestrator.holds_state());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failing_revert_does_not_mask_verification_error() -> anyhow::Result<()> {
    let (config, dpu, tgen) = lab();
    dpu.set_faults(FaultPlan::new().reject_remove("eni"));
    let mut orchestrator =
        ScenarioOrchestrator::new(&dpu, &tgen, mismatching_scenario(&config)?, &config);

    let outcome = orchestrator.execute().await;
    match &outcome.cleanup {
        Err(HarnessError::Cleanup { failures, report, .. }) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].step, CleanupStep::RevertDeviceConfig);
            assert!(failures[0].message.contains("eni"));
            assert!(report.is_none(), "no report directory configured");
        }
        other => panic!("expected cleanup error, got {:?}", other),
    }
    assert!(matches!(
        outcome.into_result(),
        Err(HarnessError::VerificationMismatch { .. })
    ));
    assert!(dpu.has_object("eni"));
    assert_eq!(dpu.object_count(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn second_cleanup_issues_no_device_calls() -> anyhow::Result<()> {
    let (config, dpu, tgen) = lab();
    let scenario = Scenario::builder("idempotent")
        .setup(fixture("vnet_setup_commands.json")?)
        .allow(short(template(&config).eni_to_network("vm_to_vm"))?)
        .build()?;
    let mut orchestrator = ScenarioOrchestrator::new(&dpu, &tgen, scenario, &config);

    orchestrator.execute().await.into_result()?;
    let calls = dpu.command_log().len();
    assert_eq!(calls, 12, "six creates and six removes");

    orchestrator.cleanup().await?;
    orchestrator.cleanup().await?;
    assert_eq!(dpu.command_log().len(), calls);
    assert_eq!(orchestrator.state(), ScenarioState::CleanedUp);
    Ok(())
}

#[tokio::test]
async fn out_of_order_calls_leave_state_unchanged() -> anyhow::Result<()> {
    let (config, dpu, tgen) = lab();
    let scenario = Scenario::builder("order")
        .setup(fixture("vnet_setup_commands.json")?)
        .build()?;
    let mut orchestrator = ScenarioOrchestrator::new(&dpu, &tgen, scenario, &config);

    let err = orchestrator.verify().await.unwrap_err();
    assert!(matches!(
        err,
        HarnessError::InvalidTransition {
            from: ScenarioState::Idle,
            operation: "verify"
        }
    ));
    assert!(orchestrator.run().await.is_err());
    assert_eq!(orchestrator.state(), ScenarioState::Idle);
    assert!(dpu.command_log().is_empty());

    orchestrator.configure().await?;
    assert!(matches!(
        orchestrator.configure().await,
        Err(HarnessError::InvalidTransition {
            from: ScenarioState::Configured,
            ..
        })
    ));
    assert_eq!(orchestrator.state(), ScenarioState::Configured);

    orchestrator.cleanup().await?;
    assert!(matches!(
        orchestrator.configure().await,
        Err(HarnessError::InvalidTransition {
            from: ScenarioState::CleanedUp,
            ..
        })
    ));
    Ok(())
}

#[tokio::test]
async fn unreachable_device_fails_configure() -> anyhow::Result<()> {
    let (config, dpu, tgen) = lab();
    dpu.set_faults(FaultPlan::new().unreachable(true));
    let scenario = Scenario::builder("offline")
        .setup(fixture("vnet_setup_commands.json")?)
        .build()?;
    let mut orchestrator = ScenarioOrchestrator::new(&dpu, &tgen, scenario, &config);

    let outcome = orchestrator.execute().await;
    assert!(matches!(
        outcome.result,
        Err(HarnessError::Device(DeviceError::Unreachable(_)))
    ));
    assert!(outcome.cleanup.is_ok(), "nothing was applied, nothing to revert");
    assert_eq!(orchestrator.state(), ScenarioState::Failed);
    assert!(!tgen.is_configured());
    Ok(())
}

#[tokio::test]
async fn rejected_setup_reverts_only_accepted_commands() -> anyhow::Result<()> {
    let (config, dpu, tgen) = lab();
    dpu.set_faults(FaultPlan::new().reject_create("eni"));
    let scenario = Scenario::builder("partial")
        .setup(fixture("vnet_setup_commands.json")?)
        .build()?;
    let mut orchestrator = ScenarioOrchestrator::new(&dpu, &tgen, scenario, &config);

    let outcome = orchestrator.execute().await;
    match &outcome.result {
        Err(HarnessError::ConfigurationApply(err)) => {
            assert!(err.to_string().contains("eni"));
        }
        other => panic!("expected configuration apply error, got {:?}", other),
    }
    assert!(outcome.cleanup.is_ok());

    let removes: Vec<String> = dpu
        .command_log()
        .into_iter()
        .filter(|c| c.op == Operation::Remove)
        .map(|c| c.name)
        .collect();
    assert_eq!(
        removes,
        ["acl_allow_lab", "vnet_network", "vnet_eni", "direction_lookup_entry", "vip_entry"]
    );
    assert_eq!(dpu.object_count(), 0);
    Ok(())
}

/// Forwards to the simulated DPU but drops the last status of the first
/// batch, so the harness cannot tell which commands took effect.
struct ShortAnsweringDpu<'a> {
    inner: &'a SimulatedDpu,
    shortchanged: AtomicBool,
}

#[async_trait]
impl<'a> Device for ShortAnsweringDpu<'a> {
    async fn process_commands(
        &self,
        commands: &[Command],
    ) -> Result<Vec<CommandStatus>, DeviceError> {
        let mut statuses = self.inner.process_commands(commands).await?;
        if !self.shortchanged.swap(true, Ordering::SeqCst) {
            statuses.pop();
        }
        Ok(statuses)
    }
}

#[tokio::test]
async fn ambiguous_apply_reverts_whole_batch() -> anyhow::Result<()> {
    let (config, dpu, tgen) = lab();
    let device = ShortAnsweringDpu {
        inner: &dpu,
        shortchanged: AtomicBool::new(false),
    };
    let scenario = Scenario::builder("short_answer")
        .setup(fixture("vnet_setup_commands.json")?)
        .build()?;
    let mut orchestrator = ScenarioOrchestrator::new(&device, &tgen, scenario, &config);

    let outcome = orchestrator.execute().await;
    assert!(matches!(
        outcome.result,
        Err(HarnessError::Device(DeviceError::ResultCountMismatch { sent: 6, got: 5 }))
    ));
    assert!(outcome.cleanup.is_ok());
    let removes = dpu
        .command_log()
        .into_iter()
        .filter(|c| c.op == Operation::Remove)
        .count();
    assert_eq!(removes, 6);
    assert_eq!(dpu.object_count(), 0);
    assert!(!orchestrator.holds_state());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unanswered_bgp_peer_times_out() -> anyhow::Result<()> {
    let (config, dpu, tgen) = lab();
    let lonely = ProtocolDevice::new(
        "lonely",
        config.topology.eni_port().context("no ENI port")?,
        config.addressing.eni_outer_src_mac,
        Ipv4Addr::new(220, 0, 1, 2),
        24,
        Ipv4Addr::new(220, 0, 1, 1),
    )?
    .with_ebgp(200, Vec::new())?;
    let scenario = Scenario::builder("bgp_down")
        .setup(fixture("vnet_setup_commands.json")?)
        .device(lonely)
        .build()?;
    let mut orchestrator = ScenarioOrchestrator::new(&dpu, &tgen, scenario, &config);

    let started = tokio::time::Instant::now();
    let outcome = orchestrator.execute().await;
    match &outcome.result {
        Err(HarnessError::ProtocolTimeout { waited, down }) => {
            assert_eq!(*waited, config.traffic.protocol_timeout());
            assert_eq!(down, &vec!["lonely_bgp".to_string()]);
        }
        other => panic!("expected protocol timeout, got {:?}", other),
    }
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert!(outcome.cleanup.is_ok());
    assert_eq!(dpu.object_count(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_teardown_writes_report() -> anyhow::Result<()> {
    let (mut config, dpu, tgen) = lab();
    let dir = std::env::temp_dir().join(format!("dash_teardown_{}", std::process::id()));
    config.traffic.report_dir = Some(dir.clone());
    dpu.set_faults(FaultPlan::new().reject_remove("vnet_eni"));
    let scenario = Scenario::builder("acl inbound")
        .setup(fixture("vnet_setup_commands.json")?)
        .allow(short(template(&config).eni_to_network("vm_to_vm"))?)
        .build()?;
    let mut orchestrator = ScenarioOrchestrator::new(&dpu, &tgen, scenario, &config);

    let outcome = orchestrator.execute().await;
    assert!(outcome.result.is_ok());
    let path = match outcome.cleanup {
        Err(HarnessError::Cleanup {
            report: Some(path), ..
        }) => path,
        other => panic!("expected cleanup error with report, got {:?}", other),
    };
    assert!(path.starts_with(&dir));
    let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.starts_with("teardown_report_acl_inbound_"));

    let yaml = std::fs::read_to_string(&path)?;
    assert!(yaml.contains("scenario: acl inbound"));
    assert!(yaml.contains("revert_device_config"));
    assert!(yaml.contains("name: vnet_eni"));
    assert_eq!(orchestrator.teardown_reports(), &[path]);
    assert_eq!(orchestrator.state(), ScenarioState::Failed);

    let _ = std::fs::remove_dir_all(dir);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn metrics_count_frames_and_outcomes() -> anyhow::Result<()> {
    let (config, dpu, tgen) = lab();
    let metrics = Arc::new(MetricsRecorder::new()?);
    let scenario = Scenario::builder("metrics")
        .setup(fixture("vnet_setup_commands.json")?)
        .allow(short(template(&config).eni_to_network("vm_to_vm"))?)
        .build()?;
    let mut orchestrator = ScenarioOrchestrator::new(&dpu, &tgen, scenario, &config)
        .with_metrics(Arc::clone(&metrics));

    assert!(orchestrator.execute().await.passed());
    let text = metrics.gather_metrics()?;
    assert!(text.contains(r#"dash_flow_tx_frames_total{flow="vm_to_vm"} 100"#));
    assert!(text.contains(r#"dash_flow_rx_frames_total{flow="vm_to_vm"} 100"#));
    assert!(text.contains(r#"dash_scenarios_total{outcome="passed"} 1"#));
    assert!(text.contains("dash_traffic_run_seconds_count 1"));
    Ok(())
}

#[traced_test]
#[tokio::test]
async fn dropping_configured_scenario_logs_error() {
    let (config, dpu, tgen) = lab();
    let scenario = Scenario::builder("abandoned")
        .setup(fixture("vnet_setup_commands.json").unwrap())
        .build()
        .unwrap();
    {
        let mut orchestrator = ScenarioOrchestrator::new(&dpu, &tgen, scenario, &config);
        orchestrator.configure().await.unwrap();
        assert!(orchestrator.holds_state());
    }
    assert!(logs_contain("dropped without cleanup"));
    assert_eq!(dpu.object_count(), 6);
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn phases_are_logged_with_scenario_name() {
    let (config, dpu, tgen) = lab();
    let scenario = Scenario::builder("logged_phases")
        .setup(fixture("vnet_setup_commands.json").unwrap())
        .allow(short(template(&config).eni_to_network("vm_to_vm")).unwrap())
        .build()
        .unwrap();
    let mut orchestrator = ScenarioOrchestrator::new(&dpu, &tgen, scenario, &config);

    assert!(orchestrator.execute().await.passed());
    assert!(logs_contain("scenario=logged_phases"));
    assert!(logs_contain("phase=configure"));
    assert!(logs_contain("phase=run"));
    assert!(logs_contain("phase=verify"));
    assert!(logs_contain("commands=6"));
}

/// A generator whose flows never finish transmitting.
#[derive(Default)]
struct StuckGenerator {
    started: Mutex<Vec<String>>,
    stopped: Mutex<bool>,
}

#[async_trait]
impl TrafficGenerator for StuckGenerator {
    async fn set_config(&self, _config: &GeneratorConfig) -> Result<(), TrafficError> {
        Ok(())
    }

    async fn clear_config(&self) -> Result<(), TrafficError> {
        Ok(())
    }

    async fn start_traffic(&self, flow: &str) -> Result<(), TrafficError> {
        self.started.lock().push(flow.to_string());
        Ok(())
    }

    async fn stop_traffic(&self) -> Result<(), TrafficError> {
        *self.stopped.lock() = true;
        Ok(())
    }

    async fn flow_metrics(&self, flow: &str) -> Result<FlowCounters, TrafficError> {
        let transmit = if *self.stopped.lock() {
            TransmitState::Stopped
        } else {
            TransmitState::Started
        };
        Ok(FlowCounters {
            name: flow.to_string(),
            tx_frames: 10,
            rx_frames: 10,
            transmit,
        })
    }

    async fn start_protocols(&self) -> Result<(), TrafficError> {
        Ok(())
    }

    async fn stop_protocols(&self) -> Result<(), TrafficError> {
        Ok(())
    }

    async fn bgp_metrics(&self) -> Result<Vec<BgpPeerMetrics>, TrafficError> {
        Ok(Vec::new())
    }
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn runner_collects_counters_after_deadline() {
    let config = dash_config::HarnessConfig::default();
    let template = template(&config);
    let flows = vec![
        short(template.eni_to_network("a")).unwrap(),
        short(template.network_to_eni("b")).unwrap(),
    ];
    let generator = StuckGenerator::default();
    let runner = TrafficRunner::new(&generator, DurationPolicy::from_config(&config.traffic));

    let started = tokio::time::Instant::now();
    let report = runner
        .run(
            &GeneratorConfig::new(&config.topology).with_flows(flows),
            &StartSchedule::waves([vec!["b"], vec!["a"]]),
        )
        .await
        .unwrap();

    assert!(report.deadline_reached);
    assert_eq!(report.counters.len(), 2);
    assert_eq!(report.counters[0].name, "b");
    assert!(report.get("a").unwrap().stopped());
    assert_eq!(*generator.started.lock(), ["b", "a"]);
    // 10 s of transmit time, one stagger and the margin.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(12_500) && elapsed < Duration::from_secs(13));
    assert!(logs_contain("Traffic deadline reached"));
}

#[tokio::test]
async fn runner_rejects_zero_rate_before_configuring() {
    let config = dash_config::HarnessConfig::default();
    let mut flow = template(&config).eni_to_network("idle").build().unwrap();
    flow.pps = 0;
    let generator = StuckGenerator::default();
    let runner = TrafficRunner::new(&generator, DurationPolicy::default());

    let err = runner
        .run(
            &GeneratorConfig::new(&config.topology).with_flows(vec![flow]),
            &StartSchedule::all(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HarnessError::ZeroRate { flow } if flow == "idle"));
    assert!(generator.started.lock().is_empty());
}
