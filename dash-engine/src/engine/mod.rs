mod diagnostics;
mod duration;
mod error;
mod orchestrator;
mod runner;
mod verdict;

pub use self::{
    diagnostics::{DiagnosticsCollector, LeftoverCommand, TeardownReport},
    duration::{DurationPolicy, Poller},
    error::{CleanupFailure, CleanupStep, HarnessError},
    orchestrator::{
        ExpectedFlow, Scenario, ScenarioBuilder, ScenarioOrchestrator, ScenarioOutcome,
        ScenarioState,
    },
    runner::{validate_flows, RunReport, StartSchedule, TrafficRunner},
    verdict::{Expectation, FlowVerdict, ScenarioResult, VerdictPolicy},
};

pub mod prelude {
    pub use super::{
        DurationPolicy, Expectation, HarnessError, Scenario, ScenarioOrchestrator,
        ScenarioOutcome, ScenarioState, StartSchedule, TrafficRunner,
    };
}
