//! Per-flow expectations and how counters are judged against them.

use std::fmt;

use dash_flows::FlowCounters;
use serde::Serialize;

use super::error::HarnessError;

/// What a flow is expected to do when it crosses the DPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Expectation {
    Allow,
    Deny,
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Allow => f.write_str("allow"),
            Expectation::Deny => f.write_str("deny"),
        }
    }
}

/// Judgement of one flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowVerdict {
    pub flow: String,
    pub expectation: Expectation,
    pub tx_frames: u64,
    pub rx_frames: u64,
    pub matched: bool,
}

/// Rules for turning counters into verdicts.
///
/// `Allow` matches iff frames were transmitted and every one was received.
/// `Deny` matches iff nothing was received, or at most `deny_tolerance * tx`
/// frames were.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerdictPolicy {
    pub deny_tolerance: f64,
}

impl VerdictPolicy {
    pub fn new(deny_tolerance: f64) -> Self {
        Self { deny_tolerance }
    }

    pub fn evaluate(&self, expectation: Expectation, counters: &FlowCounters) -> FlowVerdict {
        let (tx, rx) = (counters.tx_frames, counters.rx_frames);
        let matched = match expectation {
            Expectation::Allow => tx > 0 && tx == rx,
            Expectation::Deny => rx == 0 || (rx as f64) <= (tx as f64) * self.deny_tolerance,
        };
        FlowVerdict {
            flow: counters.name.clone(),
            expectation,
            tx_frames: tx,
            rx_frames: rx,
            matched,
        }
    }
}

impl Default for VerdictPolicy {
    fn default() -> Self {
        Self::new(0.01)
    }
}

/// Every flow verdict of a scenario, in flow order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ScenarioResult {
    pub verdicts: Vec<FlowVerdict>,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        self.verdicts.iter().all(|v| v.matched)
    }

    pub fn failures(&self) -> Vec<FlowVerdict> {
        self.verdicts.iter().filter(|v| !v.matched).cloned().collect()
    }

    pub fn verdict(&self, flow: &str) -> Option<&FlowVerdict> {
        self.verdicts.iter().find(|v| v.flow == flow)
    }

    /// Fails with [`HarnessError::VerificationMismatch`] naming every flow
    /// that missed its expectation.
    pub fn into_checked(self, scenario: &str) -> Result<Self, HarnessError> {
        if self.passed() {
            Ok(self)
        } else {
            Err(HarnessError::VerificationMismatch {
                scenario: scenario.to_string(),
                failures: self.failures(),
            })
        }
    }
}
