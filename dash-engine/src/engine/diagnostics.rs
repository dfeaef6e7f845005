use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use dash_core::RejectedCommand;
use serde::Serialize;

use super::error::{CleanupFailure, HarnessError};

/// A device command left behind by a failed teardown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeftoverCommand {
    pub name: String,
    pub op: String,
    pub status: i64,
}

impl From<&RejectedCommand> for LeftoverCommand {
    fn from(rejected: &RejectedCommand) -> Self {
        Self {
            name: rejected.name.clone(),
            op: rejected.op.to_string(),
            status: rejected.status,
        }
    }
}

/// What an operator needs to finish a teardown by hand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeardownReport {
    pub scenario: String,
    pub generated_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_error: Option<String>,
    pub failed_steps: Vec<CleanupFailure>,
    pub rejected_commands: Vec<LeftoverCommand>,
}

#[derive(Debug, Default)]
pub struct DiagnosticsCollector {
    report_dir: Option<PathBuf>,
    written: Vec<PathBuf>,
}

impl DiagnosticsCollector {
    pub fn new(report_dir: Option<PathBuf>) -> Self {
        Self {
            report_dir,
            written: Vec::new(),
        }
    }

    pub fn build_report(
        scenario: &str,
        primary_error: Option<&HarnessError>,
        failed_steps: &[CleanupFailure],
        rejected: &[RejectedCommand],
    ) -> TeardownReport {
        TeardownReport {
            scenario: scenario.to_string(),
            generated_at: unix_secs(),
            primary_error: primary_error.map(ToString::to_string),
            failed_steps: failed_steps.to_vec(),
            rejected_commands: rejected.iter().map(LeftoverCommand::from).collect(),
        }
    }

    pub fn render(report: &TeardownReport) -> Result<String, HarnessError> {
        Ok(serde_yaml::to_string(report)?)
    }

    /// Writes `report` to the configured directory. Returns `None` when no
    /// directory is configured.
    pub fn record_teardown_report(
        &mut self,
        report: &TeardownReport,
    ) -> Result<Option<PathBuf>, HarnessError> {
        let Some(dir) = &self.report_dir else {
            return Ok(None);
        };
        let path = report_path(dir, &report.scenario, report.generated_at);
        fs::create_dir_all(dir)?;
        fs::write(&path, Self::render(report)?)?;
        self.written.push(path.clone());
        Ok(Some(path))
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn report_path(dir: &Path, scenario: &str, secs: u64) -> PathBuf {
    let scenario: String = scenario
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    dir.join(format!("teardown_report_{}_{}.yaml", scenario, secs))
}
