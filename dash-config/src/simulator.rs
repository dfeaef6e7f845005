//! Settings for the in-process DPU and traffic generator simulator.
//!
//! Only the simulator reads this section. Scenarios running against real
//! hardware ignore it.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Seed for deterministic packet loss.
    pub seed: u64,

    /// Probability that an allowed frame is dropped in transit (0.0 to 1.0).
    #[validate(range(min = 0.0, max = 1.0))]
    pub loss_probability: f64,

    /// Command names the simulated device refuses, for fault injection.
    pub reject_commands: Vec<String>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            loss_probability: 0.0,
            reject_commands: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loss_probability_is_bounded() {
        let config = SimulatorConfig {
            loss_probability: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(SimulatorConfig::default().validate().is_ok());
    }
}
