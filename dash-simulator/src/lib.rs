/*!
# DASH Simulator

A deterministic stand-in for the DPU and the traffic generator, so scenario
logic can be exercised without hardware.

## Key Components:
- **Simulated DPU:** accepts SAI-style command batches, tracks created objects
  and forwards frames according to the configured VNETs and ACL rules.
- **Simulated Generator:** transmits flows on `tokio::time`, evaluates each
  frame against the DPU and reports per-flow counters and BGP session state.
- **Network Models:** seeded packet loss.
- **Chaos Engine:** refuses chosen commands or takes the DPU offline.
*/

pub mod acl;
pub mod chaos;
pub mod dpu;
pub mod network_simulation;
pub mod tgen;

pub use chaos::FaultPlan;
pub use dpu::{FrameView, SimulatedDpu};
pub use tgen::{SimulatedTrafficGenerator, BGP_ESTABLISH_DELAY};

use dash_config::SimulatorConfig;

/// Builds a DPU and a generator sharing its state.
pub fn simulated_pair(config: &SimulatorConfig) -> (SimulatedDpu, SimulatedTrafficGenerator) {
    let dpu = SimulatedDpu::from_config(config);
    let tgen = SimulatedTrafficGenerator::new(&dpu, config);
    (dpu, tgen)
}
