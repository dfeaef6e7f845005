//! ## dash-simulator::network_simulation
//! **Impairments applied to frames the DPU forwards**
//!
//! ### Key Submodules:
//! - `packet_loss/`: probabilistic, seeded frame loss

pub mod packet_loss;
