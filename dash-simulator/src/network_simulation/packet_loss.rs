//! # Packet Loss Models for Simulation
//!
//! ## Models:
//! - `ProbabilisticLossModel`: drops frames with a given probability, from a
//!   seeded RNG so runs are reproducible.
//! - `NoPacketLossModel`: never drops frames.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait PacketLossModel: Send {
    /// Determines if a frame should be dropped.
    fn should_drop(&mut self) -> bool;
}

#[derive(Debug)]
pub struct ProbabilisticLossModel {
    /// Drop probability, clamped to 0.0..=1.0.
    drop_probability: f64,
    rng: StdRng,
}

impl ProbabilisticLossModel {
    pub fn new(drop_probability: f64, seed: u64) -> Self {
        Self {
            drop_probability: drop_probability.clamp(0.0, 1.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl PacketLossModel for ProbabilisticLossModel {
    #[inline]
    fn should_drop(&mut self) -> bool {
        self.rng.random_bool(self.drop_probability)
    }
}

#[derive(Debug)]
pub struct NoPacketLossModel;

impl PacketLossModel for NoPacketLossModel {
    #[inline]
    fn should_drop(&mut self) -> bool {
        false
    }
}

/// Picks the cheapest model for `probability`.
pub fn loss_model(probability: f64, seed: u64) -> Box<dyn PacketLossModel> {
    if probability <= 0.0 {
        Box::new(NoPacketLossModel)
    } else {
        Box::new(ProbabilisticLossModel::new(probability, seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probabilistic_loss_model_probability() {
        let mut model = ProbabilisticLossModel::new(0.5, 42);
        let iterations = 10_000;
        let drops = (0..iterations).filter(|_| model.should_drop()).count();
        let drop_rate = drops as f64 / iterations as f64;
        // Allow a tolerance of 5%
        assert!((drop_rate - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_same_seed_same_drops() {
        let mut a = ProbabilisticLossModel::new(0.3, 7);
        let mut b = ProbabilisticLossModel::new(0.3, 7);
        let run_a: Vec<bool> = (0..256).map(|_| a.should_drop()).collect();
        let run_b: Vec<bool> = (0..256).map(|_| b.should_drop()).collect();
        assert_eq!(run_a, run_b);
    }

    #[test]
    fn test_no_packet_loss() {
        let mut model = loss_model(0.0, 42);
        assert!((0..1000).all(|_| !model.should_drop()));
    }
}
