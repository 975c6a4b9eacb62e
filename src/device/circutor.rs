//! CIRCUTOR ammeter emulation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{Ammeter, DeviceKind};

/// Number of voltage samples integrated per reading.
const BURST_SAMPLES: usize = 10;

/// Emulated CIRCUTOR ammeter.
///
/// Fabricates a reading by integrating a burst of random voltage samples
/// over a random time step.
pub struct CircutorAmmeter {
    rng: StdRng,
}

impl CircutorAmmeter {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic instance for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for CircutorAmmeter {
    fn default() -> Self {
        Self::new()
    }
}

impl Ammeter for CircutorAmmeter {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Circutor
    }

    fn measure(&mut self) -> f64 {
        let time_step = self.rng.gen_range(0.001..0.01);
        let mut current = 0.0;
        for _ in 0..BURST_SAMPLES {
            let voltage = self.rng.gen_range(0.1..1.0);
            current += voltage * time_step;
        }
        debug!("circutor: time_step={:.4}s current={:.5}A", time_step, current);
        current
    }
}
