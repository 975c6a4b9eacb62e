//! Greenlee ammeter emulation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{Ammeter, DeviceKind};

/// Emulated Greenlee ammeter.
///
/// Fabricates a reading from a random voltage across a random resistance.
pub struct GreenleeAmmeter {
    rng: StdRng,
}

impl GreenleeAmmeter {
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

impl Default for GreenleeAmmeter {
    fn default() -> Self {
        Self::new()
    }
}

impl Ammeter for GreenleeAmmeter {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Greenlee
    }

    fn measure(&mut self) -> f64 {
        let voltage = self.rng.gen_range(1.0..10.0);
        let resistance = self.rng.gen_range(0.1..100.0);
        let current = voltage / resistance;
        debug!(
            "greenlee: voltage={:.3}V resistance={:.3}Ω current={:.4}A",
            voltage, resistance, current
        );
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readings_stay_in_physical_range() {
        let mut dev = GreenleeAmmeter::with_seed(42);
        for _ in 0..1000 {
            let current = dev.measure();
            // 1V / 100Ω .. 10V / 0.1Ω
            assert!(current > 0.01 && current < 100.0, "current={}", current);
        }
    }
}
