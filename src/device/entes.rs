//! ENTES ammeter emulation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{Ammeter, DeviceKind};

/// Emulated ENTES ammeter.
///
/// Fabricates a reading from a random magnetic field strength scaled by a
/// random calibration factor.
pub struct EntesAmmeter {
    rng: StdRng,
}

impl EntesAmmeter {
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

impl Default for EntesAmmeter {
    fn default() -> Self {
        Self::new()
    }
}

impl Ammeter for EntesAmmeter {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Entes
    }

    fn measure(&mut self) -> f64 {
        let magnetic_field = self.rng.gen_range(0.01..0.1);
        let calibration_factor = self.rng.gen_range(500.0..2000.0);
        let current = magnetic_field * calibration_factor;
        debug!(
            "entes: field={:.4}T calibration={:.1} current={:.4}A",
            magnetic_field, calibration_factor, current
        );
        current
    }
}
