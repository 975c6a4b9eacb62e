//! Emulated ammeter devices.
//!
//! Three device families are supported, each with its own wire command and
//! default port:
//! - Greenlee — voltage/resistance measurement
//! - Entes — magnetic-field measurement with a calibration factor
//! - Circutor — integration over a burst of voltage samples
//!
//! The `Ammeter` trait abstracts the per-family measurement so the endpoint
//! server and tests can work with any device through one interface.

mod circutor;
mod entes;
mod greenlee;
pub mod server;

pub use circutor::CircutorAmmeter;
pub use entes::EntesAmmeter;
pub use greenlee::GreenleeAmmeter;
pub use server::DeviceServer;

use serde::{Deserialize, Serialize};

/// The emulated ammeter families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Greenlee,
    Entes,
    Circutor,
}

impl DeviceKind {
    /// All known device kinds.
    pub const ALL: [DeviceKind; 3] = [DeviceKind::Greenlee, DeviceKind::Entes, DeviceKind::Circutor];

    /// The exact command bytes this device answers to.
    ///
    /// Anything else on the wire is ignored and the connection is closed
    /// without a reply.
    pub fn command(self) -> &'static [u8] {
        match self {
            DeviceKind::Greenlee => b"MEASURE_GREENLEE -get_measurement",
            DeviceKind::Entes => b"MEASURE_ENTES -get_data",
            DeviceKind::Circutor => b"MEASURE_CIRCUTOR -get_measurement -current",
        }
    }

    /// Default TCP port for this device's endpoint.
    pub fn default_port(self) -> u16 {
        match self {
            DeviceKind::Greenlee => 5000,
            DeviceKind::Entes => 5001,
            DeviceKind::Circutor => 5002,
        }
    }

    /// Lowercase name used in configuration and persisted results.
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceKind::Greenlee => "greenlee",
            DeviceKind::Entes => "entes",
            DeviceKind::Circutor => "circutor",
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeviceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "greenlee" => Ok(DeviceKind::Greenlee),
            "entes" => Ok(DeviceKind::Entes),
            "circutor" => Ok(DeviceKind::Circutor),
            other => Err(format!(
                "unknown device kind '{}', expected one of: greenlee, entes, circutor",
                other
            )),
        }
    }
}

/// A current-measurement device.
///
/// `measure` fabricates one plausible reading. Implementations hold their
/// own random source so tests can seed them deterministically.
pub trait Ammeter: Send {
    /// The device family this instance belongs to.
    fn kind(&self) -> DeviceKind;

    /// Produces one current reading in amperes.
    fn measure(&mut self) -> f64;
}

/// Creates an entropy-seeded ammeter for the given kind.
pub fn ammeter_for(kind: DeviceKind) -> Box<dyn Ammeter> {
    match kind {
        DeviceKind::Greenlee => Box::new(GreenleeAmmeter::new()),
        DeviceKind::Entes => Box::new(EntesAmmeter::new()),
        DeviceKind::Circutor => Box::new(CircutorAmmeter::new()),
    }
}

/// Creates a deterministically seeded ammeter for the given kind.
pub fn ammeter_with_seed(kind: DeviceKind, seed: u64) -> Box<dyn Ammeter> {
    match kind {
        DeviceKind::Greenlee => Box::new(GreenleeAmmeter::with_seed(seed)),
        DeviceKind::Entes => Box::new(EntesAmmeter::with_seed(seed)),
        DeviceKind::Circutor => Box::new(CircutorAmmeter::with_seed(seed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn commands_are_exact() {
        assert_eq!(
            DeviceKind::Greenlee.command(),
            b"MEASURE_GREENLEE -get_measurement"
        );
        assert_eq!(DeviceKind::Entes.command(), b"MEASURE_ENTES -get_data");
        assert_eq!(
            DeviceKind::Circutor.command(),
            b"MEASURE_CIRCUTOR -get_measurement -current"
        );
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(DeviceKind::from_str("GREENLEE").unwrap(), DeviceKind::Greenlee);
        assert_eq!(DeviceKind::from_str("Entes").unwrap(), DeviceKind::Entes);
        assert_eq!(DeviceKind::from_str("circutor").unwrap(), DeviceKind::Circutor);
        assert!(DeviceKind::from_str("fluke").is_err());
    }

    #[test]
    fn serde_round_trip_uses_lowercase() {
        let json = serde_json::to_string(&DeviceKind::Greenlee).unwrap();
        assert_eq!(json, "\"greenlee\"");
        let back: DeviceKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DeviceKind::Greenlee);
    }

    #[test]
    fn default_ports_are_distinct() {
        let ports: Vec<u16> = DeviceKind::ALL.iter().map(|k| k.default_port()).collect();
        assert_eq!(ports, vec![5000, 5001, 5002]);
    }

    #[test]
    fn seeded_ammeters_are_reproducible() {
        for kind in DeviceKind::ALL {
            let mut a = ammeter_with_seed(kind, 7);
            let mut b = ammeter_with_seed(kind, 7);
            assert_eq!(a.measure(), b.measure());
            assert_eq!(a.kind(), kind);
        }
    }
}
