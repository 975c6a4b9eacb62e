//! Synthetic fault injection for measurement values.
//!
//! The injector makes a two-stage decision on every call:
//! 1. `should_inject` draws against the configured error rate (and always
//!    advances the call counter, so counters measure calls, not faults)
//! 2. `select_fault_kind` draws one fault kind from the configured weights,
//!    with unrecognized kind names filtered out and the remainder
//!    renormalized
//!
//! Separating the two stages lets tests validate the marginal rate and the
//! conditional kind distribution independently.

use std::collections::BTreeMap;

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Sentinel returned for an out-of-range fault: type-valid, domain-invalid.
pub const OUT_OF_RANGE_SENTINEL: f64 = -999.99;

/// Payload returned for a corrupt-data fault: not parseable as a number.
pub const CORRUPT_PAYLOAD: &str = "CORRUPT_DATA_NOT_A_FLOAT";

/// Categories of simulated failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    Timeout,
    ConnectionRefused,
    EmptyResponse,
    CorruptData,
    InvalidValue,
}

impl FaultKind {
    /// All known fault kinds.
    pub const ALL: [FaultKind; 5] = [
        FaultKind::Timeout,
        FaultKind::ConnectionRefused,
        FaultKind::EmptyResponse,
        FaultKind::CorruptData,
        FaultKind::InvalidValue,
    ];

    /// Configuration name of this fault kind.
    pub fn name(self) -> &'static str {
        match self {
            FaultKind::Timeout => "timeout",
            FaultKind::ConnectionRefused => "connection_refused",
            FaultKind::EmptyResponse => "empty_response",
            FaultKind::CorruptData => "corrupt_data",
            FaultKind::InvalidValue => "invalid_value",
        }
    }

    /// Parses a configuration name, case-insensitively.
    ///
    /// Unknown names yield `None`; the injector filters them out of the
    /// weight distribution rather than failing.
    pub fn from_name(name: &str) -> Option<FaultKind> {
        match name.to_ascii_lowercase().as_str() {
            "timeout" => Some(FaultKind::Timeout),
            "connection_refused" => Some(FaultKind::ConnectionRefused),
            "empty_response" => Some(FaultKind::EmptyResponse),
            "corrupt_data" => Some(FaultKind::CorruptData),
            "invalid_value" => Some(FaultKind::InvalidValue),
            _ => None,
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Fault-injection configuration.
///
/// `error_types` maps fault-kind names to non-negative weights. Weights
/// need not sum to 1; they are renormalized after unknown names are
/// filtered out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultConfig {
    pub enabled: bool,
    pub error_rate: f64,
    #[serde(default)]
    pub error_types: BTreeMap<String, f64>,
}

impl Default for FaultConfig {
    fn default() -> Self {
        let mut error_types = BTreeMap::new();
        error_types.insert("timeout".to_string(), 0.3);
        error_types.insert("corrupt_data".to_string(), 0.4);
        error_types.insert("connection_refused".to_string(), 0.1);
        error_types.insert("empty_response".to_string(), 0.1);
        error_types.insert("invalid_value".to_string(), 0.1);
        Self {
            enabled: false,
            error_rate: 0.1,
            error_types,
        }
    }
}

impl FaultConfig {
    /// Validates rate bounds and weight signs.
    pub fn validate(&self) -> Result<(), FaultConfigError> {
        if !(0.0..=1.0).contains(&self.error_rate) || !self.error_rate.is_finite() {
            return Err(FaultConfigError::RateOutOfRange(self.error_rate));
        }
        for (name, weight) in &self.error_types {
            if *weight < 0.0 || !weight.is_finite() {
                return Err(FaultConfigError::InvalidWeight(name.clone(), *weight));
            }
        }
        Ok(())
    }
}

/// Error type for invalid fault configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum FaultConfigError {
    /// `error_rate` outside [0, 1].
    RateOutOfRange(f64),
    /// Negative or non-finite weight.
    InvalidWeight(String, f64),
}

impl std::fmt::Display for FaultConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultConfigError::RateOutOfRange(rate) => {
                write!(f, "error_rate {} outside [0, 1]", rate)
            }
            FaultConfigError::InvalidWeight(name, weight) => {
                write!(f, "invalid weight {} for fault kind '{}'", weight, name)
            }
        }
    }
}

impl std::error::Error for FaultConfigError {}

/// A deliberately injected failure that surfaces as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedFault {
    Timeout,
    ConnectionRefused,
}

impl SimulatedFault {
    /// Stable lowercase name for error-event logs.
    pub fn kind_name(self) -> &'static str {
        match self {
            SimulatedFault::Timeout => "simulated_timeout",
            SimulatedFault::ConnectionRefused => "simulated_connection_refused",
        }
    }
}

impl std::fmt::Display for SimulatedFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulatedFault::Timeout => write!(f, "simulated measurement timeout"),
            SimulatedFault::ConnectionRefused => write!(f, "simulated connection refused"),
        }
    }
}

impl std::error::Error for SimulatedFault {}

/// Outcome of `apply` when no error is raised.
#[derive(Debug, Clone, PartialEq)]
pub enum InjectedValue {
    /// Pass-through, or the out-of-range sentinel.
    Value(f64),
    /// Empty-response fault: the value is absent.
    Empty,
    /// Corrupt-data fault: a payload that is not a number.
    Corrupt(&'static str),
}

/// Injection statistics, exposed for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InjectorStats {
    pub total_calls: u64,
    pub errors_injected: u64,
    pub actual_rate: f64,
    pub configured_rate: f64,
    pub enabled: bool,
}

/// Weighted fault injector.
///
/// Holds its own random source; use `with_seed` in tests for determinism.
pub struct FaultInjector {
    config: FaultConfig,
    kinds: Vec<FaultKind>,
    weighted: Option<WeightedIndex<f64>>,
    rng: StdRng,
    total_calls: u64,
    errors_injected: u64,
}

impl FaultInjector {
    /// Creates an injector with an entropy-seeded random source.
    pub fn new(config: FaultConfig) -> Result<Self, FaultConfigError> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Creates a deterministic injector for tests.
    pub fn with_seed(config: FaultConfig, seed: u64) -> Result<Self, FaultConfigError> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: FaultConfig, rng: StdRng) -> Result<Self, FaultConfigError> {
        config.validate()?;

        // Filter unknown kind names out of the distribution; the remainder
        // is renormalized implicitly by the weighted index.
        let mut kinds = Vec::new();
        let mut weights = Vec::new();
        for (name, weight) in &config.error_types {
            match FaultKind::from_name(name) {
                Some(kind) => {
                    kinds.push(kind);
                    weights.push(*weight);
                }
                None => warn!("ignoring unknown fault kind '{}' in configuration", name),
            }
        }

        // All-zero or empty weight sets leave nothing to draw from; the
        // injector then passes values through (see `apply`).
        let weighted = WeightedIndex::new(weights).ok();

        Ok(Self {
            config,
            kinds,
            weighted,
            rng,
            total_calls: 0,
            errors_injected: 0,
        })
    }

    /// Decides whether this call should inject a fault.
    ///
    /// Always advances the call counter, even when disabled: the counters
    /// measure calls, not faults.
    pub fn should_inject(&mut self) -> bool {
        self.total_calls += 1;

        if !self.config.enabled {
            return false;
        }

        self.rng.gen_range(0.0..1.0) < self.config.error_rate
    }

    /// Draws one fault kind from the renormalized weight distribution.
    ///
    /// Returns `None` when no recognized, positively weighted kind is
    /// configured; callers treat that as "no fault" (documented safe
    /// default for the empty-distribution edge case).
    pub fn select_fault_kind(&mut self) -> Option<FaultKind> {
        let weighted = self.weighted.as_ref()?;
        let idx = weighted.sample(&mut self.rng);
        Some(self.kinds[idx])
    }

    /// Applies the injection decision to a measurement value.
    ///
    /// Pass-through when no injection is due. Otherwise the selected kind
    /// either corrupts the returned value or raises a `SimulatedFault`.
    pub fn apply(&mut self, value: f64) -> Result<InjectedValue, SimulatedFault> {
        if !self.should_inject() {
            return Ok(InjectedValue::Value(value));
        }

        let Some(kind) = self.select_fault_kind() else {
            // Empty renormalized distribution: pass through, not counted
            // as an injected fault.
            return Ok(InjectedValue::Value(value));
        };

        self.errors_injected += 1;
        match kind {
            FaultKind::Timeout => Err(SimulatedFault::Timeout),
            FaultKind::ConnectionRefused => Err(SimulatedFault::ConnectionRefused),
            FaultKind::EmptyResponse => Ok(InjectedValue::Empty),
            FaultKind::CorruptData => Ok(InjectedValue::Corrupt(CORRUPT_PAYLOAD)),
            FaultKind::InvalidValue => Ok(InjectedValue::Value(OUT_OF_RANGE_SENTINEL)),
        }
    }

    /// Current injection statistics.
    pub fn stats(&self) -> InjectorStats {
        let actual_rate = if self.total_calls > 0 {
            self.errors_injected as f64 / self.total_calls as f64
        } else {
            0.0
        };
        InjectorStats {
            total_calls: self.total_calls,
            errors_injected: self.errors_injected,
            actual_rate,
            configured_rate: self.config.error_rate,
            enabled: self.config.enabled,
        }
    }
}
