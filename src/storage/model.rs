//! Persisted result model.
//!
//! These types serialize field-for-field to the on-disk JSON record:
//! one file per test, keyed by test id, with `metadata`, `measurements`
//! and `analysis` sections. The metadata's device kind keeps its legacy
//! JSON name `ammeter_type` for compatibility with existing result files.

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisResult;
use crate::device::DeviceKind;

/// One timestamped sample.
///
/// Created by the sampling collector, immutable afterward. The timestamp
/// is Unix seconds assigned at dequeue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub timestamp: f64,
    pub value: f64,
    pub test_id: String,
}

/// Metadata describing one completed test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestMetadata {
    pub test_id: String,
    /// Zero-padded ISO 8601; the date prefix sorts lexicographically.
    pub timestamp: String,
    #[serde(rename = "ammeter_type")]
    pub device_kind: DeviceKind,
    pub test_duration: f64,
    pub sampling_frequency: f64,
}

/// A completed, analyzed test run. Persisted once, read-only afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub metadata: TestMetadata,
    pub measurements: Vec<Measurement>,
    pub analysis: AnalysisResult,
}

impl TestResult {
    /// Date portion (`YYYY-MM-DD`) of the metadata timestamp.
    pub fn date(&self) -> &str {
        self.metadata
            .timestamp
            .split('T')
            .next()
            .unwrap_or(&self.metadata.timestamp)
    }
}
