//! Cross-run reliability comparison.
//!
//! Aggregates persisted test results per device kind and scores each kind
//! on a bounded [0, 100] scale. Two independent penalty terms reward low
//! dispersion and few outliers symmetrically; the constants are policy,
//! carried as `ScoreWeights` configuration rather than hard-coded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::analysis::stats;
use crate::device::DeviceKind;
use crate::storage::{ResultStore, StorageError, TestFilter, TestResult};

/// Scoring policy for the reliability score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Average std-dev is divided by this before penalizing.
    pub std_dev_divisor: f64,
    /// Average outlier count is multiplied by this before penalizing.
    pub outlier_factor: f64,
    /// Each penalty term is capped at this many points.
    pub penalty_cap: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            std_dev_divisor: 10.0,
            outlier_factor: 5.0,
            penalty_cap: 50.0,
        }
    }
}

/// Reliability score in [0, 100]: high for low dispersion and few outliers.
///
/// `score = 100 - min(avg_std_dev / d, cap) - min(avg_outliers * f, cap)`,
/// clamped at zero. Monotonically non-increasing in both inputs.
pub fn reliability_score(avg_std_dev: f64, avg_outliers: f64, weights: &ScoreWeights) -> f64 {
    let std_penalty = (avg_std_dev / weights.std_dev_divisor).min(weights.penalty_cap);
    let outlier_penalty = (avg_outliers * weights.outlier_factor).min(weights.penalty_cap);
    (100.0 - std_penalty - outlier_penalty).clamp(0.0, 100.0)
}

/// Flat per-test summary for explicit comparisons.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestSummary {
    pub test_id: String,
    pub device_kind: DeviceKind,
    pub timestamp: String,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub median: Option<f64>,
    pub outliers: usize,
    pub is_normal: bool,
}

/// Aggregate reliability summary for one device kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReliabilitySummary {
    pub test_count: usize,
    pub avg_mean: f64,
    pub avg_std_dev: f64,
    /// Population std-dev of per-test means: consistency across tests,
    /// not dispersion of raw samples.
    pub std_dev_of_means: f64,
    pub avg_outliers: f64,
    pub reliability_score: f64,
}

/// Error type for comparison operations.
#[derive(Debug, Clone)]
pub enum CompareError {
    /// An explicitly requested test id has no persisted result.
    NotFound(String),
    /// Underlying storage failure.
    Storage(StorageError),
}

impl std::fmt::Display for CompareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompareError::NotFound(test_id) => write!(f, "test result not found: {}", test_id),
            CompareError::Storage(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl std::error::Error for CompareError {}

impl From<StorageError> for CompareError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(test_id) => CompareError::NotFound(test_id),
            other => CompareError::Storage(other),
        }
    }
}

/// Comparator over a store of persisted test results.
pub struct Comparator {
    store: ResultStore,
    weights: ScoreWeights,
}

impl Comparator {
    pub fn new(store: ResultStore) -> Self {
        Self {
            store,
            weights: ScoreWeights::default(),
        }
    }

    /// Overrides the scoring policy.
    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Summarizes an explicit list of test ids.
    ///
    /// A missing id is a hard error, unlike the tolerant directory scan.
    pub fn compare(&self, test_ids: &[String]) -> Result<Vec<TestSummary>, CompareError> {
        let mut summaries = Vec::with_capacity(test_ids.len());
        for test_id in test_ids {
            let result = self.store.load(test_id)?;
            summaries.push(TestSummary {
                test_id: test_id.clone(),
                device_kind: result.metadata.device_kind,
                timestamp: result.metadata.timestamp.clone(),
                mean: result.analysis.mean,
                std_dev: result.analysis.std_dev,
                median: result.analysis.median,
                outliers: result.analysis.outliers_count,
                is_normal: result.analysis.is_normal_distribution,
            });
        }
        Ok(summaries)
    }

    /// Groups all discovered tests by device kind and scores each group.
    ///
    /// Tests whose analysis lacks mean or std-dev (gated out by the
    /// analysis allow-list) cannot contribute to the aggregates and are
    /// skipped with a warning.
    pub fn compare_by_kind(
        &self,
    ) -> Result<BTreeMap<DeviceKind, ReliabilitySummary>, CompareError> {
        let all = self.store.find(&TestFilter::default())?;

        let mut by_kind: BTreeMap<DeviceKind, Vec<&TestResult>> = BTreeMap::new();
        for result in &all {
            match (result.analysis.mean, result.analysis.std_dev) {
                (Some(_), Some(_)) => {
                    by_kind
                        .entry(result.metadata.device_kind)
                        .or_default()
                        .push(result);
                }
                _ => warn!(
                    "skipping {}: analysis lacks mean/std_dev aggregates",
                    result.metadata.test_id
                ),
            }
        }

        let mut comparison = BTreeMap::new();
        for (kind, tests) in by_kind {
            let means: Vec<f64> = tests.iter().filter_map(|t| t.analysis.mean).collect();
            let std_devs: Vec<f64> = tests.iter().filter_map(|t| t.analysis.std_dev).collect();
            let outliers: Vec<f64> = tests
                .iter()
                .map(|t| t.analysis.outliers_count as f64)
                .collect();

            let avg_std_dev = stats::mean(&std_devs);
            let avg_outliers = stats::mean(&outliers);

            comparison.insert(
                kind,
                ReliabilitySummary {
                    test_count: tests.len(),
                    avg_mean: stats::mean(&means),
                    avg_std_dev,
                    std_dev_of_means: stats::population_std_dev(&means),
                    avg_outliers,
                    reliability_score: reliability_score(avg_std_dev, avg_outliers, &self.weights),
                },
            );
        }

        Ok(comparison)
    }

    /// The device kind with the highest reliability score.
    ///
    /// Ties break lexicographically by kind name: the map iterates in
    /// name-independent kind order, and only a strictly greater score
    /// displaces the current best, so the lexicographically smallest name
    /// wins an exact tie.
    pub fn best_kind(&self) -> Result<Option<(DeviceKind, ReliabilitySummary)>, CompareError> {
        let comparison = self.compare_by_kind()?;

        let mut best: Option<(DeviceKind, ReliabilitySummary)> = None;
        for (kind, summary) in comparison {
            let replace = match &best {
                None => true,
                Some((best_kind, best_summary)) => {
                    summary.reliability_score > best_summary.reliability_score
                        || (summary.reliability_score == best_summary.reliability_score
                            && kind.as_str() < best_kind.as_str())
                }
            };
            if replace {
                best = Some((kind, summary));
            }
        }
        Ok(best)
    }

    /// Renders a text summary of all persisted results.
    pub fn summary_report(&self) -> Result<String, CompareError> {
        let all = self.store.find(&TestFilter::default())?;
        if all.is_empty() {
            return Ok("No test results found.".to_string());
        }

        let mut report = Vec::new();
        report.push("=".repeat(60));
        report.push("AMMETER TEST RESULTS SUMMARY".to_string());
        report.push("=".repeat(60));
        report.push(format!("\nTotal tests: {}", all.len()));

        let mut counts: BTreeMap<DeviceKind, usize> = BTreeMap::new();
        for result in &all {
            *counts.entry(result.metadata.device_kind).or_insert(0) += 1;
        }
        report.push("\nTests by device kind:".to_string());
        for (kind, count) in &counts {
            report.push(format!("  {}: {} tests", kind.as_str().to_uppercase(), count));
        }

        report.push(format!("\n{}", "-".repeat(60)));
        report.push("DEVICE KIND COMPARISON".to_string());
        report.push("-".repeat(60));

        let comparison = self.compare_by_kind()?;
        for (kind, summary) in &comparison {
            report.push(format!("\n{}:", kind.as_str().to_uppercase()));
            report.push(format!("  Average Mean Current: {:.2}A", summary.avg_mean));
            report.push(format!("  Average Std Dev: {:.2}A", summary.avg_std_dev));
            report.push(format!(
                "  Consistency (std of means): {:.2}A",
                summary.std_dev_of_means
            ));
            report.push(format!("  Average Outliers: {:.1}", summary.avg_outliers));
            report.push(format!(
                "  Reliability Score: {:.1}/100",
                summary.reliability_score
            ));
        }

        if let Some((kind, summary)) = self.best_kind()? {
            report.push(format!("\n{}", "-".repeat(60)));
            report.push(format!(
                "MOST RELIABLE: {} (Score: {:.1}/100)",
                kind.as_str().to_uppercase(),
                summary.reliability_score
            ));
            report.push("=".repeat(60));
        }

        Ok(report.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisResult;
    use crate::storage::{Measurement, TestMetadata};

    fn result_with(
        test_id: &str,
        kind: DeviceKind,
        mean: f64,
        std_dev: f64,
        outliers: usize,
    ) -> TestResult {
        TestResult {
            metadata: TestMetadata {
                test_id: test_id.to_string(),
                timestamp: format!("2026-08-0{}T10:00:00.000000", (outliers % 9) + 1),
                device_kind: kind,
                test_duration: 1.0,
                sampling_frequency: 10.0,
            },
            measurements: vec![Measurement {
                timestamp: 1_754_000_000.0,
                value: mean,
                test_id: test_id.to_string(),
            }],
            analysis: AnalysisResult {
                mean: Some(mean),
                median: Some(mean),
                std_dev: Some(std_dev),
                min: Some(mean - std_dev),
                max: Some(mean + std_dev),
                skewness: 0.0,
                kurtosis: 0.0,
                confidence_interval_95: (mean - 1.0, mean + 1.0),
                is_normal_distribution: true,
                outliers_count: outliers,
            },
        }
    }

    fn store_with(results: &[TestResult]) -> (tempfile::TempDir, ResultStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        for result in results {
            store.save(result).unwrap();
        }
        (dir, store)
    }

    #[test]
    fn scoring_scenario_yields_94_8() {
        let (_dir, store) = store_with(&[
            result_with("g1", DeviceKind::Greenlee, 5.0, 1.0, 0),
            result_with("g2", DeviceKind::Greenlee, 6.0, 2.0, 1),
            result_with("g3", DeviceKind::Greenlee, 7.0, 3.0, 2),
        ]);

        let comparison = Comparator::new(store).compare_by_kind().unwrap();
        let summary = &comparison[&DeviceKind::Greenlee];

        assert_eq!(summary.test_count, 3);
        assert!((summary.avg_std_dev - 2.0).abs() < 1e-12);
        assert!((summary.avg_outliers - 1.0).abs() < 1e-12);
        // Penalties: 2/10 = 0.2 and 1*5 = 5.
        assert!((summary.reliability_score - 94.8).abs() < 1e-9);
        assert!((summary.avg_mean - 6.0).abs() < 1e-12);
        // Population std of means [5, 6, 7].
        assert!((summary.std_dev_of_means - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn score_is_bounded_and_monotone() {
        let weights = ScoreWeights::default();

        assert_eq!(reliability_score(0.0, 0.0, &weights), 100.0);
        assert_eq!(reliability_score(1e9, 1e9, &weights), 0.0);

        let mut last = 100.0;
        for std_dev in [0.0, 1.0, 10.0, 100.0, 500.0, 1e6] {
            let score = reliability_score(std_dev, 0.0, &weights);
            assert!((0.0..=100.0).contains(&score));
            assert!(score <= last, "score must not increase with std_dev");
            last = score;
        }

        let mut last = 100.0;
        for outliers in [0.0, 0.5, 1.0, 5.0, 10.0, 100.0] {
            let score = reliability_score(0.0, outliers, &weights);
            assert!((0.0..=100.0).contains(&score));
            assert!(score <= last, "score must not increase with outliers");
            last = score;
        }
    }

    #[test]
    fn penalties_are_individually_capped() {
        let weights = ScoreWeights::default();
        // Huge dispersion alone cannot push the score below 50.
        assert_eq!(reliability_score(1e9, 0.0, &weights), 50.0);
        assert_eq!(reliability_score(0.0, 1e9, &weights), 50.0);
    }

    #[test]
    fn compare_returns_flat_summaries() {
        let (_dir, store) = store_with(&[
            result_with("a", DeviceKind::Greenlee, 5.0, 1.0, 0),
            result_with("b", DeviceKind::Entes, 60.0, 4.0, 2),
        ]);

        let summaries = Comparator::new(store)
            .compare(&["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].device_kind, DeviceKind::Greenlee);
        assert_eq!(summaries[1].outliers, 2);
        assert!(summaries[1].is_normal);
    }

    #[test]
    fn compare_with_missing_id_is_not_found() {
        let (_dir, store) = store_with(&[]);
        let err = Comparator::new(store)
            .compare(&["ghost".to_string()])
            .unwrap_err();
        assert!(matches!(err, CompareError::NotFound(_)));
    }

    #[test]
    fn best_kind_picks_highest_score() {
        let (_dir, store) = store_with(&[
            result_with("g", DeviceKind::Greenlee, 5.0, 30.0, 4),
            result_with("e", DeviceKind::Entes, 50.0, 1.0, 0),
            result_with("c", DeviceKind::Circutor, 0.05, 10.0, 2),
        ]);

        let (kind, summary) = Comparator::new(store).best_kind().unwrap().unwrap();
        assert_eq!(kind, DeviceKind::Entes);
        assert!((summary.reliability_score - 99.9).abs() < 1e-9);
    }

    #[test]
    fn best_kind_tie_breaks_lexicographically() {
        // Identical aggregates for all three kinds.
        let (_dir, store) = store_with(&[
            result_with("g", DeviceKind::Greenlee, 5.0, 1.0, 0),
            result_with("e", DeviceKind::Entes, 5.0, 1.0, 0),
            result_with("c", DeviceKind::Circutor, 5.0, 1.0, 0),
        ]);

        let (kind, _) = Comparator::new(store).best_kind().unwrap().unwrap();
        assert_eq!(kind, DeviceKind::Circutor, "circutor < entes < greenlee");
    }

    #[test]
    fn best_kind_on_empty_store_is_none() {
        let (_dir, store) = store_with(&[]);
        assert!(Comparator::new(store).best_kind().unwrap().is_none());
    }

    #[test]
    fn custom_weights_change_the_policy() {
        let weights = ScoreWeights {
            std_dev_divisor: 1.0,
            outlier_factor: 1.0,
            penalty_cap: 10.0,
        };
        assert_eq!(reliability_score(100.0, 100.0, &weights), 80.0);
    }

    #[test]
    fn summary_report_names_the_most_reliable_kind() {
        let (_dir, store) = store_with(&[
            result_with("g", DeviceKind::Greenlee, 5.0, 1.0, 0),
            result_with("e", DeviceKind::Entes, 50.0, 20.0, 3),
        ]);

        let report = Comparator::new(store).summary_report().unwrap();
        assert!(report.contains("Total tests: 2"));
        assert!(report.contains("MOST RELIABLE: GREENLEE"));
    }

    #[test]
    fn summary_report_on_empty_store() {
        let (_dir, store) = store_with(&[]);
        assert_eq!(
            Comparator::new(store).summary_report().unwrap(),
            "No test results found."
        );
    }
}
