//! Statistical analysis of completed sample sets.
//!
//! `Analyzer::analyze` is a pure function of the measurement values:
//! descriptive statistics gated by a configured allow-list, plus advanced
//! statistics that are always computed (skewness, excess kurtosis, a 95%
//! t-interval for the mean, a normality verdict and a Tukey-fence outlier
//! census). See `stats` for the underlying methods and their references.

pub mod stats;

use serde::{Deserialize, Serialize};

use crate::storage::model::Measurement;

/// Tukey fence multiplier for the outlier census.
const TUKEY_FENCE_FACTOR: f64 = 1.5;

/// Descriptive metrics that can be enabled through the allow-list.
const KNOWN_METRICS: [&str; 5] = ["mean", "median", "std_dev", "min", "max"];

/// Analysis configuration.
///
/// `statistical_metrics` is the allow-list of descriptive metrics to
/// compute; advanced statistics are not gated. Defaults to all known
/// metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_metrics")]
    pub statistical_metrics: Vec<String>,
}

fn default_metrics() -> Vec<String> {
    KNOWN_METRICS.iter().map(|m| m.to_string()).collect()
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            statistical_metrics: default_metrics(),
        }
    }
}

impl AnalysisConfig {
    fn wants(&self, metric: &str) -> bool {
        self.statistical_metrics.iter().any(|m| m == metric)
    }
}

/// Result of analyzing one sample set.
///
/// Descriptive fields are `None` (and omitted from JSON) when the
/// allow-list excluded them. All contained numbers are finite; degenerate
/// inputs surface as `AnalysisError` instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    pub skewness: f64,
    pub kurtosis: f64,
    /// Serialized as a `[low, high]` array.
    pub confidence_interval_95: (f64, f64),
    pub is_normal_distribution: bool,
    pub outliers_count: usize,
}

impl Default for AnalysisResult {
    fn default() -> Self {
        Self {
            mean: None,
            median: None,
            std_dev: None,
            min: None,
            max: None,
            skewness: 0.0,
            kurtosis: 0.0,
            confidence_interval_95: (0.0, 0.0),
            is_normal_distribution: false,
            outliers_count: 0,
        }
    }
}

/// Error type for analysis failures.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Variance-dependent statistics are undefined below two samples.
    InsufficientSamples { needed: usize, got: usize },
    /// A statistic degenerated to a non-finite value.
    Degenerate(String),
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisError::InsufficientSamples { needed, got } => write!(
                f,
                "insufficient samples for analysis: need at least {}, got {}",
                needed, got
            ),
            AnalysisError::Degenerate(msg) => write!(f, "degenerate statistic: {}", msg),
        }
    }
}

impl std::error::Error for AnalysisError {}

/// Statistical analyzer for measurement sets.
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Analyzes a completed measurement set.
    ///
    /// Requires at least two measurements; fewer make the standard error
    /// and t-interval undefined and yield an explicit error rather than a
    /// silently wrong number.
    pub fn analyze(&self, measurements: &[Measurement]) -> Result<AnalysisResult, AnalysisError> {
        let values: Vec<f64> = measurements.iter().map(|m| m.value).collect();
        self.analyze_values(&values)
    }

    /// Analyzes raw values. Same contract as `analyze`.
    pub fn analyze_values(&self, values: &[f64]) -> Result<AnalysisResult, AnalysisError> {
        let n = values.len();
        if n < 2 {
            return Err(AnalysisError::InsufficientSamples { needed: 2, got: n });
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mean = stats::mean(values);

        // 95% confidence interval for the mean: t-distribution with n-1
        // degrees of freedom and the standard error of the mean.
        let std_err = stats::sample_std_dev(values) / (n as f64).sqrt();
        let t = stats::t_critical_975((n - 1) as f64)
            .ok_or_else(|| AnalysisError::Degenerate("t critical value".to_string()))?;
        let half_width = t * std_err;
        let ci = (mean - half_width, mean + half_width);
        if !ci.0.is_finite() || !ci.1.is_finite() {
            return Err(AnalysisError::Degenerate(
                "confidence interval is not finite".to_string(),
            ));
        }

        // Failure to reject normality, not proof of it. Samples too small
        // for the omnibus test get a conservative false.
        let is_normal = stats::normality_p_value(values)
            .map(|p| p > 0.05)
            .unwrap_or(false);

        Ok(AnalysisResult {
            mean: self.config.wants("mean").then_some(mean),
            median: self
                .config
                .wants("median")
                .then(|| stats::median(&sorted)),
            std_dev: self
                .config
                .wants("std_dev")
                .then(|| stats::population_std_dev(values)),
            min: self.config.wants("min").then_some(sorted[0]),
            max: self.config.wants("max").then_some(sorted[n - 1]),
            skewness: stats::skewness(values),
            kurtosis: stats::excess_kurtosis(values),
            confidence_interval_95: ci,
            is_normal_distribution: is_normal,
            outliers_count: count_outliers(&sorted),
        })
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

/// Counts values outside the Tukey fences of a sorted slice.
///
/// Outliers are counted, never removed.
fn count_outliers(sorted: &[f64]) -> usize {
    let q1 = stats::quantile(sorted, 0.25);
    let q3 = stats::quantile(sorted, 0.75);
    let iqr = q3 - q1;
    let lower = q1 - TUKEY_FENCE_FACTOR * iqr;
    let upper = q3 + TUKEY_FENCE_FACTOR * iqr;
    sorted.iter().filter(|v| **v < lower || **v > upper).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{} vs {} (tol {})", a, b, tol);
    }

    #[test]
    fn outlier_census_flags_the_lone_extreme() {
        let analyzer = Analyzer::default();
        let result = analyzer
            .analyze_values(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0])
            .unwrap();
        // Type 7 quantiles: Q1=2.25, Q3=4.75, IQR=2.5, upper fence 8.5.
        assert_eq!(result.outliers_count, 1);
    }

    #[test]
    fn descriptive_stats_match_known_data() {
        let analyzer = Analyzer::default();
        let result = analyzer
            .analyze_values(&[10.0, 12.0, 14.0, 16.0, 18.0])
            .unwrap();
        assert_close(result.mean.unwrap(), 14.0, 1e-12);
        assert_close(result.median.unwrap(), 14.0, 1e-12);
        assert_close(result.std_dev.unwrap(), 8.0_f64.sqrt(), 1e-12);
        assert_eq!(result.min.unwrap(), 10.0);
        assert_eq!(result.max.unwrap(), 18.0);
        assert_eq!(result.outliers_count, 0);
    }

    #[test]
    fn confidence_interval_matches_t_table() {
        let analyzer = Analyzer::default();
        let result = analyzer
            .analyze_values(&[10.0, 12.0, 14.0, 16.0, 18.0])
            .unwrap();
        // mean 14, se = sqrt(10)/sqrt(5), t(4) = 2.7764
        let (low, high) = result.confidence_interval_95;
        assert_close(low, 10.074, 1e-2);
        assert_close(high, 17.926, 1e-2);
    }

    #[test]
    fn allow_list_gates_descriptive_stats() {
        let analyzer = Analyzer::new(AnalysisConfig {
            statistical_metrics: vec!["mean".to_string(), "max".to_string()],
        });
        let result = analyzer.analyze_values(&[1.0, 2.0, 3.0]).unwrap();
        assert!(result.mean.is_some());
        assert!(result.max.is_some());
        assert!(result.median.is_none());
        assert!(result.std_dev.is_none());
        assert!(result.min.is_none());
        // Advanced stats are never gated.
        assert!(result.confidence_interval_95.0.is_finite());
    }

    #[test]
    fn too_few_samples_is_an_explicit_error() {
        let analyzer = Analyzer::default();
        assert_eq!(
            analyzer.analyze_values(&[]),
            Err(AnalysisError::InsufficientSamples { needed: 2, got: 0 })
        );
        assert_eq!(
            analyzer.analyze_values(&[1.0]),
            Err(AnalysisError::InsufficientSamples { needed: 2, got: 1 })
        );
    }

    #[test]
    fn zero_variance_input_stays_finite() {
        let analyzer = Analyzer::default();
        let result = analyzer.analyze_values(&[5.0; 10]).unwrap();
        assert_eq!(result.skewness, 0.0);
        assert_eq!(result.kurtosis, 0.0);
        assert_eq!(result.confidence_interval_95, (5.0, 5.0));
        assert!(!result.is_normal_distribution);
        assert_eq!(result.outliers_count, 0);
    }

    #[test]
    fn normality_verdict_tracks_the_omnibus_test() {
        let analyzer = Analyzer::default();
        let skewed = analyzer
            .analyze_values(&[1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 100.0])
            .unwrap();
        assert!(!skewed.is_normal_distribution);

        let bell = analyzer
            .analyze_values(&[
                1.0, 2.0, 2.0, 3.0, 3.0, 3.0, 4.0, 4.0, 4.0, 4.0, 5.0, 5.0, 5.0, 6.0, 6.0, 7.0,
            ])
            .unwrap();
        assert!(bell.is_normal_distribution);
    }

    #[test]
    fn small_samples_get_a_conservative_normality_verdict() {
        let analyzer = Analyzer::default();
        let result = analyzer.analyze_values(&[1.0, 2.0, 3.0]).unwrap();
        assert!(!result.is_normal_distribution);
    }

    #[test]
    fn result_json_round_trips() {
        let analyzer = Analyzer::default();
        let result = analyzer
            .analyze_values(&[1.5, 2.5, 3.5, 4.5, 5.5, 6.5, 7.5, 8.5])
            .unwrap();
        let json = serde_json::to_string(&result).unwrap();
        let back: AnalysisResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result, back);
    }

    #[test]
    fn gated_metrics_are_omitted_from_json() {
        let analyzer = Analyzer::new(AnalysisConfig {
            statistical_metrics: vec!["mean".to_string()],
        });
        let result = analyzer.analyze_values(&[1.0, 2.0, 3.0]).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("mean").is_some());
        assert!(json.get("median").is_none());
        assert!(json["confidence_interval_95"].is_array());
    }
}
