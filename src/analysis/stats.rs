//! Statistical primitives for measurement analysis.
//!
//! Quantiles use linear interpolation between order statistics (type 7 in
//! Hyndman & Fan 1996) — outlier counts are sensitive to the quantile
//! method, so the choice is fixed and documented here. Skewness and
//! kurtosis are the biased moment estimators g1 and g2. The normality
//! verdict uses the D'Agostino–Pearson omnibus test (D'Agostino 1971;
//! Anscombe & Glynn 1983), which combines the skewness and kurtosis
//! Z-transforms into a chi-square statistic with two degrees of freedom.
//!
//! # Reference
//!
//! Hyndman, R. J. & Fan, Y. (1996). "Sample quantiles in statistical
//! packages." The American Statistician 50(4):361–365.

use statrs::distribution::{ContinuousCDF, StudentsT};

/// Arithmetic mean. Caller guarantees a non-empty slice.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (denominator n).
pub fn population_variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

/// Population standard deviation (denominator n).
pub fn population_std_dev(values: &[f64]) -> f64 {
    population_variance(values).sqrt()
}

/// Sample standard deviation (denominator n-1). Caller guarantees n >= 2.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    let ss = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Median of a sorted slice.
pub fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Type 7 quantile (linear interpolation) of a sorted slice, p in [0, 1].
///
/// `h = (n - 1) * p`; the result interpolates between the order statistics
/// at `floor(h)` and `floor(h) + 1`.
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = h - h.floor();
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Biased skewness g1 = m3 / m2^(3/2).
///
/// Zero-variance input yields 0.0 (no asymmetry in a constant sample)
/// rather than a NaN that would poison persisted results.
pub fn skewness(values: &[f64]) -> f64 {
    let m = mean(values);
    let n = values.len() as f64;
    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
    if m2 == 0.0 {
        return 0.0;
    }
    let m3 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / n;
    m3 / m2.powf(1.5)
}

/// Biased excess kurtosis g2 = m4 / m2^2 - 3.
///
/// Zero-variance input yields 0.0, same rationale as `skewness`.
pub fn excess_kurtosis(values: &[f64]) -> f64 {
    let m = mean(values);
    let n = values.len() as f64;
    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
    if m2 == 0.0 {
        return 0.0;
    }
    let m4 = values.iter().map(|v| (v - m).powi(4)).sum::<f64>() / n;
    m4 / (m2 * m2) - 3.0
}

/// Two-sided 97.5% critical value of Student's t with `df` degrees of
/// freedom, for the 95% confidence interval of the mean.
pub fn t_critical_975(df: f64) -> Option<f64> {
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    Some(dist.inverse_cdf(0.975))
}

/// Minimum sample size for the D'Agostino–Pearson test.
///
/// The skewness Z-transform is undefined below this; smaller samples get
/// no p-value.
pub const NORMALITY_MIN_SAMPLES: usize = 8;

/// P-value of the D'Agostino–Pearson omnibus normality test.
///
/// Returns `None` for fewer than `NORMALITY_MIN_SAMPLES` values or a
/// zero-variance sample, where the test statistic is undefined.
pub fn normality_p_value(values: &[f64]) -> Option<f64> {
    if values.len() < NORMALITY_MIN_SAMPLES {
        return None;
    }
    if population_variance(values) == 0.0 {
        return None;
    }

    let z_skew = skewtest_z(values);
    let z_kurt = kurtosistest_z(values);
    let k2 = z_skew * z_skew + z_kurt * z_kurt;

    // Chi-square survival function with two degrees of freedom.
    Some((-k2 / 2.0).exp())
}

/// Skewness Z-transform (D'Agostino 1971).
fn skewtest_z(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let b1 = skewness(values);

    let y = b1 * ((n + 1.0) * (n + 3.0) / (6.0 * (n - 2.0))).sqrt();
    let beta2 = 3.0 * (n * n + 27.0 * n - 70.0) * (n + 1.0) * (n + 3.0)
        / ((n - 2.0) * (n + 5.0) * (n + 7.0) * (n + 9.0));
    let w2 = -1.0 + (2.0 * (beta2 - 1.0)).sqrt();
    let delta = 1.0 / (0.5 * w2.ln()).sqrt();
    let alpha = (2.0 / (w2 - 1.0)).sqrt();

    let t = y / alpha;
    // asinh(t), expressed explicitly.
    delta * (t + (t * t + 1.0).sqrt()).ln()
}

/// Kurtosis Z-transform (Anscombe & Glynn 1983).
fn kurtosistest_z(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let b2 = excess_kurtosis(values) + 3.0;

    let expected = 3.0 * (n - 1.0) / (n + 1.0);
    let variance =
        24.0 * n * (n - 2.0) * (n - 3.0) / ((n + 1.0) * (n + 1.0) * (n + 3.0) * (n + 5.0));
    let x = (b2 - expected) / variance.sqrt();

    let sqrt_beta1 = 6.0 * (n * n - 5.0 * n + 2.0) / ((n + 7.0) * (n + 9.0))
        * (6.0 * (n + 3.0) * (n + 5.0) / (n * (n - 2.0) * (n - 3.0))).sqrt();
    let a = 6.0
        + 8.0 / sqrt_beta1 * (2.0 / sqrt_beta1 + (1.0 + 4.0 / (sqrt_beta1 * sqrt_beta1)).sqrt());

    let denom = 1.0 + x * (2.0 / (a - 4.0)).sqrt();
    let term = if denom == 0.0 {
        f64::INFINITY
    } else {
        denom.signum() * ((1.0 - 2.0 / a) / denom.abs()).cbrt()
    };

    (1.0 - 2.0 / (9.0 * a) - term) / (2.0 / (9.0 * a)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{} vs {} (tol {})", a, b, tol);
    }

    #[test]
    fn mean_and_std_of_known_data() {
        let values = [10.0, 12.0, 14.0, 16.0, 18.0];
        assert_close(mean(&values), 14.0, 1e-12);
        assert_close(population_std_dev(&values), 8.0_f64.sqrt(), 1e-12);
        assert_close(sample_std_dev(&values), 10.0_f64.sqrt(), 1e-12);
    }

    #[test]
    fn median_handles_odd_and_even_lengths() {
        assert_eq!(median(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), 2.5);
        assert_eq!(median(&[5.0]), 5.0);
    }

    #[test]
    fn type7_quantiles_interpolate_linearly() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0];
        // h = 5 * 0.25 = 1.25 -> 2 + 0.25 * (3 - 2)
        assert_close(quantile(&sorted, 0.25), 2.25, 1e-12);
        // h = 5 * 0.75 = 3.75 -> 4 + 0.75 * (5 - 4)
        assert_close(quantile(&sorted, 0.75), 4.75, 1e-12);
        assert_eq!(quantile(&sorted, 0.0), 1.0);
        assert_eq!(quantile(&sorted, 1.0), 100.0);
        assert_eq!(quantile(&[7.0], 0.5), 7.0);
    }

    #[test]
    fn skewness_of_symmetric_data_is_zero() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_close(skewness(&values), 0.0, 1e-12);
    }

    #[test]
    fn skewness_flags_right_tail() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0];
        assert!(skewness(&values) > 1.5);
    }

    #[test]
    fn kurtosis_of_uniform_grid_is_platykurtic() {
        // Excess kurtosis of an evenly spaced grid approaches -1.2.
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        let k = excess_kurtosis(&values);
        assert!(k < -1.0 && k > -1.4, "kurtosis={}", k);
    }

    #[test]
    fn zero_variance_moments_are_finite() {
        let values = [3.0, 3.0, 3.0, 3.0];
        assert_eq!(skewness(&values), 0.0);
        assert_eq!(excess_kurtosis(&values), 0.0);
        assert!(normality_p_value(&[3.0; 20]).is_none());
    }

    #[test]
    fn t_critical_matches_tabulated_values() {
        // Standard two-sided 95% critical values.
        assert_close(t_critical_975(4.0).unwrap(), 2.7764, 1e-3);
        assert_close(t_critical_975(5.0).unwrap(), 2.5706, 1e-3);
        assert_close(t_critical_975(19.0).unwrap(), 2.0930, 1e-3);
        assert!(t_critical_975(0.0).is_none());
    }

    #[test]
    fn normality_rejects_extreme_outlier() {
        let values = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 100.0];
        let p = normality_p_value(&values).unwrap();
        assert!(p < 0.05, "p={}", p);
    }

    #[test]
    fn normality_accepts_bell_shaped_sample() {
        // Symmetric, roughly binomial-shaped sample.
        let values = [
            1.0, 2.0, 2.0, 3.0, 3.0, 3.0, 4.0, 4.0, 4.0, 4.0, 5.0, 5.0, 5.0, 6.0, 6.0, 7.0,
        ];
        let p = normality_p_value(&values).unwrap();
        assert!(p > 0.05, "p={}", p);
    }

    #[test]
    fn normality_needs_enough_samples() {
        assert!(normality_p_value(&[1.0, 2.0, 3.0]).is_none());
        assert!(normality_p_value(&[1.0; 7]).is_none());
    }
}
