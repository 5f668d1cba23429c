//! Distribution classification for numeric columns.
//!
//! Classification runs over the moment statistics already computed by the
//! profiler plus a 10-bucket histogram of sampled values for bimodality.

use crate::profile::DistributionKind;

const HISTOGRAM_BUCKETS: usize = 10;

/// Moment statistics needed for classification.
#[derive(Debug, Clone, Copy)]
pub struct DistributionStats {
    pub skewness: f64,
    pub kurtosis: f64,
    pub std_dev: f64,
    pub iqr: f64,
    pub min: f64,
    pub max: f64,
}

/// Classifies a numeric column's distribution family.
///
/// Requires `std_dev > 0`; degenerate columns stay [`DistributionKind::Unknown`].
/// Bimodality takes precedence over the moment rules that a well-separated
/// mixture also satisfies (its kurtosis drops below the uniform threshold).
pub fn classify_distribution(stats: &DistributionStats, samples: &[f64]) -> DistributionKind {
    if !(stats.std_dev > 0.0) || !stats.std_dev.is_finite() {
        return DistributionKind::Unknown;
    }

    let skew = stats.skewness;
    let kurt = stats.kurtosis;

    if skew.abs() < 0.5 && (kurt - 3.0).abs() < 1.0 {
        return DistributionKind::Normal;
    }
    if skew > 2.0 && kurt > 10.0 {
        return DistributionKind::PowerLaw;
    }
    if skew > 0.5 && kurt > 6.0 {
        return DistributionKind::Exponential;
    }
    if skew > 1.0 {
        return DistributionKind::RightSkewed;
    }
    if skew < -1.0 {
        return DistributionKind::LeftSkewed;
    }
    if is_bimodal(samples, stats.min, stats.max) {
        return DistributionKind::Bimodal;
    }

    let range = stats.max - stats.min;
    if range > 0.0 && kurt < 2.0 {
        let ratio = stats.iqr / range;
        if ratio > 0.4 && ratio < 0.6 {
            return DistributionKind::Uniform;
        }
    }

    DistributionKind::Unknown
}

/// Builds a fixed-width histogram over `[min, max]`.
pub fn histogram(samples: &[f64], min: f64, max: f64, buckets: usize) -> Vec<u64> {
    let mut counts = vec![0u64; buckets];
    let range = max - min;
    if range <= 0.0 || buckets == 0 {
        return counts;
    }
    for &v in samples {
        if !v.is_finite() {
            continue;
        }
        let idx = (((v - min) / range) * buckets as f64) as usize;
        counts[idx.min(buckets - 1)] += 1;
    }
    counts
}

/// Two strict local maxima in a 10-bucket histogram, separated by a real
/// valley, mark a bimodal column.
fn is_bimodal(samples: &[f64], min: f64, max: f64) -> bool {
    if samples.len() < HISTOGRAM_BUCKETS * 2 {
        return false;
    }
    let counts = histogram(samples, min, max, HISTOGRAM_BUCKETS);

    let mut peaks: Vec<usize> = Vec::new();
    for i in 1..counts.len() - 1 {
        if counts[i] > counts[i - 1] && counts[i] > counts[i + 1] {
            peaks.push(i);
        }
    }
    // Edge buckets count as peaks against their single neighbour.
    if counts.len() >= 2 && counts[0] > counts[1] {
        peaks.insert(0, 0);
    }
    if counts.len() >= 2 && counts[counts.len() - 1] > counts[counts.len() - 2] {
        peaks.push(counts.len() - 1);
    }

    if peaks.len() < 2 {
        return false;
    }

    // Pick the two tallest peaks and require a valley between them, so the
    // bucket noise of a flat distribution does not read as two modes.
    let mut by_height = peaks.clone();
    by_height.sort_by_key(|&i| std::cmp::Reverse(counts[i]));
    let (a, b) = (by_height[0].min(by_height[1]), by_height[0].max(by_height[1]));
    if b - a < 2 {
        return false;
    }
    let valley = counts[a + 1..b].iter().copied().min().unwrap_or(0);
    let smaller_peak = counts[a].min(counts[b]);
    smaller_peak > 0 && (valley as f64) < 0.8 * smaller_peak as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(skewness: f64, kurtosis: f64, iqr: f64, min: f64, max: f64) -> DistributionStats {
        DistributionStats {
            skewness,
            kurtosis,
            std_dev: 1.0,
            iqr,
            min,
            max,
        }
    }

    #[test]
    fn test_normal_classification() {
        let s = stats(0.1, 3.2, 1.3, -4.0, 4.0);
        assert_eq!(classify_distribution(&s, &[]), DistributionKind::Normal);
    }

    #[test]
    fn test_right_and_left_skew() {
        assert_eq!(
            classify_distribution(&stats(1.5, 4.0, 1.0, 0.0, 10.0), &[]),
            DistributionKind::RightSkewed
        );
        assert_eq!(
            classify_distribution(&stats(-1.5, 4.0, 1.0, 0.0, 10.0), &[]),
            DistributionKind::LeftSkewed
        );
    }

    #[test]
    fn test_exponential_and_power_law() {
        assert_eq!(
            classify_distribution(&stats(2.0, 9.0, 1.0, 0.0, 10.0), &[]),
            DistributionKind::Exponential
        );
        assert_eq!(
            classify_distribution(&stats(4.0, 30.0, 1.0, 0.0, 100.0), &[]),
            DistributionKind::PowerLaw
        );
    }

    #[test]
    fn test_uniform_classification() {
        // Uniform on [0, 1]: kurtosis 1.8, iqr/range 0.5, flat histogram.
        let samples: Vec<f64> = (0..1000).map(|i| i as f64 / 1000.0).collect();
        let s = stats(0.0, 1.8, 0.5, 0.0, 1.0);
        assert_eq!(
            classify_distribution(&s, &samples),
            DistributionKind::Uniform
        );
    }

    #[test]
    fn test_bimodal_mixture() {
        // Two tight clusters at 0 and 10; mixture kurtosis is platykurtic so
        // it reaches the bimodality check before the uniform rule.
        let mut samples = Vec::new();
        for i in 0..500 {
            samples.push((i % 100) as f64 / 100.0); // near 0
            samples.push(10.0 + (i % 100) as f64 / 100.0); // near 10
        }
        let s = stats(0.0, 1.2, 10.0, 0.0, 11.0);
        assert_eq!(
            classify_distribution(&s, &samples),
            DistributionKind::Bimodal
        );
    }

    #[test]
    fn test_zero_std_dev_is_unknown() {
        let mut s = stats(0.0, 3.0, 0.0, 5.0, 5.0);
        s.std_dev = 0.0;
        assert_eq!(classify_distribution(&s, &[]), DistributionKind::Unknown);
    }

    #[test]
    fn test_histogram_bounds() {
        let counts = histogram(&[0.0, 0.5, 1.0], 0.0, 1.0, 10);
        assert_eq!(counts.iter().sum::<u64>(), 3);
        assert_eq!(counts[9], 1); // max value lands in the last bucket
    }
}
