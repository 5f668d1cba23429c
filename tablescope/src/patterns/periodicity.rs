//! Periodicity detection via autocorrelation.
//!
//! The ACF runs over at most 500 samples for lags 1..=60. Lags whose
//! autocorrelation is a strict local maximum above 0.2 are candidate periods;
//! the strongest becomes the dominant period.

use crate::profile::PeriodicityInfo;

const MAX_SAMPLES: usize = 500;
const MAX_LAG: usize = 60;
const PEAK_THRESHOLD: f64 = 0.2;

/// Computes the autocorrelation of `values` at `lag`.
pub fn autocorrelation(values: &[f64], lag: usize) -> f64 {
    let n = values.len();
    if lag >= n {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    if variance == 0.0 {
        return 0.0;
    }
    let covariance: f64 = (0..n - lag)
        .map(|i| (values[i] - mean) * (values[i + lag] - mean))
        .sum();
    covariance / variance
}

fn interpret_period(period: usize) -> String {
    match period {
        7 => "Weekly".to_string(),
        12 => "Monthly".to_string(),
        24 => "Hourly".to_string(),
        52 => "Yearly (weekly data)".to_string(),
        365 => "Yearly (daily data)".to_string(),
        other => format!("Every {other} observations"),
    }
}

/// Detects the dominant period of a numeric series, if any.
pub fn detect_periodicity(values: &[f64]) -> Option<PeriodicityInfo> {
    let samples: &[f64] = if values.len() > MAX_SAMPLES {
        &values[..MAX_SAMPLES]
    } else {
        values
    };
    if samples.len() < 8 {
        return None;
    }

    let max_lag = MAX_LAG.min(samples.len() / 2);
    let acf: Vec<f64> = (0..=max_lag)
        .map(|lag| autocorrelation(samples, lag))
        .collect();

    let mut best: Option<(usize, f64)> = None;
    for lag in 1..max_lag {
        let value = acf[lag];
        if value <= PEAK_THRESHOLD {
            continue;
        }
        // Strict local maximum against neighbouring lags.
        if value > acf[lag - 1] && value > acf[lag + 1] {
            match best {
                Some((_, best_value)) if best_value >= value => {}
                _ => best = Some((lag, value)),
            }
        }
    }

    best.map(|(dominant_period, acf_value)| PeriodicityInfo {
        dominant_period,
        confidence: acf_value.clamp(0.0, 1.0),
        interpretation: interpret_period(dominant_period),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekly_cycle_detected() {
        // A strong 7-sample cycle.
        let values: Vec<f64> = (0..200)
            .map(|i| (2.0 * std::f64::consts::PI * i as f64 / 7.0).sin())
            .collect();
        let info = detect_periodicity(&values).expect("cycle expected");
        assert_eq!(info.dominant_period, 7);
        assert_eq!(info.interpretation, "Weekly");
        assert!(info.confidence > 0.5);
    }

    #[test]
    fn test_no_periodicity_in_monotonic_series() {
        // A line autocorrelates everywhere with no strict interior peak.
        let values: Vec<f64> = (0..100).map(|i| i as f64).collect();
        assert!(detect_periodicity(&values).is_none());
    }

    #[test]
    fn test_constant_series() {
        let values = vec![5.0; 100];
        assert!(detect_periodicity(&values).is_none());
    }

    #[test]
    fn test_too_short_series() {
        assert!(detect_periodicity(&[1.0, 2.0, 1.0]).is_none());
    }

    #[test]
    fn test_autocorrelation_lag_zero_is_one() {
        let values: Vec<f64> = (0..50).map(|i| (i as f64).sin()).collect();
        assert!((autocorrelation(&values, 0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_interpretation_labels() {
        assert_eq!(interpret_period(12), "Monthly");
        assert_eq!(interpret_period(24), "Hourly");
        assert_eq!(interpret_period(5), "Every 5 observations");
    }
}
