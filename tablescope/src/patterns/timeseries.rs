//! Time-series structure of DateTime columns: granularity, gaps, seasonality.
//!
//! The analysis runs over epoch-second timestamps fetched in ascending order.
//! Granularity comes from the median inter-row difference; gaps compare the
//! distinct truncated periods against the span's expected period count.

use crate::profile::{TimeGranularity, TimeSeriesInfo};

const CONTIGUOUS_GAP_PERCENT: f64 = 5.0;
const SEASONALITY_CV_THRESHOLD: f64 = 0.3;

const SECS_MINUTE: f64 = 60.0;
const SECS_HOUR: f64 = 3_600.0;
const SECS_DAY: f64 = 86_400.0;
const SECS_WEEK: f64 = 604_800.0;
// Mean month/quarter/year lengths.
const SECS_MONTH: f64 = 2_629_800.0;
const SECS_QUARTER: f64 = 7_889_400.0;
const SECS_YEAR: f64 = 31_557_600.0;

fn granularity_from_median_gap(median_gap_secs: f64) -> TimeGranularity {
    if median_gap_secs < 120.0 {
        TimeGranularity::Minute
    } else if median_gap_secs < 2.0 * SECS_HOUR {
        TimeGranularity::Hourly
    } else if median_gap_secs < 2.0 * SECS_DAY {
        TimeGranularity::Daily
    } else if median_gap_secs < 10.0 * SECS_DAY {
        TimeGranularity::Weekly
    } else if median_gap_secs < 60.0 * SECS_DAY {
        TimeGranularity::Monthly
    } else if median_gap_secs < 180.0 * SECS_DAY {
        TimeGranularity::Quarterly
    } else {
        TimeGranularity::Yearly
    }
}

fn period_seconds(granularity: TimeGranularity) -> f64 {
    match granularity {
        TimeGranularity::Minute => SECS_MINUTE,
        TimeGranularity::Hourly => SECS_HOUR,
        TimeGranularity::Daily => SECS_DAY,
        TimeGranularity::Weekly => SECS_WEEK,
        TimeGranularity::Monthly => SECS_MONTH,
        TimeGranularity::Quarterly => SECS_QUARTER,
        TimeGranularity::Yearly => SECS_YEAR,
    }
}

/// Coefficient of variation of per-day-of-week counts. High variation
/// suggests weekly seasonality (e.g. no weekend rows).
fn day_of_week_cv(timestamps: &[f64]) -> f64 {
    let mut counts = [0f64; 7];
    for &ts in timestamps {
        // Epoch day 0 (1970-01-01) was a Thursday.
        let day = (ts / SECS_DAY).floor() as i64;
        let dow = (day + 4).rem_euclid(7) as usize;
        counts[dow] += 1.0;
    }
    let mean = counts.iter().sum::<f64>() / 7.0;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / 7.0;
    variance.sqrt() / mean
}

/// Analyzes the structure of a sorted epoch-second series.
///
/// Returns `None` for series too short to carry structure (fewer than three
/// points or a zero span).
pub fn analyze_time_series(timestamps: &[f64], anchor_column: &str) -> Option<TimeSeriesInfo> {
    if timestamps.len() < 3 {
        return None;
    }

    let mut gaps: Vec<f64> = timestamps
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|d| *d > 0.0)
        .collect();
    if gaps.is_empty() {
        return None;
    }
    gaps.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median_gap = gaps[gaps.len() / 2];

    let granularity = granularity_from_median_gap(median_gap);
    let period = period_seconds(granularity);

    let first = timestamps[0];
    let last = timestamps[timestamps.len() - 1];
    let expected_periods = ((last - first) / period).floor() as i64 + 1;

    let mut distinct_periods: Vec<i64> = timestamps
        .iter()
        .map(|ts| (ts / period).floor() as i64)
        .collect();
    distinct_periods.sort_unstable();
    distinct_periods.dedup();
    let observed = distinct_periods.len() as i64;

    let gap_count = (expected_periods - observed).max(0);
    let gap_percent = if expected_periods > 0 {
        gap_count as f64 / expected_periods as f64 * 100.0
    } else {
        0.0
    };

    Some(TimeSeriesInfo {
        granularity,
        gap_count,
        gap_percent,
        is_contiguous: gap_percent < CONTIGUOUS_GAP_PERCENT,
        seasonality_suspected: day_of_week_cv(timestamps) > SEASONALITY_CV_THRESHOLD,
        anchor_column: anchor_column.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_series_is_contiguous() {
        let timestamps: Vec<f64> = (0..60).map(|i| i as f64 * SECS_DAY).collect();
        let info = analyze_time_series(&timestamps, "event_date").unwrap();
        assert_eq!(info.granularity, TimeGranularity::Daily);
        assert_eq!(info.gap_count, 0);
        assert!(info.is_contiguous);
        assert_eq!(info.anchor_column, "event_date");
    }

    #[test]
    fn test_gaps_detected() {
        // 30 daily rows, then a 30-day hole, then 30 more.
        let mut timestamps: Vec<f64> = (0..30).map(|i| i as f64 * SECS_DAY).collect();
        timestamps.extend((60..90).map(|i| i as f64 * SECS_DAY));
        let info = analyze_time_series(&timestamps, "ts").unwrap();
        assert_eq!(info.granularity, TimeGranularity::Daily);
        assert!(info.gap_count >= 29);
        assert!(!info.is_contiguous);
    }

    #[test]
    fn test_hourly_granularity() {
        let timestamps: Vec<f64> = (0..100).map(|i| i as f64 * SECS_HOUR).collect();
        let info = analyze_time_series(&timestamps, "ts").unwrap();
        assert_eq!(info.granularity, TimeGranularity::Hourly);
    }

    #[test]
    fn test_weekday_only_series_flags_seasonality() {
        // Rows only Monday..Friday for 20 weeks.
        let mut timestamps = Vec::new();
        for week in 0..20 {
            for dow in 0..5 {
                // Epoch day 4 was a Monday (1970-01-05).
                let day = 4 + week * 7 + dow;
                timestamps.push(day as f64 * SECS_DAY);
            }
        }
        let info = analyze_time_series(&timestamps, "ts").unwrap();
        assert!(info.seasonality_suspected);
    }

    #[test]
    fn test_uniform_daily_series_has_no_seasonality() {
        let timestamps: Vec<f64> = (0..70).map(|i| i as f64 * SECS_DAY).collect();
        let info = analyze_time_series(&timestamps, "ts").unwrap();
        assert!(!info.seasonality_suspected);
    }

    #[test]
    fn test_degenerate_series() {
        assert!(analyze_time_series(&[0.0, 0.0], "ts").is_none());
        assert!(analyze_time_series(&[0.0, 0.0, 0.0], "ts").is_none());
    }
}
