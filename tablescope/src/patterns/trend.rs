//! Trend detection via simple linear regression.
//!
//! Numeric columns regress against days-since-first-date when the dataset has
//! a DateTime anchor column, or against row order otherwise. The anchored
//! variant accepts weaker fits because the x axis is physically meaningful.

use crate::profile::{TrendDirection, TrendInfo};

const R_SQUARED_ANCHORED: f64 = 0.3;
const SLOPE_ANCHORED: f64 = 0.001;
const R_SQUARED_ORDERED: f64 = 0.5;

/// Fits `y = a + b x` and reports a trend when the fit clears the threshold
/// for the anchoring mode. Returns `None` for flat or noisy columns.
pub fn detect_trend(points: &[(f64, f64)], time_anchored: bool) -> Option<TrendInfo> {
    if points.len() < 3 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut ss_xy = 0.0;
    let mut ss_xx = 0.0;
    let mut ss_yy = 0.0;
    for (x, y) in points {
        let dx = x - mean_x;
        let dy = y - mean_y;
        ss_xy += dx * dy;
        ss_xx += dx * dx;
        ss_yy += dy * dy;
    }

    if ss_xx == 0.0 || ss_yy == 0.0 {
        return None;
    }

    let slope = ss_xy / ss_xx;
    let r_squared = (ss_xy * ss_xy) / (ss_xx * ss_yy);

    let significant = if time_anchored {
        r_squared > R_SQUARED_ANCHORED || slope.abs() > SLOPE_ANCHORED
    } else {
        r_squared > R_SQUARED_ORDERED
    };
    if !significant {
        return None;
    }

    let direction = if slope > 0.0 {
        TrendDirection::Increasing
    } else if slope < 0.0 {
        TrendDirection::Decreasing
    } else {
        TrendDirection::None
    };

    Some(TrendInfo {
        direction,
        slope,
        r_squared,
        time_anchored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increasing_trend() {
        let points: Vec<(f64, f64)> = (0..100).map(|i| (i as f64, 2.0 * i as f64 + 1.0)).collect();
        let trend = detect_trend(&points, false).expect("perfect line is a trend");
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert!((trend.slope - 2.0).abs() < 1e-9);
        assert!((trend.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_decreasing_trend() {
        let points: Vec<(f64, f64)> = (0..50).map(|i| (i as f64, -0.5 * i as f64)).collect();
        let trend = detect_trend(&points, true).unwrap();
        assert_eq!(trend.direction, TrendDirection::Decreasing);
    }

    #[test]
    fn test_noise_is_no_trend_without_anchor() {
        // Alternating values have r² near zero.
        let points: Vec<(f64, f64)> = (0..100)
            .map(|i| (i as f64, if i % 2 == 0 { 1.0 } else { -1.0 }))
            .collect();
        assert!(detect_trend(&points, false).is_none());
    }

    #[test]
    fn test_anchored_accepts_weak_fit_with_material_slope() {
        // Slope above 0.001 passes with a DateTime anchor even when noisy.
        let points: Vec<(f64, f64)> = (0..100)
            .map(|i| {
                let noise = if i % 2 == 0 { 5.0 } else { -5.0 };
                (i as f64, 0.01 * i as f64 + noise)
            })
            .collect();
        assert!(detect_trend(&points, true).is_some());
        assert!(detect_trend(&points, false).is_none());
    }

    #[test]
    fn test_constant_column_has_no_trend() {
        let points: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 7.0)).collect();
        assert!(detect_trend(&points, true).is_none());
    }

    #[test]
    fn test_too_few_points() {
        assert!(detect_trend(&[(0.0, 1.0), (1.0, 2.0)], true).is_none());
    }
}
