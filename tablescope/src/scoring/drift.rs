//! Drift scoring between two profiles sharing a schema.
//!
//! The score is driven by the most-drifted column: a dataset where one column
//! moved a full standard deviation has drifted even if twenty others held
//! still. Mean movement is measured in baseline standard deviations.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::profile::DataProfile;

const WEIGHT_MEAN: f64 = 0.6;
const WEIGHT_STD: f64 = 0.2;
const WEIGHT_NULL: f64 = 0.1;
const WEIGHT_UNIQUE: f64 = 0.1;

/// Drift contribution of one column, in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDelta {
    pub column: String,
    pub delta: f64,
    /// Mean shift in baseline standard deviations, for numeric columns.
    pub mean_z: Option<f64>,
}

/// Result of comparing a current profile against its baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    /// Largest column delta, in [0, 1].
    pub drift_score: f64,
    pub column_deltas: Vec<ColumnDelta>,
    /// Columns present in only one of the two profiles.
    pub unmatched_columns: Vec<String>,
}

/// Computes simple column-delta drift between two profiles.
#[derive(Debug, Clone, Default)]
pub struct ValidationService;

impl ValidationService {
    pub fn new() -> Self {
        Self
    }

    /// Compares `current` against `baseline`. Columns are matched
    /// case-insensitively; unmatched columns are listed but do not score.
    #[instrument(skip(self, current, baseline))]
    pub fn drift(&self, current: &DataProfile, baseline: &DataProfile) -> DriftReport {
        let mut column_deltas = Vec::new();
        let mut unmatched = Vec::new();

        for cur in &current.columns {
            let Some(base) = baseline.column(&cur.name) else {
                unmatched.push(cur.name.clone());
                continue;
            };

            let null_delta = (cur.null_percent - base.null_percent).abs() / 100.0;
            let unique_delta = (cur.unique_percent - base.unique_percent).abs() / 100.0;

            let (delta, mean_z) = match (cur.mean, base.mean, base.std_dev) {
                (Some(cur_mean), Some(base_mean), Some(base_std)) if base_std > 0.0 => {
                    let z = ((cur_mean - base_mean) / base_std).abs();
                    let std_rel = match (cur.std_dev, base.std_dev) {
                        (Some(cs), Some(bs)) if bs > 0.0 => ((cs - bs) / bs).abs().min(1.0),
                        _ => 0.0,
                    };
                    let delta = WEIGHT_MEAN * z.min(1.0)
                        + WEIGHT_STD * std_rel
                        + WEIGHT_NULL * null_delta
                        + WEIGHT_UNIQUE * unique_delta;
                    (delta, Some(z))
                }
                _ => {
                    let delta = 0.5 * null_delta + 0.5 * unique_delta;
                    (delta, None)
                }
            };

            column_deltas.push(ColumnDelta {
                column: cur.name.clone(),
                delta: delta.clamp(0.0, 1.0),
                mean_z,
            });
        }

        for base in &baseline.columns {
            if current.column(&base.name).is_none() {
                unmatched.push(base.name.clone());
            }
        }

        let drift_score = column_deltas
            .iter()
            .map(|d| d.delta)
            .fold(0.0, f64::max)
            .clamp(0.0, 1.0);

        DriftReport {
            drift_score,
            column_deltas,
            unmatched_columns: unmatched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ColumnProfile, ColumnType};
    use std::time::Duration;

    fn numeric_column(name: &str, mean: f64, std: f64) -> ColumnProfile {
        let mut col = ColumnProfile::minimal(name, ColumnType::Numeric, 1000);
        col.mean = Some(mean);
        col.std_dev = Some(std);
        col.unique_count = 900;
        col.unique_percent = 90.0;
        col
    }

    fn profile_of(columns: Vec<ColumnProfile>) -> DataProfile {
        DataProfile {
            source_path: "p.csv".into(),
            row_count: 1000,
            column_count: columns.len(),
            profile_time: Duration::from_millis(1),
            columns,
            alerts: vec![],
            correlations: vec![],
            insights: vec![],
        }
    }

    #[test]
    fn test_identical_profiles_have_zero_drift() {
        let a = profile_of(vec![numeric_column("price", 10.0, 2.0)]);
        let report = ValidationService::new().drift(&a, &a.clone());
        assert_eq!(report.drift_score, 0.0);
        assert!(report.unmatched_columns.is_empty());
    }

    #[test]
    fn test_one_sigma_mean_shift_scores_at_least_point_six() {
        let baseline = profile_of(vec![
            numeric_column("price", 10.0, 2.0),
            numeric_column("qty", 5.0, 1.0),
        ]);
        let current = profile_of(vec![
            numeric_column("price", 12.0, 2.0), // exactly one sigma
            numeric_column("qty", 5.0, 1.0),
        ]);

        let report = ValidationService::new().drift(&current, &baseline);
        assert!(report.drift_score >= 0.6, "got {}", report.drift_score);
        let price = report
            .column_deltas
            .iter()
            .find(|d| d.column == "price")
            .unwrap();
        assert!((price.mean_z.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unmatched_columns_reported() {
        let baseline = profile_of(vec![numeric_column("a", 0.0, 1.0)]);
        let current = profile_of(vec![numeric_column("b", 0.0, 1.0)]);
        let report = ValidationService::new().drift(&current, &baseline);
        assert_eq!(report.unmatched_columns.len(), 2);
        assert_eq!(report.drift_score, 0.0);
    }

    #[test]
    fn test_case_insensitive_matching() {
        let baseline = profile_of(vec![numeric_column("Price", 10.0, 2.0)]);
        let current = profile_of(vec![numeric_column("price", 10.0, 2.0)]);
        let report = ValidationService::new().drift(&current, &baseline);
        assert!(report.unmatched_columns.is_empty());
    }

    #[test]
    fn test_non_numeric_columns_use_null_and_unique_deltas() {
        let mut base_col = ColumnProfile::minimal("label", ColumnType::Categorical, 100);
        base_col.null_percent = 0.0;
        base_col.unique_percent = 10.0;
        let mut cur_col = base_col.clone();
        cur_col.null_percent = 40.0;

        let report = ValidationService::new().drift(
            &profile_of(vec![cur_col]),
            &profile_of(vec![base_col]),
        );
        assert!((report.drift_score - 0.2).abs() < 1e-9);
    }
}
