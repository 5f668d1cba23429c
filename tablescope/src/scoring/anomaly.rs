//! Anomaly scoring over a finished profile.
//!
//! Six component scores combine into an overall score in [0, 1]. Each
//! component is clipped to [0, 1] before weighting, so one pathological
//! dimension cannot push the overall score out of range.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::profile::{AlertSeverity, ColumnType, DataProfile};

const WEIGHT_DATA_QUALITY: f64 = 0.25;
const WEIGHT_NULL_RATE: f64 = 0.15;
const WEIGHT_OUTLIERS: f64 = 0.20;
const WEIGHT_DISTRIBUTION: f64 = 0.15;
const WEIGHT_CARDINALITY: f64 = 0.10;
const WEIGHT_SCHEMA: f64 = 0.15;

/// The six component scores, each in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub data_quality: f64,
    pub null_rate: f64,
    pub outliers: f64,
    pub distribution: f64,
    pub cardinality: f64,
    pub schema: f64,
}

/// The combined anomaly assessment of one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyScoreResult {
    /// Weighted combination of the components, in [0, 1]. Lower is better.
    pub overall_score: f64,
    pub components: ComponentScores,
    pub interpretation: String,
    pub recommendations: Vec<String>,
}

/// Computes anomaly scores from finished profiles.
#[derive(Debug, Clone, Default)]
pub struct AnomalyScorer;

impl AnomalyScorer {
    pub fn new() -> Self {
        Self
    }

    /// Scores a profile. Deterministic: identical profiles produce identical
    /// scores and recommendations.
    #[instrument(skip(self, profile), fields(source = %profile.source_path))]
    pub fn score(&self, profile: &DataProfile) -> AnomalyScoreResult {
        let components = ComponentScores {
            data_quality: data_quality_score(profile),
            null_rate: null_rate_score(profile),
            outliers: outlier_score(profile),
            distribution: distribution_score(profile),
            cardinality: cardinality_score(profile),
            schema: schema_score(profile),
        };

        let overall_score = (WEIGHT_DATA_QUALITY * components.data_quality
            + WEIGHT_NULL_RATE * components.null_rate
            + WEIGHT_OUTLIERS * components.outliers
            + WEIGHT_DISTRIBUTION * components.distribution
            + WEIGHT_CARDINALITY * components.cardinality
            + WEIGHT_SCHEMA * components.schema)
            .clamp(0.0, 1.0);

        AnomalyScoreResult {
            overall_score,
            interpretation: interpret(overall_score).to_string(),
            recommendations: recommend(profile, &components),
            components,
        }
    }
}

fn clip(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Error alerts weigh full, warnings half, normalized by column count.
fn data_quality_score(profile: &DataProfile) -> f64 {
    if profile.column_count == 0 {
        return 0.0;
    }
    let weighted: f64 = profile
        .alerts
        .iter()
        .map(|a| match a.severity {
            AlertSeverity::Error => 1.0,
            AlertSeverity::Warning => 0.5,
            AlertSeverity::Info => 0.0,
        })
        .sum();
    clip(weighted / profile.column_count as f64)
}

/// Blend of average null percent, worst null percent, and the share of
/// columns that are mostly null.
fn null_rate_score(profile: &DataProfile) -> f64 {
    if profile.columns.is_empty() {
        return 0.0;
    }
    let n = profile.columns.len() as f64;
    let avg = profile.columns.iter().map(|c| c.null_percent).sum::<f64>() / n;
    let max = profile
        .columns
        .iter()
        .map(|c| c.null_percent)
        .fold(0.0, f64::max);
    let mostly_null = profile
        .columns
        .iter()
        .filter(|c| c.null_percent > 50.0)
        .count() as f64
        / n;
    clip(0.5 * avg / 100.0 + 0.3 * max / 100.0 + 0.2 * mostly_null)
}

/// Outlier mass relative to dataset size.
fn outlier_score(profile: &DataProfile) -> f64 {
    if profile.row_count == 0 {
        return 0.0;
    }
    let total: i64 = profile.columns.iter().map(|c| c.outlier_count).sum();
    clip(total as f64 / profile.row_count as f64 * 10.0)
}

/// Heavily non-normal numeric columns raise the distribution score.
fn distribution_score(profile: &DataProfile) -> f64 {
    let numeric: Vec<_> = profile.columns_of_type(ColumnType::Numeric).collect();
    if numeric.is_empty() {
        return 0.0;
    }
    let sum: f64 = numeric
        .iter()
        .map(|c| {
            let skew = c.skewness.unwrap_or(0.0).abs();
            let excess = (c.kurtosis.unwrap_or(3.0) - 3.0).abs();
            if skew > 2.0 || excess > 7.0 {
                1.0
            } else if skew > 1.0 {
                0.5
            } else {
                0.0
            }
        })
        .sum();
    clip(sum / numeric.len() as f64)
}

/// Constant columns and near-unique non-id columns are both suspicious.
fn cardinality_score(profile: &DataProfile) -> f64 {
    if profile.columns.is_empty() {
        return 0.0;
    }
    let n = profile.columns.len() as f64;
    let constant = profile.columns.iter().filter(|c| c.is_constant()).count() as f64;
    // Ids are unique by design and near-unique text is the PII detector's
    // concern; only numeric and categorical columns count here.
    let near_unique = profile
        .columns
        .iter()
        .filter(|c| {
            matches!(
                c.inferred_type,
                ColumnType::Numeric | ColumnType::Categorical
            ) && c.unique_percent > 99.0
                && !c.is_constant()
        })
        .count() as f64;
    clip(constant / n + 0.5 * near_unique / n)
}

/// Unusual dataset shapes: very wide tables or more columns than data.
fn schema_score(profile: &DataProfile) -> f64 {
    let cols = profile.column_count as f64;
    let mut score = 0.0;
    if cols > 100.0 {
        score += 0.5 * ((cols - 100.0) / 400.0).min(1.0);
    }
    if profile.row_count > 0 && cols / profile.row_count as f64 > 0.5 {
        score += 0.5;
    }
    clip(score)
}

fn interpret(score: f64) -> &'static str {
    if score < 0.1 {
        "Excellent"
    } else if score < 0.2 {
        "Good"
    } else if score < 0.35 {
        "Fair"
    } else if score < 0.5 {
        "Concerning"
    } else if score < 0.7 {
        "Poor"
    } else {
        "Critical"
    }
}

fn recommend(profile: &DataProfile, components: &ComponentScores) -> Vec<String> {
    let mut recommendations = Vec::new();

    if profile.columns.iter().any(|c| c.is_constant()) {
        recommendations.push("Remove constant columns before modeling".to_string());
    }
    if components.null_rate > 0.2 {
        recommendations
            .push("Address high null rates with imputation or column removal".to_string());
    }
    if components.outliers > 0.3 {
        recommendations.push("Investigate outliers before statistical modeling".to_string());
    }
    if components.distribution > 0.5 {
        recommendations.push("Consider transforming heavily skewed columns".to_string());
    }
    if components.schema > 0.5 {
        recommendations.push("Dataset shape is unusual; check the column-to-row ratio".to_string());
    }
    if recommendations.is_empty() {
        recommendations.push("No action required".to_string());
    }
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ColumnProfile, DataAlert};
    use std::time::Duration;

    fn profile_with(columns: Vec<ColumnProfile>, alerts: Vec<DataAlert>) -> DataProfile {
        DataProfile {
            source_path: "test.csv".into(),
            row_count: 1000,
            column_count: columns.len(),
            profile_time: Duration::from_millis(1),
            columns,
            alerts,
            correlations: vec![],
            insights: vec![],
        }
    }

    fn clean_column(name: &str) -> ColumnProfile {
        let mut col = ColumnProfile::minimal(name, ColumnType::Numeric, 1000);
        col.unique_count = 500;
        col.unique_percent = 50.0;
        col.skewness = Some(0.1);
        col.kurtosis = Some(3.0);
        col
    }

    #[test]
    fn test_clean_profile_is_excellent() {
        let profile = profile_with(vec![clean_column("a"), clean_column("b")], vec![]);
        let result = AnomalyScorer::new().score(&profile);
        assert!(result.overall_score < 0.1);
        assert_eq!(result.interpretation, "Excellent");
        assert_eq!(result.recommendations, vec!["No action required"]);
    }

    #[test]
    fn test_constant_column_raises_cardinality() {
        let mut constant = ColumnProfile::minimal("country", ColumnType::Categorical, 100);
        constant.unique_count = 1;
        let profile = profile_with(vec![constant, clean_column("b")], vec![]);

        let result = AnomalyScorer::new().score(&profile);
        assert!(result.components.cardinality > 0.0);
        assert!(result
            .recommendations
            .contains(&"Remove constant columns before modeling".to_string()));
    }

    #[test]
    fn test_null_heavy_profile() {
        let mut col = clean_column("sparse");
        col.null_count = 800;
        col.null_percent = 80.0;
        let profile = profile_with(vec![col], vec![]);

        let result = AnomalyScorer::new().score(&profile);
        // 0.5*0.8 + 0.3*0.8 + 0.2*1.0 = 0.84
        assert!((result.components.null_rate - 0.84).abs() < 1e-9);
    }

    #[test]
    fn test_alerts_drive_data_quality() {
        let alerts = vec![
            DataAlert::new(AlertSeverity::Error, None, "x", "m"),
            DataAlert::new(AlertSeverity::Warning, None, "y", "m"),
        ];
        let profile = profile_with(vec![clean_column("a"), clean_column("b")], alerts);
        let result = AnomalyScorer::new().score(&profile);
        // (1.0 + 0.5) / 2 columns
        assert!((result.components.data_quality - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_overall_is_clipped_and_buckets_hold() {
        assert_eq!(interpret(0.05), "Excellent");
        assert_eq!(interpret(0.15), "Good");
        assert_eq!(interpret(0.3), "Fair");
        assert_eq!(interpret(0.4), "Concerning");
        assert_eq!(interpret(0.6), "Poor");
        assert_eq!(interpret(0.9), "Critical");
    }

    #[test]
    fn test_wide_table_schema_score() {
        let columns: Vec<ColumnProfile> = (0..300)
            .map(|i| clean_column(&format!("c{i}")))
            .collect();
        let mut profile = profile_with(columns, vec![]);
        profile.row_count = 100; // 3 columns per row
        let result = AnomalyScorer::new().score(&profile);
        assert!(result.components.schema > 0.5);
    }
}
