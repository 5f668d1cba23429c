//! Fidelity validation of synthetic datasets against their originals.
//!
//! The validator compares the synthetic profile to the original column by
//! column: numeric columns by moment and quantile deltas, categorical columns
//! by PSI, top-K overlap, and Jensen-Shannon divergence. Relationship fidelity
//! compares preserved correlations, and a privacy check verifies the synthetic
//! data did not reproduce near-unique identifier columns.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::profile::{ColumnProfile, ColumnType, DataProfile};
use crate::segments::{jensen_shannon_divergence, population_stability_index, top_k_distribution};

const PRIVACY_PASS: f64 = 1.0;
const PRIVACY_FAIL: f64 = 0.8;

/// Fidelity of one synthesized column, score in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFidelity {
    pub column: String,
    pub score: f64,
    /// Population stability index, categorical columns only.
    pub psi: Option<f64>,
    /// Jensen-Shannon divergence, categorical columns only.
    pub js_divergence: Option<f64>,
    /// Share of the original top-K values present in the synthetic top-K.
    pub top_k_overlap: Option<f64>,
    /// Mean quantile delta in IQR units, numeric columns only.
    pub ks_proxy: Option<f64>,
}

/// Full fidelity report for a synthetic dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FidelityReport {
    /// Overall fidelity, 0..=100.
    pub overall_percent: f64,
    pub column_scores: Vec<ColumnFidelity>,
    /// One score per correlation pair preserved from the original.
    pub relationship_scores: Vec<f64>,
    /// 1.0 when the privacy uniqueness check passes, 0.8 otherwise.
    pub privacy_compliance: f64,
}

/// Validates synthetic data fidelity from profiles alone.
#[derive(Debug, Clone, Default)]
pub struct FidelityValidator;

impl FidelityValidator {
    pub fn new() -> Self {
        Self
    }

    /// Compares a synthetic profile against the original it imitates.
    #[instrument(skip(self, original, synthetic))]
    pub fn validate(&self, original: &DataProfile, synthetic: &DataProfile) -> FidelityReport {
        let mut column_scores = Vec::new();
        for orig_col in &original.columns {
            let Some(synth_col) = synthetic.column(&orig_col.name) else {
                column_scores.push(ColumnFidelity {
                    column: orig_col.name.clone(),
                    score: 0.0,
                    psi: None,
                    js_divergence: None,
                    top_k_overlap: None,
                    ks_proxy: None,
                });
                continue;
            };
            column_scores.push(column_fidelity(orig_col, synth_col));
        }

        let relationship_scores = relationship_fidelity(original, synthetic);
        let privacy_compliance = if passes_uniqueness_check(synthetic) {
            PRIVACY_PASS
        } else {
            PRIVACY_FAIL
        };

        let mut parts: Vec<f64> = column_scores.iter().map(|c| c.score).collect();
        parts.extend(&relationship_scores);
        parts.push(privacy_compliance);
        let overall = if parts.is_empty() {
            0.0
        } else {
            parts.iter().sum::<f64>() / parts.len() as f64
        };

        FidelityReport {
            overall_percent: (overall * 100.0).clamp(0.0, 100.0),
            column_scores,
            relationship_scores,
            privacy_compliance,
        }
    }
}

fn column_fidelity(original: &ColumnProfile, synthetic: &ColumnProfile) -> ColumnFidelity {
    let null_delta = (original.null_percent - synthetic.null_percent).abs() / 100.0;

    match original.inferred_type {
        ColumnType::Numeric | ColumnType::Id => {
            numeric_fidelity(original, synthetic, null_delta)
        }
        ColumnType::Categorical | ColumnType::Boolean => {
            categorical_fidelity(original, synthetic, null_delta)
        }
        _ => {
            // Text and datetime columns only carry the null-rate penalty.
            ColumnFidelity {
                column: original.name.clone(),
                score: (1.0 - null_delta).clamp(0.0, 1.0),
                psi: None,
                js_divergence: None,
                top_k_overlap: None,
                ks_proxy: None,
            }
        }
    }
}

fn numeric_fidelity(
    original: &ColumnProfile,
    synthetic: &ColumnProfile,
    null_delta: f64,
) -> ColumnFidelity {
    let sigma = original.std_dev.filter(|s| *s > 0.0);

    let mean_z = match (original.mean, synthetic.mean, sigma) {
        (Some(om), Some(sm), Some(sd)) => ((om - sm) / sd).abs().min(1.0),
        _ => 0.0,
    };

    let std_rel = match (original.std_dev, synthetic.std_dev) {
        (Some(os), Some(ss)) if os > 0.0 => ((os - ss) / os).abs().min(1.0),
        _ => 0.0,
    };

    // Mean quantile movement in IQR units stands in for a KS statistic.
    let iqr = original.iqr.filter(|v| *v > 0.0);
    let ks_proxy = iqr.map(|iqr| {
        let deltas = [
            (original.q25, synthetic.q25),
            (original.median, synthetic.median),
            (original.q75, synthetic.q75),
        ];
        let (sum, n) = deltas
            .iter()
            .filter_map(|(o, s)| match (o, s) {
                (Some(ov), Some(sv)) => Some(((ov - sv).abs() / iqr).min(1.0)),
                _ => None,
            })
            .fold((0.0, 0usize), |(sum, n), d| (sum + d, n + 1));
        if n == 0 {
            0.0
        } else {
            sum / n as f64
        }
    });

    let penalty = 0.2 * null_delta + 0.3 * mean_z + 0.2 * std_rel + 0.3 * ks_proxy.unwrap_or(0.0);

    ColumnFidelity {
        column: original.name.clone(),
        score: (1.0 - penalty).clamp(0.0, 1.0),
        psi: None,
        js_divergence: None,
        top_k_overlap: None,
        ks_proxy,
    }
}

fn categorical_fidelity(
    original: &ColumnProfile,
    synthetic: &ColumnProfile,
    null_delta: f64,
) -> ColumnFidelity {
    let orig_dist = top_k_distribution(original);
    let synth_dist = top_k_distribution(synthetic);

    let psi = population_stability_index(&orig_dist, &synth_dist);
    let js = jensen_shannon_divergence(&orig_dist, &synth_dist);

    let overlap = if orig_dist.is_empty() {
        1.0
    } else {
        let shared = orig_dist
            .keys()
            .filter(|k| synth_dist.contains_key(*k))
            .count();
        shared as f64 / orig_dist.len() as f64
    };

    let distribution_score = (overlap + (1.0 - js) + (1.0 - psi.min(1.0))) / 3.0;
    let score = (distribution_score - 0.2 * null_delta).clamp(0.0, 1.0);

    ColumnFidelity {
        column: original.name.clone(),
        score,
        psi: Some(psi),
        js_divergence: Some(js),
        top_k_overlap: Some(overlap),
        ks_proxy: None,
    }
}

/// Correlation pairs present in both profiles score by how well the
/// coefficient was preserved.
fn relationship_fidelity(original: &DataProfile, synthetic: &DataProfile) -> Vec<f64> {
    let key = |a: &str, b: &str| {
        let (x, y) = if a <= b { (a, b) } else { (b, a) };
        (x.to_lowercase(), y.to_lowercase())
    };
    let synth_corr: HashMap<_, f64> = synthetic
        .correlations
        .iter()
        .map(|c| (key(&c.col1, &c.col2), c.correlation))
        .collect();

    original
        .correlations
        .iter()
        .map(|orig| {
            match synth_corr.get(&key(&orig.col1, &orig.col2)) {
                // Correlations span [-1, 1]; half the absolute delta maps to [0, 1].
                Some(synth) => (1.0 - (orig.correlation - synth).abs() / 2.0).clamp(0.0, 1.0),
                None => 0.0,
            }
        })
        .collect()
}

/// Synthetic data must not reproduce near-unique text identifiers.
fn passes_uniqueness_check(synthetic: &DataProfile) -> bool {
    !synthetic
        .columns
        .iter()
        .any(|c| c.inferred_type == ColumnType::Text && c.unique_percent > 90.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ColumnCorrelation, TopValue};
    use std::time::Duration;

    fn profile_of(columns: Vec<ColumnProfile>) -> DataProfile {
        DataProfile {
            source_path: "orig.csv".into(),
            row_count: 1000,
            column_count: columns.len(),
            profile_time: Duration::from_millis(1),
            columns,
            alerts: vec![],
            correlations: vec![],
            insights: vec![],
        }
    }

    fn numeric_column(name: &str, mean: f64, std: f64) -> ColumnProfile {
        let mut col = ColumnProfile::minimal(name, ColumnType::Numeric, 1000);
        col.mean = Some(mean);
        col.std_dev = Some(std);
        col.median = Some(mean);
        col.q25 = Some(mean - std);
        col.q75 = Some(mean + std);
        col.iqr = Some(2.0 * std);
        col
    }

    fn categorical_column(name: &str, top: Vec<(&str, f64)>) -> ColumnProfile {
        let mut col = ColumnProfile::minimal(name, ColumnType::Categorical, 1000);
        col.unique_count = top.len() as i64;
        col.top_values = top
            .into_iter()
            .map(|(value, percent)| TopValue {
                value: value.to_string(),
                count: (percent * 10.0) as i64,
                percent,
            })
            .collect();
        col
    }

    #[test]
    fn test_perfect_synthesis_scores_high() {
        let original = profile_of(vec![
            numeric_column("amount", 100.0, 15.0),
            categorical_column("status", vec![("ok", 80.0), ("fail", 20.0)]),
        ]);
        let report = FidelityValidator::new().validate(&original, &original.clone());
        assert!(report.overall_percent > 95.0);
        assert_eq!(report.privacy_compliance, 1.0);
        for col in &report.column_scores {
            assert!(col.score > 0.95, "{} scored {}", col.column, col.score);
        }
    }

    #[test]
    fn test_mean_shift_penalized() {
        let original = profile_of(vec![numeric_column("amount", 100.0, 15.0)]);
        let synthetic = profile_of(vec![numeric_column("amount", 130.0, 15.0)]);
        let report = FidelityValidator::new().validate(&original, &synthetic);
        let col = &report.column_scores[0];
        assert!(col.score < 0.7, "score {}", col.score);
        assert!(col.ks_proxy.unwrap() > 0.5);
    }

    #[test]
    fn test_categorical_distribution_change() {
        let original = profile_of(vec![categorical_column(
            "status",
            vec![("ok", 80.0), ("fail", 20.0)],
        )]);
        let synthetic = profile_of(vec![categorical_column(
            "status",
            vec![("ok", 20.0), ("fail", 80.0)],
        )]);
        let report = FidelityValidator::new().validate(&original, &synthetic);
        let col = &report.column_scores[0];
        assert_eq!(col.top_k_overlap, Some(1.0));
        assert!(col.psi.unwrap() > 0.5);
        assert!(col.score < 0.9);
    }

    #[test]
    fn test_missing_synthetic_column_scores_zero() {
        let original = profile_of(vec![numeric_column("amount", 100.0, 15.0)]);
        let synthetic = profile_of(vec![]);
        let report = FidelityValidator::new().validate(&original, &synthetic);
        assert_eq!(report.column_scores[0].score, 0.0);
    }

    #[test]
    fn test_privacy_failure_lowers_compliance() {
        let original = profile_of(vec![numeric_column("amount", 100.0, 15.0)]);
        let mut leaky = ColumnProfile::minimal("token", ColumnType::Text, 1000);
        leaky.unique_percent = 99.5;
        let mut synthetic = profile_of(vec![numeric_column("amount", 100.0, 15.0), leaky]);
        synthetic.column_count = 2;

        let report = FidelityValidator::new().validate(&original, &synthetic);
        assert_eq!(report.privacy_compliance, 0.8);
    }

    #[test]
    fn test_relationship_preservation() {
        let mut original = profile_of(vec![
            numeric_column("a", 0.0, 1.0),
            numeric_column("b", 0.0, 1.0),
        ]);
        original.correlations = vec![ColumnCorrelation {
            col1: "a".into(),
            col2: "b".into(),
            correlation: 0.9,
        }];
        let mut synthetic = original.clone();
        synthetic.correlations[0].correlation = 0.5;

        let report = FidelityValidator::new().validate(&original, &synthetic);
        assert_eq!(report.relationship_scores.len(), 1);
        assert!((report.relationship_scores[0] - 0.8).abs() < 1e-9);
    }
}
