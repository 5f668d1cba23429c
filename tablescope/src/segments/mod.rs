//! Segment profiling: centroid vectors and profile-to-profile distances.
//!
//! A centroid is a fixed-layout numeric summary of a profile; Euclidean
//! distance between centroids gives a cheap similarity measure for the store's
//! centroid index. Column and segment distances compare two profiles in
//! detail, using Jensen-Shannon divergence over categorical distributions.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::profile::{ColumnProfile, ColumnType, DataProfile};

/// Smoothing epsilon for Jensen-Shannon divergence.
const JS_EPSILON: f64 = 1e-4;
/// Clip floor for PSI ratio terms.
const PSI_EPSILON: f64 = 1e-3;
/// Weight of the missing-column penalty in segment distance.
const MISSING_COLUMN_WEIGHT: f64 = 0.2;

/// Per-column centroid features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnCentroid {
    pub null_rate: f64,
    pub unique_rate: f64,
    /// `(mean - min) / (max - min)` for numeric columns.
    pub normalized_center: Option<f64>,
    /// Most frequent value and its share of non-null rows.
    pub mode: Option<String>,
    pub mode_freq: Option<f64>,
    /// Midpoint of the date range, as epoch seconds.
    pub date_midpoint: Option<f64>,
    pub avg_text_length: Option<f64>,
    pub normalized_skewness: f64,
    pub normalized_entropy: f64,
    pub column_type: ColumnType,
}

/// Centroid of a whole profile: per-column features plus dataset shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileCentroid {
    pub row_count: i64,
    pub column_count: usize,
    /// Keyed by column name; BTreeMap fixes the vector ordering.
    pub columns: BTreeMap<String, ColumnCentroid>,
}

/// Detailed comparison between two profiles treated as segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentComparison {
    /// In [0, 1]; 0 means statistically identical.
    pub distance: f64,
    /// `1 - distance`.
    pub similarity: f64,
    pub column_distances: HashMap<String, f64>,
    /// Columns present in exactly one of the profiles.
    pub missing_columns: Vec<String>,
}

/// Computes centroids and segment comparisons.
#[derive(Debug, Clone, Default)]
pub struct SegmentProfiler;

impl SegmentProfiler {
    pub fn new() -> Self {
        Self
    }

    /// Builds the centroid of a profile.
    pub fn centroid(&self, profile: &DataProfile) -> ProfileCentroid {
        let columns = profile
            .columns
            .iter()
            .map(|c| (c.name.clone(), column_centroid(c)))
            .collect();
        ProfileCentroid {
            row_count: profile.row_count,
            column_count: profile.column_count,
            columns,
        }
    }

    /// Flattens a profile into its centroid vector.
    pub fn centroid_vector(&self, profile: &DataProfile) -> Vec<f64> {
        self.centroid(profile).to_vector()
    }

    /// Compares two profiles as segments of one population.
    #[instrument(skip(self, a, b))]
    pub fn compare(&self, a: &DataProfile, b: &DataProfile) -> SegmentComparison {
        let mut column_distances = HashMap::new();
        let mut missing = Vec::new();

        for col_a in &a.columns {
            match b.column(&col_a.name) {
                Some(col_b) => {
                    column_distances.insert(col_a.name.clone(), column_distance(col_a, col_b));
                }
                None => missing.push(col_a.name.clone()),
            }
        }
        for col_b in &b.columns {
            if a.column(&col_b.name).is_none() {
                missing.push(col_b.name.clone());
            }
        }

        let common_avg = if column_distances.is_empty() {
            1.0
        } else {
            column_distances.values().sum::<f64>() / column_distances.len() as f64
        };
        let total_columns = column_distances.len() + missing.len();
        let missing_fraction = if total_columns == 0 {
            0.0
        } else {
            missing.len() as f64 / total_columns as f64
        };

        let distance = (common_avg + MISSING_COLUMN_WEIGHT * missing_fraction).clamp(0.0, 1.0);
        SegmentComparison {
            distance,
            similarity: 1.0 - distance,
            column_distances,
            missing_columns: missing,
        }
    }
}

impl ProfileCentroid {
    /// Vector layout: `[log10(rows+1), cols/100]` followed by nine features
    /// per column in column-name order.
    pub fn to_vector(&self) -> Vec<f64> {
        let mut vector = Vec::with_capacity(2 + self.columns.len() * 9);
        vector.push(((self.row_count + 1) as f64).log10());
        vector.push(self.column_count as f64 / 100.0);

        for centroid in self.columns.values() {
            vector.push(centroid.null_rate);
            vector.push(centroid.unique_rate);
            let (numeric, categorical, temporal) = type_one_hot(centroid.column_type);
            vector.push(numeric);
            vector.push(categorical);
            vector.push(temporal);
            vector.push(centroid.normalized_center.unwrap_or(0.5));
            vector.push(centroid.normalized_skewness);
            vector.push(centroid.mode_freq.unwrap_or(0.0));
            vector.push(centroid.normalized_entropy);
        }
        vector
    }
}

fn type_one_hot(ty: ColumnType) -> (f64, f64, f64) {
    match ty {
        ColumnType::Numeric | ColumnType::Id => (1.0, 0.0, 0.0),
        ColumnType::Categorical | ColumnType::Boolean => (0.0, 1.0, 0.0),
        ColumnType::DateTime => (0.0, 0.0, 1.0),
        ColumnType::Text => (0.0, 0.0, 0.0),
    }
}

fn column_centroid(column: &ColumnProfile) -> ColumnCentroid {
    let null_rate = column.null_percent / 100.0;
    let unique_rate = column.unique_percent / 100.0;

    let normalized_center = match (column.mean, column.min, column.max) {
        (Some(mean), Some(min), Some(max)) if max > min => Some((mean - min) / (max - min)),
        _ => None,
    };

    let (mode, mode_freq) = column
        .top_values
        .first()
        .map(|tv| (Some(tv.value.clone()), Some(tv.percent / 100.0)))
        .unwrap_or((None, None));

    let date_midpoint = match (column.min_date, column.max_date) {
        (Some(min), Some(max)) => {
            Some((min.timestamp() as f64 + max.timestamp() as f64) / 2.0)
        }
        _ => None,
    };

    // Squashed into (-1, 1) so extreme skew cannot dominate the vector.
    let skew = column.skewness.unwrap_or(0.0);
    let normalized_skewness = skew / (1.0 + skew.abs());

    let normalized_entropy = match (column.entropy, column.unique_count) {
        (Some(entropy), unique) if unique > 1 => {
            (entropy / (unique as f64).log2()).clamp(0.0, 1.0)
        }
        _ => 0.0,
    };

    ColumnCentroid {
        null_rate,
        unique_rate,
        normalized_center,
        mode,
        mode_freq,
        date_midpoint,
        avg_text_length: column.avg_length,
        normalized_skewness,
        normalized_entropy,
        column_type: column.inferred_type,
    }
}

/// Distance between two same-named columns, in [0, 1].
///
/// Averages the null-rate delta, the type-specific distance, and half the
/// unique-rate delta.
pub fn column_distance(a: &ColumnProfile, b: &ColumnProfile) -> f64 {
    let mut components = Vec::with_capacity(3);
    components.push((a.null_percent - b.null_percent).abs() / 100.0);

    let type_specific = match (a.inferred_type, b.inferred_type) {
        (ColumnType::Numeric, ColumnType::Numeric) | (ColumnType::Id, ColumnType::Id) => {
            numeric_distance(a, b)
        }
        (ColumnType::Categorical, ColumnType::Categorical)
        | (ColumnType::Boolean, ColumnType::Boolean) => categorical_distance(a, b),
        (ColumnType::DateTime, ColumnType::DateTime) => date_distance(a, b),
        (x, y) if x == y => 0.0,
        // Type changed between the two profiles: maximal disagreement.
        _ => 1.0,
    };
    components.push(type_specific);

    components.push((a.unique_percent - b.unique_percent).abs() / 100.0 * 0.5);

    (components.iter().sum::<f64>() / components.len() as f64).clamp(0.0, 1.0)
}

fn numeric_distance(a: &ColumnProfile, b: &ColumnProfile) -> f64 {
    let mut parts = Vec::new();

    let center = |c: &ColumnProfile| match (c.mean, c.min, c.max) {
        (Some(mean), Some(min), Some(max)) if max > min => Some((mean - min) / (max - min)),
        _ => None,
    };
    if let (Some(ca), Some(cb)) = (center(a), center(b)) {
        parts.push((ca - cb).abs());
    }

    let cv = |c: &ColumnProfile| match (c.mean, c.std_dev) {
        (Some(mean), Some(std)) if mean.abs() > f64::EPSILON => Some((std / mean).abs()),
        _ => None,
    };
    if let (Some(cva), Some(cvb)) = (cv(a), cv(b)) {
        parts.push(((cva - cvb).abs()).min(1.0));
    }

    if let (Some(sa), Some(sb)) = (a.skewness, b.skewness) {
        let squash = |s: f64| s / (1.0 + s.abs());
        parts.push((squash(sa) - squash(sb)).abs());
    }

    if parts.is_empty() {
        0.0
    } else {
        (parts.iter().sum::<f64>() / parts.len() as f64).clamp(0.0, 1.0)
    }
}

fn categorical_distance(a: &ColumnProfile, b: &ColumnProfile) -> f64 {
    let mut parts = Vec::new();

    let mode_freq = |c: &ColumnProfile| c.top_values.first().map(|t| t.percent / 100.0);
    if let (Some(fa), Some(fb)) = (mode_freq(a), mode_freq(b)) {
        parts.push((fa - fb).abs());
    }

    parts.push(jensen_shannon_divergence(
        &top_k_distribution(a),
        &top_k_distribution(b),
    ));

    let (ua, ub) = (a.unique_count.max(1) as f64, b.unique_count.max(1) as f64);
    parts.push(1.0 - ua.min(ub) / ua.max(ub));

    (parts.iter().sum::<f64>() / parts.len() as f64).clamp(0.0, 1.0)
}

fn date_distance(a: &ColumnProfile, b: &ColumnProfile) -> f64 {
    match (a.min_date, a.max_date, b.min_date, b.max_date) {
        (Some(a_min), Some(a_max), Some(b_min), Some(b_max)) => {
            let overlap_start = a_min.max(b_min);
            let overlap_end = a_max.min(b_max);
            let overlap = (overlap_end - overlap_start).num_seconds().max(0) as f64;
            let union = (a_max.max(b_max) - a_min.min(b_min)).num_seconds().max(1) as f64;
            1.0 - (overlap / union).clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}

/// The top-K distribution of a column as `value -> fraction of non-null rows`.
pub fn top_k_distribution(column: &ColumnProfile) -> HashMap<String, f64> {
    column
        .top_values
        .iter()
        .map(|tv| (tv.value.clone(), tv.percent / 100.0))
        .collect()
}

/// Jensen-Shannon divergence between two discrete distributions over the
/// union of their keys, normalized by ln 2 into [0, 1].
pub fn jensen_shannon_divergence(p: &HashMap<String, f64>, q: &HashMap<String, f64>) -> f64 {
    let keys: std::collections::BTreeSet<&String> = p.keys().chain(q.keys()).collect();
    if keys.is_empty() {
        return 0.0;
    }

    let collect = |dist: &HashMap<String, f64>| -> Vec<f64> {
        let raw: Vec<f64> = keys
            .iter()
            .map(|k| dist.get(*k).copied().unwrap_or(0.0).max(JS_EPSILON))
            .collect();
        let total: f64 = raw.iter().sum();
        raw.into_iter().map(|v| v / total).collect()
    };

    let pv = collect(p);
    let qv = collect(q);

    let kl = |x: &[f64], m: &[f64]| -> f64 {
        x.iter()
            .zip(m)
            .map(|(xi, mi)| if *xi > 0.0 { xi * (xi / mi).ln() } else { 0.0 })
            .sum()
    };

    let m: Vec<f64> = pv.iter().zip(&qv).map(|(a, b)| (a + b) / 2.0).collect();
    let jsd = (kl(&pv, &m) + kl(&qv, &m)) / 2.0;
    (jsd / std::f64::consts::LN_2).clamp(0.0, 1.0)
}

/// Population stability index between two distributions. Both sides are
/// clipped at 1e-3 before the log-ratio; the absolute value is returned.
pub fn population_stability_index(p: &HashMap<String, f64>, q: &HashMap<String, f64>) -> f64 {
    let keys: std::collections::BTreeSet<&String> = p.keys().chain(q.keys()).collect();
    let mut psi = 0.0;
    for key in keys {
        let pv = p.get(key).copied().unwrap_or(0.0).max(PSI_EPSILON);
        let qv = q.get(key).copied().unwrap_or(0.0).max(PSI_EPSILON);
        psi += (qv - pv) * (qv / pv).ln();
    }
    psi.abs()
}

/// Euclidean distance between two centroid vectors, normalized by the square
/// root of the dimension and clamped to [0, 1]. Vectors of different lengths
/// are compared by zero-padding the shorter one.
pub fn centroid_distance(a: &[f64], b: &[f64]) -> f64 {
    let dim = a.len().max(b.len());
    if dim == 0 {
        return 0.0;
    }
    let sum_sq: f64 = (0..dim)
        .map(|i| {
            let av = a.get(i).copied().unwrap_or(0.0);
            let bv = b.get(i).copied().unwrap_or(0.0);
            (av - bv).powi(2)
        })
        .sum();
    (sum_sq.sqrt() / (dim as f64).sqrt()).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::TopValue;
    use std::time::Duration;

    fn profile_of(columns: Vec<ColumnProfile>) -> DataProfile {
        DataProfile {
            source_path: "seg.csv".into(),
            row_count: 1000,
            column_count: columns.len(),
            profile_time: Duration::from_millis(1),
            columns,
            alerts: vec![],
            correlations: vec![],
            insights: vec![],
        }
    }

    fn numeric_column(name: &str, mean: f64, std: f64, min: f64, max: f64) -> ColumnProfile {
        let mut col = ColumnProfile::minimal(name, ColumnType::Numeric, 1000);
        col.mean = Some(mean);
        col.std_dev = Some(std);
        col.min = Some(min);
        col.max = Some(max);
        col.unique_count = 800;
        col.unique_percent = 80.0;
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
    fn test_centroid_vector_layout() {
        let profile = profile_of(vec![numeric_column("a", 5.0, 1.0, 0.0, 10.0)]);
        let vector = SegmentProfiler::new().centroid_vector(&profile);
        assert_eq!(vector.len(), 2 + 9);
        assert!((vector[0] - (1001f64).log10()).abs() < 1e-12);
        assert!((vector[1] - 0.01).abs() < 1e-12);
        // normalized_center of mean 5 on [0, 10]
        assert!((vector[7] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_centroid_vector_ordered_by_column_name() {
        let p1 = profile_of(vec![
            numeric_column("b", 1.0, 1.0, 0.0, 2.0),
            numeric_column("a", 1.0, 1.0, 0.0, 2.0),
        ]);
        let p2 = profile_of(vec![
            numeric_column("a", 1.0, 1.0, 0.0, 2.0),
            numeric_column("b", 1.0, 1.0, 0.0, 2.0),
        ]);
        assert_eq!(
            SegmentProfiler::new().centroid_vector(&p1),
            SegmentProfiler::new().centroid_vector(&p2)
        );
    }

    #[test]
    fn test_identical_profiles_compare_as_identical() {
        let profile = profile_of(vec![
            numeric_column("x", 5.0, 1.0, 0.0, 10.0),
            categorical_column("c", vec![("US", 60.0), ("CA", 40.0)]),
        ]);
        let comparison = SegmentProfiler::new().compare(&profile, &profile.clone());
        assert!(comparison.distance < 1e-9);
        assert!(comparison.similarity > 0.999);
    }

    #[test]
    fn test_shifted_segment_is_similar_but_not_identical() {
        let a = profile_of(vec![numeric_column("price", 5.0, 1.0, 0.0, 10.0)]);
        let b = profile_of(vec![numeric_column("price", 6.0, 1.0, 0.0, 10.0)]);
        let comparison = SegmentProfiler::new().compare(&a, &b);
        assert!(comparison.distance > 0.0);
        assert!(comparison.similarity > 0.5);
    }

    #[test]
    fn test_missing_columns_penalized() {
        let a = profile_of(vec![
            numeric_column("x", 5.0, 1.0, 0.0, 10.0),
            numeric_column("extra", 1.0, 1.0, 0.0, 2.0),
        ]);
        let b = profile_of(vec![numeric_column("x", 5.0, 1.0, 0.0, 10.0)]);
        let comparison = SegmentProfiler::new().compare(&a, &b);
        assert_eq!(comparison.missing_columns, vec!["extra".to_string()]);
        assert!(comparison.distance > 0.0);
    }

    #[test]
    fn test_jensen_shannon_bounds() {
        let mut p = HashMap::new();
        p.insert("a".to_string(), 1.0);
        let mut q = HashMap::new();
        q.insert("b".to_string(), 1.0);

        let disjoint = jensen_shannon_divergence(&p, &q);
        assert!(disjoint > 0.9 && disjoint <= 1.0);
        assert!(jensen_shannon_divergence(&p, &p) < 1e-9);
    }

    #[test]
    fn test_psi_properties() {
        let mut p = HashMap::new();
        p.insert("a".to_string(), 0.5);
        p.insert("b".to_string(), 0.5);
        let mut q = HashMap::new();
        q.insert("a".to_string(), 0.9);
        q.insert("b".to_string(), 0.1);

        assert!(population_stability_index(&p, &p) < 1e-12);
        assert!(population_stability_index(&p, &q) > 0.0);
    }

    #[test]
    fn test_centroid_distance_range() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 1.0, 1.0];
        let d = centroid_distance(&a, &b);
        assert!((d - 1.0).abs() < 1e-12);
        assert_eq!(centroid_distance(&a, &a), 0.0);
        // Different lengths are zero-padded rather than rejected.
        assert!(centroid_distance(&[1.0], &[1.0, 1.0]) > 0.0);
    }

    #[test]
    fn test_type_change_maximizes_type_component() {
        let a = numeric_column("x", 5.0, 1.0, 0.0, 10.0);
        let mut b = a.clone();
        b.inferred_type = ColumnType::Text;
        assert!(column_distance(&a, &b) > column_distance(&a, &a.clone()));
    }
}
