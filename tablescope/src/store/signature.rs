//! Statistical signatures for profile similarity matching.
//!
//! A signature is a compact, schema-independent sketch of a dataset: its size
//! bucket, column type mix, and per-column normalized statistics. Signatures
//! survive column renames better than schema hashes because names are
//! normalized and stats dominate the comparison.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::profile::{ColumnProfile, ColumnType, DataProfile};

/// Order-of-magnitude bucket of a dataset's row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowCountBucket {
    /// Fewer than 100 rows.
    Tiny,
    /// Fewer than 1 000 rows.
    Small,
    /// Fewer than 10 000 rows.
    Medium,
    /// Fewer than 100 000 rows.
    Large,
    /// Fewer than 1 000 000 rows.
    Xlarge,
    /// A million rows or more.
    Massive,
}

impl RowCountBucket {
    pub fn of(row_count: i64) -> Self {
        match row_count {
            n if n < 100 => Self::Tiny,
            n if n < 1_000 => Self::Small,
            n if n < 10_000 => Self::Medium,
            n if n < 100_000 => Self::Large,
            n if n < 1_000_000 => Self::Xlarge,
            _ => Self::Massive,
        }
    }
}

/// Per-column sketch inside a [`StatisticalSignature`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSignature {
    pub normalized_name: String,
    pub column_type: ColumnType,
    pub null_percent: f64,
    pub unique_percent: f64,

    // Numeric columns
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std_dev: Option<f64>,
    pub skewness: Option<f64>,
    pub q25: Option<f64>,
    pub q75: Option<f64>,
    pub outlier_ratio: Option<f64>,

    // Categorical columns
    pub cardinality: Option<i64>,
    pub entropy: Option<f64>,
    pub imbalance_ratio: Option<f64>,
    /// `value -> fraction of non-null rows`, from the top-K distribution.
    pub top_k_distribution: HashMap<String, f64>,
}

/// Dataset-level statistical sketch used for similarity matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalSignature {
    pub row_count_bucket: RowCountBucket,
    /// Column counts keyed by type name.
    pub column_type_counts: HashMap<String, usize>,
    pub avg_null_percent: f64,
    pub avg_unique_percent: f64,
    /// Normalized column names, sorted.
    pub column_names: Vec<String>,
    pub per_column_stats: HashMap<String, ColumnSignature>,
}

/// Lowercases and squashes separators so `User ID`, `user_id`, and `user-id`
/// compare equal.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace([' ', '-'], "_")
}

fn column_signature(column: &ColumnProfile) -> ColumnSignature {
    let outlier_ratio = if column.count > 0 {
        Some(column.outlier_count as f64 / column.count as f64)
    } else {
        None
    };

    let is_categorical = matches!(
        column.inferred_type,
        ColumnType::Categorical | ColumnType::Boolean
    );

    ColumnSignature {
        normalized_name: normalize_name(&column.name),
        column_type: column.inferred_type,
        null_percent: column.null_percent,
        unique_percent: column.unique_percent,
        mean: column.mean,
        median: column.median,
        std_dev: column.std_dev,
        skewness: column.skewness,
        q25: column.q25,
        q75: column.q75,
        outlier_ratio,
        cardinality: is_categorical.then_some(column.unique_count),
        entropy: column.entropy,
        imbalance_ratio: column.imbalance_ratio,
        top_k_distribution: column
            .top_values
            .iter()
            .map(|tv| (tv.value.clone(), tv.percent / 100.0))
            .collect(),
    }
}

impl StatisticalSignature {
    /// Builds the signature of a finished profile.
    pub fn from_profile(profile: &DataProfile) -> Self {
        let n = profile.columns.len().max(1) as f64;
        let avg_null_percent =
            profile.columns.iter().map(|c| c.null_percent).sum::<f64>() / n;
        let avg_unique_percent =
            profile.columns.iter().map(|c| c.unique_percent).sum::<f64>() / n;

        let mut column_type_counts: HashMap<String, usize> = HashMap::new();
        for column in &profile.columns {
            *column_type_counts
                .entry(column.inferred_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        let mut column_names: Vec<String> = profile
            .columns
            .iter()
            .map(|c| normalize_name(&c.name))
            .collect();
        column_names.sort();

        let per_column_stats = profile
            .columns
            .iter()
            .map(|c| (normalize_name(&c.name), column_signature(c)))
            .collect();

        Self {
            row_count_bucket: RowCountBucket::of(profile.row_count),
            column_type_counts,
            avg_null_percent,
            avg_unique_percent,
            column_names,
            per_column_stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_row_count_buckets() {
        assert_eq!(RowCountBucket::of(50), RowCountBucket::Tiny);
        assert_eq!(RowCountBucket::of(999), RowCountBucket::Small);
        assert_eq!(RowCountBucket::of(5_000), RowCountBucket::Medium);
        assert_eq!(RowCountBucket::of(99_999), RowCountBucket::Large);
        assert_eq!(RowCountBucket::of(500_000), RowCountBucket::Xlarge);
        assert_eq!(RowCountBucket::of(2_000_000), RowCountBucket::Massive);
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("User ID"), "user_id");
        assert_eq!(normalize_name("user-id"), "user_id");
        assert_eq!(normalize_name("  Amount  "), "amount");
    }

    #[test]
    fn test_signature_from_profile() {
        let mut numeric = ColumnProfile::minimal("Amount", ColumnType::Numeric, 1000);
        numeric.null_percent = 10.0;
        numeric.unique_percent = 80.0;
        numeric.mean = Some(42.0);

        let mut categorical = ColumnProfile::minimal("Status", ColumnType::Categorical, 1000);
        categorical.unique_count = 3;
        categorical.unique_percent = 0.3;

        let profile = DataProfile {
            source_path: "sig.csv".into(),
            row_count: 1000,
            column_count: 2,
            profile_time: Duration::from_millis(1),
            columns: vec![numeric, categorical],
            alerts: vec![],
            correlations: vec![],
            insights: vec![],
        };

        let signature = StatisticalSignature::from_profile(&profile);
        assert_eq!(signature.row_count_bucket, RowCountBucket::Medium);
        assert_eq!(signature.column_type_counts.get("numeric"), Some(&1));
        assert_eq!(signature.column_type_counts.get("categorical"), Some(&1));
        assert_eq!(signature.column_names, vec!["amount", "status"]);
        assert!((signature.avg_null_percent - 5.0).abs() < 1e-9);

        let amount = signature.per_column_stats.get("amount").unwrap();
        assert_eq!(amount.mean, Some(42.0));
        assert_eq!(amount.cardinality, None);

        let status = signature.per_column_stats.get("status").unwrap();
        assert_eq!(status.cardinality, Some(3));
    }
}
