//! Dataset-level patterns: foreign-key candidates and monotonic sequences.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::engine::QueryAdapter;
use crate::error::Result;
use crate::profile::{ColumnProfile, ColumnType};

const FK_MIN_CARDINALITY: i64 = 2;
const FK_MAX_CARDINALITY: i64 = 1000;
const FK_OVERLAP_THRESHOLD: f64 = 0.9;
const MONOTONIC_MAX_ROWS: usize = 10_000;
const MONOTONIC_RATIO_THRESHOLD: f64 = 0.95;

/// A categorical column whose values mostly appear in an id-like column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyCandidate {
    pub categorical_column: String,
    pub id_column: String,
    /// Fraction of the categorical's distinct values present in the id column.
    pub overlap: f64,
}

/// A numeric or id column whose values nearly always move one way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonotonicPattern {
    pub column: String,
    /// `"increasing"` or `"decreasing"`.
    pub direction: String,
    /// Share of lag-1 differences moving in the direction.
    pub ratio: f64,
    pub confidence: f64,
}

/// Patterns spanning the whole dataset rather than one column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetPatterns {
    pub fk_candidates: Vec<ForeignKeyCandidate>,
    pub monotonic: Vec<MonotonicPattern>,
}

/// Detects dataset-level patterns over the already-profiled columns.
#[instrument(skip(adapter, columns))]
pub async fn detect_dataset_patterns(
    adapter: &QueryAdapter,
    columns: &[ColumnProfile],
) -> Result<DatasetPatterns> {
    let mut patterns = DatasetPatterns::default();

    patterns.fk_candidates = detect_fk_candidates(adapter, columns).await?;
    patterns.monotonic = detect_monotonic(adapter, columns).await?;

    Ok(patterns)
}

fn id_like(column: &ColumnProfile) -> bool {
    column.inferred_type == ColumnType::Id
        || (column.has_id_name() && column.unique_percent > 90.0)
}

async fn detect_fk_candidates(
    adapter: &QueryAdapter,
    columns: &[ColumnProfile],
) -> Result<Vec<ForeignKeyCandidate>> {
    let categoricals: Vec<&ColumnProfile> = columns
        .iter()
        .filter(|c| {
            c.inferred_type == ColumnType::Categorical
                && c.unique_count >= FK_MIN_CARDINALITY
                && c.unique_count <= FK_MAX_CARDINALITY
        })
        .collect();
    let ids: Vec<&ColumnProfile> = columns.iter().filter(|c| id_like(c)).collect();

    let mut candidates = Vec::new();
    let table = adapter.table();
    for cat in &categoricals {
        for id in &ids {
            if cat.name == id.name {
                continue;
            }
            let sql = format!(
                "SELECT COUNT(*) FROM \
                 (SELECT DISTINCT CAST(\"{cat_col}\" AS VARCHAR) AS v FROM {table} \
                  WHERE \"{cat_col}\" IS NOT NULL) s \
                 JOIN \
                 (SELECT DISTINCT CAST(\"{id_col}\" AS VARCHAR) AS w FROM {table} \
                  WHERE \"{id_col}\" IS NOT NULL) d \
                 ON s.v = d.w",
                cat_col = cat.name,
                id_col = id.name,
            );
            let shared = adapter.scalar_i64(&sql).await?;
            let overlap = shared as f64 / cat.unique_count as f64;
            debug!(
                categorical = %cat.name,
                id = %id.name,
                overlap,
                "foreign key overlap"
            );
            if overlap > FK_OVERLAP_THRESHOLD {
                candidates.push(ForeignKeyCandidate {
                    categorical_column: cat.name.clone(),
                    id_column: id.name.clone(),
                    overlap,
                });
            }
        }
    }
    Ok(candidates)
}

async fn detect_monotonic(
    adapter: &QueryAdapter,
    columns: &[ColumnProfile],
) -> Result<Vec<MonotonicPattern>> {
    let mut patterns = Vec::new();
    let table = adapter.table();

    for column in columns
        .iter()
        .filter(|c| matches!(c.inferred_type, ColumnType::Numeric | ColumnType::Id))
    {
        let sql = format!(
            "SELECT CAST(\"{col}\" AS DOUBLE) FROM {table} \
             WHERE \"{col}\" IS NOT NULL LIMIT {MONOTONIC_MAX_ROWS}",
            col = column.name,
        );
        let values = adapter.column_f64s(&sql).await?;
        if let Some(pattern) = monotonic_from_values(&column.name, &values) {
            patterns.push(pattern);
        }
    }
    Ok(patterns)
}

/// Classifies a value sequence as monotonic when more than 95% of its lag-1
/// differences are strictly one-directional.
pub fn monotonic_from_values(column: &str, values: &[f64]) -> Option<MonotonicPattern> {
    if values.len() < 3 {
        return None;
    }
    let total = (values.len() - 1) as f64;
    let mut increasing = 0usize;
    let mut decreasing = 0usize;
    for w in values.windows(2) {
        if w[1] > w[0] {
            increasing += 1;
        } else if w[1] < w[0] {
            decreasing += 1;
        }
    }

    let inc_ratio = increasing as f64 / total;
    let dec_ratio = decreasing as f64 / total;

    if inc_ratio > MONOTONIC_RATIO_THRESHOLD {
        Some(MonotonicPattern {
            column: column.to_string(),
            direction: "increasing".to_string(),
            ratio: inc_ratio,
            confidence: inc_ratio,
        })
    } else if dec_ratio > MONOTONIC_RATIO_THRESHOLD {
        Some(MonotonicPattern {
            column: column.to_string(),
            direction: "decreasing".to_string(),
            ratio: dec_ratio,
            confidence: dec_ratio,
        })
    } else {
        None
    }
}
