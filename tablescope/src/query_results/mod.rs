//! Query result profiling: cacheable aggregates extracted from ad-hoc
//! query results, keyed by their filter context.
//!
//! Results arrive as a concrete [`QueryResult`] (named columns, typed cells)
//! rather than dynamic records, so the statistics here never guess at value
//! types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Cardinality ceiling for categorical distribution extraction.
const CATEGORICAL_MAX_CARDINALITY: usize = 50;
/// Share of outlying values that flags an outlier-cluster observation.
const OUTLIER_CLUSTER_SHARE: f64 = 0.05;

static WHERE_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\bWHERE\b(.*?)(?:\bGROUP\s+BY\b|\bORDER\s+BY\b|\bLIMIT\b|$)")
        .expect("static regex")
});
static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("static regex"));

static FILLER_WORDS: &[&str] = &[
    "what", "which", "is", "are", "the", "a", "an", "of", "for", "in", "on", "show", "me",
    "please", "how", "many", "much", "does", "do", "to", "and", "with", "by",
];

/// A typed cell in a query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Date(DateTime<Utc>),
    Null,
}

impl Value {
    /// Numeric view of the cell, when it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Text rendering used for categorical grouping.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Date(d) => Some(d.to_rfc3339()),
            Value::Float(_) | Value::Null => None,
        }
    }
}

/// A materialized query result: ordered columns, one map per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<HashMap<String, Value>>,
}

/// Numeric statistics of one result column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultColumnStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub q25: f64,
    pub q75: f64,
    pub outlier_count: usize,
}

/// A cacheable aggregate suitable for enriching a stored profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub column: String,
    pub statistic: String,
    pub value: f64,
    /// The WHERE clause context the aggregate was computed under, if any.
    pub filter_context: Option<String>,
}

/// One analyzed query result, keyed by its normalized question and filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedQueryResult {
    pub question: String,
    pub normalized_question: String,
    pub sql: String,
    pub where_clause: Option<String>,
    pub summary: String,
    pub related_columns: Vec<String>,
    pub column_stats: HashMap<String, ResultColumnStats>,
    pub categorical_distributions: HashMap<String, HashMap<String, i64>>,
    /// Human-readable observations (skew, near-constant, outlier clusters).
    pub observations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl CachedQueryResult {
    /// Flattens the numeric stats into aggregate records for profile
    /// enrichment, all tagged with this result's filter context.
    pub fn aggregate_records(&self) -> Vec<AggregateRecord> {
        let mut records = Vec::new();
        for (column, stats) in &self.column_stats {
            for (statistic, value) in [
                ("min", stats.min),
                ("max", stats.max),
                ("mean", stats.mean),
                ("median", stats.median),
                ("std_dev", stats.std_dev),
            ] {
                records.push(AggregateRecord {
                    column: column.clone(),
                    statistic: statistic.to_string(),
                    value,
                    filter_context: self.where_clause.clone(),
                });
            }
        }
        records
    }
}

/// Analyzes query results into cacheable aggregates.
#[derive(Debug, Clone, Default)]
pub struct QueryResultProfiler;

impl QueryResultProfiler {
    pub fn new() -> Self {
        Self
    }

    /// Wraps one answered question into a [`CachedQueryResult`].
    #[instrument(skip(self, result, summary))]
    pub fn analyze(
        &self,
        question: &str,
        sql: &str,
        summary: &str,
        result: &QueryResult,
        related_columns: Vec<String>,
    ) -> CachedQueryResult {
        let mut column_stats = HashMap::new();
        let mut categorical_distributions = HashMap::new();
        let mut observations = Vec::new();

        for column in &result.columns {
            let numeric: Vec<f64> = result
                .rows
                .iter()
                .filter_map(|row| row.get(column).and_then(Value::as_f64))
                .collect();

            if numeric.len() >= 2 {
                let stats = numeric_stats(&numeric);
                observations.extend(observe(column, &stats, numeric.len()));
                column_stats.insert(column.clone(), stats);
                continue;
            }

            let mut counts: HashMap<String, i64> = HashMap::new();
            for row in &result.rows {
                if let Some(text) = row.get(column).and_then(Value::as_text) {
                    *counts.entry(text).or_insert(0) += 1;
                }
            }
            if !counts.is_empty() && counts.len() <= CATEGORICAL_MAX_CARDINALITY {
                categorical_distributions.insert(column.clone(), counts);
            }
        }

        CachedQueryResult {
            question: question.to_string(),
            normalized_question: normalize_question(question),
            sql: sql.to_string(),
            where_clause: extract_where_clause(sql),
            summary: summary.to_string(),
            related_columns,
            column_stats,
            categorical_distributions,
            observations,
            created_at: Utc::now(),
        }
    }
}

/// Extracts the WHERE clause of a query, stopping before GROUP/ORDER/LIMIT.
pub fn extract_where_clause(sql: &str) -> Option<String> {
    WHERE_CLAUSE
        .captures(sql)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|clause| !clause.is_empty())
}

/// Lowercases a question, strips punctuation, and drops filler words.
pub fn normalize_question(question: &str) -> String {
    let lowered = question.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, " ");
    stripped
        .split_whitespace()
        .filter(|word| !FILLER_WORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let fraction = position - lower as f64;
        sorted[lower] + fraction * (sorted[upper] - sorted[lower])
    }
}

fn numeric_stats(values: &[f64]) -> ResultColumnStats {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    let q25 = quantile_sorted(&sorted, 0.25);
    let median = quantile_sorted(&sorted, 0.5);
    let q75 = quantile_sorted(&sorted, 0.75);
    let iqr = q75 - q25;
    let (lo, hi) = (q25 - 1.5 * iqr, q75 + 1.5 * iqr);
    let outlier_count = sorted.iter().filter(|v| **v < lo || **v > hi).count();

    ResultColumnStats {
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        mean,
        median,
        std_dev,
        q25,
        q75,
        outlier_count,
    }
}

fn observe(column: &str, stats: &ResultColumnStats, n: usize) -> Vec<String> {
    let mut observations = Vec::new();

    if stats.std_dev < 1e-12 {
        observations.push(format!("{column} is near-constant"));
        return observations;
    }

    let skew_gap = stats.mean - stats.median;
    if skew_gap.abs() > 0.5 * stats.std_dev {
        let direction = if skew_gap > 0.0 { "right" } else { "left" };
        observations.push(format!("{column} looks {direction}-skewed"));
    }

    if stats.outlier_count as f64 / n as f64 > OUTLIER_CLUSTER_SHARE {
        observations.push(format!(
            "{column} has an outlier cluster ({} of {} values)",
            stats.outlier_count, n
        ));
    }

    observations
}
