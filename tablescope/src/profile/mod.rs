//! The profile data model: per-column statistics, enrichments, and alerts.
//!
//! A [`DataProfile`] is the durable statistical description of one dataset
//! snapshot. It is assembled by the profiler, enriched by the pattern
//! detectors, and immutable once handed to the store.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inferred logical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// Integer or floating point values
    Numeric,
    /// Low-cardinality discrete values
    Categorical,
    /// Dates or timestamps
    DateTime,
    /// Free-form text
    Text,
    /// Two-valued true/false style columns
    Boolean,
    /// Unique row identifiers
    Id,
}

impl ColumnType {
    /// Short lowercase name used in schema hashing and signatures.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Categorical => "categorical",
            ColumnType::DateTime => "datetime",
            ColumnType::Text => "text",
            ColumnType::Boolean => "boolean",
            ColumnType::Id => "id",
        }
    }
}

/// Severity of a data quality alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
}

/// A single data quality finding attached to a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataAlert {
    pub severity: AlertSeverity,
    /// Column the alert refers to, or `None` for dataset-level alerts.
    pub column: Option<String>,
    /// Machine-readable alert type, e.g. `"high_null_rate"`.
    pub alert_type: String,
    pub message: String,
}

impl DataAlert {
    pub fn new(
        severity: AlertSeverity,
        column: Option<String>,
        alert_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            column,
            alert_type: alert_type.into(),
            message: message.into(),
        }
    }
}

/// One entry of a column's top-K value distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopValue {
    pub value: String,
    pub count: i64,
    /// Share of non-null rows, 0..=100.
    pub percent: f64,
}

/// Distribution family detected for a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistributionKind {
    Normal,
    Uniform,
    RightSkewed,
    LeftSkewed,
    Exponential,
    PowerLaw,
    Bimodal,
    #[default]
    Unknown,
}

/// Direction of a detected linear trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    None,
}

/// A linear trend of a numeric column over time (or row order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendInfo {
    pub direction: TrendDirection,
    pub slope: f64,
    pub r_squared: f64,
    /// True when the regression was anchored to a DateTime column
    /// rather than row order.
    pub time_anchored: bool,
}

/// Dominant period detected by autocorrelation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodicityInfo {
    /// Dominant lag, in rows.
    pub dominant_period: usize,
    /// Autocorrelation at the dominant lag, clipped to [0, 1].
    pub confidence: f64,
    /// Human interpretation, e.g. "Weekly" for period 7.
    pub interpretation: String,
}

/// Granularity bucket of a time-series column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeGranularity {
    Minute,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl TimeGranularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeGranularity::Minute => "minute",
            TimeGranularity::Hourly => "hourly",
            TimeGranularity::Daily => "daily",
            TimeGranularity::Weekly => "weekly",
            TimeGranularity::Monthly => "monthly",
            TimeGranularity::Quarterly => "quarterly",
            TimeGranularity::Yearly => "yearly",
        }
    }
}

/// Time-series characteristics of a DateTime column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesInfo {
    pub granularity: TimeGranularity,
    /// Expected periods minus observed distinct periods at the granularity.
    pub gap_count: i64,
    pub gap_percent: f64,
    /// True when gap_percent < 5.
    pub is_contiguous: bool,
    /// Day-of-week count variation suggests weekly seasonality.
    pub seasonality_suspected: bool,
    /// When multiple temporal columns exist, the one that anchored
    /// trend and periodicity analysis.
    pub anchor_column: String,
}

/// Kind of text pattern detected in a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextPatternType {
    Email,
    Url,
    Uuid,
    Phone,
    Ipv4,
    CreditCard,
    Percentage,
    Currency,
    /// Dominant character-class signature inferred from samples.
    Novel,
}

/// A text pattern matched by a meaningful share of a column's values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPattern {
    pub pattern_type: TextPatternType,
    pub regex: String,
    /// Share of non-null sampled values matching, 0..=100.
    pub match_percent: f64,
    pub description: String,
}

/// Synthesis guidance attached to sensitive columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SynthesisPolicy {
    pub k_anonymity_threshold: Option<u32>,
    pub suppress_top_values: bool,
}

/// Pearson correlation between two numeric columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnCorrelation {
    pub col1: String,
    pub col2: String,
    /// In [-1, 1].
    pub correlation: f64,
}

/// A human-readable observation derived from the profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileInsight {
    pub title: String,
    pub description: String,
    /// Component that produced the insight, e.g. "pattern_detector".
    pub source: String,
    pub related_columns: Vec<String>,
}

/// Per-column statistical summary.
///
/// Numeric, datetime, text, and categorical blocks are populated according to
/// the inferred type; absent statistics stay `None` rather than carrying
/// sentinel values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub inferred_type: ColumnType,
    pub semantic_role: Option<String>,

    // Counts
    pub count: i64,
    pub null_count: i64,
    pub null_percent: f64,
    pub unique_count: i64,
    pub unique_percent: f64,
    pub cardinality_ratio: f64,

    // Numeric statistics
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub median: Option<f64>,
    pub q25: Option<f64>,
    pub q75: Option<f64>,
    pub iqr: Option<f64>,
    pub mad: Option<f64>,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
    pub outlier_count: i64,

    // DateTime statistics
    pub min_date: Option<DateTime<Utc>>,
    pub max_date: Option<DateTime<Utc>>,
    pub date_span_days: Option<i64>,

    // Text statistics
    pub avg_length: Option<f64>,
    pub max_length: Option<i64>,

    // Categorical statistics
    pub top_values: Vec<TopValue>,
    pub entropy: Option<f64>,
    pub imbalance_ratio: Option<f64>,

    // Enrichment set by the pattern detector
    pub distribution: DistributionKind,
    pub trend: Option<TrendInfo>,
    pub time_series: Option<TimeSeriesInfo>,
    pub periodicity: Option<PeriodicityInfo>,
    pub text_patterns: Vec<TextPattern>,

    pub synthesis_policy: Option<SynthesisPolicy>,
}

impl ColumnProfile {
    /// A column profile with only identity and counts, used when per-column
    /// enrichment fails and the column degrades to basic statistics.
    pub fn minimal(name: impl Into<String>, inferred_type: ColumnType, count: i64) -> Self {
        Self {
            name: name.into(),
            inferred_type,
            semantic_role: None,
            count,
            null_count: 0,
            null_percent: 0.0,
            unique_count: 0,
            unique_percent: 0.0,
            cardinality_ratio: 0.0,
            min: None,
            max: None,
            mean: None,
            std_dev: None,
            median: None,
            q25: None,
            q75: None,
            iqr: None,
            mad: None,
            skewness: None,
            kurtosis: None,
            outlier_count: 0,
            min_date: None,
            max_date: None,
            date_span_days: None,
            avg_length: None,
            max_length: None,
            top_values: Vec::new(),
            entropy: None,
            imbalance_ratio: None,
            distribution: DistributionKind::Unknown,
            trend: None,
            time_series: None,
            periodicity: None,
            text_patterns: Vec::new(),
            synthesis_policy: None,
        }
    }

    /// Number of non-null rows.
    pub fn non_null_count(&self) -> i64 {
        self.count - self.null_count
    }

    /// True when every non-null value is identical.
    pub fn is_constant(&self) -> bool {
        self.unique_count == 1 && self.non_null_count() > 0
    }

    /// True when the column looks like a row identifier by name.
    pub fn has_id_name(&self) -> bool {
        let lower = self.name.to_lowercase();
        lower == "id" || lower.ends_with("_id") || lower.ends_with("id")
    }

    /// One-sentence structured description used for the registry column embedding.
    pub fn summary_sentence(&self) -> String {
        let mut parts = vec![format!(
            "column {} type {} nulls {:.1}% unique {:.1}%",
            self.name,
            self.inferred_type.as_str(),
            self.null_percent,
            self.unique_percent
        )];
        if let (Some(mean), Some(std)) = (self.mean, self.std_dev) {
            parts.push(format!("mean {mean:.4} std {std:.4}"));
        }
        if let Some(top) = self.top_values.first() {
            parts.push(format!("mode {} {:.1}%", top.value, top.percent));
        }
        if let Some(pattern) = self.text_patterns.first() {
            parts.push(format!("pattern {:?}", pattern.pattern_type));
        }
        if self.distribution != DistributionKind::Unknown {
            parts.push(format!("distribution {:?}", self.distribution));
        }
        parts.join(" ")
    }
}

/// A named dataset snapshot: the output of one profiling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataProfile {
    pub source_path: String,
    pub row_count: i64,
    pub column_count: usize,
    /// Wall time spent profiling.
    pub profile_time: Duration,
    pub columns: Vec<ColumnProfile>,
    pub alerts: Vec<DataAlert>,
    pub correlations: Vec<ColumnCorrelation>,
    pub insights: Vec<ProfileInsight>,
}

impl DataProfile {
    /// Case-insensitive column lookup. Stored names keep their original case.
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// The first DateTime column in source order, if any. It anchors trend
    /// and periodicity analysis for the whole dataset.
    pub fn datetime_anchor(&self) -> Option<&ColumnProfile> {
        self.columns
            .iter()
            .find(|c| c.inferred_type == ColumnType::DateTime)
    }

    /// Columns of a given inferred type, in source order.
    pub fn columns_of_type(&self, ty: ColumnType) -> impl Iterator<Item = &ColumnProfile> {
        self.columns.iter().filter(move |c| c.inferred_type == ty)
    }

    /// Dataset-level sentence used for the registry summary embedding.
    pub fn summary_text(&self) -> String {
        let type_counts = |ty: ColumnType| self.columns_of_type(ty).count();
        format!(
            "dataset {} rows {} columns {} numeric {} categorical {} datetime {} text {} alerts {}",
            self.source_path,
            self.row_count,
            self.column_count,
            type_counts(ColumnType::Numeric),
            type_counts(ColumnType::Categorical),
            type_counts(ColumnType::DateTime),
            type_counts(ColumnType::Text),
            self.alerts.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_column(name: &str) -> ColumnProfile {
        let mut col = ColumnProfile::minimal(name, ColumnType::Numeric, 100);
        col.null_count = 10;
        col.null_percent = 10.0;
        col.unique_count = 90;
        col
    }

    #[test]
    fn test_case_insensitive_lookup_preserves_case() {
        let profile = DataProfile {
            source_path: "test.csv".into(),
            row_count: 100,
            column_count: 1,
            profile_time: Duration::from_millis(5),
            columns: vec![sample_column("UserId")],
            alerts: vec![],
            correlations: vec![],
            insights: vec![],
        };

        let col = profile.column("userid").expect("lookup should succeed");
        assert_eq!(col.name, "UserId");
        assert!(profile.column("missing").is_none());
    }

    #[test]
    fn test_non_null_count() {
        let col = sample_column("amount");
        assert_eq!(col.non_null_count(), 90);
    }

    #[test]
    fn test_constant_column() {
        let mut col = sample_column("country");
        col.unique_count = 1;
        assert!(col.is_constant());
    }

    #[test]
    fn test_id_name_heuristic() {
        assert!(sample_column("user_id").has_id_name());
        assert!(sample_column("id").has_id_name());
        assert!(sample_column("OrderId").has_id_name());
        assert!(!sample_column("amount").has_id_name());
    }

    #[test]
    fn test_profile_roundtrip_serde() {
        let profile = DataProfile {
            source_path: "test.csv".into(),
            row_count: 2,
            column_count: 1,
            profile_time: Duration::from_secs(1),
            columns: vec![sample_column("a")],
            alerts: vec![DataAlert::new(
                AlertSeverity::Warning,
                Some("a".into()),
                "high_null_rate",
                "10% nulls",
            )],
            correlations: vec![],
            insights: vec![],
        };

        let json = serde_json::to_string(&profile).unwrap();
        let back: DataProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, profile);
    }
}
