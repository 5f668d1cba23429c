//! Profile orchestration: from a registered data source to a [`DataProfile`].
//!
//! The profiler runs a per-column aggregate pass (counts, moments, quantiles),
//! infers logical types, dispatches the pattern detectors, and finishes with
//! dataset-level passes (correlations, foreign keys, monotonic sequences).
//! A column whose enrichment fails degrades to basic statistics with a
//! warning alert; only unreadable sources fail the whole run.

use std::time::Instant;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use datafusion::prelude::SessionContext;
use tracing::{instrument, warn};

use crate::engine::{is_numeric_type, is_temporal_type, QueryAdapter};
use crate::error::Result;
use crate::logging::LogConfig;
use crate::patterns::{
    analyze_time_series, classify_distribution, detect_catalog_patterns, detect_dataset_patterns,
    detect_novel_pattern, detect_periodicity, detect_trend, DistributionStats,
};
use crate::pii::{PiiDetector, PiiRiskLevel};
use crate::profile::{
    AlertSeverity, ColumnProfile, ColumnType, ColumnCorrelation, DataAlert, DataProfile,
    ProfileInsight, TopValue,
};
use crate::sources::{source_for_path, DataSource};

/// Share of parseable sampled values required to call a text column numeric
/// or temporal.
const TYPE_PARSE_THRESHOLD: f64 = 0.95;
/// Cardinality ceiling for categorical columns.
const CATEGORICAL_MAX_UNIQUE: i64 = 1000;
/// Correlations weaker than this are not recorded.
const CORRELATION_THRESHOLD: f64 = 0.7;
/// Cap on numeric columns considered for pairwise correlation.
const CORRELATION_MAX_COLUMNS: usize = 20;

const SAMPLE_LIMIT_DEFAULT: usize = 1000;
const NUMERIC_SAMPLE_LIMIT: usize = 10_000;
const SERIES_SAMPLE_LIMIT: usize = 500;
const TIMESTAMP_SAMPLE_LIMIT: usize = 50_000;

/// Options controlling a profiling run.
#[derive(Debug, Clone)]
pub struct ProfilerOptions {
    /// Skip kurtosis, bimodality, periodicity, and dataset-level passes.
    pub fast_mode: bool,
    /// Values sampled per column for type inference and pattern detection.
    pub sample_size: Option<usize>,
    /// Size of the top-K value distribution.
    pub max_top_k: usize,
}

impl Default for ProfilerOptions {
    fn default() -> Self {
        Self {
            fast_mode: false,
            sample_size: None,
            max_top_k: 20,
        }
    }
}

/// Orchestrates profiling of one data source.
pub struct Profiler {
    options: ProfilerOptions,
    pii: PiiDetector,
    log: LogConfig,
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Profiler {
    /// Profiler with default options and the built-in PII ensemble.
    pub fn new() -> Self {
        Self {
            options: ProfilerOptions::default(),
            pii: PiiDetector::new(),
            log: LogConfig::default(),
        }
    }

    /// Profiler with explicit options.
    pub fn with_options(options: ProfilerOptions) -> Self {
        Self {
            options,
            pii: PiiDetector::new(),
            log: LogConfig::default(),
        }
    }

    /// Replaces the PII detector (e.g. to attach an external classifier).
    pub fn with_pii_detector(mut self, pii: PiiDetector) -> Self {
        self.pii = pii;
        self
    }

    /// Replaces the logging configuration, e.g. [`LogConfig::verbose`] to see
    /// every pattern-pass outcome including absorbed failures.
    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    fn sample_limit(&self) -> usize {
        self.options.sample_size.unwrap_or(SAMPLE_LIMIT_DEFAULT)
    }

    /// Profiles a file path, picking the source reader from the extension.
    #[instrument(skip(self))]
    pub async fn profile_path(&self, path: &str) -> Result<DataProfile> {
        let source = source_for_path(path)?;
        self.profile_source(source.as_ref(), path).await
    }

    /// Profiles an already-constructed source.
    pub async fn profile_source(
        &self,
        source: &dyn DataSource,
        source_path: &str,
    ) -> Result<DataProfile> {
        let ctx = SessionContext::new();
        source.register(&ctx, "dataset").await?;
        let adapter = QueryAdapter::new(ctx, "dataset");
        self.profile_adapter(&adapter, source_path).await
    }

    /// Profiles whatever table the adapter is bound to. This is the entry
    /// point for query sources registered directly with the engine.
    #[instrument(skip(self, adapter), fields(source = source_path))]
    pub async fn profile_adapter(
        &self,
        adapter: &QueryAdapter,
        source_path: &str,
    ) -> Result<DataProfile> {
        let started = Instant::now();
        let table = adapter.table().to_string();

        let row_count = adapter
            .scalar_i64(&format!("SELECT COUNT(*) FROM {table}"))
            .await?;
        let fields = adapter.schema_fields().await?;
        crate::log_data_op!(
            self.log,
            rows = row_count,
            columns = fields.len(),
            "profiling dataset"
        );

        let mut columns = Vec::with_capacity(fields.len());
        let mut alerts = Vec::new();

        for (name, data_type) in &fields {
            match self
                .profile_column(adapter, name, data_type, row_count)
                .await
            {
                Ok(column) => columns.push(column),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        column = %name,
                        error = %self.log.field(&e.to_string()),
                        "column enrichment failed, keeping basic stats"
                    );
                    alerts.push(DataAlert::new(
                        AlertSeverity::Warning,
                        Some(name.clone()),
                        "enrichment_failed",
                        format!("Enrichment failed for column '{name}': {e}"),
                    ));
                    columns.push(ColumnProfile::minimal(
                        name.clone(),
                        ColumnType::Text,
                        row_count,
                    ));
                }
            }
        }

        // Second pass: enrichments anchored to the dataset's first DateTime column.
        let anchor = columns
            .iter()
            .find(|c| c.inferred_type == ColumnType::DateTime)
            .map(|c| c.name.clone());
        for i in 0..columns.len() {
            if columns[i].inferred_type != ColumnType::Numeric {
                continue;
            }
            let name = columns[i].name.clone();
            match self
                .temporal_enrichment(adapter, &name, anchor.as_deref())
                .await
            {
                Ok((trend, periodicity)) => {
                    columns[i].trend = trend;
                    columns[i].periodicity = periodicity;
                }
                Err(e) => {
                    crate::log_pattern!(
                        self.log,
                        column = %name,
                        error = %self.log.field(&e.to_string()),
                        "temporal enrichment skipped"
                    );
                }
            }
        }

        self.emit_column_alerts(adapter, &mut columns, &mut alerts)
            .await;

        let mut correlations = Vec::new();
        let mut insights = Vec::new();
        if !self.options.fast_mode {
            correlations = self.correlations(adapter, &columns).await;
            insights = self.dataset_insights(adapter, &columns).await;
            for corr in &correlations {
                insights.push(ProfileInsight {
                    title: format!("{} correlates with {}", corr.col1, corr.col2),
                    description: format!(
                        "Pearson correlation {:.2} between '{}' and '{}'",
                        corr.correlation, corr.col1, corr.col2
                    ),
                    source: "correlation".to_string(),
                    related_columns: vec![corr.col1.clone(), corr.col2.clone()],
                });
            }
        }

        Ok(DataProfile {
            source_path: source_path.to_string(),
            row_count,
            column_count: fields.len(),
            profile_time: started.elapsed(),
            columns,
            alerts,
            correlations,
            insights,
        })
    }

    async fn profile_column(
        &self,
        adapter: &QueryAdapter,
        name: &str,
        data_type: &arrow::datatypes::DataType,
        row_count: i64,
    ) -> Result<ColumnProfile> {
        let table = adapter.table();
        let quoted = quote_ident(name);

        let batches = adapter
            .sql(&format!(
                "SELECT COUNT(*), COUNT({quoted}), COUNT(DISTINCT {quoted}) FROM {table}"
            ))
            .await?;
        let (count, non_null, unique_count) = match batches.first() {
            Some(batch) if batch.num_rows() > 0 => (
                crate::engine::cell_i64(batch.column(0).as_ref(), 0).unwrap_or(row_count),
                crate::engine::cell_i64(batch.column(1).as_ref(), 0).unwrap_or(0),
                crate::engine::cell_i64(batch.column(2).as_ref(), 0).unwrap_or(0),
            ),
            _ => (row_count, 0, 0),
        };
        let null_count = count - non_null;

        let samples = adapter
            .column_strings(&format!(
                "SELECT CAST({quoted} AS VARCHAR) FROM {table} \
                 WHERE {quoted} IS NOT NULL LIMIT {limit}",
                limit = self.sample_limit()
            ))
            .await?;

        let inferred_type = self
            .infer_type(
                adapter,
                name,
                data_type,
                &samples,
                count,
                non_null,
                unique_count,
            )
            .await?;

        let mut column = ColumnProfile::minimal(name, inferred_type, count);
        column.semantic_role = match inferred_type {
            ColumnType::Id => Some("identifier".to_string()),
            ColumnType::DateTime => Some("temporal".to_string()),
            _ => None,
        };
        column.null_count = null_count;
        column.null_percent = percent(null_count, count);
        column.unique_count = unique_count;
        column.unique_percent = percent(unique_count, count);
        column.cardinality_ratio = if non_null > 0 {
            unique_count as f64 / non_null as f64
        } else {
            0.0
        };

        match inferred_type {
            ColumnType::Numeric | ColumnType::Id => {
                self.numeric_stats(adapter, &mut column).await?;
            }
            ColumnType::DateTime => {
                self.datetime_stats(adapter, &mut column).await?;
            }
            ColumnType::Text => {
                self.text_stats(adapter, &mut column).await?;
                self.text_patterns(&mut column, &samples);
            }
            ColumnType::Categorical | ColumnType::Boolean => {}
        }

        if non_null > 0
            && unique_count <= CATEGORICAL_MAX_UNIQUE
            && matches!(
                inferred_type,
                ColumnType::Categorical | ColumnType::Boolean | ColumnType::Text
            )
        {
            self.categorical_stats(adapter, &mut column).await?;
        }

        Ok(column)
    }

    #[allow(clippy::too_many_arguments)]
    async fn infer_type(
        &self,
        adapter: &QueryAdapter,
        name: &str,
        data_type: &arrow::datatypes::DataType,
        samples: &[String],
        count: i64,
        non_null: i64,
        unique_count: i64,
    ) -> Result<ColumnType> {
        let engine_numeric = is_numeric_type(data_type);
        let engine_temporal = is_temporal_type(data_type);

        let numeric = engine_numeric || parse_rate(samples, |v| v.parse::<f64>().is_ok());
        if engine_temporal || (!numeric && parse_rate(samples, |v| parse_date(v).is_some())) {
            return Ok(ColumnType::DateTime);
        }

        if unique_count == 2 && non_null > 0 {
            let table = adapter.table();
            let quoted = quote_ident(name);
            let distinct = adapter
                .column_strings(&format!(
                    "SELECT DISTINCT CAST({quoted} AS VARCHAR) FROM {table} \
                     WHERE {quoted} IS NOT NULL"
                ))
                .await?;
            if distinct.iter().all(|v| is_boolean_token(v)) {
                return Ok(ColumnType::Boolean);
            }
        }

        let unique_percent = percent(unique_count, count);
        let id_name = {
            let lower = name.to_lowercase();
            lower == "id" || lower.ends_with("id")
        };
        // Near-unique numerics are ids only when integer-valued; a column of
        // distinct floats is a measurement, not a key.
        let integral =
            !samples.is_empty() && samples.iter().all(|v| v.trim().parse::<i64>().is_ok());
        if (unique_count == non_null && non_null > 0 && id_name)
            || (numeric && integral && unique_percent > 99.0)
        {
            return Ok(ColumnType::Id);
        }

        if numeric {
            return Ok(ColumnType::Numeric);
        }

        if unique_count <= CATEGORICAL_MAX_UNIQUE.min(count / 2) && unique_count > 0 {
            return Ok(ColumnType::Categorical);
        }

        Ok(ColumnType::Text)
    }

    async fn numeric_stats(
        &self,
        adapter: &QueryAdapter,
        column: &mut ColumnProfile,
    ) -> Result<()> {
        let table = adapter.table();
        let quoted = quote_ident(&column.name);
        let value = format!("CAST({quoted} AS DOUBLE)");

        let batches = adapter
            .sql(&format!(
                "SELECT MIN({value}), MAX({value}), AVG({value}), STDDEV({value}) \
                 FROM {table} WHERE {quoted} IS NOT NULL"
            ))
            .await?;
        if let Some(batch) = batches.first() {
            if batch.num_rows() > 0 {
                let get = |i: usize| {
                    if batch.column(i).is_null(0) {
                        None
                    } else {
                        crate::engine::cell_f64(batch.column(i).as_ref(), 0)
                    }
                };
                column.min = get(0);
                column.max = get(1);
                column.mean = get(2);
                column.std_dev = get(3);
            }
        }

        column.q25 = self.quantile(adapter, &column.name, 0.25).await?;
        column.median = self.quantile(adapter, &column.name, 0.5).await?;
        column.q75 = self.quantile(adapter, &column.name, 0.75).await?;
        if let (Some(q25), Some(q75)) = (column.q25, column.q75) {
            column.iqr = Some(q75 - q25);

            // Outliers by the 1.5 x IQR fence, computed after the quantiles.
            let iqr = q75 - q25;
            let (lo, hi) = (q25 - 1.5 * iqr, q75 + 1.5 * iqr);
            column.outlier_count = adapter
                .scalar_i64(&format!(
                    "SELECT COUNT(*) FROM {table} WHERE {quoted} IS NOT NULL \
                     AND ({value} < {lo} OR {value} > {hi})"
                ))
                .await?;
        }

        if let Some(median) = column.median {
            column.mad = adapter
                .scalar_f64(&format!(
                    "SELECT approx_percentile_cont(ABS({value} - {median}), 0.5) \
                     FROM {table} WHERE {quoted} IS NOT NULL"
                ))
                .await
                .unwrap_or(None);
        }

        if let (Some(mean), Some(std)) = (column.mean, column.std_dev) {
            if std > 0.0 {
                let m3 = adapter
                    .scalar_f64(&format!(
                        "SELECT AVG(POWER({value} - {mean}, 3)) FROM {table} \
                         WHERE {quoted} IS NOT NULL"
                    ))
                    .await?;
                column.skewness = m3.map(|m3| m3 / std.powi(3));

                if !self.options.fast_mode {
                    let m4 = adapter
                        .scalar_f64(&format!(
                            "SELECT AVG(POWER({value} - {mean}, 4)) FROM {table} \
                             WHERE {quoted} IS NOT NULL"
                        ))
                        .await?;
                    column.kurtosis = m4.map(|m4| m4 / std.powi(4));
                }
            }
        }

        if let (Some(min), Some(max), Some(std)) = (column.min, column.max, column.std_dev) {
            let samples = if self.options.fast_mode {
                Vec::new()
            } else {
                adapter
                    .column_f64s(&format!(
                        "SELECT {value} FROM {table} WHERE {quoted} IS NOT NULL \
                         LIMIT {NUMERIC_SAMPLE_LIMIT}"
                    ))
                    .await?
            };
            column.distribution = classify_distribution(
                &DistributionStats {
                    skewness: column.skewness.unwrap_or(0.0),
                    kurtosis: column.kurtosis.unwrap_or(3.0),
                    std_dev: std,
                    iqr: column.iqr.unwrap_or(0.0),
                    min,
                    max,
                },
                &samples,
            );
        }

        Ok(())
    }

    async fn quantile(
        &self,
        adapter: &QueryAdapter,
        column: &str,
        q: f64,
    ) -> Result<Option<f64>> {
        let table = adapter.table();
        let quoted = quote_ident(column);
        let value = format!("CAST({quoted} AS DOUBLE)");

        let approx = adapter
            .scalar_f64(&format!(
                "SELECT approx_percentile_cont({value}, {q}) FROM {table} \
                 WHERE {quoted} IS NOT NULL"
            ))
            .await;
        if let Ok(Some(v)) = approx {
            return Ok(Some(v));
        }

        // Exact fallback by ordered offset, as for engines without the
        // approximate aggregate.
        let n = adapter
            .scalar_i64(&format!(
                "SELECT COUNT({quoted}) FROM {table} WHERE {quoted} IS NOT NULL"
            ))
            .await?;
        if n == 0 {
            return Ok(None);
        }
        let offset = ((q * (n - 1) as f64).round() as i64).clamp(0, n - 1);
        adapter
            .scalar_f64(&format!(
                "SELECT {value} FROM {table} WHERE {quoted} IS NOT NULL \
                 ORDER BY {quoted} LIMIT 1 OFFSET {offset}"
            ))
            .await
    }

    async fn datetime_stats(
        &self,
        adapter: &QueryAdapter,
        column: &mut ColumnProfile,
    ) -> Result<()> {
        let table = adapter.table();
        let quoted = quote_ident(&column.name);

        let min_s = adapter
            .scalar_string(&format!(
                "SELECT CAST(MIN({quoted}) AS VARCHAR) FROM {table} WHERE {quoted} IS NOT NULL"
            ))
            .await?;
        let max_s = adapter
            .scalar_string(&format!(
                "SELECT CAST(MAX({quoted}) AS VARCHAR) FROM {table} WHERE {quoted} IS NOT NULL"
            ))
            .await?;
        column.min_date = min_s.as_deref().and_then(parse_date);
        column.max_date = max_s.as_deref().and_then(parse_date);
        if let (Some(min), Some(max)) = (column.min_date, column.max_date) {
            column.date_span_days = Some((max - min).num_days());
        }

        if !self.options.fast_mode {
            let timestamps = self.epoch_series(adapter, &column.name).await?;
            column.time_series = analyze_time_series(&timestamps, &column.name);
        }
        Ok(())
    }

    async fn epoch_series(&self, adapter: &QueryAdapter, column: &str) -> Result<Vec<f64>> {
        let table = adapter.table();
        let quoted = quote_ident(column);
        adapter
            .column_f64s(&format!(
                "SELECT CAST(date_part('epoch', CAST({quoted} AS TIMESTAMP)) AS DOUBLE) \
                 FROM {table} WHERE {quoted} IS NOT NULL \
                 ORDER BY {quoted} LIMIT {TIMESTAMP_SAMPLE_LIMIT}"
            ))
            .await
    }

    async fn text_stats(&self, adapter: &QueryAdapter, column: &mut ColumnProfile) -> Result<()> {
        let table = adapter.table();
        let quoted = quote_ident(&column.name);
        let length = format!("LENGTH(CAST({quoted} AS VARCHAR))");

        let batches = adapter
            .sql(&format!(
                "SELECT AVG(CAST({length} AS DOUBLE)), MAX({length}) \
                 FROM {table} WHERE {quoted} IS NOT NULL"
            ))
            .await?;
        if let Some(batch) = batches.first() {
            if batch.num_rows() > 0 {
                if !batch.column(0).is_null(0) {
                    column.avg_length = crate::engine::cell_f64(batch.column(0).as_ref(), 0);
                }
                if !batch.column(1).is_null(0) {
                    column.max_length = crate::engine::cell_i64(batch.column(1).as_ref(), 0);
                }
            }
        }
        Ok(())
    }

    fn text_patterns(&self, column: &mut ColumnProfile, samples: &[String]) {
        if samples.is_empty() {
            return;
        }
        column.text_patterns = detect_catalog_patterns(samples);
        if column.text_patterns.is_empty() && samples.len() >= 10 {
            if let Some(novel) = detect_novel_pattern(samples) {
                column.text_patterns.push(novel);
            }
        }
        for pattern in &column.text_patterns {
            crate::log_pattern!(
                self.log,
                column = %column.name,
                kind = ?pattern.pattern_type,
                regex = %self.log.field(&pattern.regex),
                match_percent = pattern.match_percent,
                "text pattern detected"
            );
        }
    }

    async fn categorical_stats(
        &self,
        adapter: &QueryAdapter,
        column: &mut ColumnProfile,
    ) -> Result<()> {
        let table = adapter.table();
        let quoted = quote_ident(&column.name);

        let counts = adapter
            .value_counts(&format!(
                "SELECT CAST({quoted} AS VARCHAR) AS value, COUNT(*) AS cnt FROM {table} \
                 WHERE {quoted} IS NOT NULL \
                 GROUP BY CAST({quoted} AS VARCHAR) ORDER BY cnt DESC, value LIMIT 10000"
            ))
            .await?;
        if counts.is_empty() {
            return Ok(());
        }

        let non_null = column.non_null_count().max(1);
        column.top_values = counts
            .iter()
            .take(self.options.max_top_k)
            .map(|(value, count)| TopValue {
                value: value.clone(),
                count: *count,
                percent: percent(*count, non_null),
            })
            .collect();

        let total: i64 = counts.iter().map(|(_, c)| c).sum();
        let entropy: f64 = counts
            .iter()
            .map(|(_, c)| {
                let p = *c as f64 / total as f64;
                if p > 0.0 {
                    -p * p.log2()
                } else {
                    0.0
                }
            })
            .sum();
        column.entropy = Some(entropy);

        let max_count = counts.iter().map(|(_, c)| *c).max().unwrap_or(0);
        let min_count = counts.iter().map(|(_, c)| *c).min().unwrap_or(1).max(1);
        column.imbalance_ratio = Some(max_count as f64 / min_count as f64);

        Ok(())
    }

    async fn temporal_enrichment(
        &self,
        adapter: &QueryAdapter,
        column: &str,
        anchor: Option<&str>,
    ) -> Result<(Option<crate::profile::TrendInfo>, Option<crate::profile::PeriodicityInfo>)> {
        let table = adapter.table();
        let quoted = quote_ident(column);
        let value = format!("CAST({quoted} AS DOUBLE)");

        let (points, ordered_values) = match anchor {
            Some(anchor_col) if anchor_col != column => {
                let anchor_quoted = quote_ident(anchor_col);
                let batches = adapter
                    .sql(&format!(
                        "SELECT CAST(date_part('epoch', CAST({anchor_quoted} AS TIMESTAMP)) AS DOUBLE), {value} \
                         FROM {table} WHERE {quoted} IS NOT NULL AND {anchor_quoted} IS NOT NULL \
                         ORDER BY {anchor_quoted} LIMIT {NUMERIC_SAMPLE_LIMIT}"
                    ))
                    .await?;
                let mut pairs = Vec::new();
                for batch in &batches {
                    for i in 0..batch.num_rows() {
                        if batch.column(0).is_null(i) || batch.column(1).is_null(i) {
                            continue;
                        }
                        let ts = crate::engine::cell_f64(batch.column(0).as_ref(), i);
                        let v = crate::engine::cell_f64(batch.column(1).as_ref(), i);
                        if let (Some(ts), Some(v)) = (ts, v) {
                            pairs.push((ts, v));
                        }
                    }
                }
                let min_ts = pairs.first().map(|(ts, _)| *ts).unwrap_or(0.0);
                let points: Vec<(f64, f64)> = pairs
                    .iter()
                    .map(|(ts, v)| ((ts - min_ts) / 86_400.0, *v))
                    .collect();
                let values: Vec<f64> = pairs.iter().map(|(_, v)| *v).collect();
                (points, values)
            }
            _ => {
                let values = adapter
                    .column_f64s(&format!(
                        "SELECT {value} FROM {table} WHERE {quoted} IS NOT NULL \
                         LIMIT {NUMERIC_SAMPLE_LIMIT}"
                    ))
                    .await?;
                let points: Vec<(f64, f64)> = values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (i as f64, *v))
                    .collect();
                (points, values)
            }
        };

        let trend = detect_trend(&points, anchor.is_some());
        let periodicity = if self.options.fast_mode {
            None
        } else {
            let series: Vec<f64> = ordered_values
                .into_iter()
                .take(SERIES_SAMPLE_LIMIT)
                .collect();
            detect_periodicity(&series)
        };
        Ok((trend, periodicity))
    }

    async fn emit_column_alerts(
        &self,
        adapter: &QueryAdapter,
        columns: &mut [ColumnProfile],
        alerts: &mut Vec<DataAlert>,
    ) {
        for column in columns.iter_mut() {
            if column.null_percent > 50.0 {
                alerts.push(DataAlert::new(
                    AlertSeverity::Error,
                    Some(column.name.clone()),
                    "high_null_rate",
                    format!("Column '{}' is {:.1}% null", column.name, column.null_percent),
                ));
            } else if column.null_percent > 20.0 {
                alerts.push(DataAlert::new(
                    AlertSeverity::Warning,
                    Some(column.name.clone()),
                    "high_null_rate",
                    format!("Column '{}' is {:.1}% null", column.name, column.null_percent),
                ));
            }

            if column.is_constant() {
                alerts.push(DataAlert::new(
                    AlertSeverity::Info,
                    Some(column.name.clone()),
                    "constant_column",
                    format!("Column '{}' holds a single value", column.name),
                ));
            }

            if matches!(
                column.inferred_type,
                ColumnType::Text | ColumnType::Categorical
            ) && column.non_null_count() > 0
            {
                let table = adapter.table();
                let quoted = quote_ident(&column.name);
                let samples = adapter
                    .column_strings(&format!(
                        "SELECT CAST({quoted} AS VARCHAR) FROM {table} \
                         WHERE {quoted} IS NOT NULL LIMIT {limit}",
                        limit = self.sample_limit()
                    ))
                    .await
                    .unwrap_or_default();
                match self.pii.assess(column, &samples).await {
                    Ok(risk) if risk.risk_level >= PiiRiskLevel::Medium => {
                        let severity = if risk.risk_level == PiiRiskLevel::Critical {
                            AlertSeverity::Warning
                        } else {
                            AlertSeverity::Info
                        };
                        alerts.push(DataAlert::new(
                            severity,
                            Some(column.name.clone()),
                            "pii_risk",
                            format!(
                                "Column '{}' carries {:?} PII risk: {:?}",
                                column.name,
                                risk.risk_level,
                                risk.detected_types()
                            ),
                        ));
                        // Risky columns get synthesis guidance: suppress the
                        // top-value distribution, and require k-anonymity for
                        // the highest risk levels.
                        column.synthesis_policy = Some(crate::profile::SynthesisPolicy {
                            k_anonymity_threshold: (risk.risk_level >= PiiRiskLevel::High)
                                .then_some(5),
                            suppress_top_values: true,
                        });
                    }
                    Ok(_) => {}
                    Err(e) => {
                        crate::log_pattern!(
                            self.log,
                            column = %column.name,
                            error = %self.log.field(&e.to_string()),
                            "pii assessment skipped"
                        );
                    }
                }
            }
        }
    }

    async fn correlations(
        &self,
        adapter: &QueryAdapter,
        columns: &[ColumnProfile],
    ) -> Vec<ColumnCorrelation> {
        let numeric: Vec<&ColumnProfile> = columns
            .iter()
            .filter(|c| c.inferred_type == ColumnType::Numeric)
            .take(CORRELATION_MAX_COLUMNS)
            .collect();

        let table = adapter.table();
        let mut correlations = Vec::new();
        for i in 0..numeric.len() {
            for j in i + 1..numeric.len() {
                let a = quote_ident(&numeric[i].name);
                let b = quote_ident(&numeric[j].name);
                let sql = format!(
                    "SELECT corr(CAST({a} AS DOUBLE), CAST({b} AS DOUBLE)) FROM {table} \
                     WHERE {a} IS NOT NULL AND {b} IS NOT NULL"
                );
                match adapter.scalar_f64(&sql).await {
                    Ok(Some(r)) if r.abs() >= CORRELATION_THRESHOLD && r.is_finite() => {
                        correlations.push(ColumnCorrelation {
                            col1: numeric[i].name.clone(),
                            col2: numeric[j].name.clone(),
                            correlation: r.clamp(-1.0, 1.0),
                        });
                    }
                    Ok(_) => {}
                    Err(e) => {
                        crate::log_pattern!(
                            self.log,
                            error = %self.log.field(&e.to_string()),
                            "correlation query skipped"
                        );
                    }
                }
            }
        }
        correlations
    }

    async fn dataset_insights(
        &self,
        adapter: &QueryAdapter,
        columns: &[ColumnProfile],
    ) -> Vec<ProfileInsight> {
        let mut insights = Vec::new();
        match detect_dataset_patterns(adapter, columns).await {
            Ok(patterns) => {
                for fk in &patterns.fk_candidates {
                    insights.push(ProfileInsight {
                        title: format!(
                            "{} references {}",
                            fk.categorical_column, fk.id_column
                        ),
                        description: format!(
                            "{:.1}% of '{}' values appear in '{}'",
                            fk.overlap * 100.0,
                            fk.categorical_column,
                            fk.id_column
                        ),
                        source: "pattern_detector".to_string(),
                        related_columns: vec![
                            fk.categorical_column.clone(),
                            fk.id_column.clone(),
                        ],
                    });
                }
                for mono in &patterns.monotonic {
                    insights.push(ProfileInsight {
                        title: format!("{} is {}", mono.column, mono.direction),
                        description: format!(
                            "{:.1}% of steps move in one direction (confidence {:.2})",
                            mono.ratio * 100.0,
                            mono.confidence
                        ),
                        source: "pattern_detector".to_string(),
                        related_columns: vec![mono.column.clone()],
                    });
                }
            }
            Err(e) => {
                crate::log_pattern!(
                    self.log,
                    error = %self.log.field(&e.to_string()),
                    "dataset pattern pass skipped"
                );
            }
        }
        insights
    }
}

fn percent(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Fraction-threshold parse check used by type inference.
fn parse_rate(samples: &[String], check: impl Fn(&str) -> bool) -> bool {
    if samples.is_empty() {
        return false;
    }
    let hits = samples.iter().filter(|v| check(v.trim())).count();
    hits as f64 / samples.len() as f64 > TYPE_PARSE_THRESHOLD
}

fn is_boolean_token(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "false" | "0" | "1" | "yes" | "no"
    )
}

/// Parses the date formats recognized by type inference:
/// `YYYY-MM-DD`, `MM/DD/YYYY`, and ISO 8601 timestamps.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&ndt));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&ndt));
    }
    if let Ok(nd) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&nd.and_hms_opt(0, 0, 0)?));
    }
    if let Ok(nd) = NaiveDate::parse_from_str(trimmed, "%m/%d/%Y") {
        return Some(Utc.from_utc_datetime(&nd.and_hms_opt(0, 0, 0)?));
    }
    None
}
