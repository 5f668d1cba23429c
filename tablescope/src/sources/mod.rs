//! Data source connectors for profiling.
//!
//! Each source knows how to register itself with a DataFusion session so the
//! profiler can address it as a plain table. File formats cover CSV, Parquet,
//! JSON lines, XLSX workbooks, plain log files, and markdown documents whose
//! pipe tables are converted to CSV before registration.

use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use std::fmt::Debug;
use std::path::Path;

mod csv;
mod json;
mod log;
mod markdown;
mod parquet;
mod xlsx;

pub use csv::CsvSource;
pub use json::JsonSource;
pub use log::LogSource;
pub use markdown::{markdown_tables_to_csv, MarkdownSource};
pub use parquet::ParquetSource;
pub use xlsx::XlsxSource;

use crate::error::{Result, TablescopeError};

/// Kind of dataset being profiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Csv,
    Parquet,
    Json,
    Xlsx,
    Log,
    Markdown,
    /// A query result registered directly with the engine.
    Query,
}

impl SourceKind {
    /// Detects the source kind from a file extension.
    pub fn detect(path: &str) -> Result<Self> {
        let lower = path.to_lowercase();
        let ext = Path::new(&lower)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        match ext {
            "csv" | "tsv" => Ok(Self::Csv),
            "parquet" => Ok(Self::Parquet),
            "json" | "jsonl" | "ndjson" => Ok(Self::Json),
            "xlsx" | "xls" => Ok(Self::Xlsx),
            "log" | "txt" => Ok(Self::Log),
            "md" | "markdown" => Ok(Self::Markdown),
            other => Err(TablescopeError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// A data source that can be registered with a DataFusion context.
///
/// # Examples
///
/// ```rust,ignore
/// use tablescope::sources::{CsvSource, DataSource};
///
/// # async fn example() -> tablescope::error::Result<()> {
/// let source = CsvSource::new("data/users.csv");
/// let ctx = datafusion::prelude::SessionContext::new();
/// source.register(&ctx, "users").await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait DataSource: Debug + Send + Sync {
    /// Registers this data source with the given session context under
    /// `table_name`, inferring the schema where the format allows it.
    async fn register(&self, ctx: &SessionContext, table_name: &str) -> Result<()>;

    /// Returns a human-readable description of this data source.
    fn description(&self) -> String;
}

/// Builds the source matching a path's extension.
pub fn source_for_path(path: &str) -> Result<Box<dyn DataSource>> {
    match SourceKind::detect(path)? {
        SourceKind::Csv => Ok(Box::new(CsvSource::new(path))),
        SourceKind::Parquet => Ok(Box::new(ParquetSource::new(path))),
        SourceKind::Json => Ok(Box::new(JsonSource::new(path))),
        SourceKind::Xlsx => Ok(Box::new(XlsxSource::new(path))),
        SourceKind::Log => Ok(Box::new(LogSource::new(path))),
        SourceKind::Markdown => Ok(Box::new(MarkdownSource::new(path))),
        SourceKind::Query => Err(TablescopeError::Configuration(
            "query sources are registered directly with the engine".to_string(),
        )),
    }
}

/// Verifies the path exists before registration, turning the miss into the
/// fatal source-unreadable error instead of a later engine failure.
pub(crate) fn check_readable(path: &str) -> Result<()> {
    if !Path::new(path).is_file() {
        return Err(TablescopeError::source_unreadable(
            path,
            "file does not exist",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_detection() {
        assert_eq!(SourceKind::detect("data/users.csv").unwrap(), SourceKind::Csv);
        assert_eq!(SourceKind::detect("x.PARQUET").unwrap(), SourceKind::Parquet);
        assert_eq!(SourceKind::detect("lines.ndjson").unwrap(), SourceKind::Json);
        assert_eq!(SourceKind::detect("book.xlsx").unwrap(), SourceKind::Xlsx);
        assert_eq!(SourceKind::detect("app.log").unwrap(), SourceKind::Log);
        assert_eq!(SourceKind::detect("notes.md").unwrap(), SourceKind::Markdown);
        assert!(matches!(
            SourceKind::detect("archive.zip"),
            Err(TablescopeError::UnsupportedFormat(_))
        ));
    }
}
