//! Markdown table source implementation.
//!
//! Only pipe tables are profiled: contiguous lines starting and ending with
//! `|`. The tables are converted to CSV (inline formatting stripped, cells
//! quoted where needed) and the CSV registers like any other file. The staged
//! CSV lives as long as the source so lazy engine reads stay valid.

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use datafusion::prelude::*;
use once_cell::sync::Lazy;
use regex::Regex;
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use super::{check_readable, DataSource};
use crate::error::{Result, TablescopeError};

static SEPARATOR_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[|\-:\s]+$").expect("static regex"));
static INLINE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("static regex"));

/// A markdown document whose pipe tables are converted to CSV for profiling.
#[derive(Debug)]
pub struct MarkdownSource {
    path: String,
    /// Staged CSV file, kept alive for the duration of the profiling run.
    staged: Mutex<Option<NamedTempFile>>,
}

impl MarkdownSource {
    /// Creates a new markdown source from a file path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            staged: Mutex::new(None),
        }
    }
}

/// Strips markdown inline formatting from a table cell.
fn strip_inline_formatting(cell: &str) -> String {
    let without_links = INLINE_LINK.replace_all(cell, "$1");
    without_links
        .replace("**", "")
        .replace("__", "")
        .replace(['*', '_', '`'], "")
        .trim()
        .to_string()
}

/// Quotes a CSV cell when it contains a delimiter, quote, or line break.
fn csv_quote(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') || cell.contains('\r') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// Extracts all pipe tables from markdown text and renders them as one CSV
/// document. Separator rows are skipped; rows from every table are appended
/// in document order (the first table's header leads).
pub fn markdown_tables_to_csv(text: &str) -> Result<String> {
    let mut out = String::new();
    let mut rows = 0usize;

    for line in text.lines() {
        let trimmed = line.trim();
        if !(trimmed.starts_with('|') && trimmed.ends_with('|') && trimmed.len() > 1) {
            continue;
        }
        if SEPARATOR_ROW.is_match(trimmed) {
            continue;
        }

        let inner = &trimmed[1..trimmed.len() - 1];
        let cells: Vec<String> = inner
            .split('|')
            .map(|cell| csv_quote(&strip_inline_formatting(cell)))
            .collect();

        out.push_str(&cells.join(","));
        out.push('\n');
        rows += 1;
    }

    if rows == 0 {
        return Err(TablescopeError::invalid_data(
            "no markdown tables found in document",
        ));
    }
    Ok(out)
}

#[async_trait]
impl DataSource for MarkdownSource {
    #[instrument(skip(self, ctx), fields(path = %self.path))]
    async fn register(&self, ctx: &SessionContext, table_name: &str) -> Result<()> {
        check_readable(&self.path)?;
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| TablescopeError::source_unreadable(&self.path, e.to_string()))?;
        let csv = markdown_tables_to_csv(&text)?;

        let mut staged = NamedTempFile::new()?;
        staged.write_all(csv.as_bytes())?;
        staged.flush()?;
        let staged_path = staged
            .path()
            .to_str()
            .ok_or_else(|| TablescopeError::internal("staged path is not valid UTF-8"))?
            .to_string();
        debug!(table = table_name, staged = %staged_path, "registering markdown tables as CSV");

        ctx.register_csv(table_name, &staged_path, CsvReadOptions::new().has_header(true))
            .await?;

        *self
            .staged
            .lock()
            .map_err(|_| TablescopeError::internal("staged file lock poisoned"))? = Some(staged);
        Ok(())
    }

    fn description(&self) -> String {
        format!("Markdown tables: {}", self.path)
    }
}
