//! Plain text log file source implementation.
//!
//! Log files register as a single-column table named `line`, letting the text
//! pattern detectors run over raw log lines.

use std::sync::Arc;

use arrow::array::StringArray;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use tokio::io::AsyncBufReadExt;
use tracing::{debug, instrument};

use super::{check_readable, DataSource};
use crate::error::{Result, TablescopeError};

/// A plain log or text file exposed as a one-column table.
#[derive(Debug, Clone)]
pub struct LogSource {
    path: String,
}

impl LogSource {
    /// Creates a new log source from a file path.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DataSource for LogSource {
    #[instrument(skip(self, ctx), fields(path = %self.path))]
    async fn register(&self, ctx: &SessionContext, table_name: &str) -> Result<()> {
        check_readable(&self.path)?;

        let file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| TablescopeError::source_unreadable(&self.path, e.to_string()))?;
        let mut lines = tokio::io::BufReader::new(file).lines();
        let mut collected = Vec::new();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| TablescopeError::source_unreadable(&self.path, e.to_string()))?
        {
            collected.push(line);
        }
        debug!(table = table_name, rows = collected.len(), "registering log source");

        let schema = Arc::new(Schema::new(vec![Field::new("line", DataType::Utf8, true)]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(StringArray::from(collected))],
        )?;
        let table = MemTable::try_new(schema, vec![vec![batch]])?;
        ctx.register_table(table_name, Arc::new(table))?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Log file: {}", self.path)
    }
}
