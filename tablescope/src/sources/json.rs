//! Newline-delimited JSON source implementation.

use async_trait::async_trait;
use datafusion::prelude::*;
use tracing::{debug, instrument};

use super::{check_readable, DataSource};
use crate::error::Result;

/// A JSON-lines data source (one object per line).
#[derive(Debug, Clone)]
pub struct JsonSource {
    path: String,
}

impl JsonSource {
    /// Creates a new JSON-lines source from a file path.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    fn file_extension(&self) -> &'static str {
        let lower = self.path.to_lowercase();
        if lower.ends_with(".ndjson") {
            ".ndjson"
        } else if lower.ends_with(".jsonl") {
            ".jsonl"
        } else {
            ".json"
        }
    }
}

#[async_trait]
impl DataSource for JsonSource {
    #[instrument(skip(self, ctx), fields(path = %self.path))]
    async fn register(&self, ctx: &SessionContext, table_name: &str) -> Result<()> {
        check_readable(&self.path)?;
        debug!(table = table_name, "registering JSON lines source");

        let mut options = NdJsonReadOptions::default();
        options.file_extension = self.file_extension();
        ctx.register_json(table_name, &self.path, options).await?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("JSON lines file: {}", self.path)
    }
}
