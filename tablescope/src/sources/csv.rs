//! CSV file source implementation.

use async_trait::async_trait;
use datafusion::prelude::*;
use tracing::{debug, instrument};

use super::{check_readable, DataSource};
use crate::error::Result;

/// A CSV file data source with header and delimiter configuration.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: String,
    has_header: bool,
    delimiter: u8,
}

impl CsvSource {
    /// Creates a new CSV source from a file path, assuming a header row.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let delimiter = if path.to_lowercase().ends_with(".tsv") {
            b'\t'
        } else {
            b','
        };
        Self {
            path,
            has_header: true,
            delimiter,
        }
    }

    /// Sets whether the file carries a header row.
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Sets the field delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

#[async_trait]
impl DataSource for CsvSource {
    #[instrument(skip(self, ctx), fields(path = %self.path))]
    async fn register(&self, ctx: &SessionContext, table_name: &str) -> Result<()> {
        check_readable(&self.path)?;
        debug!(table = table_name, "registering CSV source");

        let options = CsvReadOptions::new()
            .has_header(self.has_header)
            .delimiter(self.delimiter);
        ctx.register_csv(table_name, &self.path, options).await?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("CSV file: {}", self.path)
    }
}
