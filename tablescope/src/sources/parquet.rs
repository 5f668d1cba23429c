//! Parquet file source implementation.

use async_trait::async_trait;
use datafusion::prelude::*;
use tracing::{debug, instrument};

use super::{check_readable, DataSource};
use crate::error::Result;

/// A Parquet file data source. Schema comes from the file metadata.
#[derive(Debug, Clone)]
pub struct ParquetSource {
    path: String,
}

impl ParquetSource {
    /// Creates a new Parquet source from a file path.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DataSource for ParquetSource {
    #[instrument(skip(self, ctx), fields(path = %self.path))]
    async fn register(&self, ctx: &SessionContext, table_name: &str) -> Result<()> {
        check_readable(&self.path)?;
        debug!(table = table_name, "registering Parquet source");

        ctx.register_parquet(table_name, &self.path, ParquetReadOptions::default())
            .await?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Parquet file: {}", self.path)
    }
}
