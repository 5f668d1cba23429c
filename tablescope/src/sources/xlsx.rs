//! XLSX/XLS workbook source implementation.
//!
//! Workbooks are materialized as in-memory string tables: the first row of the
//! first sheet supplies column names, every following row becomes a record.
//! Type inference downstream treats the columns like CSV text columns.

use std::sync::Arc;

use arrow::array::StringArray;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use calamine::{open_workbook_auto, Data, Reader};
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use tracing::{debug, instrument};

use super::{check_readable, DataSource};
use crate::error::{Result, TablescopeError};

/// An Excel workbook data source reading the first worksheet.
#[derive(Debug, Clone)]
pub struct XlsxSource {
    path: String,
    sheet: Option<String>,
}

impl XlsxSource {
    /// Creates a new workbook source reading the first sheet.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sheet: None,
        }
    }

    /// Selects a specific worksheet by name.
    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    fn cell_to_string(cell: &Data) -> Option<String> {
        match cell {
            Data::Empty => None,
            Data::String(s) => Some(s.clone()),
            Data::Float(f) => Some(f.to_string()),
            Data::Int(i) => Some(i.to_string()),
            Data::Bool(b) => Some(b.to_string()),
            Data::DateTime(dt) => Some(dt.as_f64().to_string()),
            Data::DateTimeIso(s) => Some(s.clone()),
            Data::DurationIso(s) => Some(s.clone()),
            Data::Error(e) => Some(format!("{e:?}")),
        }
    }

    fn read_rows(&self) -> Result<(Vec<String>, Vec<Vec<Option<String>>>)> {
        let mut workbook = open_workbook_auto(&self.path)
            .map_err(|e| TablescopeError::source_unreadable(&self.path, e.to_string()))?;

        let sheet_name = match &self.sheet {
            Some(name) => name.clone(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| TablescopeError::source_unreadable(&self.path, "no worksheets"))?,
        };

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| TablescopeError::source_unreadable(&self.path, e.to_string()))?;

        let mut rows = range.rows();
        let header: Vec<String> = rows
            .next()
            .ok_or_else(|| TablescopeError::source_unreadable(&self.path, "empty worksheet"))?
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                Self::cell_to_string(cell).unwrap_or_else(|| format!("column_{}", i + 1))
            })
            .collect();

        let records: Vec<Vec<Option<String>>> = rows
            .map(|row| {
                (0..header.len())
                    .map(|i| row.get(i).and_then(Self::cell_to_string))
                    .collect()
            })
            .collect();

        Ok((header, records))
    }
}

#[async_trait]
impl DataSource for XlsxSource {
    #[instrument(skip(self, ctx), fields(path = %self.path))]
    async fn register(&self, ctx: &SessionContext, table_name: &str) -> Result<()> {
        check_readable(&self.path)?;
        let (header, records) = self.read_rows()?;
        debug!(
            table = table_name,
            columns = header.len(),
            rows = records.len(),
            "registering XLSX source"
        );

        let fields: Vec<Field> = header
            .iter()
            .map(|name| Field::new(name, DataType::Utf8, true))
            .collect();
        let schema = Arc::new(Schema::new(fields));

        let arrays: Vec<Arc<dyn arrow::array::Array>> = (0..header.len())
            .map(|col| {
                let values: Vec<Option<String>> =
                    records.iter().map(|row| row[col].clone()).collect();
                Arc::new(StringArray::from(values)) as Arc<dyn arrow::array::Array>
            })
            .collect();

        let batch = RecordBatch::try_new(schema.clone(), arrays)?;
        let table = MemTable::try_new(schema, vec![vec![batch]])?;
        ctx.register_table(table_name, Arc::new(table))?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Excel workbook: {}", self.path)
    }
}
