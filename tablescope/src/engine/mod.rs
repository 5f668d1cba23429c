//! Thin adapter over the analytical query engine.
//!
//! Profiling issues many small aggregate queries against a single registered
//! dataset table. [`QueryAdapter`] owns that table name, runs SQL through a
//! DataFusion [`SessionContext`], and converts Arrow results into plain Rust
//! scalars and vectors so the statistical layers never touch record batches.

use arrow::array::{
    Array, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, LargeStringArray,
    StringArray, StringViewArray, UInt64Array,
};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use datafusion::prelude::*;
use tracing::{debug, instrument};

use crate::error::{Result, TablescopeError};

/// Adapter binding a DataFusion session to one registered dataset table.
#[derive(Clone)]
pub struct QueryAdapter {
    ctx: SessionContext,
    table: String,
}

impl QueryAdapter {
    /// Wraps a session context whose `table` has already been registered.
    pub fn new(ctx: SessionContext, table: impl Into<String>) -> Self {
        Self {
            ctx,
            table: table.into(),
        }
    }

    /// The registered table name, usable as the read expression in SQL.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The underlying session context.
    pub fn session(&self) -> &SessionContext {
        &self.ctx
    }

    /// Runs SQL and collects all result batches.
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn sql(&self, query: &str) -> Result<Vec<RecordBatch>> {
        debug!(query, "executing engine query");
        let df = self
            .ctx
            .sql(query)
            .await
            .map_err(|e| TablescopeError::query_engine(e.to_string()))?;
        df.collect()
            .await
            .map_err(|e| TablescopeError::query_engine(e.to_string()))
    }

    /// Ordered `(name, data_type)` pairs of the dataset's columns.
    pub async fn schema_fields(&self) -> Result<Vec<(String, DataType)>> {
        let provider = self
            .ctx
            .table_provider(self.table.as_str())
            .await
            .map_err(|e| TablescopeError::query_engine(e.to_string()))?;
        let schema = provider.schema();
        Ok(schema
            .fields()
            .iter()
            .map(|f| (f.name().clone(), f.data_type().clone()))
            .collect())
    }

    /// Runs a query expected to yield a single integer cell.
    pub async fn scalar_i64(&self, query: &str) -> Result<i64> {
        let batches = self.sql(query).await?;
        first_cell_i64(&batches)
            .ok_or_else(|| TablescopeError::invalid_data(format!("no scalar result for: {query}")))
    }

    /// Runs a query expected to yield a single float cell; `None` when the
    /// aggregate is NULL (e.g. AVG over zero rows).
    pub async fn scalar_f64(&self, query: &str) -> Result<Option<f64>> {
        let batches = self.sql(query).await?;
        Ok(first_cell_f64(&batches))
    }

    /// Runs a query expected to yield a single string cell.
    pub async fn scalar_string(&self, query: &str) -> Result<Option<String>> {
        let batches = self.sql(query).await?;
        for batch in &batches {
            if batch.num_rows() > 0 {
                if batch.column(0).is_null(0) {
                    return Ok(None);
                }
                return Ok(Some(cell_string(batch.column(0).as_ref(), 0)?));
            }
        }
        Ok(None)
    }

    /// Collects the first result column as strings, skipping NULL rows.
    pub async fn column_strings(&self, query: &str) -> Result<Vec<String>> {
        let batches = self.sql(query).await?;
        let mut values = Vec::new();
        for batch in &batches {
            let col = batch.column(0);
            for i in 0..batch.num_rows() {
                if !col.is_null(i) {
                    values.push(cell_string(col.as_ref(), i)?);
                }
            }
        }
        Ok(values)
    }

    /// Collects the first result column as f64, skipping NULL rows.
    pub async fn column_f64s(&self, query: &str) -> Result<Vec<f64>> {
        let batches = self.sql(query).await?;
        let mut values = Vec::new();
        for batch in &batches {
            let col = batch.column(0);
            for i in 0..batch.num_rows() {
                if !col.is_null(i) {
                    if let Some(v) = cell_f64(col.as_ref(), i) {
                        values.push(v);
                    }
                }
            }
        }
        Ok(values)
    }

    /// Collects `(string, i64)` pairs from the first two result columns,
    /// the shape of every GROUP BY ... COUNT(*) query.
    pub async fn value_counts(&self, query: &str) -> Result<Vec<(String, i64)>> {
        let batches = self.sql(query).await?;
        let mut pairs = Vec::new();
        for batch in &batches {
            let values = batch.column(0);
            let counts = batch.column(1);
            for i in 0..batch.num_rows() {
                if values.is_null(i) {
                    continue;
                }
                let value = cell_string(values.as_ref(), i)?;
                let count = cell_i64(counts.as_ref(), i).ok_or_else(|| {
                    TablescopeError::invalid_data("expected integer count column")
                })?;
                pairs.push((value, count));
            }
        }
        Ok(pairs)
    }
}

/// Extracts the first cell of the first non-empty batch as i64.
pub fn first_cell_i64(batches: &[RecordBatch]) -> Option<i64> {
    for batch in batches {
        if batch.num_rows() > 0 {
            if batch.column(0).is_null(0) {
                return None;
            }
            return cell_i64(batch.column(0).as_ref(), 0);
        }
    }
    None
}

/// Extracts the first cell of the first non-empty batch as f64.
pub fn first_cell_f64(batches: &[RecordBatch]) -> Option<f64> {
    for batch in batches {
        if batch.num_rows() > 0 {
            if batch.column(0).is_null(0) {
                return None;
            }
            return cell_f64(batch.column(0).as_ref(), 0);
        }
    }
    None
}

/// Reads one cell as i64 across the integer array types the engine returns.
pub fn cell_i64(column: &dyn Array, row: usize) -> Option<i64> {
    if let Some(arr) = column.as_any().downcast_ref::<Int64Array>() {
        Some(arr.value(row))
    } else if let Some(arr) = column.as_any().downcast_ref::<UInt64Array>() {
        Some(arr.value(row) as i64)
    } else if let Some(arr) = column.as_any().downcast_ref::<Int32Array>() {
        Some(arr.value(row) as i64)
    } else {
        cell_f64(column, row).map(|v| v as i64)
    }
}

/// Reads one cell as f64 across the numeric array types the engine returns.
pub fn cell_f64(column: &dyn Array, row: usize) -> Option<f64> {
    if let Some(arr) = column.as_any().downcast_ref::<Float64Array>() {
        Some(arr.value(row))
    } else if let Some(arr) = column.as_any().downcast_ref::<Float32Array>() {
        Some(arr.value(row) as f64)
    } else if let Some(arr) = column.as_any().downcast_ref::<Int64Array>() {
        Some(arr.value(row) as f64)
    } else if let Some(arr) = column.as_any().downcast_ref::<Int32Array>() {
        Some(arr.value(row) as f64)
    } else if let Some(arr) = column.as_any().downcast_ref::<UInt64Array>() {
        Some(arr.value(row) as f64)
    } else {
        None
    }
}

/// Reads one cell as a display string across common array types.
pub fn cell_string(column: &dyn Array, row: usize) -> Result<String> {
    if let Some(arr) = column.as_any().downcast_ref::<StringArray>() {
        Ok(arr.value(row).to_string())
    } else if let Some(arr) = column.as_any().downcast_ref::<LargeStringArray>() {
        Ok(arr.value(row).to_string())
    } else if let Some(arr) = column.as_any().downcast_ref::<StringViewArray>() {
        Ok(arr.value(row).to_string())
    } else if let Some(arr) = column.as_any().downcast_ref::<Int64Array>() {
        Ok(arr.value(row).to_string())
    } else if let Some(arr) = column.as_any().downcast_ref::<Int32Array>() {
        Ok(arr.value(row).to_string())
    } else if let Some(arr) = column.as_any().downcast_ref::<UInt64Array>() {
        Ok(arr.value(row).to_string())
    } else if let Some(arr) = column.as_any().downcast_ref::<Float64Array>() {
        Ok(arr.value(row).to_string())
    } else if let Some(arr) = column.as_any().downcast_ref::<BooleanArray>() {
        Ok(arr.value(row).to_string())
    } else {
        Err(TablescopeError::invalid_data(format!(
            "unsupported array type for string extraction: {:?}",
            column.data_type()
        )))
    }
}

/// True when an engine-declared type is numeric.
pub fn is_numeric_type(dt: &DataType) -> bool {
    matches!(
        dt,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float16
            | DataType::Float32
            | DataType::Float64
            | DataType::Decimal128(_, _)
            | DataType::Decimal256(_, _)
    )
}

/// True when an engine-declared type is temporal.
pub fn is_temporal_type(dt: &DataType) -> bool {
    matches!(
        dt,
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) | DataType::Time32(_) | DataType::Time64(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::TimeUnit;
    use std::sync::Arc;

    #[test]
    fn test_type_predicates() {
        assert!(is_numeric_type(&DataType::Int64));
        assert!(is_numeric_type(&DataType::Float64));
        assert!(is_numeric_type(&DataType::Decimal128(10, 2)));
        assert!(!is_numeric_type(&DataType::Utf8));

        assert!(is_temporal_type(&DataType::Date32));
        assert!(is_temporal_type(&DataType::Timestamp(
            TimeUnit::Nanosecond,
            None
        )));
        assert!(!is_temporal_type(&DataType::Int64));
    }

    #[test]
    fn test_cell_extraction() {
        let ints: Arc<dyn Array> = Arc::new(Int64Array::from(vec![7i64]));
        assert_eq!(cell_i64(ints.as_ref(), 0), Some(7));
        assert_eq!(cell_f64(ints.as_ref(), 0), Some(7.0));
        assert_eq!(cell_string(ints.as_ref(), 0).unwrap(), "7");

        let floats: Arc<dyn Array> = Arc::new(Float64Array::from(vec![1.5f64]));
        assert_eq!(cell_f64(floats.as_ref(), 0), Some(1.5));
        // Truncating conversion mirrors SQL CAST semantics.
        assert_eq!(cell_i64(floats.as_ref(), 0), Some(1));

        let strings: Arc<dyn Array> = Arc::new(StringArray::from(vec!["x"]));
        assert_eq!(cell_string(strings.as_ref(), 0).unwrap(), "x");
        assert_eq!(cell_f64(strings.as_ref(), 0), None);
    }

    #[tokio::test]
    async fn test_adapter_scalars_against_memtable() {
        use arrow::datatypes::{Field, Schema};
        use datafusion::datasource::MemTable;

        let schema = Arc::new(Schema::new(vec![
            Field::new("v", DataType::Int64, true),
            Field::new("s", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![Some(1), Some(2), None])),
                Arc::new(StringArray::from(vec![Some("a"), Some("b"), Some("b")])),
            ],
        )
        .unwrap();
        let ctx = SessionContext::new();
        let table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
        ctx.register_table("data", Arc::new(table)).unwrap();

        let adapter = QueryAdapter::new(ctx, "data");
        let count = adapter
            .scalar_i64("SELECT COUNT(*) FROM data")
            .await
            .unwrap();
        assert_eq!(count, 3);

        let mean = adapter
            .scalar_f64("SELECT AVG(CAST(v AS DOUBLE)) FROM data")
            .await
            .unwrap();
        assert_eq!(mean, Some(1.5));

        let fields = adapter.schema_fields().await.unwrap();
        assert_eq!(fields[0].0, "v");
        assert_eq!(fields[1].0, "s");

        let counts = adapter
            .value_counts(
                "SELECT CAST(s AS VARCHAR) AS value, COUNT(*) AS cnt FROM data \
                 WHERE s IS NOT NULL GROUP BY s ORDER BY cnt DESC",
            )
            .await
            .unwrap();
        assert_eq!(counts[0], ("b".to_string(), 2));
    }
}
