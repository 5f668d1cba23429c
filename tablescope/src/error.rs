//! Error types for the tablescope profiling library.
//!
//! This module provides a comprehensive error handling strategy using `thiserror`
//! for automatic error trait implementations. All errors in the library are
//! represented by the `TablescopeError` enum; recoverable conditions (a single
//! pattern failing, a missing index extension) are absorbed close to where they
//! occur, while fatal conditions bubble out of the top-level operation.

use thiserror::Error;

/// The main error type for the tablescope library.
#[derive(Error, Debug)]
pub enum TablescopeError {
    /// The source file or stream could not be read.
    #[error("Source unreadable: {path}: {message}")]
    SourceUnreadable {
        /// Path or locator of the source
        path: String,
        /// Detailed error message
        message: String,
    },

    /// The source format is not supported by any registered reader.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The analytical query engine rejected or failed a query.
    #[error("Query engine failure: {0}")]
    QueryEngineFailure(String),

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// The profile store directory is missing or not writable.
    #[error("Store path unavailable: {0}")]
    PathUnavailable(String),

    /// The profile index could not be parsed; it is reloaded as empty.
    #[error("Profile index corrupt: {0}")]
    IndexCorrupt(String),

    /// Error from the embedded registry database.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Error from the embedding service.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error when parsing or processing data.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Data type mismatch or otherwise invalid data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Error when a required column is not found in the dataset.
    #[error("Column '{column}' not found in dataset")]
    ColumnNotFound { column: String },

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, TablescopeError>`.
///
/// This is the standard `Result` type used throughout the library.
pub type Result<T> = std::result::Result<T, TablescopeError>;

impl TablescopeError {
    /// Creates a source-unreadable error for the given path.
    pub fn source_unreadable(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnreadable {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a query engine failure with the given message.
    pub fn query_engine(msg: impl Into<String>) -> Self {
        Self::QueryEngineFailure(msg.into())
    }

    /// Creates an invalid data error with the given message.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Creates a registry error with the given message.
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Creates an embedding error with the given message.
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true when the condition should abort the whole operation
    /// rather than degrade a single column or pattern pass.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SourceUnreadable { .. }
                | Self::UnsupportedFormat(_)
                | Self::PathUnavailable(_)
                | Self::Io(_)
        )
    }
}

impl From<serde_json::Error> for TablescopeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for TablescopeError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Registry(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<TablescopeError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| {
            let base_error = e.into();
            TablescopeError::Internal(format!("{}: {}", msg, base_error))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let msg = f();
            let base_error = e.into();
            TablescopeError::Internal(format!("{}: {}", msg, base_error))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_unreadable_display() {
        let err = TablescopeError::source_unreadable("data/users.csv", "permission denied");
        assert_eq!(
            err.to_string(),
            "Source unreadable: data/users.csv: permission denied"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_column_not_found() {
        let err = TablescopeError::ColumnNotFound {
            column: "user_id".to_string(),
        };
        assert_eq!(err.to_string(), "Column 'user_id' not found in dataset");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_query_engine_failure_is_not_fatal() {
        // Query failures are retried by the caller, not treated as fatal.
        let err = TablescopeError::query_engine("timeout");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_error_context() {
        fn failing_operation() -> Result<()> {
            Err(TablescopeError::Internal("something went wrong".to_string()))
        }

        let result = failing_operation().context("during profiling");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("during profiling"));
    }
}
