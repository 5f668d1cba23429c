//! Prelude for commonly used types and traits in tablescope.

pub use crate::engine::QueryAdapter;
pub use crate::error::{ErrorContext, Result, TablescopeError};
pub use crate::fidelity::{FidelityReport, FidelityValidator};
pub use crate::logging::LogConfig;
pub use crate::pii::{ColumnPiiRisk, PiiDetector, PiiRiskLevel};
pub use crate::profile::{ColumnProfile, ColumnType, DataProfile};
pub use crate::profiler::{Profiler, ProfilerOptions};
pub use crate::registry::{EmbeddingService, VectorStore};
pub use crate::scoring::{AnomalyScorer, ValidationService};
pub use crate::segments::SegmentProfiler;
pub use crate::sources::{CsvSource, DataSource};
pub use crate::store::ProfileStore;
