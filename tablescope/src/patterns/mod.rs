//! Pattern detection over profiled columns.
//!
//! Per-column enrichments (text patterns, distribution family, trend,
//! periodicity, time-series structure) are pure functions of one column's
//! sampled data plus the dataset's DateTime anchor, so enrichment order never
//! changes the resulting profile. Dataset-level passes (foreign-key candidates,
//! monotonic sequences) run after all columns are profiled.

pub mod dataset;
pub mod distribution;
pub mod periodicity;
pub mod text;
pub mod timeseries;
pub mod trend;

pub use dataset::{
    detect_dataset_patterns, monotonic_from_values, DatasetPatterns, ForeignKeyCandidate,
    MonotonicPattern,
};
pub use distribution::{classify_distribution, histogram, DistributionStats};
pub use periodicity::{autocorrelation, detect_periodicity};
pub use text::{char_class_signature, detect_catalog_patterns, detect_novel_pattern};
pub use timeseries::analyze_time_series;
pub use trend::detect_trend;
