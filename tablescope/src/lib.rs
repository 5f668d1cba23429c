//! # tablescope - Statistical Dataset Profiling for Rust
//!
//! tablescope turns tabular datasets (files or query results) into compact,
//! durable statistical descriptions that support anomaly scoring, PII risk
//! assessment, drift and segment comparison, and similarity search. It
//! leverages DataFusion for query execution, so profiling scales to datasets
//! that never fit in memory.
//!
//! ## Overview
//!
//! A profiling run produces a [`profile::DataProfile`]: per-column statistics,
//! distribution classification, text and time-series patterns, and data
//! quality alerts. Profiles are deduplicated and versioned by the
//! [`store::ProfileStore`] (content hashing, schema hashing, centroid
//! vectors) and registered as fixed-dimension embeddings in the
//! [`registry::VectorStore`] for approximate-nearest-neighbor retrieval.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tablescope::prelude::*;
//!
//! # async fn example() -> tablescope::error::Result<()> {
//! // Profile a CSV file.
//! let profiler = Profiler::new();
//! let profile = profiler.profile_path("data/users.csv").await?;
//!
//! // Score it.
//! let score = AnomalyScorer::new().score(&profile);
//! println!("{}: {:.3}", score.interpretation, score.overall_score);
//!
//! // Store it, deduplicated by content hash.
//! let mut store = ProfileStore::open(".tablescope").await?;
//! let info = store.store_file_profile(&profile, "data/users.csv").await?;
//! println!("stored as {}", info.id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`engine`**: thin adapter over the DataFusion session (SQL in, scalars
//!   and vectors out)
//! - **`sources`**: CSV, Parquet, JSON lines, XLSX, log, and markdown-table
//!   registration
//! - **`profile`**: the profile data model
//! - **`profiler`**: orchestration, type inference, alerting
//! - **`patterns`**: text patterns, distribution classification, trend,
//!   periodicity, time series, dataset-level patterns
//! - **`pii`**: ensemble PII risk assessment
//! - **`scoring`**: anomaly scoring and drift validation
//! - **`segments`**: centroids and segment comparison
//! - **`fidelity`**: synthetic-data fidelity validation
//! - **`store`**: content-addressed profile storage with baseline pinning
//! - **`registry`**: embedded vector registry with HNSW retrieval and
//!   brute-force fallback
//! - **`query_results`**: cacheable aggregates from ad-hoc query results

pub mod engine;
pub mod error;
pub mod fidelity;
pub mod logging;
pub mod patterns;
pub mod pii;
pub mod prelude;
pub mod profile;
pub mod profiler;
pub mod query_results;
pub mod registry;
pub mod scoring;
pub mod segments;
pub mod sources;
pub mod store;
