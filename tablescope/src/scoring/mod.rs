//! Profile scoring: anomaly scoring and drift validation.

pub mod anomaly;
pub mod drift;

pub use anomaly::{AnomalyScoreResult, AnomalyScorer, ComponentScores};
pub use drift::{ColumnDelta, DriftReport, ValidationService};
