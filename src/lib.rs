// Library interface for the leanrs modules
// This allows integration tests and benchmarks to access the core functionality

pub mod composition;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod insight;
pub mod logging;
pub mod models;
pub mod phases;
pub mod projection;
pub mod schedule;
pub mod storage;
pub mod tracker;
pub mod trend;

// Re-export commonly used types for convenience
pub use models::*;
pub use composition::BodyComposition;
pub use dashboard::{DashboardSummary, TrajectoryPoint};
pub use insight::{Insight, InsightCategory, InsightFormatter, StandardFormatter};
pub use phases::PhaseEvent;
pub use projection::{Projection, ProjectionBasis};
pub use storage::{JsonStore, TrackerData};
pub use tracker::{NewWeighIn, Replay, WeighInOutcome};
pub use trend::{TrendAnalysis, TrendDirection};
pub use error::{LeanRsError, Result};
pub use logging::{LogConfig, LogLevel, LogFormat};
