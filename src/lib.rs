//! AML Detection Pipeline Library
//!
//! Batch detection of money-laundering patterns (flow imbalance, structuring,
//! layering chains and dense communities) over a transaction graph, with
//! per-account risk ranking and CSV/JSON reporting.

pub mod config;
pub mod detectors;
pub mod loader;
pub mod metrics;
pub mod pipeline;
pub mod ranker;
pub mod report;
pub mod types;

pub use config::AppConfig;
pub use detectors::{CancelToken, Detector, DetectorKind};
pub use loader::{LoadedBatch, TransactionLoader};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use ranker::RiskRanker;
pub use report::{ReportPaths, ReportWriter};
pub use types::{Finding, PatternKind, Transaction, TransactionSet};
