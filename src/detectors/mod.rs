//! Rule-based laundering pattern detectors
//!
//! Every detector is a pure function of a read-only [`TransactionSet`]: it
//! builds its own private indexes and returns findings in a deterministic
//! order, so detectors can run side by side on the same batch.

pub mod community;
pub mod flow;
pub mod layering;
pub mod structuring;

pub use community::DenseCommunityDetector;
pub use flow::FlowImbalanceDetector;
pub use layering::LayeringDetector;
pub use structuring::StructuringDetector;

use crate::config::DetectionConfig;
use crate::types::{Finding, TransactionSet};
use clap::ValueEnum;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Selects one of the available detectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum DetectorKind {
    FlowImbalance,
    Structuring,
    Layering,
    DenseCommunity,
}

impl DetectorKind {
    /// All detectors in canonical run order
    pub const ALL: [DetectorKind; 4] = [
        DetectorKind::FlowImbalance,
        DetectorKind::Structuring,
        DetectorKind::Layering,
        DetectorKind::DenseCommunity,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DetectorKind::FlowImbalance => "flow_imbalance",
            DetectorKind::Structuring => "structuring",
            DetectorKind::Layering => "layering",
            DetectorKind::DenseCommunity => "dense_community",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cooperative cancellation flag shared between the pipeline and a running detector
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A laundering pattern detector
pub trait Detector: Send + Sync {
    /// Which detector this is
    fn kind(&self) -> DetectorKind;

    /// Scan the batch and return one finding per flagged account (or chain).
    ///
    /// Output produced after `cancel` trips is incomplete and is discarded by
    /// the pipeline.
    fn detect(&self, transactions: &TransactionSet, cancel: &CancelToken) -> Vec<Finding>;
}

/// Build the detector for `kind` from its configuration section
pub fn build(kind: DetectorKind, config: &DetectionConfig) -> Arc<dyn Detector> {
    match kind {
        DetectorKind::FlowImbalance => {
            Arc::new(FlowImbalanceDetector::from_config(&config.flow_imbalance))
        }
        DetectorKind::Structuring => {
            Arc::new(StructuringDetector::from_config(&config.structuring))
        }
        DetectorKind::Layering => Arc::new(LayeringDetector::from_config(&config.layering)),
        DetectorKind::DenseCommunity => {
            Arc::new(DenseCommunityDetector::from_config(&config.community))
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::types::Transaction;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    /// Fixed reference instant for detector fixtures
    pub fn base_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 9, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    pub fn tx(origin: &str, destination: &str, amount: f64, minutes: i64) -> Transaction {
        Transaction::new(
            origin,
            destination,
            amount,
            base_time() + Duration::minutes(minutes),
        )
    }
}
