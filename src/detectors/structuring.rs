//! Structuring ("smurfing") detection

use crate::config::StructuringConfig;
use crate::detectors::{CancelToken, Detector, DetectorKind};
use crate::types::{Finding, PatternKind, TransactionSet, TxRef};
use std::collections::BTreeMap;
use tracing::debug;

/// Finds bursts of small transfers sent by the same origin.
///
/// Each origin's transfers are scanned in timestamp order. A burst starts at
/// a candidate transfer and greedily absorbs the following transfers while
/// they stay within `window_minutes` of the start and at or below
/// `unit_limit`; the first transfer breaking either rule ends the burst. The
/// first burst reaching `min_count` is reported and the origin is done, so an
/// origin yields at most one finding.
#[derive(Debug, Clone)]
pub struct StructuringDetector {
    window_minutes: i64,
    unit_limit: f64,
    min_count: usize,
}

impl StructuringDetector {
    pub fn new(window_minutes: i64, unit_limit: f64, min_count: usize) -> Self {
        Self {
            window_minutes,
            unit_limit,
            min_count,
        }
    }

    pub fn from_config(config: &StructuringConfig) -> Self {
        Self::new(config.window_minutes, config.unit_limit, config.min_count)
    }

    /// Greedy burst starting at `sent[start]`
    fn burst_from<'a>(&self, sent: &'a [&'a TxRef], start: usize) -> &'a [&'a TxRef] {
        let opened_at = sent[start].timestamp;
        let len = sent[start..]
            .iter()
            .take_while(|tx| {
                (tx.timestamp - opened_at).num_minutes() <= self.window_minutes
                    && tx.amount <= self.unit_limit
            })
            .count();
        &sent[start..start + len]
    }
}

impl Detector for StructuringDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Structuring
    }

    fn detect(&self, transactions: &TransactionSet, cancel: &CancelToken) -> Vec<Finding> {
        let mut by_origin: BTreeMap<&str, Vec<&TxRef>> = BTreeMap::new();
        for tx in transactions {
            by_origin.entry(tx.origin.as_str()).or_default().push(tx);
        }

        let mut findings = Vec::new();
        for (origin, mut sent) in by_origin {
            if cancel.is_cancelled() {
                break;
            }
            // Stable: same-minute transfers keep ingestion order
            sent.sort_by_key(|tx| tx.timestamp);

            for start in 0..sent.len() {
                let burst = self.burst_from(&sent, start);
                if burst.len() >= self.min_count {
                    debug!(
                        origin = %origin,
                        transfers = burst.len(),
                        "Structuring burst found"
                    );
                    let evidence = burst.iter().map(|tx| TxRef::clone(tx)).collect();
                    findings.push(Finding::new(origin, PatternKind::Structuring, evidence));
                    break;
                }
            }
        }

        findings
    }
}
