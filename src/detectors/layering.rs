//! Layering chain detection

use crate::config::LayeringConfig;
use crate::detectors::{CancelToken, Detector, DetectorKind};
use crate::types::{Finding, PatternKind, TransactionSet, TxRef};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Outgoing transfers per origin account, in ingestion order
type Adjacency<'a> = HashMap<&'a str, Vec<&'a TxRef>>;

/// Finds chains of pass-through transfers.
///
/// Every transaction seeds a depth-first search over outgoing transfers of
/// its destination. A hop is followed when its destination is not already on
/// the chain, it happens at most `time_window_minutes` after the previous hop
/// and its amount differs from the previous hop's by at most `amount_delta`.
/// A chain reaching `max_depth` transactions is reported against the seed's
/// origin. All branches are explored, and overlapping chains found from
/// different seeds are all reported.
#[derive(Debug, Clone)]
pub struct LayeringDetector {
    max_depth: usize,
    amount_delta: f64,
    time_window_minutes: i64,
}

/// Mutable state of one seeded search
struct ChainSearch<'a, 'c> {
    adjacency: &'c Adjacency<'a>,
    path: Vec<&'a TxRef>,
    on_path: HashSet<&'a str>,
    cancel: &'c CancelToken,
}

impl LayeringDetector {
    pub fn new(max_depth: usize, amount_delta: f64, time_window_minutes: i64) -> Self {
        Self {
            max_depth,
            amount_delta,
            time_window_minutes,
        }
    }

    pub fn from_config(config: &LayeringConfig) -> Self {
        Self::new(
            config.max_depth,
            config.amount_delta,
            config.time_window_minutes,
        )
    }

    fn continues(&self, previous: &TxRef, next: &TxRef) -> bool {
        (next.timestamp - previous.timestamp).num_minutes() <= self.time_window_minutes
            && (next.amount - previous.amount).abs() <= self.amount_delta
    }

    fn extend(&self, search: &mut ChainSearch<'_, '_>, findings: &mut Vec<Finding>) {
        if search.cancel.is_cancelled() {
            return;
        }

        if search.path.len() >= self.max_depth {
            let evidence = search.path.iter().map(|tx| TxRef::clone(tx)).collect();
            findings.push(Finding::new(
                search.path[0].origin.as_str(),
                PatternKind::Layering,
                evidence,
            ));
            return;
        }

        let adjacency = search.adjacency;
        let Some(&previous) = search.path.last() else {
            return;
        };
        let Some(outgoing) = adjacency.get(previous.destination.as_str()) else {
            return;
        };

        for &next in outgoing {
            let hop = next.destination.as_str();
            if search.on_path.contains(hop) || !self.continues(previous, next) {
                continue;
            }

            search.on_path.insert(hop);
            search.path.push(next);
            self.extend(search, findings);
            search.path.pop();
            search.on_path.remove(hop);
        }
    }
}

impl Detector for LayeringDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Layering
    }

    fn detect(&self, transactions: &TransactionSet, cancel: &CancelToken) -> Vec<Finding> {
        let mut adjacency: Adjacency = HashMap::new();
        for tx in transactions {
            adjacency.entry(tx.origin.as_str()).or_default().push(tx);
        }

        let mut findings = Vec::new();
        for seed in transactions {
            if cancel.is_cancelled() {
                break;
            }

            let mut search = ChainSearch {
                adjacency: &adjacency,
                path: Vec::with_capacity(self.max_depth.max(1)),
                on_path: HashSet::from([seed.origin.as_str(), seed.destination.as_str()]),
                cancel,
            };
            search.path.push(seed);
            self.extend(&mut search, &mut findings);
        }

        debug!(chains = findings.len(), "Layering search complete");
        findings
    }
}
