//! Net flow imbalance detection

use crate::config::FlowImbalanceConfig;
use crate::detectors::{CancelToken, Detector, DetectorKind};
use crate::types::{Evidence, Finding, PatternKind, TransactionSet};
use std::collections::BTreeMap;
use tracing::debug;

/// Flags accounts whose net outflow exceeds a threshold.
///
/// Net balance is `received - sent` over the whole batch. An account is
/// flagged when its balance is strictly below `-threshold`; its evidence is
/// every transaction it takes part in.
#[derive(Debug, Clone)]
pub struct FlowImbalanceDetector {
    threshold: f64,
}

impl FlowImbalanceDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn from_config(config: &FlowImbalanceConfig) -> Self {
        Self::new(config.threshold)
    }

    /// Net balance per account, keyed by account identifier
    pub fn balances<'a>(&self, transactions: &'a TransactionSet) -> BTreeMap<&'a str, f64> {
        let mut balances: BTreeMap<&str, f64> = BTreeMap::new();
        for tx in transactions {
            *balances.entry(tx.destination.as_str()).or_insert(0.0) += tx.amount;
            *balances.entry(tx.origin.as_str()).or_insert(0.0) -= tx.amount;
        }
        balances
    }
}

impl Detector for FlowImbalanceDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::FlowImbalance
    }

    fn detect(&self, transactions: &TransactionSet, cancel: &CancelToken) -> Vec<Finding> {
        let mut findings = Vec::new();

        for (account, balance) in self.balances(transactions) {
            if cancel.is_cancelled() {
                break;
            }
            if balance >= -self.threshold {
                continue;
            }

            let evidence: Evidence = transactions
                .iter()
                .filter(|tx| tx.involves(account))
                .cloned()
                .collect();

            debug!(account = %account, balance = balance, "Net outflow above threshold");
            findings.push(Finding::new(account, PatternKind::FlowImbalance, evidence));
        }

        findings
    }
}
