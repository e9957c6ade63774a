//! Per-account findings produced by the detectors

use crate::types::transaction::TxRef;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Ordered evidence backing a finding.
///
/// Entries are shared handles into the originating `TransactionSet`; a
/// single `Evidence` may itself be shared by several findings.
pub type Evidence = Arc<[TxRef]>;

/// Laundering pattern recognised by a detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    FlowImbalance,
    Structuring,
    Layering,
    DenseCommunity,
}

impl PatternKind {
    /// Human-readable reason attached to findings of this kind
    pub fn label(&self) -> &'static str {
        match self {
            PatternKind::FlowImbalance => "flow imbalance",
            PatternKind::Structuring => "structuring detected",
            PatternKind::Layering => "layering detected",
            PatternKind::DenseCommunity => "dense community",
        }
    }

    /// Severity weight of a single finding of this kind
    pub fn score(&self) -> u32 {
        match self {
            PatternKind::FlowImbalance => 1,
            PatternKind::Structuring => 2,
            PatternKind::Layering => 3,
            PatternKind::DenseCommunity => 2,
        }
    }
}

/// A verdict on one account, or the merge of several verdicts
#[derive(Debug, Clone)]
pub struct Finding {
    /// Flagged account identifier
    pub account: String,

    /// Reason label(s), `; `-separated once merged
    pub reason: String,

    /// Aggregate severity
    pub score: u32,

    /// Transactions justifying the finding
    pub evidence: Evidence,
}

impl Finding {
    /// Create a finding for a single detected pattern
    pub fn new(account: impl Into<String>, kind: PatternKind, evidence: Evidence) -> Self {
        Self {
            account: account.into(),
            reason: kind.label().to_string(),
            score: kind.score(),
            evidence,
        }
    }

    pub fn evidence_count(&self) -> usize {
        self.evidence.len()
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Account: {} | Reason: {} | Score: {} | Evidence: {} transactions",
            self.account,
            self.reason,
            self.score,
            self.evidence.len()
        )
    }
}
