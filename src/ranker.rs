//! Merging and ranking of findings from multiple detectors

use crate::types::{Finding, TxRef};
use std::collections::HashMap;

/// Separator placed between merged reasons
pub const REASON_SEPARATOR: &str = "; ";

/// Combines findings per account into a single ranked list.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskRanker;

/// Running merge of every finding seen for one account
struct Merged {
    account: String,
    reasons: Vec<String>,
    score: u32,
    evidence: Vec<TxRef>,
}

impl Merged {
    fn absorb(&mut self, finding: Finding) {
        self.reasons.push(finding.reason);
        self.score += finding.score;
        self.evidence.extend(finding.evidence.iter().cloned());
    }

    fn into_finding(self) -> Finding {
        Finding {
            account: self.account,
            reason: self.reasons.join(REASON_SEPARATOR),
            score: self.score,
            evidence: self.evidence.into(),
        }
    }
}

impl RiskRanker {
    pub fn new() -> Self {
        Self
    }

    /// Merge findings by account and sort by descending score.
    ///
    /// Reasons and evidence are concatenated in input order without
    /// deduplication and scores are summed. Equal scores are ordered by
    /// account identifier.
    pub fn rank(&self, findings: Vec<Finding>) -> Vec<Finding> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut merged: Vec<Merged> = Vec::new();

        for finding in findings {
            match index.get(&finding.account) {
                Some(&slot) => merged[slot].absorb(finding),
                None => {
                    index.insert(finding.account.clone(), merged.len());
                    let mut entry = Merged {
                        account: finding.account.clone(),
                        reasons: Vec::new(),
                        score: 0,
                        evidence: Vec::new(),
                    };
                    entry.absorb(finding);
                    merged.push(entry);
                }
            }
        }

        let mut ranked: Vec<Finding> = merged.into_iter().map(Merged::into_finding).collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.account.cmp(&b.account)));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::tx;
    use crate::types::{Evidence, PatternKind};
    use std::sync::Arc;

    fn evidence(count: usize) -> Evidence {
        (0..count)
            .map(|i| Arc::new(tx("A", "B", 1.0, i as i64)))
            .collect()
    }

    #[test]
    fn test_merge_sums_scores_and_keeps_duplicate_evidence() {
        let shared = evidence(2);
        let findings = vec![
            Finding::new("A", PatternKind::FlowImbalance, evidence(3)),
            Finding::new("A", PatternKind::Structuring, shared.clone()),
        ];

        let ranked = RiskRanker::new().rank(findings);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].score, 3);
        assert_eq!(ranked[0].evidence_count(), 5);
        assert_eq!(ranked[0].reason, "flow imbalance; structuring detected");
        assert!(Arc::ptr_eq(&ranked[0].evidence[3], &shared[0]));
    }

    #[test]
    fn test_same_evidence_cited_twice_is_repeated() {
        let shared = evidence(2);
        let findings = vec![
            Finding::new("A", PatternKind::Layering, shared.clone()),
            Finding::new("A", PatternKind::Layering, shared),
        ];

        let ranked = RiskRanker::new().rank(findings);

        assert_eq!(ranked[0].score, 6);
        assert_eq!(ranked[0].evidence_count(), 4);
        assert_eq!(ranked[0].reason, "layering detected; layering detected");
    }

    #[test]
    fn test_sorted_by_score_then_account() {
        let findings = vec![
            Finding::new("Z", PatternKind::FlowImbalance, evidence(1)),
            Finding::new("M", PatternKind::Structuring, evidence(1)),
            Finding::new("C", PatternKind::DenseCommunity, evidence(1)),
            Finding::new("Q", PatternKind::Layering, evidence(1)),
            Finding::new("B", PatternKind::FlowImbalance, evidence(1)),
        ];

        let ranked = RiskRanker::new().rank(findings);

        let order: Vec<(&str, u32)> = ranked
            .iter()
            .map(|f| (f.account.as_str(), f.score))
            .collect();
        assert_eq!(
            order,
            vec![("Q", 3), ("C", 2), ("M", 2), ("B", 1), ("Z", 1)]
        );
    }

    #[test]
    fn test_ranking_is_reproducible() {
        let build = || {
            (0..50)
                .map(|i| {
                    let account = format!("ACC{:02}", i % 17);
                    Finding::new(account, PatternKind::Structuring, evidence(1))
                })
                .collect::<Vec<_>>()
        };

        let accounts = |ranked: Vec<Finding>| -> Vec<String> {
            ranked.into_iter().map(|f| f.account).collect()
        };
        let first = accounts(RiskRanker::new().rank(build()));
        let second = accounts(RiskRanker::new().rank(build()));

        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_findings() {
        let ranked = RiskRanker::new().rank(Vec::new());
        assert!(ranked.is_empty());
    }
}
