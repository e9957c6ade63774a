//! Dense community detection via k-core peeling

use crate::config::CommunityConfig;
use crate::detectors::{CancelToken, Detector, DetectorKind};
use crate::types::{Evidence, Finding, PatternKind, TransactionSet};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// Flags every account in the `min_degree`-core of the undirected
/// transaction graph.
///
/// Two accounts are neighbours if money moved between them in either
/// direction; repeated transfers between a pair count once and an account is
/// never its own neighbour. All findings share one evidence list: every
/// transaction with both endpoints inside the core.
#[derive(Debug, Clone)]
pub struct DenseCommunityDetector {
    min_degree: usize,
}

impl DenseCommunityDetector {
    pub fn new(min_degree: usize) -> Self {
        Self { min_degree }
    }

    pub fn from_config(config: &CommunityConfig) -> Self {
        Self::new(config.min_degree)
    }

    /// Accounts surviving the peeling, sorted by identifier
    pub fn core<'a>(&self, transactions: &'a TransactionSet) -> BTreeSet<&'a str> {
        let mut neighbours: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for tx in transactions {
            let (origin, destination) = (tx.origin.as_str(), tx.destination.as_str());
            neighbours.entry(origin).or_default();
            neighbours.entry(destination).or_default();
            if origin != destination {
                neighbours.entry(origin).or_default().insert(destination);
                neighbours.entry(destination).or_default().insert(origin);
            }
        }

        let mut degree: BTreeMap<&str, usize> = neighbours
            .iter()
            .map(|(&account, adjacent)| (account, adjacent.len()))
            .collect();
        let mut queue: VecDeque<&str> = degree
            .iter()
            .filter(|(_, &d)| d < self.min_degree)
            .map(|(&account, _)| account)
            .collect();
        let mut removed: BTreeSet<&str> = BTreeSet::new();

        while let Some(account) = queue.pop_front() {
            if !removed.insert(account) {
                continue;
            }
            let Some(adjacent) = neighbours.get(account) else {
                continue;
            };
            for &neighbour in adjacent {
                if removed.contains(neighbour) {
                    continue;
                }
                if let Some(d) = degree.get_mut(neighbour) {
                    *d = d.saturating_sub(1);
                    if *d < self.min_degree {
                        queue.push_back(neighbour);
                    }
                }
            }
        }

        neighbours
            .into_keys()
            .filter(|account| !removed.contains(account))
            .collect()
    }
}

impl Detector for DenseCommunityDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::DenseCommunity
    }

    fn detect(&self, transactions: &TransactionSet, cancel: &CancelToken) -> Vec<Finding> {
        let community = self.core(transactions);
        if community.is_empty() || cancel.is_cancelled() {
            return Vec::new();
        }

        let evidence: Evidence = transactions
            .iter()
            .filter(|tx| {
                community.contains(tx.origin.as_str())
                    && community.contains(tx.destination.as_str())
            })
            .cloned()
            .collect();

        debug!(
            accounts = community.len(),
            transactions = evidence.len(),
            min_degree = self.min_degree,
            "Dense community found"
        );

        community
            .into_iter()
            .map(|account| {
                Finding::new(account, PatternKind::DenseCommunity, Evidence::clone(&evidence))
            })
            .collect()
    }
}
