//! Transaction data structures shared by every detector

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// A single transfer between two accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sending account identifier
    pub origin: String,

    /// Receiving account identifier
    pub destination: String,

    /// Transferred amount
    pub amount: f64,

    /// Booking time (minute resolution)
    pub timestamp: NaiveDateTime,
}

impl Transaction {
    /// Create a new transaction
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        amount: f64,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            amount,
            timestamp,
        }
    }

    /// Whether `account` sent or received this transaction
    pub fn involves(&self, account: &str) -> bool {
        self.origin == account || self.destination == account
    }
}

/// Shared handle to a transaction held by a [`TransactionSet`]
pub type TxRef = Arc<Transaction>;

/// Immutable, ordered batch of transactions.
///
/// Cloning only bumps a reference count, so each detector task can own a
/// handle to the same underlying batch.
#[derive(Debug, Clone)]
pub struct TransactionSet {
    transactions: Arc<[TxRef]>,
}

impl TransactionSet {
    /// Build a set from transactions in ingestion order
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions: transactions.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TxRef> {
        self.transactions.get(index)
    }

    /// Iterate over the shared transaction handles in ingestion order
    pub fn iter(&self) -> std::slice::Iter<'_, TxRef> {
        self.transactions.iter()
    }

    /// Distinct account identifiers appearing as origin or destination, sorted
    pub fn accounts(&self) -> BTreeSet<&str> {
        self.transactions
            .iter()
            .flat_map(|tx| [tx.origin.as_str(), tx.destination.as_str()])
            .collect()
    }
}

impl Default for TransactionSet {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl From<Vec<Transaction>> for TransactionSet {
    fn from(transactions: Vec<Transaction>) -> Self {
        Self::new(transactions)
    }
}

impl FromIterator<Transaction> for TransactionSet {
    fn from_iter<I: IntoIterator<Item = Transaction>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a TransactionSet {
    type Item = &'a TxRef;
    type IntoIter = std::slice::Iter<'a, TxRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
