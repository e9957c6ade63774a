//! Type definitions for the detection pipeline

pub mod finding;
pub mod transaction;

pub use finding::{Evidence, Finding, PatternKind};
pub use transaction::{Transaction, TransactionSet, TxRef};
