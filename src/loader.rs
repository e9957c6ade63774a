//! CSV transaction loader

use crate::types::{Transaction, TransactionSet};
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Timestamp layout of field 0
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M";

/// Text shared by the start/end lines of an annotated laundering block
pub const BLOCK_MARKER: &str = "LAUNDERING ATTEMPT";

/// Delimiters of an annotated laundering block
const BLOCK_DELIMITERS: [&str; 2] = ["BEGIN LAUNDERING ATTEMPT", "END LAUNDERING ATTEMPT"];

/// Minimum number of fields in a transaction row
pub const MIN_FIELDS: usize = 11;

const TIMESTAMP_FIELD: usize = 0;
const ORIGIN_FIELD: usize = 2;
const DESTINATION_FIELD: usize = 4;
const AMOUNT_FIELD: usize = 5;

/// Failure to open a transaction source
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("input file '{}' not found", .0.display())]
    NotFound(PathBuf),

    #[error("failed to open '{}'", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Reason a single row was rejected
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid timestamp '{value}'")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid amount '{value}'")]
    Amount {
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },

    #[error("amount {0} is negative or not finite")]
    AmountOutOfRange(f64),

    #[error("malformed CSV record")]
    Csv(#[from] csv::Error),
}

/// Result of loading one source
#[derive(Debug, Clone, Default)]
pub struct LoadedBatch {
    /// Successfully parsed transactions, in file order
    pub transactions: TransactionSet,
    /// Rows that failed to parse (markers, blanks and short rows excluded)
    pub skipped: usize,
}

/// Loads transactions from delimited text files.
///
/// The first row is a header. Blank rows, block marker rows and rows with
/// fewer than [`MIN_FIELDS`] fields are ignored; rows that fail to parse are
/// skipped with a warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionLoader;

impl TransactionLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load every transaction from the file at `path`
    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> Result<LoadedBatch, LoadError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening transaction file");

        let file = File::open(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
            _ => LoadError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;

        Ok(self.load_reader(BufReader::new(file)))
    }

    /// Load every transaction from an arbitrary reader
    pub fn load_reader<R: Read>(&self, reader: R) -> LoadedBatch {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let mut transactions = Vec::new();
        let mut skipped = 0;

        for result in reader.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    skipped += 1;
                    let line = e.position().map(|p| p.line()).unwrap_or_default();
                    warn!(line = line, error = %RecordError::from(e), "Skipping unreadable row");
                    continue;
                }
            };
            let line = record.position().map(|p| p.line()).unwrap_or_default();

            if Self::is_ignorable(&record) {
                debug!(line = line, "Ignoring non-transaction row");
                continue;
            }

            match Self::parse_record(&record) {
                Ok(tx) => transactions.push(tx),
                Err(e) => {
                    skipped += 1;
                    warn!(
                        line = line,
                        row = %record.iter().collect::<Vec<_>>().join(","),
                        error = %e,
                        "Skipping invalid row"
                    );
                }
            }
        }

        info!(
            loaded = transactions.len(),
            skipped = skipped,
            "Transactions loaded"
        );

        LoadedBatch {
            transactions: TransactionSet::new(transactions),
            skipped,
        }
    }

    fn is_ignorable(record: &StringRecord) -> bool {
        record.iter().all(str::is_empty)
            || record
                .iter()
                .any(|field| BLOCK_DELIMITERS.iter().any(|marker| field.contains(marker)))
            || record.len() < MIN_FIELDS
    }

    /// Parse one full-width row into a transaction
    pub fn parse_record(record: &StringRecord) -> Result<Transaction, RecordError> {
        let field = |i: usize| record.get(i).unwrap_or_default();

        let raw_timestamp = field(TIMESTAMP_FIELD);
        let timestamp = NaiveDateTime::parse_from_str(raw_timestamp, TIMESTAMP_FORMAT).map_err(
            |source| RecordError::Timestamp {
                value: raw_timestamp.to_string(),
                source,
            },
        )?;

        let raw_amount = field(AMOUNT_FIELD);
        let amount: f64 = raw_amount.parse().map_err(|source| RecordError::Amount {
            value: raw_amount.to_string(),
            source,
        })?;
        if !amount.is_finite() || amount < 0.0 {
            return Err(RecordError::AmountOutOfRange(amount));
        }

        Ok(Transaction::new(
            field(ORIGIN_FIELD),
            field(DESTINATION_FIELD),
            amount,
            timestamp,
        ))
    }
}
