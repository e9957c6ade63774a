//! Synthetic Dataset Generator
//!
//! Writes a transaction CSV of random background transfers with injected
//! laundering patterns, each wrapped in BEGIN/END LAUNDERING ATTEMPT lines.

use aml_detection_pipeline::loader::{BLOCK_MARKER, TIMESTAMP_FORMAT};
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use clap::Parser;
use csv::{Writer, WriterBuilder};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

const HEADER: [&str; 11] = [
    "Timestamp",
    "From Bank",
    "Account",
    "To Bank",
    "Account",
    "Amount Received",
    "Receiving Currency",
    "Amount Paid",
    "Payment Currency",
    "Payment Format",
    "Is Laundering",
];

const PAYMENT_FORMATS: [&str; 5] = ["Cheque", "Credit Card", "ACH", "Cash", "Wire"];

#[derive(Parser, Debug)]
#[command(name = "generate-dataset")]
#[command(about = "Generate a synthetic transaction CSV with injected laundering patterns")]
struct Args {
    /// Output CSV path
    #[arg(default_value = "synthetic_dataset.csv")]
    output: PathBuf,

    /// Number of background transactions
    #[arg(default_value_t = 1000)]
    background: usize,

    /// Random seed
    #[arg(default_value_t = 42)]
    seed: u64,
}

/// One generated row
#[derive(Debug, Clone)]
struct Row {
    timestamp: NaiveDateTime,
    origin: String,
    destination: String,
    amount: f64,
    laundering: bool,
}

/// Random transaction generator
struct DatasetGenerator {
    rng: StdRng,
    accounts: Vec<String>,
    start: NaiveDateTime,
}

impl DatasetGenerator {
    fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let accounts = (0..200)
            .map(|_| format!("8{:08X}", rng.gen::<u32>()))
            .collect();
        let start = NaiveDate::from_ymd_opt(2022, 9, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();

        Self { rng, accounts, start }
    }

    fn account(&mut self) -> String {
        self.accounts[self.rng.gen_range(0..self.accounts.len())].clone()
    }

    /// Ordinary transfers spread over ten days, in time order
    fn background(&mut self, count: usize) -> Vec<Row> {
        let mut rows: Vec<Row> = (0..count)
            .map(|_| {
                let origin = self.account();
                let mut destination = self.account();
                while destination == origin {
                    destination = self.account();
                }
                Row {
                    timestamp: self.start + Duration::minutes(self.rng.gen_range(0..14_400)),
                    origin,
                    destination,
                    amount: self.rng.gen_range(10.0..5_000.0),
                    laundering: false,
                }
            })
            .collect();
        rows.sort_by_key(|row| row.timestamp);
        rows
    }

    /// One sender splitting funds into several sub-limit transfers within hours
    fn structuring(&mut self) -> Vec<Row> {
        let mut at = self.start + Duration::days(2);
        (0..6)
            .map(|i| {
                at += Duration::minutes(self.rng.gen_range(20..120));
                Row {
                    timestamp: at,
                    origin: "SMURF0001".to_string(),
                    destination: format!("MULE{:04}", i),
                    amount: self.rng.gen_range(9_000.0..19_500.0),
                    laundering: true,
                }
            })
            .collect()
    }

    /// Funds hopping through intermediaries with a small cut taken at each hop
    fn layering(&mut self) -> Vec<Row> {
        let mut at = self.start + Duration::days(4);
        let mut amount = self.rng.gen_range(40_000.0..60_000.0);
        (0..4)
            .map(|hop| {
                at += Duration::minutes(self.rng.gen_range(30..600));
                amount -= self.rng.gen_range(100.0..1_000.0);
                Row {
                    timestamp: at,
                    origin: format!("LAYER{:04}", hop),
                    destination: format!("LAYER{:04}", hop + 1),
                    amount,
                    laundering: true,
                }
            })
            .collect()
    }

    /// Every pair of a small group transacting with each other
    fn clique(&mut self) -> Vec<Row> {
        let members: Vec<String> = (0..4).map(|i| format!("RING{:04}", i)).collect();
        let mut at = self.start + Duration::days(6);
        let mut rows = Vec::new();
        for (i, origin) in members.iter().enumerate() {
            for destination in &members[i + 1..] {
                at += Duration::minutes(self.rng.gen_range(5..60));
                rows.push(Row {
                    timestamp: at,
                    origin: origin.clone(),
                    destination: destination.clone(),
                    amount: self.rng.gen_range(1_000.0..8_000.0),
                    laundering: true,
                });
            }
        }
        rows
    }

    /// One account paying out far more than it receives
    fn drain(&mut self) -> Vec<Row> {
        let mut at = self.start + Duration::days(8);
        (0..3)
            .map(|i| {
                at += Duration::minutes(self.rng.gen_range(60..240));
                Row {
                    timestamp: at,
                    origin: "DRAIN0001".to_string(),
                    destination: format!("OFFSHORE{:04}", i),
                    amount: self.rng.gen_range(45_000.0..80_000.0),
                    laundering: true,
                }
            })
            .collect()
    }

    fn bank(&mut self) -> String {
        format!("{:03}", self.rng.gen_range(1..300))
    }

    fn payment_format(&mut self) -> &'static str {
        PAYMENT_FORMATS[self.rng.gen_range(0..PAYMENT_FORMATS.len())]
    }

    /// Write the whole dataset, returning the number of transaction rows
    fn write<W: Write>(&mut self, background: usize, out: W) -> Result<usize> {
        let mut writer = WriterBuilder::new().flexible(true).from_writer(out);
        writer.write_record(HEADER)?;

        let rows = self.background(background);
        let mut written = self.write_rows(&mut writer, &rows)?;

        let attempts = [
            ("STRUCTURING", self.structuring()),
            ("LAYERING", self.layering()),
            ("CLIQUE", self.clique()),
            ("FLOW IMBALANCE", self.drain()),
        ];
        for (name, rows) in attempts {
            writer.write_record([format!("BEGIN {} - {}", BLOCK_MARKER, name)])?;
            written += self.write_rows(&mut writer, &rows)?;
            writer.write_record([format!("END {}", BLOCK_MARKER)])?;
            info!(pattern = name, transactions = rows.len(), "Injected laundering attempt");
        }

        writer.flush()?;
        Ok(written)
    }

    fn write_rows<W: Write>(&mut self, writer: &mut Writer<W>, rows: &[Row]) -> Result<usize> {
        for row in rows {
            let amount = format!("{:.2}", row.amount);
            let from_bank = self.bank();
            let to_bank = self.bank();
            writer.write_record([
                row.timestamp.format(TIMESTAMP_FORMAT).to_string().as_str(),
                from_bank.as_str(),
                row.origin.as_str(),
                to_bank.as_str(),
                row.destination.as_str(),
                amount.as_str(),
                "US Dollar",
                amount.as_str(),
                "US Dollar",
                self.payment_format(),
                if row.laundering { "1" } else { "0" },
            ])?;
        }
        Ok(rows.len())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("generate_dataset=info".parse()?),
        )
        .init();

    let args = Args::parse();
    info!(
        output = %args.output.display(),
        background = args.background,
        seed = args.seed,
        "Generating synthetic dataset"
    );

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    let written = DatasetGenerator::new(args.seed).write(args.background, BufWriter::new(file))?;

    info!("Completed! Wrote {} transactions to {}", written, args.output.display());
    Ok(())
}
