//! Result and execution-time reports

use crate::detectors::DetectorKind;
use crate::metrics::{DetectorRun, RunStatus};
use crate::types::{Finding, TxRef};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::{QuoteStyle, WriterBuilder};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Column header of the CSV result report
pub const CSV_HEADER: [&str; 4] = ["Account", "Reason", "Score", "EvidenceCount"];

/// Placeholder account cell written when nothing was flagged
pub const NONE_DETECTED: &str = "No suspicious activity detected";

/// JSON result document
#[derive(Debug, Serialize)]
struct FindingsDocument<'a> {
    run_id: Uuid,
    generated_at: DateTime<Utc>,
    dataset: &'a str,
    findings: Vec<FindingRecord<'a>>,
}

#[derive(Debug, Serialize)]
struct FindingRecord<'a> {
    account: &'a str,
    reason: &'a str,
    score: u32,
    evidence_count: usize,
    evidence: &'a [TxRef],
}

/// Output file locations for one analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub results: PathBuf,
    pub execution_times: PathBuf,
    pub json: PathBuf,
}

impl ReportPaths {
    /// Paths under `dir` named after the dataset and the detectors that ran
    pub fn for_run(dir: &Path, dataset: &Path, selected: &[DetectorKind]) -> Self {
        let stem = dataset
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string());
        let suffix = format!("{}_{}", stem, analysis_label(selected));

        Self {
            results: dir.join(format!("suspicion_results_for_{}.csv", suffix)),
            execution_times: dir.join(format!("execution_times_for_{}.txt", suffix)),
            json: dir.join(format!("suspicion_results_for_{}.json", suffix)),
        }
    }
}

/// `all_algorithms` when every detector ran, otherwise `algo_<names>`
pub fn analysis_label(selected: &[DetectorKind]) -> String {
    let mut kinds = selected.to_vec();
    kinds.sort();
    kinds.dedup();

    if kinds == DetectorKind::ALL {
        "all_algorithms".to_string()
    } else {
        let names: Vec<&str> = kinds.iter().map(|k| k.name()).collect();
        format!("algo_{}", names.join("_"))
    }
}

/// Writes ranked findings and detector timings
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportWriter;

impl ReportWriter {
    pub fn new() -> Self {
        Self
    }

    /// Write the CSV result report
    pub fn write_csv<W: Write>(&self, findings: &[Finding], writer: W) -> Result<()> {
        let mut csv = WriterBuilder::new()
            .quote_style(QuoteStyle::Necessary)
            .from_writer(writer);

        csv.write_record(CSV_HEADER)?;
        if findings.is_empty() {
            csv.write_record([NONE_DETECTED, "", "", ""])?;
        }
        for finding in findings {
            csv.write_record([
                finding.account.as_str(),
                finding.reason.as_str(),
                finding.score.to_string().as_str(),
                finding.evidence_count().to_string().as_str(),
            ])?;
        }

        csv.flush()?;
        Ok(())
    }

    /// Write the JSON result document, including full evidence
    pub fn write_json<W: Write>(
        &self,
        findings: &[Finding],
        dataset: &str,
        writer: W,
    ) -> Result<()> {
        let document = FindingsDocument {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            dataset,
            findings: findings
                .iter()
                .map(|f| FindingRecord {
                    account: &f.account,
                    reason: &f.reason,
                    score: f.score,
                    evidence_count: f.evidence_count(),
                    evidence: &f.evidence,
                })
                .collect(),
        };

        serde_json::to_writer_pretty(writer, &document)?;
        debug!(run_id = %document.run_id, findings = findings.len(), "Wrote JSON report");
        Ok(())
    }

    /// Write per-detector execution times
    pub fn write_execution_times<W: Write>(
        &self,
        runs: &[DetectorRun],
        mut writer: W,
    ) -> Result<()> {
        writeln!(writer, "--- DETECTOR EXECUTION TIMES ---")?;
        if runs.is_empty() {
            writeln!(writer, "No detectors were run.")?;
        }
        for run in runs {
            match run.status {
                RunStatus::Completed => {
                    writeln!(writer, "{}: {} ms", run.detector.name(), run.elapsed.as_millis())?
                }
                status => writeln!(
                    writer,
                    "{}: {} ms ({})",
                    run.detector.name(),
                    run.elapsed.as_millis(),
                    status.as_str()
                )?,
            }
        }

        let total: u128 = runs.iter().map(|run| run.elapsed.as_millis()).sum();
        writeln!(writer, "--------------------------------------")?;
        writeln!(writer, "Total detector time: {} ms", total)?;
        writer.flush()?;
        Ok(())
    }

    /// Write the CSV results and execution times (and optionally JSON) to `paths`
    pub fn save(
        &self,
        paths: &ReportPaths,
        findings: &[Finding],
        runs: &[DetectorRun],
        dataset: &str,
        with_json: bool,
    ) -> Result<()> {
        if let Some(dir) = paths.results.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        }

        self.write_csv(findings, create(&paths.results)?)
            .with_context(|| format!("Failed to write {}", paths.results.display()))?;
        self.write_execution_times(runs, create(&paths.execution_times)?)
            .with_context(|| format!("Failed to write {}", paths.execution_times.display()))?;
        if with_json {
            self.write_json(findings, dataset, create(&paths.json)?)
                .with_context(|| format!("Failed to write {}", paths.json.display()))?;
        }

        info!(
            results = %paths.results.display(),
            execution_times = %paths.execution_times.display(),
            "Reports saved"
        );
        Ok(())
    }
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::tx;
    use crate::types::PatternKind;
    use std::sync::Arc;
    use std::time::Duration;

    fn finding(account: &str, reason: &str, score: u32, evidence: usize) -> Finding {
        Finding {
            account: account.to_string(),
            reason: reason.to_string(),
            score,
            evidence: (0..evidence)
                .map(|i| Arc::new(tx(account, "X", 10.0, i as i64)))
                .collect(),
        }
    }

    fn csv_string(findings: &[Finding]) -> String {
        let mut out = Vec::new();
        ReportWriter::new().write_csv(findings, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_csv_rows() {
        let output = csv_string(&[finding("A", "layering detected", 3, 4)]);
        assert_eq!(output, "Account,Reason,Score,EvidenceCount\nA,layering detected,3,4\n");
    }

    #[test]
    fn test_csv_quotes_reasons_when_needed() {
        let output = csv_string(&[
            finding("A", "flow imbalance; dense community", 3, 2),
            finding("B", "odd, \"quoted\" reason", 1, 1),
        ]);

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[1], "A,flow imbalance; dense community,3,2");
        assert_eq!(lines[2], "B,\"odd, \"\"quoted\"\" reason\",1,1");
    }

    #[test]
    fn test_csv_placeholder_when_empty() {
        let output = csv_string(&[]);
        assert_eq!(
            output,
            "Account,Reason,Score,EvidenceCount\nNo suspicious activity detected,,,\n"
        );
    }

    #[test]
    fn test_json_report() {
        let findings = vec![Finding::new(
            "A",
            PatternKind::Structuring,
            vec![Arc::new(tx("A", "B", 99.0, 0))].into(),
        )];
        let mut out = Vec::new();
        ReportWriter::new()
            .write_json(&findings, "transfers.csv", &mut out)
            .unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["dataset"], "transfers.csv");
        assert_eq!(value["findings"][0]["account"], "A");
        assert_eq!(value["findings"][0]["reason"], "structuring detected");
        assert_eq!(value["findings"][0]["evidence_count"], 1);
        assert_eq!(value["findings"][0]["evidence"][0]["destination"], "B");
        assert!(Uuid::parse_str(value["run_id"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_execution_times() {
        let runs = vec![
            DetectorRun {
                detector: DetectorKind::FlowImbalance,
                status: RunStatus::Completed,
                elapsed: Duration::from_millis(12),
                findings: 1,
            },
            DetectorRun {
                detector: DetectorKind::Layering,
                status: RunStatus::TimedOut,
                elapsed: Duration::from_millis(500),
                findings: 0,
            },
        ];
        let mut out = Vec::new();
        ReportWriter::new().write_execution_times(&runs, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("flow_imbalance: 12 ms\n"));
        assert!(text.contains("layering: 500 ms (timed out)\n"));
        assert!(text.ends_with("Total detector time: 512 ms\n"));
    }

    #[test]
    fn test_execution_times_without_runs() {
        let mut out = Vec::new();
        ReportWriter::new().write_execution_times(&[], &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("No detectors were run."));
    }

    #[test]
    fn test_report_paths() {
        let paths = ReportPaths::for_run(
            Path::new("out"),
            Path::new("data/full_dataset.csv"),
            &[DetectorKind::Layering, DetectorKind::FlowImbalance],
        );
        assert_eq!(
            paths.results,
            PathBuf::from("out/suspicion_results_for_full_dataset_algo_flow_imbalance_layering.csv")
        );
        assert_eq!(
            paths.execution_times,
            PathBuf::from("out/execution_times_for_full_dataset_algo_flow_imbalance_layering.txt")
        );

        assert_eq!(analysis_label(&DetectorKind::ALL), "all_algorithms");
    }

    #[test]
    fn test_save_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ReportPaths::for_run(
            &dir.path().join("reports"),
            Path::new("small.csv"),
            &DetectorKind::ALL,
        );

        ReportWriter::new()
            .save(&paths, &[finding("A", "dense community", 2, 3)], &[], "small.csv", true)
            .unwrap();

        let csv = fs::read_to_string(&paths.results).unwrap();
        assert!(csv.starts_with("Account,Reason,Score,EvidenceCount\n"));
        assert!(paths.execution_times.exists());
        assert!(paths.json.exists());
    }
}
