//! Execution metrics for a detection run.

use crate::detectors::DetectorKind;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// How a detector run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    TimedOut,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::TimedOut => "timed out",
            RunStatus::Failed => "failed",
        }
    }
}

/// Outcome of running one detector
#[derive(Debug, Clone, Serialize)]
pub struct DetectorRun {
    pub detector: DetectorKind,
    pub status: RunStatus,
    pub elapsed: Duration,
    /// Findings contributed to the ranking (0 unless completed)
    pub findings: usize,
}

/// Metrics collector for pipeline runs
pub struct PipelineMetrics {
    /// Transactions accepted by the loader
    pub transactions_loaded: AtomicU64,
    /// Rows rejected by the loader
    pub rows_skipped: AtomicU64,
    /// Findings produced by detectors before merging
    pub findings_generated: AtomicU64,
    /// Accounts in the final ranking
    pub accounts_flagged: AtomicU64,
    /// Detector runs in canonical order
    runs: RwLock<Vec<DetectorRun>>,
    /// Start time for wall-clock reporting
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            transactions_loaded: AtomicU64::new(0),
            rows_skipped: AtomicU64::new(0),
            findings_generated: AtomicU64::new(0),
            accounts_flagged: AtomicU64::new(0),
            runs: RwLock::new(Vec::new()),
            start_time: Instant::now(),
        }
    }

    /// Record the outcome of loading a batch
    pub fn record_load(&self, loaded: usize, skipped: usize) {
        self.transactions_loaded
            .fetch_add(loaded as u64, Ordering::Relaxed);
        self.rows_skipped.fetch_add(skipped as u64, Ordering::Relaxed);
    }

    /// Record a finished detector run
    pub fn record_run(&self, run: &DetectorRun) {
        self.findings_generated
            .fetch_add(run.findings as u64, Ordering::Relaxed);

        if let Ok(mut runs) = self.runs.write() {
            runs.push(run.clone());
        }
    }

    /// Record the size of the final ranking
    pub fn record_ranking(&self, accounts: usize) {
        self.accounts_flagged
            .fetch_add(accounts as u64, Ordering::Relaxed);
    }

    /// Detector runs recorded so far
    pub fn runs(&self) -> Vec<DetectorRun> {
        self.runs.read().map(|runs| runs.clone()).unwrap_or_default()
    }

    /// Sum of detector execution times
    pub fn total_detector_time(&self) -> Duration {
        self.runs().iter().map(|run| run.elapsed).sum()
    }

    /// Time since the collector was created
    pub fn wall_time(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let loaded = self.transactions_loaded.load(Ordering::Relaxed);
        let skipped = self.rows_skipped.load(Ordering::Relaxed);
        let findings = self.findings_generated.load(Ordering::Relaxed);
        let flagged = self.accounts_flagged.load(Ordering::Relaxed);

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            AML DETECTION PIPELINE - RUN SUMMARY              ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Transactions Loaded: {:>9}  │  Rows Skipped: {:>9}   ║",
            loaded, skipped
        );
        info!(
            "║ Raw Findings:        {:>9}  │  Accounts Flagged: {:>5}   ║",
            findings, flagged
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Detector Times:                                              ║");
        for run in self.runs() {
            info!("║   {}║", detector_row(&run));
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Total Detector Time: {:>8} ms  │  Wall Time: {:>8} ms  ║",
            self.total_detector_time().as_millis(),
            self.wall_time().as_millis()
        );
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

/// One detector line of the summary box, padded to the box width
fn detector_row(run: &DetectorRun) -> String {
    format!(
        "{:16} {:>8} ms  {:>6} findings  {:<12}",
        run.detector.name(),
        run.elapsed.as_millis(),
        run.findings,
        format!("({})", run.status.as_str())
    )
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(detector: DetectorKind, millis: u64, findings: usize) -> DetectorRun {
        DetectorRun {
            detector,
            status: RunStatus::Completed,
            elapsed: Duration::from_millis(millis),
            findings,
        }
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = PipelineMetrics::new();

        metrics.record_load(120, 3);
        metrics.record_run(&run(DetectorKind::FlowImbalance, 5, 2));
        metrics.record_run(&run(DetectorKind::Layering, 40, 7));
        metrics.record_ranking(6);

        assert_eq!(metrics.transactions_loaded.load(Ordering::Relaxed), 120);
        assert_eq!(metrics.rows_skipped.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.findings_generated.load(Ordering::Relaxed), 9);
        assert_eq!(metrics.accounts_flagged.load(Ordering::Relaxed), 6);
    }

    #[test]
    fn test_detector_row_fills_summary_box() {
        let header = "║ Detector Times:                                              ║";
        let mut timed_out = run(DetectorKind::DenseCommunity, 123_456, 0);
        timed_out.status = RunStatus::TimedOut;

        for r in [run(DetectorKind::Layering, 7, 12), timed_out] {
            let line = format!("║   {}║", detector_row(&r));
            assert_eq!(line.chars().count(), header.chars().count());
        }
    }

    #[test]
    fn test_runs_keep_order_and_total() {
        let metrics = PipelineMetrics::new();
        metrics.record_run(&run(DetectorKind::Structuring, 10, 0));
        metrics.record_run(&run(DetectorKind::DenseCommunity, 15, 4));

        let kinds: Vec<DetectorKind> = metrics.runs().iter().map(|r| r.detector).collect();
        assert_eq!(kinds, vec![DetectorKind::Structuring, DetectorKind::DenseCommunity]);
        assert_eq!(metrics.total_detector_time(), Duration::from_millis(25));
    }
}
