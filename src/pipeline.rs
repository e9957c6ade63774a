//! Concurrent execution of the selected detectors followed by ranking

use crate::config::{DetectionConfig, PipelineConfig};
use crate::detectors::{self, CancelToken, Detector, DetectorKind};
use crate::metrics::{DetectorRun, PipelineMetrics, RunStatus};
use crate::ranker::RiskRanker;
use crate::types::{Finding, TransactionSet};
use futures::future::join_all;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Result of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Merged findings, highest score first
    pub ranked: Vec<Finding>,
    /// One entry per selected detector, in canonical order
    pub runs: Vec<DetectorRun>,
}

impl PipelineOutcome {
    /// Sum of detector execution times
    pub fn detector_time(&self) -> Duration {
        self.runs.iter().map(|run| run.elapsed).sum()
    }
}

/// Runs detectors over a shared batch and ranks their combined findings.
pub struct Pipeline {
    detectors: Vec<Arc<dyn Detector>>,
    timeout: Option<Duration>,
    ranker: RiskRanker,
    metrics: Arc<PipelineMetrics>,
}

impl Pipeline {
    /// Build a pipeline with every detector configured from `detection`
    pub fn new(detection: &DetectionConfig, pipeline: &PipelineConfig) -> Self {
        let all = DetectorKind::ALL
            .iter()
            .map(|&kind| detectors::build(kind, detection))
            .collect();
        let timeout = match pipeline.detector_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        Self::with_detectors(all, timeout)
    }

    /// Build a pipeline from explicit detector instances
    pub fn with_detectors(detectors: Vec<Arc<dyn Detector>>, timeout: Option<Duration>) -> Self {
        Self {
            detectors,
            timeout,
            ranker: RiskRanker::new(),
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Share an existing metrics collector
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Configured detectors matching `selected`, in canonical order
    fn selected(&self, selected: &[DetectorKind]) -> Vec<Arc<dyn Detector>> {
        let mut chosen: Vec<Arc<dyn Detector>> = self
            .detectors
            .iter()
            .filter(|d| selected.contains(&d.kind()))
            .cloned()
            .collect();
        chosen.sort_by_key(|d| d.kind());
        chosen
    }

    /// Run the selected detectors concurrently and rank their findings.
    ///
    /// Each detector runs on the blocking thread pool with its own handle to
    /// the batch. A detector that panics or exceeds the timeout contributes no
    /// findings; the others are still ranked.
    pub async fn run(
        &self,
        transactions: &TransactionSet,
        selected: &[DetectorKind],
    ) -> PipelineOutcome {
        let detectors = self.selected(selected);
        info!(
            transactions = transactions.len(),
            detectors = detectors.len(),
            "Starting detection run"
        );

        let tasks = detectors
            .into_iter()
            .map(|detector| run_detector(detector, transactions.clone(), self.timeout));
        let results = join_all(tasks).await;

        self.finish(results)
    }

    /// Run the selected detectors one after another on the current thread.
    ///
    /// Same isolation of panicking detectors as [`Pipeline::run`], without
    /// timeouts.
    pub fn run_blocking(
        &self,
        transactions: &TransactionSet,
        selected: &[DetectorKind],
    ) -> PipelineOutcome {
        let results = self
            .selected(selected)
            .into_iter()
            .map(|detector| {
                let kind = detector.kind();
                let started = Instant::now();
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    detector.detect(transactions, &CancelToken::new())
                }));
                match result {
                    Ok(findings) => completed(kind, started.elapsed(), findings),
                    Err(_) => {
                        error!(detector = %kind, "Detector panicked, discarding its findings");
                        aborted(kind, RunStatus::Failed, started.elapsed())
                    }
                }
            })
            .collect();

        self.finish(results)
    }

    fn finish(&self, results: Vec<(DetectorRun, Vec<Finding>)>) -> PipelineOutcome {
        let mut runs = Vec::with_capacity(results.len());
        let mut findings = Vec::new();
        for (run, found) in results {
            self.metrics.record_run(&run);
            runs.push(run);
            findings.extend(found);
        }

        info!(findings = findings.len(), "Merging and ranking findings");
        let ranked = self.ranker.rank(findings);
        self.metrics.record_ranking(ranked.len());

        PipelineOutcome { ranked, runs }
    }
}

async fn run_detector(
    detector: Arc<dyn Detector>,
    transactions: TransactionSet,
    timeout: Option<Duration>,
) -> (DetectorRun, Vec<Finding>) {
    let kind = detector.kind();
    let cancel = CancelToken::new();
    let started = Instant::now();
    info!(detector = %kind, "Running detector");

    let task = {
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || detector.detect(&transactions, &cancel))
    };

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                cancel.cancel();
                warn!(
                    detector = %kind,
                    timeout_ms = limit.as_millis() as u64,
                    "Detector exceeded its time budget, discarding its findings"
                );
                return aborted(kind, RunStatus::TimedOut, started.elapsed());
            }
        },
        None => task.await,
    };

    match joined {
        Ok(findings) => completed(kind, started.elapsed(), findings),
        Err(e) => {
            error!(detector = %kind, error = %e, "Detector failed, discarding its findings");
            aborted(kind, RunStatus::Failed, started.elapsed())
        }
    }
}

fn completed(
    kind: DetectorKind,
    elapsed: Duration,
    findings: Vec<Finding>,
) -> (DetectorRun, Vec<Finding>) {
    info!(
        detector = %kind,
        elapsed_ms = elapsed.as_millis() as u64,
        findings = findings.len(),
        "Detector finished"
    );
    let run = DetectorRun {
        detector: kind,
        status: RunStatus::Completed,
        elapsed,
        findings: findings.len(),
    };
    (run, findings)
}

fn aborted(
    kind: DetectorKind,
    status: RunStatus,
    elapsed: Duration,
) -> (DetectorRun, Vec<Finding>) {
    let run = DetectorRun {
        detector: kind,
        status,
        elapsed,
        findings: 0,
    };
    (run, Vec::new())
}
