//! End-to-end tests: CSV file → loader → pipeline → reports

use aml_detection_pipeline::loader::LoadError;
use aml_detection_pipeline::metrics::RunStatus;
use aml_detection_pipeline::{
    AppConfig, DetectorKind, Pipeline, ReportPaths, ReportWriter, TransactionLoader,
};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

const HEADER: &str = "Timestamp,From Bank,Account,To Bank,Account,Amount Received,Receiving Currency,Amount Paid,Payment Currency,Payment Format,Is Laundering";

fn row(minute: u32, origin: &str, destination: &str, amount: f64) -> String {
    format!(
        "2022/09/01 {:02}:{:02},001,{},002,{},{:.2},US Dollar,{:.2},US Dollar,Wire,0",
        minute / 60,
        minute % 60,
        origin,
        destination,
        amount,
        amount
    )
}

/// Smurfing burst from S and a four-hop chain A → B → C → D → S
fn write_dataset(dir: &TempDir) -> std::path::PathBuf {
    let mut lines = vec![HEADER.to_string()];
    lines.push("BEGIN LAUNDERING ATTEMPT - STRUCTURING".to_string());
    for i in 0..5 {
        lines.push(row(i, "S", &format!("M{}", i), 100.0));
    }
    lines.push("END LAUNDERING ATTEMPT - STRUCTURING".to_string());
    lines.push(row(0, "A", "B", 10_000.0));
    lines.push(row(60, "B", "C", 10_000.0));
    lines.push("2022/09/01 01:30,001,X,002,Y,not-a-number,US Dollar,1,US Dollar,Wire,0".to_string());
    lines.push(row(120, "C", "D", 10_000.0));
    lines.push(row(180, "D", "S", 10_000.0));

    let path = dir.path().join("small_dataset.csv");
    let mut file = fs::File::create(&path).unwrap();
    writeln!(file, "{}", lines.join("\n")).unwrap();
    path
}

async fn analyse(input: &Path, output: &Path, selected: &[DetectorKind]) -> ReportPaths {
    let config = AppConfig::default();
    let batch = TransactionLoader::new().load_path(input).unwrap();
    let outcome = Pipeline::new(&config.detection, &config.pipeline)
        .run(&batch.transactions, selected)
        .await;

    let paths = ReportPaths::for_run(output, input, selected);
    ReportWriter::new()
        .save(&paths, &outcome.ranked, &outcome.runs, "small_dataset.csv", true)
        .unwrap();
    paths
}

#[tokio::test]
async fn test_full_analysis_report() {
    let dir = TempDir::new().unwrap();
    let input = write_dataset(&dir);

    let batch = TransactionLoader::new().load_path(&input).unwrap();
    assert_eq!(batch.transactions.len(), 9);
    assert_eq!(batch.skipped, 1);

    let paths = analyse(&input, dir.path(), &DetectorKind::ALL).await;

    assert!(paths
        .results
        .ends_with("suspicion_results_for_small_dataset_all_algorithms.csv"));
    assert_eq!(
        fs::read_to_string(&paths.results).unwrap(),
        "Account,Reason,Score,EvidenceCount\n\
         A,layering detected,3,4\n\
         S,structuring detected,2,5\n"
    );

    let times = fs::read_to_string(&paths.execution_times).unwrap();
    for kind in DetectorKind::ALL {
        assert!(times.contains(&format!("{}: ", kind.name())));
    }
    assert!(times.contains("Total detector time:"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&paths.json).unwrap()).unwrap();
    assert_eq!(json["findings"].as_array().unwrap().len(), 2);
    assert_eq!(json["findings"][0]["evidence"][3]["destination"], "S");
}

#[tokio::test]
async fn test_single_detector_analysis() {
    let dir = TempDir::new().unwrap();
    let input = write_dataset(&dir);

    let paths = analyse(&input, dir.path(), &[DetectorKind::FlowImbalance]).await;

    assert!(paths
        .execution_times
        .ends_with("execution_times_for_small_dataset_algo_flow_imbalance.txt"));
    assert_eq!(
        fs::read_to_string(&paths.results).unwrap(),
        "Account,Reason,Score,EvidenceCount\nNo suspicious activity detected,,,\n"
    );
}

#[tokio::test]
async fn test_every_run_completes_on_real_input() {
    let dir = TempDir::new().unwrap();
    let input = write_dataset(&dir);
    let config = AppConfig::default();
    let batch = TransactionLoader::new().load_path(&input).unwrap();

    let pipeline = Pipeline::new(&config.detection, &config.pipeline);
    let concurrent = pipeline.run(&batch.transactions, &DetectorKind::ALL).await;
    let sequential = pipeline.run_blocking(&batch.transactions, &DetectorKind::ALL);

    assert!(concurrent.runs.iter().all(|r| r.status == RunStatus::Completed));
    let render = |ranked: &[aml_detection_pipeline::Finding]| -> Vec<String> {
        ranked.iter().map(|f| f.to_string()).collect()
    };
    assert_eq!(render(&concurrent.ranked), render(&sequential.ranked));
}

#[test]
fn test_missing_input_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = TransactionLoader::new()
        .load_path(dir.path().join("absent.csv"))
        .unwrap_err();
    assert!(matches!(err, LoadError::NotFound(_)));
}
