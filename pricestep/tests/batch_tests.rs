mod common;

use common::{Op, ScriptedAdapter};
use pricestep::input::tasks_from_table;
use pricestep::{
    config::InputConfig, run_batch, run_batch_until, ConvergenceEngine, InputError, PriceTask,
    TaskError, TaskPhase, TaskRow,
};

fn rows(pairs: &[(&str, f64)]) -> Vec<TaskRow> {
    pairs
        .iter()
        .map(|(sku, target)| PriceTask::new(sku, *target))
        .collect()
}

#[tokio::test]
async fn test_failing_task_does_not_stop_the_batch() {
    let mut adapter = ScriptedAdapter::new()
        .with_listing("A", 100.0)
        .with_listing("B", 100.0)
        .with_listing("C", 50.0)
        .fail_on("B", Op::Apply, 1);
    let engine = ConvergenceEngine::default();

    let summary = run_batch(
        rows(&[("A", 102.0), ("B", 110.0), ("MISSING", 10.0), ("C", 51.0)]),
        &engine,
        &mut adapter,
    )
    .await;

    assert_eq!(adapter.opened(), vec!["A", "B", "MISSING", "C"]);
    assert_eq!(summary.total(), 4);
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 2);
    assert!(!summary.interrupted);

    let skus: Vec<&str> = summary.outcomes.iter().map(|o| o.sku()).collect();
    assert_eq!(skus, vec!["A", "B", "MISSING", "C"]);
    assert!(summary.outcomes[0].is_success());
    assert!(!summary.outcomes[1].is_success());
    assert!(!summary.outcomes[2].is_success());
    assert!(summary.outcomes[3].is_success());
    assert_eq!(adapter.price("A"), Some(102.0));
    assert_eq!(adapter.price("C"), Some(51.0));
}

#[tokio::test]
async fn test_invalid_rows_are_reported_and_skipped() {
    let headers = vec!["SKU".to_string(), "FinalPrice".to_string()];
    let table = vec![
        vec!["A".to_string(), "101".to_string()],
        vec!["".to_string(), "90".to_string()],
        vec!["B".to_string(), "n/a".to_string()],
        vec!["C".to_string(), "60".to_string()],
    ];
    let task_rows = tasks_from_table(&headers, &table, &InputConfig::default()).unwrap();

    let mut adapter = ScriptedAdapter::new()
        .with_listing("A", 100.0)
        .with_listing("C", 60.0);
    let summary = run_batch(task_rows, &ConvergenceEngine::default(), &mut adapter).await;

    assert_eq!(adapter.opened(), vec!["A", "C"]);
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 2);

    let rejected = &summary.outcomes[1];
    assert_eq!(rejected.sku(), "<row 3>");
    assert!(matches!(
        rejected.error(),
        Some(TaskError::Input(InputError::Row { row: 3, .. }))
    ));
    assert_eq!(summary.outcomes[2].sku(), "B");

    let report = summary.report();
    assert_eq!(report.tasks[1].phase, TaskPhase::NotStarted);
    assert_eq!(report.tasks[0].phase, TaskPhase::Done);
}

#[tokio::test]
async fn test_cancelled_run_skips_remaining_rows() {
    let mut adapter = ScriptedAdapter::new()
        .with_listing("A", 100.0)
        .with_listing("B", 100.0);
    let summary = run_batch_until(
        rows(&[("A", 105.0), ("B", 105.0)]),
        &ConvergenceEngine::default(),
        &mut adapter,
        async {},
    )
    .await;

    assert!(summary.interrupted);
    assert_eq!(summary.skipped, 2);
    assert!(summary.outcomes.is_empty());
    assert_eq!(summary.total(), 2);
    assert!(adapter.calls.is_empty());
}

#[tokio::test]
async fn test_summary_report_serializes() {
    let mut adapter = ScriptedAdapter::new().with_listing("A", 100.0);
    let summary = run_batch(
        rows(&[("A", 101.0), ("B", 10.0)]),
        &ConvergenceEngine::default(),
        &mut adapter,
    )
    .await;

    let json = serde_json::to_value(summary.report()).unwrap();
    assert_eq!(json["total"], 2);
    assert_eq!(json["succeeded"], 1);
    assert_eq!(json["failed"], 1);
    assert_eq!(json["tasks"][0]["sku"], "A");
    assert_eq!(json["tasks"][0]["phase"], "done");
    assert_eq!(json["tasks"][0]["applied"][0], 101.0);
    assert_eq!(json["tasks"][1]["phase"], "not_started");
    assert!(json["tasks"][1]["error"]
        .as_str()
        .unwrap()
        .contains("listing for SKU 'B' not found"));
}
