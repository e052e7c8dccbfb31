use serde::Serialize;
use std::future::Future;
use tracing::{info, warn};

use crate::adapter::PricingAdapter;
use crate::engine::ConvergenceEngine;
use crate::errors::{InputError, TaskError};
use crate::input::TaskRow;
use crate::types::{TaskOutcome, TaskPhase, TaskReport};

/// Result of one run over the input rows.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<TaskOutcome>,
    /// Rows not attempted because the run was interrupted
    pub skipped: usize,
    pub interrupted: bool,
}

#[derive(Debug, Serialize)]
pub struct SummaryReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub interrupted: bool,
    pub tasks: Vec<TaskReport>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.outcomes.len() + self.skipped
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn report(&self) -> SummaryReport {
        SummaryReport {
            total: self.total(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            skipped: self.skipped,
            interrupted: self.interrupted,
            tasks: self.outcomes.iter().map(TaskOutcome::report).collect(),
        }
    }
}

/// Process every row in order, one task at a time.
pub async fn run_batch<A>(
    rows: Vec<TaskRow>,
    engine: &ConvergenceEngine,
    adapter: &mut A,
) -> RunSummary
where
    A: PricingAdapter + ?Sized,
{
    run_batch_until(rows, engine, adapter, std::future::pending::<()>()).await
}

/// Like [`run_batch`], but stops as soon as `cancel` resolves. A task that is
/// interrupted keeps whatever step was applied last; it and every later row
/// count as skipped.
pub async fn run_batch_until<A, F>(
    rows: Vec<TaskRow>,
    engine: &ConvergenceEngine,
    adapter: &mut A,
    cancel: F,
) -> RunSummary
where
    A: PricingAdapter + ?Sized,
    F: Future<Output = ()>,
{
    tokio::pin!(cancel);
    let total = rows.len();
    let mut summary = RunSummary::default();
    let mut rows = rows.into_iter().enumerate();

    while let Some((index, row)) = rows.next() {
        let task = match row {
            Ok(task) => task,
            Err(err) => {
                let outcome = rejected_row(err);
                warn!(
                    "[{}/{}] Skipping invalid row: {}",
                    index + 1,
                    total,
                    outcome.error().map(|e| e.to_string()).unwrap_or_default()
                );
                summary.outcomes.push(outcome);
                continue;
            }
        };

        info!(
            sku = %task.sku(),
            "[{}/{}] {} → ₹{:.2}",
            index + 1,
            total,
            task.sku(),
            task.target_price()
        );

        tokio::select! {
            biased;
            _ = &mut cancel => {
                warn!(sku = %task.sku(), "Run interrupted; last applied step is left in place");
                summary.interrupted = true;
                summary.skipped = 1 + rows.by_ref().count();
                break;
            }
            outcome = engine.run_task(&task, adapter) => {
                summary.outcomes.push(outcome);
            }
        }
    }

    info!(
        total = summary.total(),
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        skipped = summary.skipped,
        "Run finished: {} succeeded, {} failed, {} skipped",
        summary.succeeded(),
        summary.failed(),
        summary.skipped
    );
    summary
}

fn rejected_row(err: InputError) -> TaskOutcome {
    let sku = match &err {
        InputError::Row { row, sku, .. } if sku.is_empty() => format!("<row {row}>"),
        InputError::Row { sku, .. } => sku.clone(),
        _ => String::from("<unknown>"),
    };
    TaskOutcome::Failed {
        sku,
        phase: TaskPhase::NotStarted,
        initial_value: None,
        steps: Vec::new(),
        error: TaskError::Input(err),
    }
}
