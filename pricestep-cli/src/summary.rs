use anyhow::{Context, Result};
use colored::*;
use pricestep::{RunSummary, TaskOutcome};
use std::path::Path;

pub fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", "PRICE UPDATE SUMMARY".bold());
    println!("{}", "=".repeat(60));

    for outcome in &summary.outcomes {
        match outcome {
            TaskOutcome::Done {
                sku,
                initial_value,
                final_value,
                steps,
            } => {
                println!(
                    "{} {:<24} ₹{:.2} → ₹{:.2} ({} step{})",
                    "✅ DONE   ".green().bold(),
                    sku,
                    initial_value,
                    final_value,
                    steps.len(),
                    if steps.len() == 1 { "" } else { "s" }
                );
            }
            TaskOutcome::Failed {
                sku, phase, error, ..
            } => {
                println!(
                    "{} {:<24} during {}: {}",
                    "❌ FAILED ".red().bold(),
                    sku,
                    phase,
                    error
                );
            }
        }
    }
    if summary.skipped > 0 {
        println!(
            "{} {} row(s) not attempted",
            "⏭️  SKIPPED".yellow().bold(),
            summary.skipped
        );
    }

    println!("{}", "=".repeat(60));
    let counts = format!(
        "{} total, {} succeeded, {} failed, {} skipped",
        summary.total(),
        summary.succeeded(),
        summary.failed(),
        summary.skipped
    );
    if summary.failed() == 0 && !summary.interrupted {
        println!("{}", counts.green());
    } else {
        println!("{}", counts.yellow());
    }
    if summary.interrupted {
        println!("{}", "Run was interrupted.".yellow());
    }
}

pub fn write_summary_json(summary: &RunSummary, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&summary.report())?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write summary to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricestep::{run_batch, ConvergenceEngine, PriceTask};

    #[tokio::test]
    async fn test_summary_json_file() {
        struct NoListings;

        #[async_trait::async_trait]
        impl pricestep::PricingAdapter for NoListings {
            async fn open_listing(&mut self, sku: &str) -> Result<(), pricestep::AdapterError> {
                Err(pricestep::AdapterError::NotFound {
                    sku: sku.to_string(),
                    source: pricestep::AutomationError::ElementNotFound("row".to_string()),
                })
            }
            async fn open_pricing_panel(&mut self, _: &str) -> Result<(), pricestep::AdapterError> {
                unreachable!()
            }
            async fn read_settlement_value(&mut self) -> Result<f64, pricestep::AdapterError> {
                unreachable!()
            }
            async fn apply_settlement_value(&mut self, _: f64) -> Result<(), pricestep::AdapterError> {
                unreachable!()
            }
        }

        let rows = vec![PriceTask::new("SKU-1", 10.0)];
        let summary = run_batch(rows, &ConvergenceEngine::default(), &mut NoListings).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        write_summary_json(&summary, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["failed"], 1);
        assert_eq!(value["tasks"][0]["sku"], "SKU-1");
        assert_eq!(value["tasks"][0]["phase"], "not_started");
    }
}
