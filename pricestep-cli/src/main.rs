//! pricestep CLI
//!
//! Launches the browser with a persistent profile, waits for a manual login,
//! then processes every spreadsheet row in order.
//!
//! Usage:
//!   pricestep --excel input.xlsx --login-wait 60 --no-headless   # first run, log in by hand
//!   pricestep --excel input.xlsx                                 # later runs reuse the session
//!   pricestep --excel prices.csv --verify-after-apply --summary-json run.json

use anyhow::{Context, Result};
use clap::Parser;
use pricestep::{
    load_tasks, run_batch_until, BrowserSession, Config, ConvergenceEngine, RunSummary,
    SellerDashboard, TaskRow,
};
use tracing::{info, warn};

mod cli;
mod logging;
mod summary;

use cli::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init_logging(&cli.log_dir);

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    cli.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    let rows = load_tasks(&cli.excel, &config.input)
        .with_context(|| format!("Failed to load input from {}", cli.excel.display()))?;
    if rows.is_empty() {
        warn!("No rows to process in {}", cli.excel.display());
    }

    info!(
        "🚀 Starting pricestep v{} ({} rows, policy {:?})",
        env!("CARGO_PKG_VERSION"),
        rows.len(),
        config.convergence.apply_policy
    );

    let session = BrowserSession::launch(&config.session, &config.dashboard)
        .await
        .context("Failed to start browser session")?;

    let summary = process(&session, &config, rows).await;
    session.close().await;
    info!("Browser closed");

    summary::print_summary(&summary);
    if let Some(path) = &cli.summary_json {
        summary::write_summary_json(&summary, path)?;
        info!("Summary written to {}", path.display());
    }
    Ok(())
}

async fn process(session: &BrowserSession, config: &Config, rows: Vec<TaskRow>) -> RunSummary {
    tokio::select! {
        _ = session.login_grace(config.session.login_wait()) => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted during login wait");
            return RunSummary {
                skipped: rows.len(),
                interrupted: true,
                ..Default::default()
            };
        }
    }

    let engine = ConvergenceEngine::from_config(&config.convergence);
    let mut dashboard = SellerDashboard::new(session.page(), config.dashboard.clone());
    run_batch_until(rows, &engine, &mut dashboard, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}
