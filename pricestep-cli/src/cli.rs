use clap::Parser;
use pricestep::{ApplyPolicy, Config};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pricestep")]
#[command(about = "📈 Step seller settlement prices toward spreadsheet targets")]
#[command(
    long_about = "Reads SKU / FinalPrice rows from a spreadsheet, opens each listing in the seller dashboard, and raises its settlement value toward the target in steps of at most 1.99%."
)]
pub struct Cli {
    /// Spreadsheet with SKU and FinalPrice columns (xlsx, xls, ods or csv)
    #[arg(long, env = "PRICESTEP_INPUT", default_value = "input.xlsx")]
    pub excel: PathBuf,

    /// Seconds to wait for a manual login before processing starts
    #[arg(long, env = "PRICESTEP_LOGIN_WAIT")]
    pub login_wait: Option<u64>,

    /// Show the browser window (needed for the first login)
    #[arg(long)]
    pub no_headless: bool,

    /// YAML config file
    #[arg(long, short = 'c', env = "PRICESTEP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Re-read the settlement value after each apply instead of trusting it
    #[arg(long)]
    pub verify_after_apply: bool,

    /// Browser executable (Chrome, Chromium or Edge)
    #[arg(long, env = "PRICESTEP_BROWSER")]
    pub browser: Option<PathBuf>,

    /// Persistent browser profile directory
    #[arg(long, env = "PRICESTEP_PROFILE_DIR")]
    pub profile_dir: Option<PathBuf>,

    /// DevTools remote debugging port
    #[arg(long, env = "PRICESTEP_DEBUG_PORT")]
    pub debug_port: Option<u16>,

    /// Write the run summary as JSON to this file
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Directory for price_update.log
    #[arg(long, env = "PRICESTEP_LOG_DIR", default_value = ".")]
    pub log_dir: PathBuf,
}

impl Cli {
    /// Command-line values win over the config file.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(secs) = self.login_wait {
            config.session.login_wait_secs = secs;
        }
        if self.no_headless {
            config.session.headless = false;
        }
        if self.verify_after_apply {
            config.convergence.apply_policy = ApplyPolicy::Reread;
        }
        if let Some(path) = &self.browser {
            config.session.browser_path = Some(path.clone());
        }
        if let Some(dir) = &self.profile_dir {
            config.session.profile_dir = Some(dir.clone());
        }
        if let Some(port) = self.debug_port {
            config.session.debug_port = port;
        }
    }
}
