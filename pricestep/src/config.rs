//! Run configuration.
//!
//! Every field has a default, so an empty or missing file yields a working
//! setup for the seller dashboard. Values can be overridden from a YAML file
//! and then from command-line flags.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::{ApplyPolicy, GROWTH_FACTOR};
use crate::errors::ConfigError;
use crate::selector::Selector;

pub const DEFAULT_LISTING_URL: &str = "https://seller.flipkart.com/index.html\
#dashboard/listings-management?listingState=ACTIVE&listingsSearchQuery={sku}&partnerContext=ALL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub dashboard: DashboardConfig,
    pub convergence: ConvergenceConfig,
    pub input: InputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Browser executable; searched on PATH when unset
    pub browser_path: Option<PathBuf>,
    /// Persistent profile directory (cookies, login)
    pub profile_dir: Option<PathBuf>,
    pub headless: bool,
    pub debug_port: u16,
    pub launch_timeout_secs: u64,
    /// Time given to the operator to log in before the first task
    pub login_wait_secs: u64,
    pub extra_args: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            browser_path: None,
            profile_dir: None,
            headless: true,
            debug_port: 9222,
            launch_timeout_secs: 30,
            login_wait_secs: 60,
            extra_args: Vec::new(),
        }
    }
}

impl SessionConfig {
    pub fn resolved_profile_dir(&self) -> PathBuf {
        self.profile_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("pricestep")
                .join("chrome-profile")
        })
    }

    pub fn launch_timeout(&self) -> Duration {
        Duration::from_secs(self.launch_timeout_secs)
    }

    pub fn login_wait(&self) -> Duration {
        Duration::from_secs(self.login_wait_secs)
    }
}

/// Where things live in the seller dashboard.
///
/// `listing_url` takes a URL-encoded `{sku}`; `listing_row` takes `{sku}` as
/// an XPath string literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub listing_url: String,
    pub listing_row: String,
    /// Evaluated inside the listing row
    pub pricing_entry: String,
    pub continue_button: String,
    pub settlement_field: String,
    pub apply_button: String,
    pub wait_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub command_timeout_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_LISTING_URL.to_string(),
            listing_row: "//tr[.//td[contains(text(), {sku})]]".to_string(),
            pricing_entry: ".//div[contains(@class,'ClickableContainer')]".to_string(),
            continue_button: "//button[.//span[text()='Continue to pricing']]".to_string(),
            settlement_field: "#settlementValue".to_string(),
            apply_button: "//button[contains(@class,'primary') and contains(.,'Apply')]"
                .to_string(),
            wait_timeout_secs: 20,
            poll_interval_ms: 100,
            command_timeout_secs: 30,
        }
    }
}

impl DashboardConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    pub growth_factor: f64,
    pub apply_policy: ApplyPolicy,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            growth_factor: GROWTH_FACTOR,
            apply_policy: ApplyPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub sku_column: String,
    pub price_column: String,
    /// Worksheet to read; the first sheet when unset
    pub sheet: Option<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            sku_column: "SKU".to_string(),
            price_column: "FinalPrice".to_string(),
            sheet: None,
        }
    }
}

impl Config {
    /// Load from a YAML file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_yaml(&text)?
            }
            None => Config::default(),
        };
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let growth = self.convergence.growth_factor;
        if !growth.is_finite() || growth <= 1.0 {
            return Err(ConfigError::Invalid(format!(
                "growth_factor must be greater than 1, got {growth}"
            )));
        }
        if self.dashboard.wait_timeout_secs == 0 || self.dashboard.command_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero".to_string()));
        }
        if self.dashboard.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.session.launch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "launch_timeout_secs must be non-zero".to_string(),
            ));
        }
        if !self.dashboard.listing_url.contains("{sku}") {
            return Err(ConfigError::Invalid(
                "listing_url must contain a {sku} placeholder".to_string(),
            ));
        }
        if !self.dashboard.listing_row.contains("{sku}") {
            return Err(ConfigError::Invalid(
                "listing_row must contain a {sku} placeholder".to_string(),
            ));
        }

        let selectors = [
            ("pricing_entry", &self.dashboard.pricing_entry),
            ("continue_button", &self.dashboard.continue_button),
            ("settlement_field", &self.dashboard.settlement_field),
            ("apply_button", &self.dashboard.apply_button),
        ];
        for (name, raw) in selectors {
            if let Selector::Invalid(reason) = Selector::from(raw.as_str()) {
                return Err(ConfigError::Invalid(format!("{name}: {reason}")));
            }
        }

        if self.input.sku_column.trim().is_empty() || self.input.price_column.trim().is_empty() {
            return Err(ConfigError::Invalid("column names must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert!(config.session.headless);
        assert_eq!(config.session.login_wait_secs, 60);
        assert_eq!(config.dashboard.wait_timeout(), Duration::from_secs(20));
        assert_eq!(config.convergence.growth_factor, 1.0199);
        assert_eq!(config.convergence.apply_policy, ApplyPolicy::TrustApplied);
        assert!(config.dashboard.listing_url.contains("listingsSearchQuery={sku}"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml(
            r#"
session:
  headless: false
  debug_port: 9333
convergence:
  apply_policy: reread
input:
  sheet: Prices
"#,
        )
        .unwrap();
        assert!(!config.session.headless);
        assert_eq!(config.session.debug_port, 9333);
        assert_eq!(config.session.login_wait_secs, 60);
        assert_eq!(config.convergence.apply_policy, ApplyPolicy::Reread);
        assert_eq!(config.convergence.growth_factor, 1.0199);
        assert_eq!(config.input.sheet.as_deref(), Some("Prices"));
        assert_eq!(config.input.sku_column, "SKU");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = Config::from_yaml("   \n").unwrap();
        assert_eq!(config.session.debug_port, 9222);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.convergence.growth_factor = 1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dashboard.listing_url = "https://example.com/listings".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dashboard.apply_button = "Apply".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dashboard.wait_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = Config::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
