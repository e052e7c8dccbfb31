use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::cdp::CdpConnection;
use crate::errors::AutomationError;
use crate::locator::Locator;
use crate::selector::Selector;

/// A single browser tab driven over DevTools.
pub struct Page {
    cdp: CdpConnection,
    poll_interval: Duration,
    default_timeout: Duration,
}

impl Page {
    pub(crate) fn new(cdp: CdpConnection, poll_interval: Duration, default_timeout: Duration) -> Self {
        Self {
            cdp,
            poll_interval,
            default_timeout,
        }
    }

    /// Create a locator for elements matching the selector, using the page's
    /// default wait timeout.
    pub fn locator(&self, selector: impl Into<Selector>) -> Locator<'_> {
        Locator::new(self, selector.into(), self.default_timeout)
    }

    /// Navigate and wait until the document has finished loading.
    #[instrument(level = "debug", skip(self))]
    pub async fn goto(&self, url: &str) -> Result<(), AutomationError> {
        self.cdp.navigate(url).await?;
        self.wait_for_load(self.default_timeout).await
    }

    pub async fn wait_for_load(&self, timeout: Duration) -> Result<(), AutomationError> {
        let deadline = Instant::now() + timeout;
        loop {
            // the old execution context may vanish mid-navigation; retry until the deadline
            match self.cdp.evaluate("document.readyState").await {
                Ok(Value::String(state)) if state == "complete" => return Ok(()),
                Ok(other) => debug!(state = %other, "Document not ready yet"),
                Err(e) if e.is_transient() => debug!("readyState probe failed: {}", e),
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::Timeout(format!(
                    "page did not finish loading within {timeout:?}"
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    pub async fn evaluate(&self, expression: &str) -> Result<Value, AutomationError> {
        self.cdp.evaluate(expression).await
    }

    pub(crate) fn cdp(&self) -> &CdpConnection {
        &self.cdp
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub async fn close(self) {
        self.cdp.close().await;
    }
}
