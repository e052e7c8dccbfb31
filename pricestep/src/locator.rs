use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, trace};

use crate::element::PageElement;
use crate::errors::AutomationError;
use crate::page::Page;
use crate::selector::Selector;

/// What an element must satisfy before a wait returns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    /// Attached to the DOM
    Present,
    /// Present with a non-empty box and not hidden by style
    Visible,
    /// Visible and not disabled
    Clickable,
    /// Clickable with the same bounding box on two consecutive polls
    Stable,
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WaitCondition::Present => "present",
            WaitCondition::Visible => "visible",
            WaitCondition::Clickable => "clickable",
            WaitCondition::Stable => "stable",
        };
        f.write_str(name)
    }
}

/// Snapshot of an element taken in the page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ElementState {
    pub found: bool,
    pub visible: bool,
    pub enabled: bool,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementState {
    fn same_box(&self, other: &ElementState) -> bool {
        const EPS: f64 = 0.5;
        (self.x - other.x).abs() < EPS
            && (self.y - other.y).abs() < EPS
            && (self.width - other.width).abs() < EPS
            && (self.height - other.height).abs() < EPS
    }

    /// Whether this snapshot satisfies `condition`, given the previous snapshot.
    pub fn satisfies(&self, condition: WaitCondition, previous: Option<&ElementState>) -> bool {
        match condition {
            WaitCondition::Present => self.found,
            WaitCondition::Visible => self.found && self.visible,
            WaitCondition::Clickable => self.found && self.visible && self.enabled,
            WaitCondition::Stable => {
                self.found
                    && self.visible
                    && self.enabled
                    && previous.is_some_and(|p| p.found && self.same_box(p))
            }
        }
    }
}

/// A high-level handle for finding elements and waiting on their state.
#[derive(Clone)]
pub struct Locator<'p> {
    page: &'p Page,
    selector: Selector,
    timeout: Duration,
}

impl<'p> Locator<'p> {
    pub(crate) fn new(page: &'p Page, selector: Selector, timeout: Duration) -> Self {
        Self {
            page,
            selector,
            timeout,
        }
    }

    /// Set the timeout used by waits on this locator.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get a nested locator evaluated inside this one's match
    pub fn locator(&self, selector: impl Into<Selector>) -> Locator<'p> {
        Locator {
            page: self.page,
            selector: self.selector.clone().then(selector),
            timeout: self.timeout,
        }
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Take one snapshot of the element's state without waiting.
    pub async fn probe(&self) -> Result<ElementState, AutomationError> {
        let script = probe_script(&self.selector)?;
        let value = self.page.evaluate(&script).await?;
        serde_json::from_value(value)
            .map_err(|e| AutomationError::Protocol(format!("unexpected probe result: {e}")))
    }

    /// Poll until the element satisfies `condition` or the timeout elapses.
    #[instrument(level = "debug", skip(self), fields(selector = %self.selector))]
    pub async fn wait_for(&self, condition: WaitCondition) -> Result<PageElement<'p>, AutomationError> {
        let deadline = Instant::now() + self.timeout;
        let mut previous: Option<ElementState> = None;

        loop {
            match self.probe().await {
                Ok(state) => {
                    if state.satisfies(condition, previous.as_ref()) {
                        trace!(%condition, "Wait satisfied");
                        return Ok(PageElement::new(self.page, self.selector.clone()));
                    }
                    previous = Some(state);
                }
                // transient while the page swaps documents
                Err(e) if e.is_transient() => {
                    debug!("probe script failed: {}", e);
                    previous = None;
                }
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                return Err(self.timeout_error(condition, previous.as_ref()));
            }
            tokio::time::sleep(self.page.poll_interval()).await;
        }
    }

    pub async fn wait_present(&self) -> Result<PageElement<'p>, AutomationError> {
        self.wait_for(WaitCondition::Present).await
    }

    pub async fn wait_clickable(&self) -> Result<PageElement<'p>, AutomationError> {
        self.wait_for(WaitCondition::Clickable).await
    }

    fn timeout_error(&self, condition: WaitCondition, last: Option<&ElementState>) -> AutomationError {
        let waited = format!(
            "{} not {} after {:?}",
            self.selector, condition, self.timeout
        );
        match last {
            None => AutomationError::ElementNotFound(waited),
            Some(s) if !s.found => AutomationError::ElementNotFound(waited),
            Some(s) if !s.visible => AutomationError::ElementNotVisible(waited),
            Some(s) if !s.enabled => AutomationError::ElementNotEnabled(waited),
            Some(_) if condition == WaitCondition::Stable => {
                AutomationError::ElementNotStable(waited)
            }
            Some(_) => AutomationError::Timeout(waited),
        }
    }
}

fn probe_script(selector: &Selector) -> Result<String, AutomationError> {
    let lookup = selector.to_js()?;
    Ok(format!(
        "(() => {{ \
            const el = {lookup}; \
            if (!el) return {{ found: false }}; \
            const r = el.getBoundingClientRect(); \
            const s = window.getComputedStyle(el); \
            const visible = r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; \
            const enabled = !el.disabled && el.getAttribute('aria-disabled') !== 'true'; \
            return {{ found: true, visible, enabled, x: r.x, y: r.y, width: r.width, height: r.height }}; \
        }})()"
    ))
}
