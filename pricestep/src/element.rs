use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::errors::AutomationError;
use crate::page::Page;
use crate::selector::Selector;

/// An element that satisfied a wait. The element is looked up again by
/// selector for every action, so a re-rendered node is picked up transparently.
pub struct PageElement<'p> {
    page: &'p Page,
    selector: Selector,
}

#[derive(Debug, Deserialize)]
struct Point {
    x: f64,
    y: f64,
}

impl<'p> PageElement<'p> {
    pub(crate) fn new(page: &'p Page, selector: Selector) -> Self {
        Self { page, selector }
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Run `body` with `el` bound to the element; returns `null` when the
    /// element has disappeared since the wait.
    async fn with_element(&self, body: &str) -> Result<Value, AutomationError> {
        let lookup = self.selector.to_js()?;
        let script = format!("(() => {{ const el = {lookup}; if (!el) return null; {body} }})()");
        self.page.evaluate(&script).await
    }

    fn detached(&self) -> AutomationError {
        AutomationError::ElementNotFound(format!("{} is no longer attached", self.selector))
    }

    /// Scroll the element to the centre of the viewport and click its centre
    /// with real mouse events.
    #[instrument(level = "debug", skip(self), fields(selector = %self.selector))]
    pub async fn click(&self) -> Result<(), AutomationError> {
        let centre = self
            .with_element(
                "el.scrollIntoView({ block: 'center', inline: 'center' }); \
                 const r = el.getBoundingClientRect(); \
                 return { x: r.x + r.width / 2, y: r.y + r.height / 2 };",
            )
            .await?;
        if centre.is_null() {
            return Err(self.detached());
        }
        let point: Point = serde_json::from_value(centre)
            .map_err(|e| AutomationError::Protocol(format!("unexpected click target: {e}")))?;
        debug!(x = point.x, y = point.y, "Clicking element");
        self.page.cdp().click_at(point.x, point.y).await
    }

    /// Focus the element and empty its value, notifying the page's framework.
    pub async fn clear(&self) -> Result<(), AutomationError> {
        // use the native setter so framework-controlled inputs see the change
        let cleared = self
            .with_element(
                "el.focus(); \
                 const proto = Object.getPrototypeOf(el); \
                 const desc = Object.getOwnPropertyDescriptor(proto, 'value'); \
                 if (desc && desc.set) { desc.set.call(el, ''); } else { el.value = ''; } \
                 el.dispatchEvent(new Event('input', { bubbles: true })); \
                 el.dispatchEvent(new Event('change', { bubbles: true })); \
                 return true;",
            )
            .await?;
        if cleared.is_null() {
            return Err(self.detached());
        }
        Ok(())
    }

    /// Focus the element and insert `text` at the caret.
    pub async fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        let focused = self.with_element("el.focus(); return true;").await?;
        if focused.is_null() {
            return Err(self.detached());
        }
        self.page.cdp().insert_text(text).await
    }

    /// Current `value` of the element, falling back to the `value` attribute.
    pub async fn value(&self) -> Result<Option<String>, AutomationError> {
        let value = self
            .with_element("return (el.value !== undefined ? el.value : el.getAttribute('value'));")
            .await?;
        Ok(match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }
}
