use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::adapter::{parse_settlement_text, PricingAdapter};
use crate::config::DashboardConfig;
use crate::errors::{AdapterError, AutomationError};
use crate::locator::{Locator, WaitCondition};
use crate::page::Page;
use crate::selector::{xpath_literal, Selector};

/// [`PricingAdapter`] for the seller dashboard's listings page and its
/// pricing modal.
pub struct SellerDashboard<'p> {
    page: &'p Page,
    config: DashboardConfig,
    /// Row of the listing opened last; the pricing entry point lives inside it
    listing_row: Option<Selector>,
}

impl<'p> SellerDashboard<'p> {
    pub fn new(page: &'p Page, config: DashboardConfig) -> Self {
        Self {
            page,
            config,
            listing_row: None,
        }
    }

    pub fn listing_url(&self, sku: &str) -> String {
        listing_url(&self.config.listing_url, sku)
    }

    fn locator(&self, raw: &str) -> Locator<'p> {
        self.page.locator(Selector::from(raw))
    }

    fn settlement_field(&self) -> Locator<'p> {
        self.locator(&self.config.settlement_field)
    }
}

pub fn listing_url(template: &str, sku: &str) -> String {
    template.replace("{sku}", &urlencoding::encode(sku))
}

pub fn listing_row_selector(template: &str, sku: &str) -> Selector {
    Selector::XPath(template.replace("{sku}", &xpath_literal(sku)))
}

#[async_trait]
impl PricingAdapter for SellerDashboard<'_> {
    #[instrument(level = "debug", skip(self))]
    async fn open_listing(&mut self, sku: &str) -> Result<(), AdapterError> {
        self.listing_row = None;
        let url = self.listing_url(sku);
        debug!(%url, "Navigating to listing search");

        let not_found = |source: AutomationError| AdapterError::NotFound {
            sku: sku.to_string(),
            source,
        };
        self.page.goto(&url).await.map_err(not_found)?;

        let row = listing_row_selector(&self.config.listing_row, sku);
        self.page
            .locator(row.clone())
            .wait_present()
            .await
            .map_err(not_found)?;
        self.listing_row = Some(row);
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn open_pricing_panel(&mut self, sku: &str) -> Result<(), AdapterError> {
        let row = self.listing_row.clone().ok_or_else(|| {
            AdapterError::interaction(
                "open pricing panel",
                AutomationError::ElementNotFound(format!("no listing opened for SKU '{sku}'")),
            )
        })?;

        let entry = self
            .page
            .locator(row)
            .locator(Selector::from(self.config.pricing_entry.as_str()))
            .wait_clickable()
            .await
            .map_err(|e| AdapterError::interaction("reach the pricing entry point", e))?;
        entry
            .click()
            .await
            .map_err(|e| AdapterError::interaction("click the pricing entry point", e))?;

        let proceed = self
            .locator(&self.config.continue_button)
            .wait_clickable()
            .await
            .map_err(|e| AdapterError::interaction("reach 'Continue to pricing'", e))?;
        proceed
            .click()
            .await
            .map_err(|e| AdapterError::interaction("click 'Continue to pricing'", e))?;

        self.settlement_field()
            .wait_for(WaitCondition::Stable)
            .await
            .map_err(|e| AdapterError::interaction("open the pricing panel", e))?;
        Ok(())
    }

    async fn read_settlement_value(&mut self) -> Result<f64, AdapterError> {
        let field = self
            .settlement_field()
            .wait_present()
            .await
            .map_err(|e| AdapterError::Read(e.to_string()))?;
        let raw = field
            .value()
            .await
            .map_err(|e| AdapterError::Read(e.to_string()))?
            .ok_or_else(|| AdapterError::Read("settlement field disappeared".to_string()))?;
        parse_settlement_text(&raw)
    }

    #[instrument(level = "debug", skip(self))]
    async fn apply_settlement_value(&mut self, value: f64) -> Result<(), AdapterError> {
        let field = self
            .settlement_field()
            .wait_clickable()
            .await
            .map_err(|e| AdapterError::interaction("edit the settlement value", e))?;
        field
            .clear()
            .await
            .map_err(|e| AdapterError::interaction("clear the settlement value", e))?;
        field
            .type_text(&format!("{value:.2}"))
            .await
            .map_err(|e| AdapterError::interaction("type the settlement value", e))?;

        let apply = self
            .locator(&self.config.apply_button)
            .wait_clickable()
            .await
            .map_err(|e| AdapterError::interaction("reach the Apply button", e))?;
        apply
            .click()
            .await
            .map_err(|e| AdapterError::interaction("click Apply", e))?;

        // the modal re-renders after Apply; wait for it to settle before the next step
        self.settlement_field()
            .wait_for(WaitCondition::Stable)
            .await
            .map_err(|e| AdapterError::interaction("confirm the applied value", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DashboardConfig;

    #[test]
    fn test_listing_url_encodes_sku() {
        let config = DashboardConfig::default();
        let url = listing_url(&config.listing_url, "MUG 01/RED");
        assert!(url.contains("listingsSearchQuery=MUG%2001%2FRED&"));
        assert!(url.starts_with("https://seller.flipkart.com/index.html#dashboard/"));
    }

    #[test]
    fn test_listing_row_selector_quotes_sku() {
        let config = DashboardConfig::default();
        assert_eq!(
            listing_row_selector(&config.listing_row, "SKU-1"),
            Selector::XPath("//tr[.//td[contains(text(), 'SKU-1')]]".to_string())
        );
        assert_eq!(
            listing_row_selector(&config.listing_row, "KID'S CAP"),
            Selector::XPath("//tr[.//td[contains(text(), \"KID'S CAP\")]]".to_string())
        );
    }
}
