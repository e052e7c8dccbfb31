#![allow(dead_code)]

use async_trait::async_trait;
use pricestep::adapter::parse_settlement_text;
use pricestep::{AdapterError, AutomationError, PricingAdapter};
use std::collections::HashMap;

/// Adapter operations, recorded in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    OpenListing(String),
    OpenPanel(String),
    Read,
    Apply(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    OpenListing,
    OpenPanel,
    Read,
    Apply,
}

/// In-memory stand-in for the pricing UI: one settlement value per SKU,
/// with failures injected on the n-th call of an operation for a SKU.
#[derive(Default)]
pub struct ScriptedAdapter {
    pub calls: Vec<Call>,
    prices: HashMap<String, f64>,
    current: Option<String>,
    failures: HashMap<(String, Op), usize>,
    counts: HashMap<(String, Op), usize>,
    round_to_cents: bool,
    ignore_applies: bool,
    raw_reads: HashMap<String, f64>,
    field_texts: HashMap<String, String>,
    apply_markup: f64,
}

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listing(mut self, sku: &str, price: f64) -> Self {
        self.prices.insert(sku.to_string(), price);
        self
    }

    /// Fail the `nth` (1-based) call of `op` made while `sku` is open.
    pub fn fail_on(mut self, sku: &str, op: Op, nth: usize) -> Self {
        self.failures.insert((sku.to_string(), op), nth);
        self
    }

    /// Store applied values the way a two-decimal input field would.
    pub fn rounding_to_cents(mut self) -> Self {
        self.round_to_cents = true;
        self
    }

    /// Accept apply calls without changing the stored value.
    pub fn ignoring_applies(mut self) -> Self {
        self.ignore_applies = true;
        self
    }

    /// Store `delta` more than each applied value, like a UI that adds a fee.
    pub fn adding_on_apply(mut self, delta: f64) -> Self {
        self.apply_markup = delta;
        self
    }

    /// Make every read for `sku` return `value` regardless of the stored price.
    pub fn reading_as(mut self, sku: &str, value: f64) -> Self {
        self.raw_reads.insert(sku.to_string(), value);
        self
    }

    /// Make every read for `sku` parse `text` the way the dashboard field does.
    pub fn showing_text(mut self, sku: &str, text: &str) -> Self {
        self.field_texts.insert(sku.to_string(), text.to_string());
        self
    }

    pub fn price(&self, sku: &str) -> Option<f64> {
        self.prices.get(sku).copied()
    }

    pub fn applies(&self) -> Vec<f64> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Apply(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    pub fn opened(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::OpenListing(sku) => Some(sku.clone()),
                _ => None,
            })
            .collect()
    }

    fn tick(&mut self, sku: &str, op: Op) -> bool {
        let key = (sku.to_string(), op);
        let count = self.counts.entry(key.clone()).or_insert(0);
        *count += 1;
        let count = *count;
        self.failures.get(&key) == Some(&count)
    }

    fn open_sku(&self) -> String {
        self.current.clone().unwrap_or_default()
    }
}

#[async_trait]
impl PricingAdapter for ScriptedAdapter {
    async fn open_listing(&mut self, sku: &str) -> Result<(), AdapterError> {
        self.calls.push(Call::OpenListing(sku.to_string()));
        self.current = None;
        if self.tick(sku, Op::OpenListing) || !self.prices.contains_key(sku) {
            return Err(AdapterError::NotFound {
                sku: sku.to_string(),
                source: AutomationError::ElementNotFound(format!("row for {sku}")),
            });
        }
        self.current = Some(sku.to_string());
        Ok(())
    }

    async fn open_pricing_panel(&mut self, sku: &str) -> Result<(), AdapterError> {
        self.calls.push(Call::OpenPanel(sku.to_string()));
        if self.current.as_deref() != Some(sku) {
            return Err(AdapterError::interaction(
                "open pricing panel",
                AutomationError::ElementNotFound("listing not open".to_string()),
            ));
        }
        if self.tick(sku, Op::OpenPanel) {
            return Err(AdapterError::interaction(
                "click 'Continue to pricing'",
                AutomationError::ElementNotEnabled("button disabled".to_string()),
            ));
        }
        Ok(())
    }

    async fn read_settlement_value(&mut self) -> Result<f64, AdapterError> {
        self.calls.push(Call::Read);
        let sku = self.open_sku();
        if self.tick(&sku, Op::Read) {
            return Err(AdapterError::Read("settlement field absent".to_string()));
        }
        if let Some(text) = self.field_texts.get(&sku) {
            return parse_settlement_text(text);
        }
        if let Some(raw) = self.raw_reads.get(&sku) {
            return Ok(*raw);
        }
        self.prices
            .get(&sku)
            .copied()
            .ok_or_else(|| AdapterError::Read("no panel open".to_string()))
    }

    async fn apply_settlement_value(&mut self, value: f64) -> Result<(), AdapterError> {
        self.calls.push(Call::Apply(value));
        let sku = self.open_sku();
        if self.tick(&sku, Op::Apply) {
            return Err(AdapterError::interaction(
                "click Apply",
                AutomationError::Timeout("Apply not clickable after 20s".to_string()),
            ));
        }
        if !self.ignore_applies {
            let value = value + self.apply_markup;
            let stored = if self.round_to_cents {
                (value * 100.0).round() / 100.0
            } else {
                value
            };
            self.prices.insert(sku, stored);
        }
        Ok(())
    }
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
