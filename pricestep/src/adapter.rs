use async_trait::async_trait;

use crate::errors::AdapterError;

/// The four operations the convergence engine needs from the pricing UI.
///
/// Calls take `&mut self`: the UI has a single point of interaction, so only
/// one call may be in flight at a time. `open_listing` must succeed before
/// `open_pricing_panel` is meaningful.
#[async_trait]
pub trait PricingAdapter: Send {
    /// Resolve the listing page for `sku`.
    async fn open_listing(&mut self, sku: &str) -> Result<(), AdapterError>;

    /// Open the pricing panel of the listing opened last.
    async fn open_pricing_panel(&mut self, sku: &str) -> Result<(), AdapterError>;

    /// Read the settlement value currently shown in the panel.
    async fn read_settlement_value(&mut self) -> Result<f64, AdapterError>;

    /// Enter `value` and submit it.
    async fn apply_settlement_value(&mut self, value: f64) -> Result<(), AdapterError>;
}

// Longest first, so "INR." wins over "INR".
const CURRENCY_PREFIXES: &[&str] = &["INR.", "INR", "Rs.", "Rs", "₹"];

/// Parse a settlement field's text. Accepts thousands separators and one
/// leading currency token (`₹`, `Rs.`, `Rs`, `INR`). Anything else that is
/// not a plain decimal is rejected.
pub fn parse_settlement_text(raw: &str) -> Result<f64, AdapterError> {
    let mut text = raw.trim();
    if let Some(prefix) = CURRENCY_PREFIXES.iter().find(|p| {
        text.get(..p.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(p))
    }) {
        text = text[prefix.len()..].trim_start();
    }

    let cleaned = text.replace(',', "");
    if cleaned.is_empty() {
        return Err(AdapterError::Read(format!("value field is empty ({raw:?})")));
    }
    if !cleaned
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.' || c == '-')
    {
        return Err(AdapterError::Read(format!("value {raw:?} is not numeric")));
    }
    let value: f64 = cleaned
        .parse()
        .map_err(|_| AdapterError::Read(format!("value {raw:?} is not numeric")))?;
    if !value.is_finite() {
        return Err(AdapterError::Read(format!("value {raw:?} is not finite")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settlement_text() {
        assert_eq!(parse_settlement_text("101.99").unwrap(), 101.99);
        assert_eq!(parse_settlement_text(" 1,250.50 ").unwrap(), 1250.5);
        assert_eq!(parse_settlement_text("₹ 99").unwrap(), 99.0);
        assert!(parse_settlement_text("").is_err());
        assert!(parse_settlement_text("   ").is_err());
        assert!(parse_settlement_text("abc").is_err());
        assert!(parse_settlement_text("12.3.4").is_err());
    }

    #[test]
    fn test_currency_prefix_with_dot_keeps_magnitude() {
        assert_eq!(parse_settlement_text("Rs. 99").unwrap(), 99.0);
        assert_eq!(parse_settlement_text("INR. 499").unwrap(), 499.0);
        assert_eq!(parse_settlement_text("rs.1,299.50").unwrap(), 1299.5);
        assert_eq!(parse_settlement_text("INR 250").unwrap(), 250.0);
        assert_eq!(parse_settlement_text("₹101.99").unwrap(), 101.99);
    }

    #[test]
    fn test_unrecognised_text_is_rejected() {
        assert!(parse_settlement_text("Rs . 99").is_err());
        assert!(parse_settlement_text("USD 99").is_err());
        assert!(parse_settlement_text("99 /-").is_err());
        assert!(parse_settlement_text("1 299").is_err());
        assert!(parse_settlement_text("Rs.").is_err());
    }
}
