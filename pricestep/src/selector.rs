use crate::errors::AutomationError;

/// Represents ways to locate an element in the page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Select by DOM id
    Id(String),
    /// Select by CSS selector
    Css(String),
    /// Select by XPath expression (relative paths resolve against the enclosing match)
    XPath(String),
    /// Chain multiple selectors, each evaluated inside the previous match
    Chain(Vec<Selector>),
    /// Represents an invalid selector string, with a reason.
    Invalid(String),
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Id(id) => write!(f, "#{id}"),
            Selector::Css(css) => write!(f, "css:{css}"),
            Selector::XPath(xpath) => write!(f, "{xpath}"),
            Selector::Chain(parts) => {
                let joined: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
                write!(f, "{}", joined.join(" >> "))
            }
            Selector::Invalid(reason) => write!(f, "<invalid: {reason}>"),
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        let s = s.trim();

        // Handle chained selectors first
        let parts: Vec<&str> = s.split(">>").map(|p| p.trim()).collect();
        if parts.len() > 1 {
            return Selector::Chain(parts.into_iter().map(Selector::from).collect());
        }

        match s {
            "" => Selector::Invalid("empty selector".to_string()),
            _ if s.to_lowercase().starts_with("id:") => Selector::Id(s[3..].trim().to_string()),
            _ if s.to_lowercase().starts_with("css:") => Selector::Css(s[4..].trim().to_string()),
            _ if s.to_lowercase().starts_with("xpath:") => {
                Selector::XPath(s[6..].trim().to_string())
            }
            _ if s.starts_with('#') && s.len() > 1 => Selector::Id(s[1..].to_string()),
            _ if s.starts_with('/') || s.starts_with("./") || s.starts_with('(') => {
                Selector::XPath(s.to_string())
            }
            _ => Selector::Invalid(format!(
                "Unknown selector format: \"{s}\". Use prefixes like 'id:', 'css:', 'xpath:', '#' or an XPath starting with '/'."
            )),
        }
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::from(s.as_str())
    }
}

impl Selector {
    /// Append another selector, flattening chains.
    pub fn then(self, next: impl Into<Selector>) -> Selector {
        let mut chain = match self {
            Selector::Chain(parts) => parts,
            s => vec![s],
        };
        match next.into() {
            Selector::Chain(mut more) => chain.append(&mut more),
            s => chain.push(s),
        }
        Selector::Chain(chain)
    }

    /// Builds a JavaScript expression that evaluates to the first matching
    /// element, or `null` when nothing matches.
    pub fn to_js(&self) -> Result<String, AutomationError> {
        let mut steps = String::new();
        self.push_js_steps(&mut steps)?;
        Ok(format!(
            "(() => {{ let scope = document; {steps}return scope; }})()"
        ))
    }

    fn push_js_steps(&self, out: &mut String) -> Result<(), AutomationError> {
        match self {
            Selector::Id(id) => {
                out.push_str(&format!(
                    "scope = scope.querySelector('#' + CSS.escape({})); if (!scope) return null; ",
                    js_string(id)
                ));
            }
            Selector::Css(css) => {
                out.push_str(&format!(
                    "scope = scope.querySelector({}); if (!scope) return null; ",
                    js_string(css)
                ));
            }
            Selector::XPath(xpath) => {
                out.push_str(&format!(
                    "scope = document.evaluate({}, scope, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue; if (!scope) return null; ",
                    js_string(xpath)
                ));
            }
            Selector::Chain(parts) => {
                if parts.is_empty() {
                    return Err(AutomationError::InvalidSelector("empty chain".to_string()));
                }
                for part in parts {
                    part.push_js_steps(out)?;
                }
            }
            Selector::Invalid(reason) => {
                return Err(AutomationError::InvalidSelector(reason.clone()));
            }
        }
        Ok(())
    }
}

/// Quote arbitrary text as an XPath string literal.
///
/// XPath 1.0 has no escape sequences, so text containing both quote kinds is
/// split into pieces and joined with `concat()`.
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        return format!("'{text}'");
    }
    if !text.contains('"') {
        return format!("\"{text}\"");
    }
    let pieces: Vec<String> = text
        .split('\'')
        .map(|piece| format!("'{piece}'"))
        .collect();
    format!("concat({})", pieces.join(", \"'\", "))
}

fn js_string(s: &str) -> String {
    // serde_json string encoding is a valid JS string literal
    serde_json::Value::String(s.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefixes() {
        assert_eq!(
            Selector::from("#settlementValue"),
            Selector::Id("settlementValue".into())
        );
        assert_eq!(
            Selector::from("id:settlementValue"),
            Selector::Id("settlementValue".into())
        );
        assert_eq!(
            Selector::from("css:button.primary"),
            Selector::Css("button.primary".into())
        );
        assert_eq!(
            Selector::from("//button[.//span[text()='Continue to pricing']]"),
            Selector::XPath("//button[.//span[text()='Continue to pricing']]".into())
        );
        assert_eq!(
            Selector::from(".//div[contains(@class,'ClickableContainer')]"),
            Selector::XPath(".//div[contains(@class,'ClickableContainer')]".into())
        );
    }

    #[test]
    fn test_parse_chain() {
        let selector = Selector::from("//tr[1] >> .//div >> #field");
        assert_eq!(
            selector,
            Selector::Chain(vec![
                Selector::XPath("//tr[1]".into()),
                Selector::XPath(".//div".into()),
                Selector::Id("field".into()),
            ])
        );
    }

    #[test]
    fn test_unknown_format_is_invalid() {
        assert!(matches!(Selector::from("button"), Selector::Invalid(_)));
        assert!(matches!(Selector::from(""), Selector::Invalid(_)));
        assert!(Selector::from("button").to_js().is_err());
    }

    #[test]
    fn test_then_flattens() {
        let chained = Selector::from("//tr").then(Selector::from(".//td >> .//div"));
        match chained {
            Selector::Chain(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected chain, got {other:?}"),
        }
    }

    #[test]
    fn test_to_js_escapes_strings() {
        let js = Selector::Css("input[name=\"a\"]".into()).to_js().unwrap();
        assert!(js.contains(r#"querySelector("input[name=\"a\"]")"#));
        assert!(js.starts_with("(() => {"));
        assert!(js.ends_with("return scope; })()"));
    }

    #[test]
    fn test_xpath_literal() {
        assert_eq!(xpath_literal("SKU-1"), "'SKU-1'");
        assert_eq!(xpath_literal("it's"), "\"it's\"");
        assert_eq!(
            xpath_literal("a'b\"c"),
            "concat('a', \"'\", 'b\"c')"
        );
    }
}
