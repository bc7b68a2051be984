//! Market-qualified ticker identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A ticker plus optional exchange suffix, e.g. `AAPL.US`.
///
/// Construction always goes through [`Identifier::normalize`] or
/// [`Identifier::parse`], so the suffix is present at most once and
/// re-normalizing an identifier returns it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier {
    symbol: String,
    exchange: Option<String>,
}

impl Identifier {
    /// Normalize a raw ticker: trim, upper-case, and append `default_exchange`
    /// unless the input already carries a `.EXCHANGE` suffix.
    ///
    /// The text after the last `.` is always read as the exchange, so share
    /// classes must use the provider's `-` form: `BRK-B`, not `BRK.B`.
    ///
    /// Returns `None` for blank input.
    pub fn normalize(raw: &str, default_exchange: Option<&str>) -> Option<Self> {
        let cleaned = raw.trim().to_ascii_uppercase();
        if cleaned.is_empty() {
            return None;
        }

        if let Some((symbol, exchange)) = cleaned.rsplit_once('.') {
            if !symbol.is_empty() && !exchange.is_empty() {
                return Some(Self {
                    symbol: symbol.to_string(),
                    exchange: Some(exchange.to_string()),
                });
            }
        }

        let symbol = cleaned.trim_matches('.').to_string();
        if symbol.is_empty() {
            return None;
        }
        let exchange = default_exchange
            .map(|e| e.trim().trim_start_matches('.').to_ascii_uppercase())
            .filter(|e| !e.is_empty());
        Some(Self { symbol, exchange })
    }

    /// Parse an already-qualified code (as written to a checkpoint file).
    pub fn parse(code: &str) -> Option<Self> {
        Self::normalize(code, None)
    }

    /// Re-apply normalization. Always a fixed point.
    pub fn renormalize(&self, default_exchange: Option<&str>) -> Self {
        Self::normalize(&self.code(), default_exchange).unwrap_or_else(|| self.clone())
    }

    /// Base ticker without the exchange suffix.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn exchange(&self) -> Option<&str> {
        self.exchange.as_deref()
    }

    /// Provider code: `SYMBOL.EXCHANGE`, or just `SYMBOL`.
    pub fn code(&self) -> String {
        match &self.exchange {
            Some(exchange) => format!("{}.{exchange}", self.symbol),
            None => self.symbol.clone(),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.exchange {
            Some(exchange) => write!(f, "{}.{exchange}", self.symbol),
            None => write!(f, "{}", self.symbol),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn appends_default_exchange() {
        let id = Identifier::normalize(" aapl ", Some("US")).unwrap();
        assert_eq!(id.symbol(), "AAPL");
        assert_eq!(id.exchange(), Some("US"));
        assert_eq!(id.code(), "AAPL.US");
    }

    #[test]
    fn keeps_existing_suffix() {
        let id = Identifier::normalize("vod.lse", Some("US")).unwrap();
        assert_eq!(id.code(), "VOD.LSE");
    }

    #[test]
    fn share_class_uses_dash() {
        let id = Identifier::normalize("brk-b", Some("US")).unwrap();
        assert_eq!(id.symbol(), "BRK-B");
        assert_eq!(id.code(), "BRK-B.US");

        // A dotted class suffix is taken as the exchange.
        let dotted = Identifier::normalize("BRK.B", Some("US")).unwrap();
        assert_eq!(dotted.symbol(), "BRK");
        assert_eq!(dotted.exchange(), Some("B"));
    }

    #[test]
    fn no_exchange_configured() {
        let id = Identifier::normalize("msft", None).unwrap();
        assert_eq!(id.code(), "MSFT");
        assert_eq!(id.exchange(), None);
    }

    #[test]
    fn blank_input_is_rejected() {
        assert!(Identifier::normalize("   ", Some("US")).is_none());
        assert!(Identifier::normalize(".", Some("US")).is_none());
    }

    #[test]
    fn parse_roundtrips_display() {
        let id = Identifier::normalize("spy", Some("us")).unwrap();
        assert_eq!(Identifier::parse(&id.to_string()), Some(id));
    }

    proptest! {
        #[test]
        fn normalization_is_a_fixed_point(
            raw in "[a-zA-Z]{1,6}(\\.[a-zA-Z]{1,4})?",
            exchange in proptest::option::of("[A-Z]{2,4}"),
        ) {
            let once = Identifier::normalize(&raw, exchange.as_deref()).unwrap();
            let twice = once.renormalize(exchange.as_deref());
            prop_assert_eq!(&once, &twice);
            let reparsed = Identifier::normalize(&once.code(), exchange.as_deref()).unwrap();
            prop_assert_eq!(once, reparsed);
        }
    }
}
