//! Identifier types for feeds, instruments and book entries
//!
//! Book entries are keyed either by an id the exchange assigns or by a
//! synthetic `side-price` string for feeds that only publish price levels.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::numeric::format_price;
use crate::side::Side;
use rust_decimal::Decimal;

/// Exchange (feed) identifier, e.g. `"gdax"`, `"bitfinex"`, `"bitmex"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeId(String);

impl ExchangeId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExchangeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Instrument identifier as the exchange spells it
///
/// Exchanges disagree on formatting (`BTC-USD`, `tBTCUSD`, `XBTUSD`), so the
/// symbol is kept verbatim. Only emptiness is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(String);

impl MarketId {
    /// Create a new MarketId from a string
    ///
    /// # Panics
    /// Panics if the symbol is empty
    pub fn new(symbol: impl Into<String>) -> Self {
        let s = symbol.into();
        assert!(!s.is_empty(), "MarketId must not be empty");
        Self(s)
    }

    /// Try to create a MarketId, returning None if empty
    pub fn try_new(symbol: impl Into<String>) -> Option<Self> {
        let s = symbol.into();
        if s.is_empty() {
            None
        } else {
            Some(Self(s))
        }
    }

    /// Get the symbol string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MarketId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identity of one entry in an order book store.
///
/// `Synthetic` ids are derived from side and price, so a (side, price) pair
/// always maps to the same entry. `Native` ids come straight from the feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LevelId {
    Synthetic(String),
    Native(u64),
}

impl LevelId {
    /// Build the synthetic id for a side and price at the given precision.
    pub fn synthetic(side: Side, price: Decimal, precision: u32) -> Self {
        Self::Synthetic(format!("{}-{}", side.as_str(), format_price(price, precision)))
    }

    pub fn native(id: u64) -> Self {
        Self::Native(id)
    }
}

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelId::Synthetic(s) => write!(f, "{}", s),
            LevelId::Native(id) => write!(f, "#{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_market_id_creation() {
        let market = MarketId::new("BTC-USD");
        assert_eq!(market.as_str(), "BTC-USD");
        assert_eq!(market.to_string(), "BTC-USD");
    }

    #[test]
    fn test_market_id_try_new() {
        assert!(MarketId::try_new("tBTCUSD").is_some());
        assert!(MarketId::try_new("").is_none());
    }

    #[test]
    #[should_panic(expected = "MarketId must not be empty")]
    fn test_market_id_empty() {
        MarketId::new("");
    }

    #[test]
    fn test_market_id_serialization() {
        let market = MarketId::new("XBTUSD");
        let json = serde_json::to_string(&market).unwrap();
        assert_eq!(json, "\"XBTUSD\"");

        let deserialized: MarketId = serde_json::from_str(&json).unwrap();
        assert_eq!(market, deserialized);
    }

    #[test]
    fn test_synthetic_id_is_side_qualified() {
        let price = Decimal::from_str("1026").unwrap();
        let buy = LevelId::synthetic(Side::BUY, price, 2);
        let sell = LevelId::synthetic(Side::SELL, price, 2);
        assert_eq!(buy, LevelId::Synthetic("buy-1026.00".to_string()));
        assert_eq!(sell, LevelId::Synthetic("sell-1026.00".to_string()));
        assert_ne!(buy, sell);
    }

    #[test]
    fn test_synthetic_id_ignores_trailing_zeros() {
        let a = LevelId::synthetic(Side::BUY, Decimal::from_str("1005.3").unwrap(), 8);
        let b = LevelId::synthetic(Side::BUY, Decimal::from_str("1005.30000").unwrap(), 8);
        assert_eq!(a, b);
    }

    #[test]
    fn test_level_id_display() {
        assert_eq!(LevelId::native(8798900200).to_string(), "#8798900200");
    }
}
