//! Book side
//!
//! Feeds label sides inconsistently (`"Buy"`, `"buy"`, `"bid"`) or encode
//! them in the sign of the size, so everything is funnelled through here.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::FieldError;

/// Side of a resting price level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Resting buy interest (bid)
    BUY,
    /// Resting sell interest (ask)
    SELL,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::BUY => Side::SELL,
            Side::SELL => Side::BUY,
        }
    }

    /// Lowercase label used inside synthetic level ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::BUY => "buy",
            Side::SELL => "sell",
        }
    }

    /// Infer side from a signed size: positive is a bid, negative an ask.
    ///
    /// Returns the side and the absolute size. Zero carries no side.
    pub fn from_signed_size(size: Decimal) -> Option<(Side, Decimal)> {
        if size > Decimal::ZERO {
            Some((Side::BUY, size))
        } else if size < Decimal::ZERO {
            Some((Side::SELL, size.abs()))
        } else {
            None
        }
    }

    /// Parse a side label as sent by an exchange.
    pub fn parse_field(field: &'static str, raw: &str) -> Result<Side, FieldError> {
        raw.parse::<Side>().map_err(|_| FieldError::InvalidSide {
            field,
            value: raw.to_string(),
        })
    }
}

impl FromStr for Side {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "bid" | "bids" => Ok(Side::BUY),
            "sell" | "ask" | "asks" => Ok(Side::SELL),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite() {
        assert_eq!(Side::BUY.opposite(), Side::SELL);
        assert_eq!(Side::SELL.opposite(), Side::BUY);
    }

    #[test]
    fn test_from_signed_size() {
        let (side, size) = Side::from_signed_size(Decimal::from_str("1.5").unwrap()).unwrap();
        assert_eq!(side, Side::BUY);
        assert_eq!(size, Decimal::from_str("1.5").unwrap());

        let (side, size) = Side::from_signed_size(Decimal::from_str("-0.3").unwrap()).unwrap();
        assert_eq!(side, Side::SELL);
        assert_eq!(size, Decimal::from_str("0.3").unwrap());

        assert!(Side::from_signed_size(Decimal::ZERO).is_none());
    }

    #[test]
    fn test_parse_exchange_labels() {
        assert_eq!("Buy".parse::<Side>(), Ok(Side::BUY));
        assert_eq!("sell".parse::<Side>(), Ok(Side::SELL));
        assert_eq!("asks".parse::<Side>(), Ok(Side::SELL));
        assert!(Side::parse_field("side", "unset").is_err());
    }

    #[test]
    fn test_side_serialization() {
        assert_eq!(serde_json::to_string(&Side::BUY).unwrap(), "\"BUY\"");
    }
}
