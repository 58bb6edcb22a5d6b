//! Price levels and the normalized updates adapters emit for them
//!
//! Adapters decode exchange payloads into [`RawLevelUpdate`] (strings as they
//! came off the wire) and normalize them into [`PriceLevelUpdate`]. Each field
//! is parsed on its own: a malformed size does not throw away a good price.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{FieldError, LevelError};
use crate::ids::LevelId;
use crate::numeric::{parse_decimal_field, parse_id_field};
use crate::side::Side;

/// How a feed identifies its book entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdScheme {
    /// `side-price` string built from the update (price-level feeds).
    Synthetic,
    /// Integer id assigned by the exchange.
    Native,
}

/// One resting price level as stored in a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub id: LevelId,
    pub side: Side,
    pub price: Decimal,
    /// Aggregated resting size; zero means nothing rests here.
    pub size: Decimal,
    /// Unix nanos of the last update applied to this level.
    pub updated_at: i64,
}

impl PriceLevel {
    /// Whether this level contributes to the visible book.
    pub fn is_active(&self) -> bool {
        self.size > Decimal::ZERO
    }
}

/// A normalized single-level delta.
///
/// `None` fields were absent or failed to parse and must leave the stored
/// value untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceLevelUpdate {
    pub side: Option<Side>,
    pub price: Option<Decimal>,
    pub size: Option<Decimal>,
    pub exchange_id: Option<u64>,
    /// Unix nanos when the update was received or stamped by the exchange.
    pub time: i64,
}

impl PriceLevelUpdate {
    /// Update with an explicit side.
    pub fn new(side: Side, price: Decimal, size: Decimal) -> Self {
        Self {
            side: Some(side),
            price: Some(price),
            size: Some(size),
            exchange_id: None,
            time: 0,
        }
    }

    /// Update whose side is carried by the sign of `signed_size`.
    ///
    /// A zero size leaves the side unknown.
    pub fn from_signed(price: Decimal, signed_size: Decimal) -> Self {
        let (side, size) = match Side::from_signed_size(signed_size) {
            Some((side, size)) => (Some(side), size),
            None => (None, Decimal::ZERO),
        };
        Self {
            side,
            price: Some(price),
            size: Some(size),
            exchange_id: None,
            time: 0,
        }
    }

    pub fn with_exchange_id(mut self, id: u64) -> Self {
        self.exchange_id = Some(id);
        self
    }

    pub fn with_time(mut self, time: i64) -> Self {
        self.time = time;
        self
    }

    /// Resolve the book id this update addresses.
    pub fn level_id(&self, scheme: IdScheme, precision: u32) -> Result<LevelId, LevelError> {
        match scheme {
            IdScheme::Native => self
                .exchange_id
                .map(LevelId::native)
                .ok_or(LevelError::MissingExchangeId),
            IdScheme::Synthetic => {
                let price = self.price.ok_or(LevelError::MissingPrice)?;
                let side = self.side.ok_or(LevelError::MissingSide)?;
                Ok(LevelId::synthetic(side, price, precision))
            }
        }
    }

    /// Whether side, price and size are all known.
    pub fn is_complete(&self) -> bool {
        self.side.is_some() && self.price.is_some() && self.size.is_some()
    }
}

/// A level update with fields still in wire (string) form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawLevelUpdate {
    pub side: Option<String>,
    pub price: Option<String>,
    pub size: Option<String>,
    pub exchange_id: Option<String>,
    /// Orders resting at the level. Zero marks a removal on signed-size
    /// feeds, where `size` then carries only the side (`1` or `-1`).
    pub count: Option<String>,
    /// When true and no side label is present, the side comes from the
    /// sign of `size`.
    pub signed_size: bool,
    pub time: i64,
}

impl RawLevelUpdate {
    /// Parse every field independently.
    ///
    /// Returns the update built from the fields that parsed, plus one error
    /// per field that did not.
    pub fn normalize(&self) -> (PriceLevelUpdate, Vec<FieldError>) {
        let mut errors = Vec::new();
        let mut update = PriceLevelUpdate {
            time: self.time,
            ..Default::default()
        };

        if let Some(raw) = &self.side {
            match Side::parse_field("side", raw) {
                Ok(side) => update.side = Some(side),
                Err(e) => errors.push(e),
            }
        }

        if let Some(raw) = &self.price {
            match parse_decimal_field("price", raw) {
                Ok(price) => update.price = Some(price),
                Err(e) => errors.push(e),
            }
        }

        let mut emptied = false;
        if let Some(raw) = &self.count {
            match parse_id_field("count", raw) {
                Ok(count) => emptied = count == 0,
                Err(e) => errors.push(e),
            }
        }

        if let Some(raw) = &self.size {
            match parse_decimal_field("size", raw) {
                Ok(size) if self.signed_size => match Side::from_signed_size(size) {
                    Some((side, abs)) => {
                        update.side.get_or_insert(side);
                        update.size = Some(abs);
                    }
                    None => update.size = Some(Decimal::ZERO),
                },
                Ok(size) => update.size = Some(size),
                Err(e) => errors.push(e),
            }
            if emptied && update.size.is_some() {
                update.size = Some(Decimal::ZERO);
            }
        }

        if let Some(raw) = &self.exchange_id {
            match parse_id_field("id", raw) {
                Ok(id) => update.exchange_id = Some(id),
                Err(e) => errors.push(e),
            }
        }

        (update, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_from_signed_sell() {
        let update = PriceLevelUpdate::from_signed(d("1100.32"), d("-0.3"));
        assert_eq!(update.side, Some(Side::SELL));
        assert_eq!(update.size, Some(d("0.3")));
    }

    #[test]
    fn test_from_signed_zero_has_no_side() {
        let update = PriceLevelUpdate::from_signed(d("1100.32"), Decimal::ZERO);
        assert_eq!(update.side, None);
        assert_eq!(update.size, Some(Decimal::ZERO));
    }

    #[test]
    fn test_level_id_native_requires_exchange_id() {
        let update = PriceLevelUpdate::new(Side::BUY, d("100"), d("1"));
        assert_eq!(
            update.level_id(IdScheme::Native, 8),
            Err(LevelError::MissingExchangeId)
        );
        let update = update.with_exchange_id(42);
        assert_eq!(update.level_id(IdScheme::Native, 8), Ok(LevelId::Native(42)));
    }

    #[test]
    fn test_level_id_synthetic() {
        let update = PriceLevelUpdate::new(Side::SELL, d("1030"), d("3"));
        assert_eq!(
            update.level_id(IdScheme::Synthetic, 2),
            Ok(LevelId::Synthetic("sell-1030.00".to_string()))
        );

        let no_price = PriceLevelUpdate {
            side: Some(Side::SELL),
            ..Default::default()
        };
        assert_eq!(
            no_price.level_id(IdScheme::Synthetic, 2),
            Err(LevelError::MissingPrice)
        );
    }

    #[test]
    fn test_normalize_keeps_good_fields() {
        let raw = RawLevelUpdate {
            side: Some("Sell".to_string()),
            price: Some("1033".to_string()),
            size: Some("eight".to_string()),
            exchange_id: Some("8798900200".to_string()),
            count: None,
            signed_size: false,
            time: 7,
        };

        let (update, errors) = raw.normalize();
        assert_eq!(update.side, Some(Side::SELL));
        assert_eq!(update.price, Some(d("1033")));
        assert_eq!(update.size, None);
        assert_eq!(update.exchange_id, Some(8798900200));
        assert_eq!(update.time, 7);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            FieldError::InvalidDecimal { field: "size", .. }
        ));
    }

    #[test]
    fn test_normalize_signed_size() {
        let raw = RawLevelUpdate {
            price: Some("8861.5".to_string()),
            size: Some("-0.011275".to_string()),
            signed_size: true,
            ..Default::default()
        };

        let (update, errors) = raw.normalize();
        assert!(errors.is_empty());
        assert_eq!(update.side, Some(Side::SELL));
        assert_eq!(update.size, Some(d("0.011275")));
        assert!(update.is_complete());
    }

    #[test]
    fn test_normalize_zero_count_keeps_side() {
        let raw = RawLevelUpdate {
            price: Some("1100.32".to_string()),
            size: Some("-1".to_string()),
            count: Some("0".to_string()),
            signed_size: true,
            ..Default::default()
        };

        let (update, errors) = raw.normalize();
        assert!(errors.is_empty());
        assert_eq!(update.side, Some(Side::SELL));
        assert_eq!(update.size, Some(Decimal::ZERO));
        assert_eq!(
            update.level_id(IdScheme::Synthetic, 8),
            Ok(LevelId::synthetic(Side::SELL, d("1100.32"), 8))
        );

        let resting = RawLevelUpdate {
            count: Some("3".to_string()),
            ..raw.clone()
        };
        assert_eq!(resting.normalize().0.size, Some(d("1")));

        let garbled = RawLevelUpdate {
            count: Some("many".to_string()),
            ..raw
        };
        let (update, errors) = garbled.normalize();
        assert_eq!(update.size, Some(d("1")));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_price_level_active() {
        let level = PriceLevel {
            id: LevelId::native(1),
            side: Side::BUY,
            price: d("100"),
            size: Decimal::ZERO,
            updated_at: 0,
        };
        assert!(!level.is_active());
    }
}
