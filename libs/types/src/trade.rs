//! Normalized trade prints
//!
//! A trade print drives candle aggregation. Only the fields every exchange
//! publishes are kept.

use crate::ids::MarketId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One executed trade as reported by a feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub instrument: MarketId,
    pub price: Decimal,
    pub size: Decimal,
    /// Execution time in Unix nanos (exchange clock).
    pub time: i64,
}

impl Trade {
    pub fn new(instrument: MarketId, price: Decimal, size: Decimal, time: i64) -> Self {
        Self {
            instrument,
            price,
            size,
            time,
        }
    }

    /// Notional value (price × size).
    pub fn value(&self) -> Decimal {
        self.price * self.size
    }
}
