//! Normalized feed events
//!
//! Adapters translate exchange payloads into `FeedEvent` values; the core
//! never inspects raw JSON. A feed's events must be handed to its engine in
//! arrival order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::MarketId;
use types::level::PriceLevelUpdate;
use types::trade::Trade;

/// A single book change.
///
/// The level is addressed through the update itself (exchange id, or side
/// and price for synthetic-id feeds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "level", rename_all = "snake_case")]
pub enum BookDelta {
    /// Insert-or-update by id.
    Upsert(PriceLevelUpdate),
    /// Explicitly declare a new level (feeds with insert messages).
    Insert(PriceLevelUpdate),
    /// Explicit delete message.
    Delete(PriceLevelUpdate),
    /// Removal expressed as a zero size.
    ZeroSize(PriceLevelUpdate),
}

impl BookDelta {
    /// Classify a price-level update: zero size is a removal, anything else
    /// an upsert.
    pub fn from_level_update(update: PriceLevelUpdate) -> Self {
        match update.size {
            Some(size) if size == Decimal::ZERO => BookDelta::ZeroSize(update),
            _ => BookDelta::Upsert(update),
        }
    }

    pub fn update(&self) -> &PriceLevelUpdate {
        match self {
            BookDelta::Upsert(u) | BookDelta::Insert(u) | BookDelta::Delete(u) | BookDelta::ZeroSize(u) => u,
        }
    }

    /// Label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            BookDelta::Upsert(_) => "Upsert",
            BookDelta::Insert(_) => "Insert",
            BookDelta::Delete(_) => "Delete",
            BookDelta::ZeroSize(_) => "ZeroSize",
        }
    }
}

/// Everything a feed adapter can hand to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum FeedEvent {
    /// Full book image after (re)connect.
    Snapshot {
        instrument: MarketId,
        levels: Vec<PriceLevelUpdate>,
    },

    /// Incremental book change.
    Delta {
        instrument: MarketId,
        delta: BookDelta,
    },

    /// Executed trade.
    Trade(Trade),

    /// Discard the instrument's book and re-seed it from `levels`.
    Reset {
        instrument: MarketId,
        levels: Vec<PriceLevelUpdate>,
    },

    /// Message the adapter could not map; logged and skipped.
    Unrecognized { kind: String },
}

impl FeedEvent {
    /// Extract the instrument from the event if present.
    pub fn instrument(&self) -> Option<&MarketId> {
        match self {
            FeedEvent::Snapshot { instrument, .. } => Some(instrument),
            FeedEvent::Delta { instrument, .. } => Some(instrument),
            FeedEvent::Trade(trade) => Some(&trade.instrument),
            FeedEvent::Reset { instrument, .. } => Some(instrument),
            FeedEvent::Unrecognized { .. } => None,
        }
    }

    /// Get the event type as a string label for logging.
    pub fn event_type_label(&self) -> &'static str {
        match self {
            FeedEvent::Snapshot { .. } => "Snapshot",
            FeedEvent::Delta { .. } => "Delta",
            FeedEvent::Trade(_) => "Trade",
            FeedEvent::Reset { .. } => "Reset",
            FeedEvent::Unrecognized { .. } => "Unrecognized",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use types::side::Side;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_classify_zero_size() {
        let delta = BookDelta::from_level_update(PriceLevelUpdate::new(Side::BUY, d("1020"), d("0.000")));
        assert_eq!(delta.label(), "ZeroSize");

        let delta = BookDelta::from_level_update(PriceLevelUpdate::new(Side::BUY, d("1025"), d("2")));
        assert_eq!(delta.label(), "Upsert");
        assert_eq!(delta.update().price, Some(d("1025")));
    }

    #[test]
    fn test_event_instrument_extraction() {
        let event = FeedEvent::Trade(Trade::new(MarketId::new("ETH-USD"), d("300"), d("1"), 0));
        assert_eq!(event.instrument().unwrap().as_str(), "ETH-USD");
        assert_eq!(event.event_type_label(), "Trade");

        let event = FeedEvent::Unrecognized {
            kind: "heartbeat".to_string(),
        };
        assert!(event.instrument().is_none());
    }

    #[test]
    fn test_event_serialization() {
        let event = FeedEvent::Delta {
            instrument: MarketId::new("BTC-USD"),
            delta: BookDelta::Upsert(PriceLevelUpdate::new(Side::SELL, d("1031"), d("3"))),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"Delta\""));
        assert!(json.contains("\"action\":\"upsert\""));
        let back: FeedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
