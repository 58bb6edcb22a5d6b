//! Best bid / best ask extraction
//!
//! Derives the top of book with one linear scan of an [`OrderBookStore`].
//! The scan is run every `cadence` processed deltas rather than on every
//! delta, trading a little freshness for throughput.
//!
//! Quote layout is fixed: level 1 is the best resting ask (lowest sell
//! price), level 2 the best resting bid (highest buy price).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::{ExchangeId, MarketId};
use types::side::Side;

use crate::order_book::OrderBookStore;

/// Price and size at one side's best level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLevel {
    pub price: Decimal,
    pub size: Decimal,
}

/// Top of book for one exchange+instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestPriceQuote {
    pub exchange: ExchangeId,
    pub instrument: MarketId,
    /// Lowest resting sell level.
    pub best_ask: Option<QuoteLevel>,
    /// Highest resting buy level.
    pub best_bid: Option<QuoteLevel>,
}

impl BestPriceQuote {
    /// `(ask price, ask size, bid price, bid size)`; an empty side is zeros.
    pub fn as_tuple(&self) -> (Decimal, Decimal, Decimal, Decimal) {
        let ask = self.best_ask.unwrap_or(QuoteLevel {
            price: Decimal::ZERO,
            size: Decimal::ZERO,
        });
        let bid = self.best_bid.unwrap_or(QuoteLevel {
            price: Decimal::ZERO,
            size: Decimal::ZERO,
        });
        (ask.price, ask.size, bid.price, bid.size)
    }

    /// Ask minus bid, when both sides rest.
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_ask, self.best_bid) {
            (Some(ask), Some(bid)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Midpoint of best ask and best bid.
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_ask, self.best_bid) {
            (Some(ask), Some(bid)) => Some((ask.price + bid.price) / Decimal::from(2)),
            _ => None,
        }
    }
}

/// Runs the top-of-book scan on a delta cadence.
#[derive(Debug, Clone)]
pub struct BestPriceExtractor {
    cadence: u64,
    processed: u64,
}

impl BestPriceExtractor {
    /// `cadence` of 0 is treated as 1 (scan on every delta).
    pub fn new(cadence: u64) -> Self {
        Self {
            cadence: cadence.max(1),
            processed: 0,
        }
    }

    /// Count one processed delta; scan when the cadence is reached.
    pub fn on_delta(&mut self, book: &OrderBookStore) -> Option<BestPriceQuote> {
        self.processed += 1;
        if self.processed % self.cadence == 0 {
            Some(Self::scan(book))
        } else {
            None
        }
    }

    /// Single pass over the book.
    ///
    /// Only levels with size > 0 count. Replacement is on strict
    /// comparison, so among equal prices the first scanned level wins.
    pub fn scan(book: &OrderBookStore) -> BestPriceQuote {
        let mut best_ask: Option<QuoteLevel> = None;
        let mut best_bid: Option<QuoteLevel> = None;

        for level in book.levels().filter(|l| l.is_active()) {
            let candidate = QuoteLevel {
                price: level.price,
                size: level.size,
            };
            match level.side {
                Side::SELL => {
                    if best_ask.map_or(true, |best| level.price < best.price) {
                        best_ask = Some(candidate);
                    }
                }
                Side::BUY => {
                    if best_bid.map_or(true, |best| level.price > best.price) {
                        best_bid = Some(candidate);
                    }
                }
            }
        }

        BestPriceQuote {
            exchange: book.exchange().clone(),
            instrument: book.instrument().clone(),
            best_ask,
            best_bid,
        }
    }

    /// Deltas counted so far.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn cadence(&self) -> u64 {
        self.cadence
    }
}
