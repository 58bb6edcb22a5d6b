//! OHLCV candle ring and trade aggregation
//!
//! A [`CandleChart`] keeps the last N candles of one instrument in a
//! fixed-size ring. The cursor always points at the candle being built;
//! older candles are addressed relative to it and are overwritten when the
//! cursor laps.
//!
//! [`CandleAggregator`] turns a stream of trades into window rolls: it
//! opens, extends and completes candles based on trade timestamps. Candle
//! windows start on interval boundaries (e.g. 1m candles open on minute
//! boundaries). Windows without trades are not backfilled.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use types::trade::Trade;

use crate::indicators::{average_price, IndicatorEngine};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A single OHLCV candle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Window start, Unix nanos.
    pub time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// `(H + L + O + C) / 4`, set when the candle is completed.
    pub average: Decimal,
    pub volume: Decimal,
    pub indicators: BTreeMap<String, Decimal>,
}

impl Candle {
    /// Candle opened by the first trade of a window.
    pub fn opening(time: i64, price: Decimal, size: Decimal) -> Self {
        Self {
            time,
            open: price,
            high: price,
            low: price,
            close: price,
            average: price,
            volume: size,
            indicators: BTreeMap::new(),
        }
    }

    /// `(H + L + C) / 3`
    pub fn typical_price(&self) -> Decimal {
        (self.high + self.low + self.close) / Decimal::from(3)
    }

    /// Fold one trade tick into the candle.
    fn update(&mut self, price: Decimal, size: Decimal) {
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.close = price;
        self.volume += size;
    }
}

/// Ring size and window length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartConfig {
    pub ring_capacity: usize,
    pub candle_interval_secs: u64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 60,
            candle_interval_secs: 60,
        }
    }
}

/// Fixed-capacity ring of candles.
#[derive(Debug, Clone)]
pub struct CandleChart {
    slots: Vec<Candle>,
    cursor: usize,
    total_candles: u64,
}

impl CandleChart {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "CandleChart capacity must be positive");
        Self {
            slots: vec![Candle::default(); capacity],
            cursor: 0,
            total_candles: 0,
        }
    }

    /// Advance the cursor and store `candle` in the new current slot.
    pub fn add_candle(&mut self, candle: Candle) {
        self.cursor = (self.cursor + 1) % self.slots.len();
        self.slots[self.cursor] = candle;
        self.total_candles += 1;
    }

    pub fn current_candle(&self) -> &Candle {
        &self.slots[self.cursor]
    }

    pub fn current_candle_mut(&mut self) -> &mut Candle {
        &mut self.slots[self.cursor]
    }

    /// Candle `offset` windows back from the current one (`0` is current,
    /// `-1` the previous). `None` for positive offsets or offsets beyond
    /// the ring.
    pub fn past_relative_candle(&self, offset: i64) -> Option<&Candle> {
        let back = usize::try_from(offset.checked_neg()?).ok()?;
        let capacity = self.slots.len();
        if back >= capacity {
            return None;
        }
        Some(&self.slots[(self.cursor + capacity - back) % capacity])
    }

    pub fn update_current_candle(&mut self, price: Decimal, size: Decimal) {
        self.current_candle_mut().update(price, size);
    }

    /// Apply a late tick to the window before the current one.
    pub fn update_previous_candle(&mut self, price: Decimal, size: Decimal) {
        let capacity = self.slots.len();
        let previous = (self.cursor + capacity - 1) % capacity;
        self.slots[previous].update(price, size);
    }

    /// Finalize the current candle: set its average price and indicators.
    ///
    /// Returns an owned copy; later ring writes never reach it.
    pub fn complete_current_candle(&mut self, engine: &IndicatorEngine) -> Candle {
        let average = average_price(self.current_candle());
        let indicators = engine.evaluate(self);

        let candle = self.current_candle_mut();
        candle.average = average;
        candle.indicators = indicators;
        candle.clone()
    }

    /// The last `count` candles ending at the current one, oldest first.
    ///
    /// `None` if `count` is zero or larger than the ring. Slots never
    /// written hold default candles.
    pub fn window(&self, count: usize) -> Option<Vec<&Candle>> {
        if count == 0 || count > self.slots.len() {
            return None;
        }
        let first = -(count as i64 - 1);
        (first..=0).map(|offset| self.past_relative_candle(offset)).collect()
    }

    /// Closing prices of the last `count` candles, oldest first.
    ///
    /// Unlike [`window`](Self::window), this also requires that `count`
    /// candles have actually been added.
    pub fn closes(&self, count: usize) -> Option<Vec<Decimal>> {
        if (count as u64) > self.total_candles {
            return None;
        }
        self.window(count)
            .map(|candles| candles.into_iter().map(|c| c.close).collect())
    }

    /// Candles added since creation; never reset by wraparound.
    pub fn total_candles(&self) -> u64 {
        self.total_candles
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Rolls candle windows for one instrument from its trade stream.
#[derive(Debug, Clone)]
pub struct CandleAggregator {
    chart: CandleChart,
    interval_nanos: i64,
}

impl CandleAggregator {
    pub fn new(config: ChartConfig) -> Self {
        let interval_secs = i64::try_from(config.candle_interval_secs.max(1)).unwrap_or(i64::MAX);
        Self {
            chart: CandleChart::new(config.ring_capacity.max(1)),
            interval_nanos: interval_secs.saturating_mul(NANOS_PER_SEC),
        }
    }

    /// Align a timestamp to the window boundary (floor).
    pub fn align_to_boundary(&self, time: i64) -> i64 {
        time - time.rem_euclid(self.interval_nanos)
    }

    /// Process a trade: open, extend or roll the current window.
    ///
    /// Returns the completed candle when the trade starts a new window.
    pub fn process_trade(&mut self, trade: &Trade, engine: &IndicatorEngine) -> Option<Candle> {
        let window_start = self.align_to_boundary(trade.time);

        if self.chart.total_candles() == 0 {
            self.chart
                .add_candle(Candle::opening(window_start, trade.price, trade.size));
            return None;
        }

        let current_time = self.chart.current_candle().time;

        if current_time.saturating_add(self.interval_nanos) <= trade.time {
            let completed = self.chart.complete_current_candle(engine);
            self.chart
                .add_candle(Candle::opening(window_start, trade.price, trade.size));
            return Some(completed);
        }

        if trade.time < current_time && self.chart.total_candles() >= 2 {
            debug!(
                instrument = %trade.instrument,
                trade_time = trade.time,
                window = current_time,
                "Late trade applied to previous candle"
            );
            self.chart.update_previous_candle(trade.price, trade.size);
        } else {
            self.chart.update_current_candle(trade.price, trade.size);
        }
        None
    }

    pub fn chart(&self) -> &CandleChart {
        &self.chart
    }

    pub fn interval_nanos(&self) -> i64 {
        self.interval_nanos
    }
}
