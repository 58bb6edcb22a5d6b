//! Per-exchange feed engine and its tokio worker
//!
//! A [`FeedEngine`] owns every order book and candle chart of one exchange
//! and applies that feed's events strictly in arrival order. It is driven
//! by exactly one task ([`FeedWorker::run`]), so it holds no locks.
//!
//! Other tasks only ever see copies:
//! - the latest [`BestPriceQuote`] per instrument through a `watch` channel
//! - every completed candle through an unbounded `mpsc` channel
//!
//! ```text
//! adapter ──mpsc──▶ FeedWorker ──▶ FeedEngine ─┬─ OrderBookStore ─▶ BestPriceExtractor ──watch──▶ quotes
//!                                              └─ CandleAggregator ─▶ IndicatorEngine ──mpsc───▶ candles
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use types::ids::{ExchangeId, MarketId};
use types::level::{PriceLevelUpdate, RawLevelUpdate};
use types::trade::Trade;

use crate::best_price::{BestPriceExtractor, BestPriceQuote};
use crate::candles::{Candle, CandleAggregator};
use crate::config::FeedConfig;
use crate::events::{BookDelta, FeedEvent};
use crate::indicators::IndicatorEngine;
use crate::order_book::{BookError, OrderBookStore};

/// Latest quote of every instrument on one exchange.
pub type QuoteBoard = BTreeMap<MarketId, BestPriceQuote>;

/// A finalized candle tagged with its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedCandle {
    pub exchange: ExchangeId,
    pub instrument: MarketId,
    pub candle: Candle,
}

/// What handling one event produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutput {
    Quote(BestPriceQuote),
    Candle(CompletedCandle),
}

/// Event counters for one feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedStats {
    pub events: u64,
    pub snapshots: u64,
    pub resets: u64,
    pub deltas_applied: u64,
    pub deltas_rejected: u64,
    pub trades: u64,
    pub candles_completed: u64,
    pub unrecognized: u64,
    pub field_errors: u64,
}

/// Book, extractor and candle state of one instrument.
#[derive(Debug)]
struct InstrumentState {
    book: OrderBookStore,
    extractor: BestPriceExtractor,
    aggregator: CandleAggregator,
}

/// Single-writer state for one exchange feed.
#[derive(Debug)]
pub struct FeedEngine {
    exchange: ExchangeId,
    config: FeedConfig,
    indicators: IndicatorEngine,
    instruments: BTreeMap<MarketId, InstrumentState>,
    stats: FeedStats,
}

impl FeedEngine {
    /// Create an engine. `config` is expected to be validated.
    pub fn new(exchange: ExchangeId, config: FeedConfig) -> Self {
        info!(
            exchange = %exchange,
            ring_capacity = config.ring_capacity,
            extraction_cadence = config.extraction_cadence,
            candle_interval_secs = config.candle_interval_secs,
            "FeedEngine initialized"
        );

        Self {
            indicators: IndicatorEngine::new(config.indicator_config()),
            exchange,
            config,
            instruments: BTreeMap::new(),
            stats: FeedStats::default(),
        }
    }

    /// Create an engine with default configuration.
    pub fn with_defaults(exchange: ExchangeId) -> Self {
        Self::new(exchange, FeedConfig::default())
    }

    /// Apply one event.
    pub fn handle(&mut self, event: FeedEvent) -> Option<FeedOutput> {
        self.stats.events += 1;
        match event {
            FeedEvent::Snapshot { instrument, levels } => {
                self.stats.snapshots += 1;
                let state = self.state_mut(&instrument);
                state.book.apply_snapshot(&levels);
                Some(FeedOutput::Quote(BestPriceExtractor::scan(&state.book)))
            }
            FeedEvent::Reset { instrument, levels } => {
                self.stats.resets += 1;
                let state = self.state_mut(&instrument);
                state.book.reset();
                state.book.apply_snapshot(&levels);
                Some(FeedOutput::Quote(BestPriceExtractor::scan(&state.book)))
            }
            FeedEvent::Delta { instrument, delta } => self.apply_delta(&instrument, &delta),
            FeedEvent::Trade(trade) => self.apply_trade(&trade),
            FeedEvent::Unrecognized { kind } => {
                self.stats.unrecognized += 1;
                warn!(exchange = %self.exchange, kind = %kind, "Unrecognized feed message skipped");
                None
            }
        }
    }

    /// Normalize a raw update, logging fields that failed to parse.
    ///
    /// Failed fields are left empty; the rest of the update still applies.
    pub fn normalize(&mut self, raw: &RawLevelUpdate) -> PriceLevelUpdate {
        let (update, errors) = raw.normalize();
        for error in &errors {
            warn!(exchange = %self.exchange, error = %error, "Dropping unparsable field");
        }
        self.stats.field_errors += errors.len() as u64;
        update
    }

    fn apply_delta(&mut self, instrument: &MarketId, delta: &BookDelta) -> Option<FeedOutput> {
        let state = instrument_state(&mut self.instruments, &self.exchange, &self.config, instrument);

        let applied = match state.book.apply(delta) {
            Ok(outcome) => {
                debug!(
                    exchange = %self.exchange,
                    instrument = %instrument,
                    action = delta.label(),
                    outcome = ?outcome,
                    "Delta applied"
                );
                true
            }
            Err(BookError::UnknownLevel(_)) => false,
            Err(e) => {
                warn!(
                    exchange = %self.exchange,
                    instrument = %instrument,
                    action = delta.label(),
                    error = %e,
                    "Delta rejected"
                );
                false
            }
        };
        let quote = state.extractor.on_delta(&state.book);

        if applied {
            self.stats.deltas_applied += 1;
        } else {
            self.stats.deltas_rejected += 1;
        }
        quote.map(FeedOutput::Quote)
    }

    fn apply_trade(&mut self, trade: &Trade) -> Option<FeedOutput> {
        self.stats.trades += 1;
        let state = instrument_state(&mut self.instruments, &self.exchange, &self.config, &trade.instrument);

        let candle = state.aggregator.process_trade(trade, &self.indicators)?;
        self.stats.candles_completed += 1;
        info!(
            exchange = %self.exchange,
            instrument = %trade.instrument,
            window = candle.time,
            close = %candle.close,
            volume = %candle.volume,
            "Candle completed"
        );
        Some(FeedOutput::Candle(CompletedCandle {
            exchange: self.exchange.clone(),
            instrument: trade.instrument.clone(),
            candle,
        }))
    }

    fn state_mut(&mut self, instrument: &MarketId) -> &mut InstrumentState {
        instrument_state(&mut self.instruments, &self.exchange, &self.config, instrument)
    }

    pub fn book(&self, instrument: &MarketId) -> Option<&OrderBookStore> {
        self.instruments.get(instrument).map(|s| &s.book)
    }

    pub fn aggregator(&self, instrument: &MarketId) -> Option<&CandleAggregator> {
        self.instruments.get(instrument).map(|s| &s.aggregator)
    }

    /// Scan the current top of book on demand.
    pub fn quote(&self, instrument: &MarketId) -> Option<BestPriceQuote> {
        self.book(instrument).map(BestPriceExtractor::scan)
    }

    pub fn instruments(&self) -> impl Iterator<Item = &MarketId> {
        self.instruments.keys()
    }

    pub fn exchange(&self) -> &ExchangeId {
        &self.exchange
    }

    pub fn stats(&self) -> &FeedStats {
        &self.stats
    }
}

/// Look up an instrument's state, creating it on first sight.
fn instrument_state<'a>(
    instruments: &'a mut BTreeMap<MarketId, InstrumentState>,
    exchange: &ExchangeId,
    config: &FeedConfig,
    instrument: &MarketId,
) -> &'a mut InstrumentState {
    instruments
        .entry(instrument.clone())
        .or_insert_with(|| InstrumentState {
            book: OrderBookStore::new(exchange.clone(), instrument.clone(), config.book_config()),
            extractor: BestPriceExtractor::new(config.extraction_cadence),
            aggregator: CandleAggregator::new(config.chart_config()),
        })
}

/// Receiving ends handed to consumers of a feed.
#[derive(Debug)]
pub struct FeedSubscriptions {
    pub quotes: watch::Receiver<QuoteBoard>,
    pub candles: mpsc::UnboundedReceiver<CompletedCandle>,
}

/// Drives one [`FeedEngine`] from an event channel.
pub struct FeedWorker {
    engine: FeedEngine,
    events: mpsc::Receiver<FeedEvent>,
    quotes: watch::Sender<QuoteBoard>,
    candles: mpsc::UnboundedSender<CompletedCandle>,
}

impl FeedWorker {
    pub fn new(engine: FeedEngine, events: mpsc::Receiver<FeedEvent>) -> (Self, FeedSubscriptions) {
        let (quotes_tx, quotes_rx) = watch::channel(QuoteBoard::new());
        let (candles_tx, candles_rx) = mpsc::unbounded_channel();
        (
            Self {
                engine,
                events,
                quotes: quotes_tx,
                candles: candles_tx,
            },
            FeedSubscriptions {
                quotes: quotes_rx,
                candles: candles_rx,
            },
        )
    }

    /// Consume events until the sender side closes.
    ///
    /// Returns the final counters.
    pub async fn run(mut self) -> FeedStats {
        let exchange = self.engine.exchange().clone();
        info!(exchange = %exchange, "Feed worker started");

        while let Some(event) = self.events.recv().await {
            match self.engine.handle(event) {
                Some(FeedOutput::Quote(quote)) => {
                    self.quotes.send_modify(|board| {
                        board.insert(quote.instrument.clone(), quote);
                    });
                }
                Some(FeedOutput::Candle(completed)) => {
                    if self.candles.send(completed).is_err() {
                        debug!(exchange = %exchange, "Candle receiver dropped");
                    }
                }
                None => {}
            }
        }

        let stats = self.engine.stats().clone();
        info!(
            exchange = %exchange,
            events = stats.events,
            deltas_applied = stats.deltas_applied,
            deltas_rejected = stats.deltas_rejected,
            candles = stats.candles_completed,
            "Feed closed, worker stopping"
        );
        stats
    }
}

/// Sending side and subscriptions of a spawned feed.
#[derive(Debug)]
pub struct FeedHandle {
    pub events: mpsc::Sender<FeedEvent>,
    pub subscriptions: FeedSubscriptions,
    pub task: JoinHandle<FeedStats>,
}

/// Spawn a worker for one exchange on the current runtime.
pub fn spawn_feed(exchange: ExchangeId, config: FeedConfig, buffer: usize) -> FeedHandle {
    let (events_tx, events_rx) = mpsc::channel(buffer.max(1));
    let (worker, subscriptions) = FeedWorker::new(FeedEngine::new(exchange, config), events_rx);
    FeedHandle {
        events: events_tx,
        subscriptions,
        task: tokio::spawn(worker.run()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order_book::RemovalPolicy;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use types::side::Side;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn market() -> MarketId {
        MarketId::new("BTC-USD")
    }

    fn delta(side: Side, price: &str, size: &str) -> FeedEvent {
        FeedEvent::Delta {
            instrument: market(),
            delta: BookDelta::from_level_update(PriceLevelUpdate::new(side, d(price), d(size))),
        }
    }

    fn trade_at(price: &str, secs: i64) -> FeedEvent {
        FeedEvent::Trade(Trade::new(market(), d(price), d("1"), secs * 1_000_000_000))
    }

    fn snapshot() -> FeedEvent {
        FeedEvent::Snapshot {
            instrument: market(),
            levels: vec![
                PriceLevelUpdate::new(Side::BUY, d("1020"), d("5")),
                PriceLevelUpdate::new(Side::SELL, d("1033"), d("8")),
            ],
        }
    }

    fn engine_with_cadence(cadence: u64) -> FeedEngine {
        FeedEngine::new(
            ExchangeId::new("gdax"),
            FeedConfig {
                extraction_cadence: cadence,
                ..FeedConfig::default()
            },
        )
    }

    #[test]
    fn test_snapshot_publishes_quote() {
        let mut engine = FeedEngine::with_defaults(ExchangeId::new("gdax"));
        let Some(FeedOutput::Quote(quote)) = engine.handle(snapshot()) else {
            panic!("expected quote");
        };
        assert_eq!(quote.best_ask.unwrap().price, d("1033"));
        assert_eq!(quote.best_bid.unwrap().price, d("1020"));
        assert_eq!(engine.stats().snapshots, 1);
    }

    #[test]
    fn test_quote_every_k_deltas() {
        let mut engine = engine_with_cadence(2);
        engine.handle(snapshot());

        assert!(engine.handle(delta(Side::BUY, "1025", "2")).is_none());
        let out = engine.handle(delta(Side::SELL, "1031", "3"));
        let Some(FeedOutput::Quote(quote)) = out else {
            panic!("expected quote on second delta");
        };
        assert_eq!(quote.best_bid.unwrap().price, d("1025"));
        assert_eq!(quote.best_ask.unwrap().price, d("1031"));
        assert_eq!(engine.stats().deltas_applied, 2);
    }

    #[test]
    fn test_zero_size_delta_respects_removal_policy() {
        let mut keep = engine_with_cadence(1);
        keep.handle(snapshot());
        keep.handle(delta(Side::BUY, "1020", "0"));
        assert_eq!(keep.book(&market()).unwrap().len(), 2);

        let mut drop = FeedEngine::new(
            ExchangeId::new("bitfinex"),
            FeedConfig {
                removal_policy: RemovalPolicy::Delete,
                ..FeedConfig::default()
            },
        );
        drop.handle(snapshot());
        drop.handle(delta(Side::BUY, "1020", "0"));
        assert_eq!(drop.book(&market()).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_native_id_is_counted_not_fatal() {
        let mut engine = FeedEngine::new(ExchangeId::new("bitfinex"), FeedConfig::native());
        engine.handle(FeedEvent::Snapshot {
            instrument: market(),
            levels: vec![PriceLevelUpdate::new(Side::BUY, d("100"), d("1")).with_exchange_id(7)],
        });

        let ghost = PriceLevelUpdate {
            size: Some(d("3")),
            exchange_id: Some(99),
            ..Default::default()
        };
        engine.handle(FeedEvent::Delta {
            instrument: market(),
            delta: BookDelta::Upsert(ghost),
        });

        assert_eq!(engine.stats().deltas_rejected, 1);
        assert_eq!(engine.book(&market()).unwrap().len(), 1);
    }

    #[test]
    fn test_reset_reseeds_book() {
        let mut engine = engine_with_cadence(1);
        engine.handle(snapshot());
        engine.handle(delta(Side::BUY, "1025", "2"));

        engine.handle(FeedEvent::Reset {
            instrument: market(),
            levels: vec![PriceLevelUpdate::new(Side::SELL, d("2000"), d("1"))],
        });

        let book = engine.book(&market()).unwrap();
        assert_eq!(book.len(), 1);
        let quote = engine.quote(&market()).unwrap();
        assert!(quote.best_bid.is_none());
        assert_eq!(quote.best_ask.unwrap().price, d("2000"));
        assert_eq!(engine.stats().resets, 1);
    }

    #[test]
    fn test_trades_emit_completed_candle() {
        let mut engine = FeedEngine::with_defaults(ExchangeId::new("gdax"));
        assert!(engine.handle(trade_at("100", 0)).is_none());
        assert!(engine.handle(trade_at("105", 30)).is_none());

        let Some(FeedOutput::Candle(completed)) = engine.handle(trade_at("101", 60)) else {
            panic!("expected completed candle");
        };
        assert_eq!(completed.exchange.as_str(), "gdax");
        assert_eq!(completed.instrument, market());
        assert_eq!(completed.candle.high, d("105"));
        assert_eq!(completed.candle.indicators.len(), 3);
        assert_eq!(engine.stats().candles_completed, 1);
    }

    #[test]
    fn test_unrecognized_is_counted() {
        let mut engine = FeedEngine::with_defaults(ExchangeId::new("gdax"));
        let out = engine.handle(FeedEvent::Unrecognized {
            kind: "subscriptions".to_string(),
        });
        assert!(out.is_none());
        assert_eq!(engine.stats().unrecognized, 1);
        assert_eq!(engine.instruments().count(), 0);
    }

    #[test]
    fn test_normalize_counts_field_errors() {
        let mut engine = FeedEngine::with_defaults(ExchangeId::new("gdax"));
        let raw = RawLevelUpdate {
            side: Some("buy".to_string()),
            price: Some("10x".to_string()),
            size: Some("2".to_string()),
            ..Default::default()
        };
        let update = engine.normalize(&raw);
        assert_eq!(update.side, Some(Side::BUY));
        assert!(update.price.is_none());
        assert_eq!(update.size, Some(d("2")));
        assert_eq!(engine.stats().field_errors, 1);
    }

    #[tokio::test]
    async fn test_worker_publishes_and_stops_on_close() {
        let handle = spawn_feed(
            ExchangeId::new("gdax"),
            FeedConfig {
                extraction_cadence: 1,
                ..FeedConfig::default()
            },
            16,
        );
        let FeedHandle {
            events,
            mut subscriptions,
            task,
        } = handle;

        events.send(snapshot()).await.unwrap();
        events.send(delta(Side::SELL, "1031", "3")).await.unwrap();
        events.send(trade_at("100", 0)).await.unwrap();
        events.send(trade_at("101", 61)).await.unwrap();
        drop(events);

        let stats = task.await.unwrap();
        assert_eq!(stats.events, 4);
        assert_eq!(stats.candles_completed, 1);

        let board = subscriptions.quotes.borrow().clone();
        assert_eq!(board[&market()].best_ask.unwrap().price, d("1031"));

        let completed = subscriptions.candles.recv().await.unwrap();
        assert_eq!(completed.candle.close, d("100"));
        assert!(subscriptions.candles.recv().await.is_none());
    }
}
