//! Market Data Core
//!
//! Consumes normalized exchange feed events and produces:
//! - Order book mirrors rebuilt from snapshot + delta streams
//! - Best bid / best ask quotes on a delta cadence
//! - Fixed-duration OHLCV candles in a wraparound ring
//! - MFI and MACD indicators on every completed candle
//! - Line records of completed candles for backtest tooling
//!
//! Exchange transports and per-exchange JSON decoding live in adapters
//! outside this crate; they hand over [`events::FeedEvent`] values.
//!
//! # Architecture
//!
//! ```text
//!   Adapter (one per exchange)
//!        │ FeedEvent
//!    ┌───▼──────┐
//!    │FeedWorker│  ← one task, events in arrival order
//!    └───┬──────┘
//!        │
//!   ┌────┴──────────┐
//!   │               │
//! ┌─▼───────┐  ┌────▼─────┐
//! │OrderBook│  │Candle    │
//! │Store    │  │Aggregator│
//! └─┬───────┘  └────┬─────┘
//!   │               │
//! ┌─▼─────────┐ ┌───▼──────┐
//! │BestPrice  │ │Indicator │
//! │Extractor  │ │Engine    │
//! └─┬─────────┘ └───┬──────┘
//!   │ watch         │ mpsc
//!   ▼               ▼
//! quotes        completed candles ─▶ CandleFileSink
//! ```

pub mod best_price;
pub mod candles;
pub mod config;
pub mod events;
pub mod feed;
pub mod indicators;
pub mod order_book;
pub mod sink;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
