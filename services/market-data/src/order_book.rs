//! In-memory order book store rebuilt from snapshot + delta feeds
//!
//! One store mirrors one exchange+instrument book. Entries are keyed by
//! [`LevelId`] and kept in a `BTreeMap` so scans see a deterministic order.
//!
//! Feeds differ in how they remove a level:
//! - `RemovalPolicy::KeepZero` → the entry stays with size zero
//! - `RemovalPolicy::Delete` → the entry is removed outright
//!
//! Downstream scans treat zero-size entries as inactive, so both policies
//! yield the same visible book but different stored-entry counts.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use types::errors::LevelError;
use types::ids::{ExchangeId, LevelId, MarketId};
use types::level::{IdScheme, PriceLevel, PriceLevelUpdate};
use types::numeric::DEFAULT_PRICE_PRECISION;

use crate::events::BookDelta;

/// How removals are physically applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Removal sets size to zero; the entry is kept.
    KeepZero,
    /// Removal deletes the entry.
    Delete,
}

/// Whether deltas may introduce ids the store has not seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdPolicy {
    /// Any complete upsert may create a new entry.
    Open,
    /// Ids are declared by the snapshot or an explicit insert; upserts,
    /// deletes and zero-size updates for unknown ids are integrity errors.
    Predeclared,
}

/// Per-feed book configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookConfig {
    pub id_scheme: IdScheme,
    pub removal_policy: RemovalPolicy,
    pub id_policy: IdPolicy,
    /// Fractional digits used when formatting synthetic price ids.
    pub price_precision: u32,
}

impl BookConfig {
    /// Price-level feed: synthetic ids, zero-size removals.
    pub fn synthetic(price_precision: u32) -> Self {
        Self {
            id_scheme: IdScheme::Synthetic,
            removal_policy: RemovalPolicy::KeepZero,
            id_policy: IdPolicy::Open,
            price_precision,
        }
    }

    /// Exchange-id feed: native ids, explicit deletes, ids declared up front.
    pub fn native() -> Self {
        Self {
            id_scheme: IdScheme::Native,
            removal_policy: RemovalPolicy::Delete,
            id_policy: IdPolicy::Predeclared,
            price_precision: DEFAULT_PRICE_PRECISION,
        }
    }
}

impl Default for BookConfig {
    fn default() -> Self {
        Self::synthetic(DEFAULT_PRICE_PRECISION)
    }
}

/// Errors raised while applying a delta.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookError {
    #[error("delta references unknown level {0}")]
    UnknownLevel(LevelId),

    #[error("cannot insert level {0}: side, price and size are required")]
    IncompleteLevel(LevelId),

    #[error("cannot resolve level id: {0}")]
    Unresolvable(#[from] LevelError),
}

/// What a successful apply did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Inserted,
    Updated,
    Zeroed,
    Removed,
    /// Nothing to do (removal of an absent level on an open feed).
    Ignored,
}

/// Order book mirror for a single exchange+instrument pair.
#[derive(Debug, Clone)]
pub struct OrderBookStore {
    exchange: ExchangeId,
    instrument: MarketId,
    config: BookConfig,
    levels: BTreeMap<LevelId, PriceLevel>,
    /// Unix nanos of the last applied update.
    last_update: i64,
}

impl OrderBookStore {
    /// Create an empty store.
    pub fn new(exchange: ExchangeId, instrument: MarketId, config: BookConfig) -> Self {
        Self {
            exchange,
            instrument,
            config,
            levels: BTreeMap::new(),
            last_update: 0,
        }
    }

    /// Replace the whole book with a snapshot.
    ///
    /// Snapshot entries that cannot be resolved or are incomplete are
    /// skipped with a warning. Returns the number of entries stored.
    pub fn apply_snapshot(&mut self, levels: &[PriceLevelUpdate]) -> usize {
        self.levels.clear();

        let mut skipped = 0usize;
        for update in levels {
            match self.resolve(update) {
                Ok(id) if update.is_complete() => {
                    self.store_new(id, update);
                }
                Ok(id) => {
                    skipped += 1;
                    warn!(exchange = %self.exchange, instrument = %self.instrument, level = %id, "Skipping incomplete snapshot level");
                }
                Err(e) => {
                    skipped += 1;
                    warn!(exchange = %self.exchange, instrument = %self.instrument, error = %e, "Skipping unresolvable snapshot level");
                }
            }
        }

        info!(
            exchange = %self.exchange,
            instrument = %self.instrument,
            stored = self.levels.len(),
            skipped,
            "Snapshot applied"
        );
        self.levels.len()
    }

    /// Insert or update a level.
    ///
    /// Fields missing from `update` keep their stored values.
    pub fn upsert(&mut self, update: &PriceLevelUpdate) -> Result<ApplyOutcome, BookError> {
        let id = self.resolve(update)?;

        if let Some(level) = self.levels.get_mut(&id) {
            merge_into(level, update);
            self.last_update = update.time;
            return Ok(ApplyOutcome::Updated);
        }

        if self.config.id_policy == IdPolicy::Predeclared {
            return Err(self.unknown(id));
        }
        if !update.is_complete() {
            return Err(BookError::IncompleteLevel(id));
        }

        self.store_new(id, update);
        Ok(ApplyOutcome::Inserted)
    }

    /// Declare a new level (explicit insert messages).
    ///
    /// An existing entry with the same id is overwritten.
    pub fn insert(&mut self, update: &PriceLevelUpdate) -> Result<ApplyOutcome, BookError> {
        let id = self.resolve(update)?;
        if !update.is_complete() {
            return Err(BookError::IncompleteLevel(id));
        }

        let existed = self.levels.contains_key(&id);
        self.store_new(id, update);
        Ok(if existed {
            ApplyOutcome::Updated
        } else {
            ApplyOutcome::Inserted
        })
    }

    /// Remove a level outright.
    pub fn delete(&mut self, id: &LevelId) -> Result<ApplyOutcome, BookError> {
        match self.levels.remove(id) {
            Some(_) => Ok(ApplyOutcome::Removed),
            None => self.absent(id),
        }
    }

    /// Set a level's size to zero, keeping the entry.
    pub fn apply_zero_size(&mut self, id: &LevelId, time: i64) -> Result<ApplyOutcome, BookError> {
        match self.levels.get_mut(id) {
            Some(level) => {
                level.size = Decimal::ZERO;
                level.updated_at = time;
                self.last_update = time;
                Ok(ApplyOutcome::Zeroed)
            }
            None => self.absent(id),
        }
    }

    /// Apply one normalized delta.
    ///
    /// `Delete` and `ZeroSize` are both removals; the configured
    /// [`RemovalPolicy`] decides whether the entry is dropped or zeroed.
    pub fn apply(&mut self, delta: &BookDelta) -> Result<ApplyOutcome, BookError> {
        match delta {
            BookDelta::Upsert(update) => self.upsert(update),
            BookDelta::Insert(update) => self.insert(update),
            BookDelta::Delete(update) | BookDelta::ZeroSize(update) => {
                let id = self.resolve(update)?;
                match self.config.removal_policy {
                    RemovalPolicy::KeepZero => self.apply_zero_size(&id, update.time),
                    RemovalPolicy::Delete => self.delete(&id),
                }
            }
        }
    }

    /// Drop every entry. Must be followed by a fresh snapshot.
    pub fn reset(&mut self) {
        info!(
            exchange = %self.exchange,
            instrument = %self.instrument,
            discarded = self.levels.len(),
            "Order book reset"
        );
        self.levels.clear();
        self.last_update = 0;
    }

    /// Look up a level by id.
    pub fn get(&self, id: &LevelId) -> Option<&PriceLevel> {
        self.levels.get(id)
    }

    /// All stored levels in id order, including zero-size ones.
    pub fn levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.levels.values()
    }

    /// Number of stored entries (zero-size entries included).
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Number of entries with a positive size.
    pub fn active_len(&self) -> usize {
        self.levels.values().filter(|l| l.is_active()).count()
    }

    pub fn last_update(&self) -> i64 {
        self.last_update
    }

    pub fn exchange(&self) -> &ExchangeId {
        &self.exchange
    }

    pub fn instrument(&self) -> &MarketId {
        &self.instrument
    }

    pub fn config(&self) -> &BookConfig {
        &self.config
    }

    fn resolve(&self, update: &PriceLevelUpdate) -> Result<LevelId, BookError> {
        Ok(update.level_id(self.config.id_scheme, self.config.price_precision)?)
    }

    /// Store a complete update as a fresh entry.
    fn store_new(&mut self, id: LevelId, update: &PriceLevelUpdate) {
        let (Some(side), Some(price), Some(size)) = (update.side, update.price, update.size) else {
            return;
        };
        debug!(level = %id, %price, %size, "Level stored");
        self.levels.insert(
            id.clone(),
            PriceLevel {
                id,
                side,
                price,
                size,
                updated_at: update.time,
            },
        );
        self.last_update = update.time;
    }

    /// Outcome for a removal that found nothing.
    fn absent(&self, id: &LevelId) -> Result<ApplyOutcome, BookError> {
        match self.config.id_policy {
            IdPolicy::Predeclared => Err(self.unknown(id.clone())),
            IdPolicy::Open => {
                debug!(level = %id, "Removal for absent level ignored");
                Ok(ApplyOutcome::Ignored)
            }
        }
    }

    fn unknown(&self, id: LevelId) -> BookError {
        warn!(
            exchange = %self.exchange,
            instrument = %self.instrument,
            level = %id,
            "Delta references level not declared by snapshot"
        );
        BookError::UnknownLevel(id)
    }
}

/// Copy the fields present in `update` onto `level`.
fn merge_into(level: &mut PriceLevel, update: &PriceLevelUpdate) {
    if let Some(side) = update.side {
        level.side = side;
    }
    if let Some(price) = update.price {
        level.price = price;
    }
    if let Some(size) = update.size {
        level.size = size;
    }
    level.updated_at = update.time;
}
