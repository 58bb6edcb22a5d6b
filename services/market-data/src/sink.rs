//! Completed-candle output records
//!
//! One line per candle, space separated:
//!
//! ```text
//! <unix secs> <open> <high> <low> <close> <average> <volume> <mfi> <macd> <macdh>
//! ```
//!
//! Decimals carry six fractional digits. The same format is read back by
//! backtest tooling through [`CandleRecord::from_line`].

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{error, info};
use types::ids::MarketId;
use types::numeric::format_price;

use crate::candles::Candle;
use crate::feed::CompletedCandle;
use crate::indicators::{MACD_HISTOGRAM_KEY, MACD_KEY, MFI_KEY};

const FIELD_COUNT: usize = 10;
const OUTPUT_DIGITS: u32 = 6;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    #[error("invalid value for {field}: {value:?}")]
    InvalidDecimal { field: &'static str, value: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Flat form of a completed candle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandleRecord {
    /// Window start, Unix seconds.
    pub time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub average: Decimal,
    pub volume: Decimal,
    pub mfi: Decimal,
    pub macd: Decimal,
    pub macdh: Decimal,
}

impl CandleRecord {
    /// Missing indicators are written as zero.
    pub fn from_candle(candle: &Candle) -> Self {
        let indicator = |key: &str| candle.indicators.get(key).copied().unwrap_or_default();
        Self {
            time: candle.time.div_euclid(1_000_000_000),
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            average: candle.average,
            volume: candle.volume,
            mfi: indicator(MFI_KEY),
            macd: indicator(MACD_KEY),
            macdh: indicator(MACD_HISTOGRAM_KEY),
        }
    }

    fn values(&self) -> [Decimal; FIELD_COUNT - 1] {
        [
            self.open,
            self.high,
            self.low,
            self.close,
            self.average,
            self.volume,
            self.mfi,
            self.macd,
            self.macdh,
        ]
    }

    fn rendered_values(&self) -> String {
        self.values()
            .iter()
            .map(|v| format_price(*v, OUTPUT_DIGITS))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// File line, without the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{} {}", self.time, self.rendered_values())
    }

    /// Human-readable line: instrument and RFC 3339 time (UTC) first.
    pub fn console_line(&self, instrument: &MarketId) -> String {
        let time = DateTime::from_timestamp(self.time, 0)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| self.time.to_string());
        format!("{} {} {}", instrument, time, self.rendered_values())
    }

    /// Parse one line of the file format.
    pub fn from_line(line: &str) -> Result<Self, RecordError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != FIELD_COUNT {
            return Err(RecordError::FieldCount {
                expected: FIELD_COUNT,
                found: fields.len(),
            });
        }

        let time = fields[0]
            .parse::<i64>()
            .map_err(|_| RecordError::InvalidTimestamp(fields[0].to_string()))?;

        let decimal = |index: usize, field: &'static str| {
            Decimal::from_str(fields[index]).map_err(|_| RecordError::InvalidDecimal {
                field,
                value: fields[index].to_string(),
            })
        };

        Ok(Self {
            time,
            open: decimal(1, "open")?,
            high: decimal(2, "high")?,
            low: decimal(3, "low")?,
            close: decimal(4, "close")?,
            average: decimal(5, "average")?,
            volume: decimal(6, "volume")?,
            mfi: decimal(7, "mfi")?,
            macd: decimal(8, "macd")?,
            macdh: decimal(9, "macdh")?,
        })
    }
}

/// Appends completed candles to one `<instrument>.txt` file per
/// instrument.
#[derive(Debug, Clone)]
pub struct CandleFileSink {
    dir: PathBuf,
}

impl CandleFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path separators in the instrument name become `-`.
    pub fn path_for(&self, instrument: &MarketId) -> PathBuf {
        let name = instrument.as_str().replace(['/', '\\'], "-");
        self.dir.join(format!("{}.txt", name))
    }

    /// Append one candle line.
    pub async fn write(&self, completed: &CompletedCandle) -> Result<(), RecordError> {
        let record = CandleRecord::from_candle(&completed.candle);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(&completed.instrument))
            .await?;
        file.write_all(format!("{}\n", record.to_line()).as_bytes()).await?;
        Ok(())
    }

    /// Write every candle from `candles` until the channel closes.
    ///
    /// Write failures are logged and the candle is skipped. Returns the
    /// number of lines written.
    pub async fn drain(&self, mut candles: mpsc::UnboundedReceiver<CompletedCandle>) -> u64 {
        let mut written = 0u64;
        while let Some(completed) = candles.recv().await {
            match self.write(&completed).await {
                Ok(()) => {
                    written += 1;
                    let record = CandleRecord::from_candle(&completed.candle);
                    info!(
                        exchange = %completed.exchange,
                        line = %record.console_line(&completed.instrument),
                        "Candle written"
                    );
                }
                Err(e) => error!(
                    exchange = %completed.exchange,
                    instrument = %completed.instrument,
                    error = %e,
                    "Failed to write candle"
                ),
            }
        }
        written
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
