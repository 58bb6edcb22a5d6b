//! Indicator engine: average price, SMA, EMA, Money Flow Index, MACD
//!
//! All chained arithmetic stays in `Decimal`; floats appear only when a
//! consumer asks for them at the output boundary.
//!
//! EMA follows the usual recurrence, seeded with an SMA:
//!
//! ```text
//! k     = 2 / (period + 1)
//! EMA_t = close_t * k + EMA_{t-1} * (1 - k)
//! ```
//!
//! Indicators asked for before the chart holds enough candles return a
//! neutral value instead of an error.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::candles::{Candle, CandleChart};

/// Indicator map key for the Money Flow Index.
pub const MFI_KEY: &str = "mfi";
/// Indicator map key for the MACD line.
pub const MACD_KEY: &str = "macd";
/// Indicator map key for the MACD histogram.
pub const MACD_HISTOGRAM_KEY: &str = "macdh";

/// MFI returned during warm-up (midpoint of the 0..100 range).
pub fn neutral_mfi() -> Decimal {
    Decimal::from(50)
}

/// What MFI does when a window has no negative money flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MfiZeroFlow {
    /// Use the positive flow itself as the ratio. Values approach but
    /// never reach 100, and the range is no longer strictly bounded by the
    /// standard formula.
    PositiveFlow,
    /// Report exactly 100 (or the neutral value when there was no flow at
    /// all).
    ClampToHundred,
}

/// Indicator periods and policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub mfi_period: usize,
    pub macd_short: usize,
    pub macd_long: usize,
    pub macd_signal: usize,
    pub mfi_zero_flow: MfiZeroFlow,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            mfi_period: 14,
            macd_short: 12,
            macd_long: 26,
            macd_signal: 9,
            mfi_zero_flow: MfiZeroFlow::PositiveFlow,
        }
    }
}

/// Final MACD values for one candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdOutput {
    pub macd: Decimal,
    pub histogram: Decimal,
}

impl MacdOutput {
    /// Value reported during warm-up.
    pub fn neutral() -> Self {
        Self {
            macd: Decimal::ZERO,
            histogram: Decimal::ZERO,
        }
    }

    /// Lossy conversion for float consumers.
    pub fn to_f64(&self) -> (f64, f64) {
        (
            self.macd.to_f64().unwrap_or_default(),
            self.histogram.to_f64().unwrap_or_default(),
        )
    }
}

/// `(high + low + open + close) / 4`
pub fn average_price(candle: &Candle) -> Decimal {
    (candle.high + candle.low + candle.open + candle.close) / Decimal::from(4)
}

/// Simple moving average; `None` for an empty slice.
pub fn sma(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum: Decimal = values.iter().copied().sum();
    Some(sum / Decimal::from(values.len() as u64))
}

/// Roll an EMA of the given period over `values`, starting from `seed`.
///
/// Returns one EMA value per input value.
pub fn ema_series(values: &[Decimal], period: usize, seed: Decimal) -> Vec<Decimal> {
    let k = Decimal::from(2) / Decimal::from(period as u64 + 1);
    let keep = Decimal::ONE - k;

    let mut out = Vec::with_capacity(values.len());
    let mut previous = seed;
    for &value in values {
        previous = value * k + previous * keep;
        out.push(previous);
    }
    out
}

/// `100 - 100 / (1 + positive / negative)` with the zero-flow policy applied.
pub fn money_flow_index(positive: Decimal, negative: Decimal, policy: MfiZeroFlow) -> Decimal {
    let hundred = Decimal::from(100);
    let ratio = if negative.is_zero() {
        match policy {
            MfiZeroFlow::PositiveFlow => positive,
            MfiZeroFlow::ClampToHundred if positive.is_zero() => return neutral_mfi(),
            MfiZeroFlow::ClampToHundred => return hundred,
        }
    } else {
        positive / negative
    };
    hundred - hundred / (Decimal::ONE + ratio)
}

/// MACD over a close series (oldest first).
///
/// Uses the last `2 * long` closes: the long EMA is seeded with the SMA of
/// the first `long` of them and rolled over the remaining `long`; the short
/// EMA is seeded with the SMA of the first `short` of the last
/// `short + long` closes and rolled over the same `long` tail. The signal
/// line is seeded with the SMA of the first `signal` MACD values.
///
/// Returns `None` for degenerate periods or too few closes.
pub fn compute_macd(closes: &[Decimal], short: usize, long: usize, signal: usize) -> Option<MacdOutput> {
    if short == 0 || signal == 0 || short > long || signal > long || closes.len() < 2 * long {
        return None;
    }

    let window = &closes[closes.len() - 2 * long..];
    let long_seed = sma(&window[..long])?;
    let long_ema = ema_series(&window[long..], long, long_seed);

    let short_window = &window[window.len() - (short + long)..];
    let short_seed = sma(&short_window[..short])?;
    let short_ema = ema_series(&short_window[short..], short, short_seed);

    let macd_series: Vec<Decimal> = short_ema
        .iter()
        .zip(long_ema.iter())
        .map(|(s, l)| s - l)
        .collect();

    let signal_seed = sma(&macd_series[..signal])?;
    let signal_series = ema_series(&macd_series[signal..], signal, signal_seed);

    let macd = *macd_series.last()?;
    let signal_last = signal_series.last().copied().unwrap_or(signal_seed);
    Some(MacdOutput {
        macd,
        histogram: macd - signal_last,
    })
}

/// Computes the configured indicators over a candle chart.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Money Flow Index over the current candle and `mfi_period` past ones.
    pub fn mfi(&self, chart: &CandleChart) -> Decimal {
        let period = self.config.mfi_period;
        if period == 0 || chart.total_candles() < period as u64 {
            return neutral_mfi();
        }
        let Some(window) = chart.window(period + 1) else {
            return neutral_mfi();
        };

        let mut positive = Decimal::ZERO;
        let mut negative = Decimal::ZERO;
        let mut previous: Option<Decimal> = None;

        for candle in window {
            let typical = candle.typical_price();
            if let Some(prev) = previous {
                let flow = typical * candle.volume;
                if typical > prev {
                    positive += flow;
                } else if typical < prev {
                    negative += flow;
                }
            }
            previous = Some(typical);
        }

        money_flow_index(positive, negative, self.config.mfi_zero_flow)
    }

    /// MACD line and histogram for the current candle.
    pub fn macd(&self, chart: &CandleChart) -> MacdOutput {
        let IndicatorConfig {
            macd_short: short,
            macd_long: long,
            macd_signal: signal,
            ..
        } = self.config;

        let total = chart.total_candles();
        if total < 2 * long as u64 || total < 2 * signal as u64 {
            return MacdOutput::neutral();
        }
        chart
            .closes(2 * long)
            .and_then(|closes| compute_macd(&closes, short, long, signal))
            .unwrap_or_else(MacdOutput::neutral)
    }

    /// All indicators keyed for a candle's indicator map.
    pub fn evaluate(&self, chart: &CandleChart) -> BTreeMap<String, Decimal> {
        let macd = self.macd(chart);
        let mut indicators = BTreeMap::new();
        indicators.insert(MFI_KEY.to_string(), self.mfi(chart));
        indicators.insert(MACD_KEY.to_string(), macd.macd);
        indicators.insert(MACD_HISTOGRAM_KEY.to_string(), macd.histogram);
        indicators
    }
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new(IndicatorConfig::default())
    }
}
