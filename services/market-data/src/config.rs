//! Per-feed configuration
//!
//! One `FeedConfig` is handed to a feed engine at construction. Every field
//! has a default, so a config file only needs the values it changes.

use serde::{Deserialize, Serialize};
use types::level::IdScheme;
use types::numeric::{DEFAULT_PRICE_PRECISION, MAX_PRECISION};

use crate::candles::ChartConfig;
use crate::indicators::{IndicatorConfig, MfiZeroFlow};
use crate::order_book::{BookConfig, IdPolicy, RemovalPolicy};

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("ring capacity {0} is too small (minimum 2)")]
    RingTooSmall(usize),

    #[error("price precision {0} exceeds the maximum of 28")]
    PrecisionTooLarge(u32),

    #[error("{field} must be at least 1")]
    ZeroPeriod { field: &'static str },

    #[error("macd_short ({short}) must be less than macd_long ({long})")]
    ShortNotBelowLong { short: usize, long: usize },

    #[error("macd_signal ({signal}) must not exceed macd_long ({long})")]
    SignalAboveLong { signal: usize, long: usize },

    #[error("{indicator} needs {needed} candles but the ring holds {capacity}")]
    WindowExceedsRing {
        indicator: &'static str,
        needed: usize,
        capacity: usize,
    },

    #[error("invalid config document: {0}")]
    Parse(String),
}

/// Configuration for one exchange feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Candles kept per instrument.
    pub ring_capacity: usize,
    /// Fractional digits in synthetic price ids.
    pub price_precision: u32,
    pub mfi_period: usize,
    pub macd_short: usize,
    pub macd_long: usize,
    pub macd_signal: usize,
    /// Best-price scan runs once per this many deltas.
    pub extraction_cadence: u64,
    pub candle_interval_secs: u64,
    pub mfi_zero_flow: MfiZeroFlow,
    pub id_scheme: IdScheme,
    pub removal_policy: RemovalPolicy,
    pub id_policy: IdPolicy,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 60,
            price_precision: DEFAULT_PRICE_PRECISION,
            mfi_period: 14,
            macd_short: 12,
            macd_long: 26,
            macd_signal: 9,
            extraction_cadence: 10,
            candle_interval_secs: 60,
            mfi_zero_flow: MfiZeroFlow::PositiveFlow,
            id_scheme: IdScheme::Synthetic,
            removal_policy: RemovalPolicy::KeepZero,
            id_policy: IdPolicy::Open,
        }
    }
}

impl FeedConfig {
    /// Defaults for an exchange-id feed with explicit deletes.
    pub fn native() -> Self {
        Self {
            id_scheme: IdScheme::Native,
            removal_policy: RemovalPolicy::Delete,
            id_policy: IdPolicy::Predeclared,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values are usable together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ring_capacity < 2 {
            return Err(ConfigError::RingTooSmall(self.ring_capacity));
        }
        if self.price_precision > MAX_PRECISION {
            return Err(ConfigError::PrecisionTooLarge(self.price_precision));
        }

        for (field, value) in [
            ("mfi_period", self.mfi_period as u64),
            ("macd_short", self.macd_short as u64),
            ("macd_long", self.macd_long as u64),
            ("macd_signal", self.macd_signal as u64),
            ("extraction_cadence", self.extraction_cadence),
            ("candle_interval_secs", self.candle_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroPeriod { field });
            }
        }

        if self.macd_short >= self.macd_long {
            return Err(ConfigError::ShortNotBelowLong {
                short: self.macd_short,
                long: self.macd_long,
            });
        }
        if self.macd_signal > self.macd_long {
            return Err(ConfigError::SignalAboveLong {
                signal: self.macd_signal,
                long: self.macd_long,
            });
        }
        if 2 * self.macd_long > self.ring_capacity {
            return Err(ConfigError::WindowExceedsRing {
                indicator: "macd",
                needed: 2 * self.macd_long,
                capacity: self.ring_capacity,
            });
        }
        if self.mfi_period + 1 > self.ring_capacity {
            return Err(ConfigError::WindowExceedsRing {
                indicator: "mfi",
                needed: self.mfi_period + 1,
                capacity: self.ring_capacity,
            });
        }
        Ok(())
    }

    pub fn book_config(&self) -> BookConfig {
        BookConfig {
            id_scheme: self.id_scheme,
            removal_policy: self.removal_policy,
            id_policy: self.id_policy,
            price_precision: self.price_precision,
        }
    }

    pub fn chart_config(&self) -> ChartConfig {
        ChartConfig {
            ring_capacity: self.ring_capacity,
            candle_interval_secs: self.candle_interval_secs,
        }
    }

    pub fn indicator_config(&self) -> IndicatorConfig {
        IndicatorConfig {
            mfi_period: self.mfi_period,
            macd_short: self.macd_short,
            macd_long: self.macd_long,
            macd_signal: self.macd_signal,
            mfi_zero_flow: self.mfi_zero_flow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = FeedConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ring_capacity, 60);
        assert_eq!(config.price_precision, 8);
        assert_eq!(config.extraction_cadence, 10);
        assert_eq!(config.indicator_config(), IndicatorConfig::default());
        assert_eq!(config.chart_config(), ChartConfig::default());
        assert_eq!(config.book_config(), BookConfig::default());
        assert!(FeedConfig::native().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = FeedConfig::from_json_str(
            r#"{"macd_short": 4, "macd_long": 5, "macd_signal": 2, "removal_policy": "delete"}"#,
        )
        .unwrap();
        assert_eq!(config.macd_long, 5);
        assert_eq!(config.mfi_period, 14);
        assert_eq!(config.removal_policy, RemovalPolicy::Delete);
        assert_eq!(config.mfi_zero_flow, MfiZeroFlow::PositiveFlow);
    }

    #[test]
    fn test_zero_flow_policy_from_json() {
        let config = FeedConfig::from_json_str(r#"{"mfi_zero_flow": "clamp_to_hundred"}"#).unwrap();
        assert_eq!(config.mfi_zero_flow, MfiZeroFlow::ClampToHundred);
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = FeedConfig::from_json_str("{ring_capacity: }").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_errors() {
        let base = FeedConfig::default();

        let config = FeedConfig { ring_capacity: 1, ..base.clone() };
        assert_eq!(config.validate(), Err(ConfigError::RingTooSmall(1)));

        let config = FeedConfig { price_precision: 29, ..base.clone() };
        assert_eq!(config.validate(), Err(ConfigError::PrecisionTooLarge(29)));

        let config = FeedConfig { extraction_cadence: 0, ..base.clone() };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroPeriod { field: "extraction_cadence" })
        );

        let config = FeedConfig { macd_short: 26, ..base.clone() };
        assert!(matches!(config.validate(), Err(ConfigError::ShortNotBelowLong { .. })));

        let config = FeedConfig { macd_signal: 27, ..base.clone() };
        assert!(matches!(config.validate(), Err(ConfigError::SignalAboveLong { .. })));

        let config = FeedConfig { ring_capacity: 40, ..base.clone() };
        assert_eq!(
            config.validate(),
            Err(ConfigError::WindowExceedsRing {
                indicator: "macd",
                needed: 52,
                capacity: 40
            })
        );

        let config = FeedConfig {
            ring_capacity: 10,
            mfi_period: 10,
            macd_short: 2,
            macd_long: 4,
            macd_signal: 2,
            ..base
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WindowExceedsRing { indicator: "mfi", .. })
        ));
    }
}
