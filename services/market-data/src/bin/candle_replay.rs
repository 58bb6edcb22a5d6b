//! Replays a candle file through a fresh chart and prints the candles with
//! recomputed indicators.
//!
//! Usage: `candle-replay <candles.txt> [feed-config.json]`

use anyhow::{bail, Context};
use market_data::candles::{Candle, CandleChart};
use market_data::config::FeedConfig;
use market_data::indicators::IndicatorEngine;
use market_data::sink::CandleRecord;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let Some(candles_path) = args.next() else {
        bail!("usage: candle-replay <candles.txt> [feed-config.json]");
    };

    let config = match args.next() {
        Some(path) => {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading config {}", path))?;
            FeedConfig::from_json_str(&raw).with_context(|| format!("loading config {}", path))?
        }
        None => FeedConfig::default(),
    };

    let raw = tokio::fs::read_to_string(&candles_path)
        .await
        .with_context(|| format!("reading candles {}", candles_path))?;

    let engine = IndicatorEngine::new(config.indicator_config());
    let mut chart = CandleChart::new(config.ring_capacity);
    let mut changed = 0usize;
    let mut replayed = 0usize;

    for (number, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let recorded =
            CandleRecord::from_line(line).with_context(|| format!("{}:{}", candles_path, number + 1))?;

        chart.add_candle(Candle {
            time: recorded.time.saturating_mul(1_000_000_000),
            open: recorded.open,
            high: recorded.high,
            low: recorded.low,
            close: recorded.close,
            volume: recorded.volume,
            ..Default::default()
        });
        let recomputed = CandleRecord::from_candle(&chart.complete_current_candle(&engine));

        if recomputed.to_line() != line.trim() {
            changed += 1;
        }
        replayed += 1;
        println!("{}", recomputed.to_line());
    }

    tracing::info!(
        file = %candles_path,
        candles = replayed,
        changed,
        "Replay finished"
    );
    Ok(())
}
