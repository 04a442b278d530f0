//! CSV candle replay feed
//!
//! Replays historical OHLC rows in file order, optionally paced to simulate
//! a live stream. Rows that fail to parse are skipped with a warning rather
//! than aborting the replay.

use super::{PriceFeed, PriceTick};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Replay feed configuration
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Path to the candle CSV file
    pub path: PathBuf,
    /// Instrument symbol attached to every tick
    pub instrument: String,
    /// Delay between ticks; zero replays at full speed
    pub tick_interval: Duration,
}

/// One CSV row: `timestamp,high,low,close`
#[derive(Debug, Deserialize)]
struct CandleRow {
    timestamp: DateTime<Utc>,
    high: Decimal,
    low: Decimal,
    close: Decimal,
}

/// Feed that replays candles from a CSV file
pub struct ReplayFeed {
    config: ReplayConfig,
}

impl ReplayFeed {
    /// Create a replay feed for the given file
    pub fn new(config: ReplayConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PriceFeed for ReplayFeed {
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<PriceTick>> {
        let (tx, rx) = mpsc::channel(64);
        let config = self.config.clone();

        let mut reader = csv::Reader::from_path(&config.path)?;
        let rows: Vec<csv::Result<CandleRow>> = reader.deserialize().collect();
        tracing::info!(path = %config.path.display(), rows = rows.len(), "Replay feed loaded");

        tokio::spawn(async move {
            for row in rows {
                let row = match row {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping malformed candle row");
                        continue;
                    }
                };
                let tick = PriceTick {
                    instrument: config.instrument.clone(),
                    timestamp: row.timestamp,
                    high: row.high,
                    low: row.low,
                    close: row.close,
                };
                if tx.send(tick).await.is_err() {
                    // Receiver dropped, replay is over
                    break;
                }
                if !config.tick_interval.is_zero() {
                    tokio::time::sleep(config.tick_interval).await;
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn write_fixture(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_replay_emits_all_rows() {
        let file = write_fixture(
            "timestamp,high,low,close\n\
             2024-01-01T00:00:00Z,101,99,100\n\
             2024-01-01T00:01:00Z,103,100,102\n",
        );
        let feed = ReplayFeed::new(ReplayConfig {
            path: file.path().to_path_buf(),
            instrument: "BTC-USDT-SWAP".to_string(),
            tick_interval: Duration::ZERO,
        });

        let mut rx = feed.subscribe().await.unwrap();
        let first = rx.recv().await.unwrap();
        assert_eq!(first.instrument, "BTC-USDT-SWAP");
        assert_eq!(first.close, dec!(100));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.high, dec!(103));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_replay_skips_bad_rows() {
        let file = write_fixture(
            "timestamp,high,low,close\n\
             2024-01-01T00:00:00Z,101,99,100\n\
             not-a-timestamp,1,2,3\n\
             2024-01-01T00:02:00Z,105,101,104\n",
        );
        let feed = ReplayFeed::new(ReplayConfig {
            path: file.path().to_path_buf(),
            instrument: "ETH-USDT-SWAP".to_string(),
            tick_interval: Duration::ZERO,
        });

        let mut rx = feed.subscribe().await.unwrap();
        assert_eq!(rx.recv().await.unwrap().close, dec!(100));
        assert_eq!(rx.recv().await.unwrap().close, dec!(104));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_replay_missing_file() {
        let feed = ReplayFeed::new(ReplayConfig {
            path: PathBuf::from("/nonexistent/candles.csv"),
            instrument: "BTC-USDT-SWAP".to_string(),
            tick_interval: Duration::ZERO,
        });
        assert!(feed.subscribe().await.is_err());
    }
}
