//! Run command implementation

use crate::config::{Config, ExecutionMode};
use crate::engine::{Engine, OpenRequest};
use crate::execution::PaperVenue;
use crate::feed::{PriceFeed, ReplayConfig, ReplayFeed};
use crate::position::Side;
use anyhow::Context;
use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Candle CSV to replay; overrides feed.data_path
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Instrument symbol; overrides feed.instrument
    #[arg(short, long)]
    pub instrument: Option<String>,

    /// Position direction
    #[arg(long, default_value = "long")]
    pub side: Side,

    /// Size in contracts
    #[arg(long, default_value_t = dec!(1))]
    pub size: Decimal,

    /// Requested leverage, clamped to the volatility band
    #[arg(long, default_value_t = 3)]
    pub leverage: u32,
}

impl RunArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        if config.execution.mode == ExecutionMode::Live {
            anyhow::bail!("replay runs are paper-only: set execution.mode = \"paper\"");
        }

        let path = self
            .data
            .clone()
            .or_else(|| config.feed.data_path.clone())
            .context("no candle file: pass --data or set feed.data_path")?;
        let instrument = self
            .instrument
            .clone()
            .unwrap_or_else(|| config.feed.instrument.clone());

        let feed = ReplayFeed::new(ReplayConfig {
            path,
            instrument: instrument.clone(),
            tick_interval: Duration::from_millis(config.feed.tick_interval_ms),
        });
        let mut ticks = feed.subscribe().await?;

        let first = ticks
            .recv()
            .await
            .context("candle file produced no ticks")?;
        tracing::info!(%instrument, entry = %first.close, "Replay stream opened");

        let engine = Engine::new(&config, Arc::new(PaperVenue::new()));

        let mut events = engine.events().subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                tracing::info!(?event, "Lifecycle event");
            }
        });

        let position_id = engine
            .open_position(OpenRequest {
                instrument,
                side: self.side,
                target_price: first.close,
                size: self.size,
                leverage: self.leverage,
                atr: None,
            })
            .await?;
        tracing::info!(%position_id, "Position submitted");

        engine.run(ticks).await;

        let open = engine.registry().len().await;
        tracing::info!(open, "Replay finished");
        Ok(())
    }
}
