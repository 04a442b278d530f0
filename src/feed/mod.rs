//! Price feed module
//!
//! The engine consumes ticks from any source implementing [`PriceFeed`].
//! Live transport is out of scope here; the provided implementation replays
//! historical candles from CSV.

mod replay;
mod types;

pub use replay::{ReplayConfig, ReplayFeed};
pub use types::PriceTick;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Trait for price feed implementations
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Subscribe to price updates
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<PriceTick>>;
}
