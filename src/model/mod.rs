//! Volatility model module
//!
//! ATR estimation from OHLC history and volatility banding for leverage caps

mod atr;
mod band;

pub use atr::{estimate, VolatilityReading};
pub use band::VolatilityBand;

use thiserror::Error;

/// Volatility model errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// No price history available at all
    #[error("Insufficient data: price history is empty")]
    InsufficientData,
}
