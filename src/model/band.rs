//! Volatility banding
//!
//! Classifies an instrument by ATR as a percentage of price. Wilder bands
//! separate majors in quiet regimes from small caps and meme coins, and each
//! band caps the leverage the engine will accept at open.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Volatility regime band for one instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityBand {
    /// ATR < 1.5% of price (majors in quiet markets)
    UltraStable,
    /// ATR < 3%
    Stable,
    /// ATR < 5% (most altcoins)
    Normal,
    /// ATR < 8% (small caps)
    Volatile,
    /// ATR >= 8% (meme coins, illiquid listings)
    Extreme,
}

impl VolatilityBand {
    /// Classify from ATR and current price
    pub fn classify(atr: Decimal, price: Decimal) -> Self {
        if price <= Decimal::ZERO {
            return VolatilityBand::Extreme;
        }
        let atr_pct = atr / price * dec!(100);
        if atr_pct < dec!(1.5) {
            VolatilityBand::UltraStable
        } else if atr_pct < dec!(3.0) {
            VolatilityBand::Stable
        } else if atr_pct < dec!(5.0) {
            VolatilityBand::Normal
        } else if atr_pct < dec!(8.0) {
            VolatilityBand::Volatile
        } else {
            VolatilityBand::Extreme
        }
    }

    /// Maximum leverage the engine accepts in this band
    pub fn max_leverage(&self) -> u32 {
        match self {
            VolatilityBand::UltraStable => 10,
            VolatilityBand::Stable => 8,
            VolatilityBand::Normal => 5,
            VolatilityBand::Volatile => 3,
            VolatilityBand::Extreme => 2,
        }
    }
}
