//! Stop and take-profit level computation

use crate::model::VolatilityReading;
use crate::position::{Position, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

/// Stop policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// ATR multiple that sets the stop distance
    #[serde(default = "default_atr_multiplier")]
    pub atr_multiplier: Decimal,

    /// Take-profit distance as a fraction of entry price
    #[serde(default = "default_take_profit_ratio")]
    pub take_profit_ratio: Decimal,

    /// Enable the trailing-stop ratchet
    #[serde(default = "default_true")]
    pub trailing_enabled: bool,

    /// Minimum stop distance as a fraction of the anchor price.
    /// Keeps a flat market (ATR near zero) from placing the stop on top of
    /// the entry.
    #[serde(default = "default_stop_min_distance")]
    pub stop_min_distance: Decimal,

    /// Enable the breakeven lift once a position is in profit
    #[serde(default)]
    pub breakeven_enabled: bool,

    /// Favorable move (fraction of entry) that arms the breakeven lift
    #[serde(default = "default_breakeven_activation")]
    pub breakeven_activation: Decimal,

    /// Buffer past entry (fraction of entry) the breakeven stop locks in
    #[serde(default = "default_breakeven_buffer")]
    pub breakeven_buffer: Decimal,
}

fn default_true() -> bool {
    true
}
fn default_atr_multiplier() -> Decimal {
    dec!(2.0)
}
fn default_take_profit_ratio() -> Decimal {
    dec!(0.05)
}
fn default_stop_min_distance() -> Decimal {
    dec!(0.004)
}
fn default_breakeven_activation() -> Decimal {
    dec!(0.01)
}
fn default_breakeven_buffer() -> Decimal {
    dec!(0.002)
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            atr_multiplier: default_atr_multiplier(),
            take_profit_ratio: default_take_profit_ratio(),
            trailing_enabled: true,
            stop_min_distance: default_stop_min_distance(),
            breakeven_enabled: false,
            breakeven_activation: default_breakeven_activation(),
            breakeven_buffer: default_breakeven_buffer(),
        }
    }
}

/// Protective levels for one position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Levels {
    /// Stop-loss price
    pub stop: Decimal,
    /// Take-profit price
    pub take_profit: Decimal,
}

/// Stop distance from an anchor price: ATR-scaled with a minimum floor
fn stop_distance(anchor: Decimal, vol: &VolatilityReading, config: &PolicyConfig) -> Decimal {
    let atr_distance = config.atr_multiplier * vol.value;
    let floor = anchor * config.stop_min_distance;
    atr_distance.max(floor)
}

/// Compute the current protective levels for a position
///
/// With no stored stop this places the initial levels from the entry price.
/// With a stored stop and trailing enabled, the candidate is recomputed from
/// the high-water mark and the ratchet applied: the returned stop never
/// loosens protection (non-decreasing for longs, non-increasing for shorts).
/// Pure and deterministic; all I/O stays with the caller.
pub fn compute_levels(
    position: &Position,
    vol: &VolatilityReading,
    config: &PolicyConfig,
) -> Levels {
    let entry = position.entry_price;
    let take_profit = match position.side {
        Side::Long => entry * (Decimal::ONE + config.take_profit_ratio),
        Side::Short => entry * (Decimal::ONE - config.take_profit_ratio),
    };

    let stop = match position.current_stop {
        None => {
            let distance = stop_distance(entry, vol, config);
            match position.side {
                Side::Long => entry - distance,
                Side::Short => entry + distance,
            }
        }
        Some(current) if !config.trailing_enabled => current,
        Some(current) => {
            let anchor = position.high_water_mark;
            let distance = stop_distance(anchor, vol, config);
            let mut candidate = match position.side {
                Side::Long => anchor - distance,
                Side::Short => anchor + distance,
            };

            if config.breakeven_enabled {
                let moved = match position.side {
                    Side::Long => (anchor - entry) / entry,
                    Side::Short => (entry - anchor) / entry,
                };
                if moved >= config.breakeven_activation {
                    let breakeven = match position.side {
                        Side::Long => entry * (Decimal::ONE + config.breakeven_buffer),
                        Side::Short => entry * (Decimal::ONE - config.breakeven_buffer),
                    };
                    candidate = match position.side {
                        Side::Long => candidate.max(breakeven),
                        Side::Short => candidate.min(breakeven),
                    };
                }
            }

            // Tightening-only ratchet
            match position.side {
                Side::Long => candidate.max(current),
                Side::Short => candidate.min(current),
            }
        }
    };

    Levels { stop, take_profit }
}
