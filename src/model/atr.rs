//! Average true range estimation
//!
//! Wilder-smoothed true range over a rolling window of OHLC samples

use super::ModelError;
use crate::feed::PriceTick;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A derived volatility measurement
///
/// Never persisted authoritatively; always recomputable from price history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityReading {
    /// Timestamp of the newest sample used
    pub timestamp: DateTime<Utc>,
    /// ATR value, non-negative, in price units
    pub value: Decimal,
    /// Number of samples the estimate actually covered
    pub window: usize,
}

/// Estimate ATR over the trailing `window` samples of `history`
///
/// `history` must be ordered oldest-first. A history shorter than `window`
/// degrades to the available samples rather than failing; only an empty
/// history is an error. The first sample's true range is its high-low span
/// (no prior close to gap against), later samples use the full
/// `max(high-low, |high-prev_close|, |low-prev_close|)` definition, smoothed
/// with Wilder's recurrence.
pub fn estimate(history: &[PriceTick], window: usize) -> Result<VolatilityReading, ModelError> {
    let newest = history.last().ok_or(ModelError::InsufficientData)?;
    let window = window.max(1);

    // One extra sample so the oldest TR in the window has a prior close.
    let start = history.len().saturating_sub(window + 1);
    let slice = &history[start..];

    let mut prev_close: Option<Decimal> = None;
    let mut atr: Option<Decimal> = None;
    let mut used = 0usize;
    let smoothing = Decimal::from(window as u64);

    for tick in slice {
        let tr = match prev_close {
            Some(pc) => tick.true_range(pc),
            None => {
                prev_close = Some(tick.close);
                // Lone sample: its range is the only estimate we have
                if slice.len() == 1 {
                    atr = Some(tick.high - tick.low);
                    used = 1;
                }
                continue;
            }
        };
        prev_close = Some(tick.close);
        used += 1;
        atr = Some(match atr {
            None => tr,
            Some(prev) => (prev * (smoothing - Decimal::ONE) + tr) / smoothing,
        });
    }

    // TR is non-negative by construction, but a malformed bar (high < low)
    // must not produce a negative reading.
    let value = atr.unwrap_or(Decimal::ZERO).max(Decimal::ZERO);

    Ok(VolatilityReading {
        timestamp: newest.timestamp,
        value,
        window: used,
    })
}
