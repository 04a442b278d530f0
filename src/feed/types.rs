//! Price feed types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single OHLC price tick for one instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTick {
    /// Instrument symbol (e.g. "BTC-USDT-SWAP")
    pub instrument: String,
    /// Tick timestamp
    pub timestamp: DateTime<Utc>,
    /// Interval high
    pub high: Decimal,
    /// Interval low
    pub low: Decimal,
    /// Interval close (the mark price used for level checks)
    pub close: Decimal,
}

impl PriceTick {
    /// True range against the previous close
    pub fn true_range(&self, prev_close: Decimal) -> Decimal {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tick(high: Decimal, low: Decimal, close: Decimal) -> PriceTick {
        PriceTick {
            instrument: "BTC-USDT-SWAP".to_string(),
            timestamp: Utc::now(),
            high,
            low,
            close,
        }
    }

    #[test]
    fn test_true_range_plain_range() {
        // Prior close inside the bar: TR is just high-low
        let t = tick(dec!(102), dec!(98), dec!(100));
        assert_eq!(t.true_range(dec!(100)), dec!(4));
    }

    #[test]
    fn test_true_range_gap_up() {
        // Prior close far below the bar: TR measured from prior close
        let t = tick(dec!(110), dec!(108), dec!(109));
        assert_eq!(t.true_range(dec!(100)), dec!(10));
    }

    #[test]
    fn test_true_range_gap_down() {
        let t = tick(dec!(92), dec!(90), dec!(91));
        assert_eq!(t.true_range(dec!(100)), dec!(10));
    }
}
