//! Position types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Position identifier
pub type PositionId = Uuid;

/// Direction of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "long" => Ok(Side::Long),
            "short" => Ok(Side::Short),
            other => Err(format!("unknown side: {other}")),
        }
    }
}

/// Lifecycle state of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    /// Entry intent submitted, fill not yet confirmed
    Opening,
    /// Live position, levels recomputed on every tick
    Monitoring,
    /// Breach detected, close intent in flight or exhausted
    Exiting,
    /// Terminal: close fill confirmed
    Closed,
    /// Terminal: entry confirmation never arrived
    FailedOpen,
}

impl PositionState {
    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, PositionState::Closed | PositionState::FailedOpen)
    }
}

/// An open trading position
///
/// Owned exclusively by one state-machine task; all mutation goes through
/// that machine's transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Position identifier
    pub id: PositionId,
    /// Instrument symbol
    pub instrument: String,
    /// Position direction
    pub side: Side,
    /// Entry price (the fill price once confirmed)
    pub entry_price: Decimal,
    /// Position size in contracts
    pub size: Decimal,
    /// Leverage multiplier
    pub leverage: u32,
    /// Entry timestamp
    pub opened_at: DateTime<Utc>,
    /// Current stop-loss level; tightening-only once trailing is active
    pub current_stop: Option<Decimal>,
    /// Current take-profit level
    pub current_take_profit: Option<Decimal>,
    /// Most favorable price since entry (highest for long, lowest for short)
    pub high_water_mark: Decimal,
    /// Lifecycle state
    pub state: PositionState,
}

impl Position {
    /// Create a position awaiting entry confirmation
    pub fn opening(
        instrument: impl Into<String>,
        side: Side,
        target_price: Decimal,
        size: Decimal,
        leverage: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            instrument: instrument.into(),
            side,
            entry_price: target_price,
            size,
            leverage,
            opened_at: Utc::now(),
            current_stop: None,
            current_take_profit: None,
            high_water_mark: target_price,
            state: PositionState::Opening,
        }
    }

    /// Update the high-water mark if `price` is more favorable
    pub fn observe(&mut self, price: Decimal) {
        self.high_water_mark = match self.side {
            Side::Long => self.high_water_mark.max(price),
            Side::Short => self.high_water_mark.min(price),
        };
    }

    /// Side-aware breach check against the stored levels
    ///
    /// Returns `None` while levels are uninitialized.
    pub fn breached(&self, price: Decimal) -> Option<Breach> {
        let stop = self.current_stop?;
        let take_profit = self.current_take_profit?;
        match self.side {
            Side::Long if price <= stop => Some(Breach::Stop),
            Side::Long if price >= take_profit => Some(Breach::TakeProfit),
            Side::Short if price >= stop => Some(Breach::Stop),
            Side::Short if price <= take_profit => Some(Breach::TakeProfit),
            _ => None,
        }
    }
}

/// Which protective level a price crossed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Breach {
    Stop,
    TakeProfit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_opening_position() {
        let pos = Position::opening("BTC-USDT-SWAP", Side::Long, dec!(100), dec!(2), 5);
        assert_eq!(pos.state, PositionState::Opening);
        assert!(pos.current_stop.is_none());
        assert_eq!(pos.high_water_mark, dec!(100));
    }

    #[test]
    fn test_observe_long_ratchets_up() {
        let mut pos = Position::opening("BTC-USDT-SWAP", Side::Long, dec!(100), dec!(1), 3);
        pos.observe(dec!(103));
        assert_eq!(pos.high_water_mark, dec!(103));
        pos.observe(dec!(101));
        assert_eq!(pos.high_water_mark, dec!(103));
    }

    #[test]
    fn test_observe_short_ratchets_down() {
        let mut pos = Position::opening("BTC-USDT-SWAP", Side::Short, dec!(100), dec!(1), 3);
        pos.observe(dec!(96));
        assert_eq!(pos.high_water_mark, dec!(96));
        pos.observe(dec!(99));
        assert_eq!(pos.high_water_mark, dec!(96));
    }

    #[test]
    fn test_breach_long() {
        let mut pos = Position::opening("BTC-USDT-SWAP", Side::Long, dec!(100), dec!(1), 3);
        assert!(pos.breached(dec!(90)).is_none()); // levels not set yet

        pos.current_stop = Some(dec!(97));
        pos.current_take_profit = Some(dec!(105));
        assert!(pos.breached(dec!(100)).is_none());
        assert_eq!(pos.breached(dec!(97)), Some(Breach::Stop));
        assert_eq!(pos.breached(dec!(96)), Some(Breach::Stop));
        assert_eq!(pos.breached(dec!(105)), Some(Breach::TakeProfit));
    }

    #[test]
    fn test_breach_short() {
        let mut pos = Position::opening("BTC-USDT-SWAP", Side::Short, dec!(100), dec!(1), 3);
        pos.current_stop = Some(dec!(103));
        pos.current_take_profit = Some(dec!(95));
        assert!(pos.breached(dec!(100)).is_none());
        assert_eq!(pos.breached(dec!(103)), Some(Breach::Stop));
        assert_eq!(pos.breached(dec!(94)), Some(Breach::TakeProfit));
    }

    #[test]
    fn test_terminal_states() {
        assert!(PositionState::Closed.is_terminal());
        assert!(PositionState::FailedOpen.is_terminal());
        assert!(!PositionState::Exiting.is_terminal());
        assert!(!PositionState::Monitoring.is_terminal());
        assert!(!PositionState::Opening.is_terminal());
    }

    #[test]
    fn test_side_display() {
        assert_eq!(Side::Long.to_string(), "long");
        assert_eq!(Side::Short.to_string(), "short");
        assert_eq!("short".parse::<Side>(), Ok(Side::Short));
        assert!("sideways".parse::<Side>().is_err());
    }
}
