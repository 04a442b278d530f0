//! Execution types

use crate::position::{PositionId, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What an intent asks the venue to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Open the position at the target price
    Open,
    /// Move the protective stop order
    AdjustStop,
    /// Flatten the position
    Close,
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntentKind::Open => write!(f, "open"),
            IntentKind::AdjustStop => write!(f, "adjust_stop"),
            IntentKind::Close => write!(f, "close"),
        }
    }
}

/// An internally generated order request
///
/// Transient: produced by a state machine, consumed by the coordinator,
/// discarded after a terminal outcome. Distinct from whatever order object
/// the venue layer actually builds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIntent {
    /// Position this intent belongs to
    pub position_id: PositionId,
    /// Intent kind
    pub kind: IntentKind,
    /// Instrument symbol
    pub instrument: String,
    /// Position direction
    pub side: Side,
    /// Size in contracts
    pub size: Decimal,
    /// Target or trigger price
    pub trigger_price: Decimal,
    /// Stable key: a retried submission has at most one venue-side effect
    pub idempotency_key: String,
}

impl OrderIntent {
    /// Build an intent with a key derived from position, kind and sequence
    ///
    /// The sequence distinguishes genuine re-attempts (each close retry is a
    /// new attempt) while transport-level retries of the same attempt reuse
    /// the key.
    pub fn new(
        position_id: PositionId,
        kind: IntentKind,
        instrument: impl Into<String>,
        side: Side,
        size: Decimal,
        trigger_price: Decimal,
        seq: u32,
    ) -> Self {
        Self {
            position_id,
            kind,
            instrument: instrument.into(),
            side,
            size,
            trigger_price,
            idempotency_key: format!("{position_id}:{kind}:{seq}"),
        }
    }
}

/// Terminal outcome of a submitted intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum OrderResult {
    /// Venue confirmed the order
    Acknowledged { fill_price: Decimal },
    /// Venue refused the order; not retryable
    Rejected { reason: String },
    /// No confirmation within the attempt budget
    TimedOut,
}

/// Acknowledgment payload from the venue
#[derive(Debug, Clone)]
pub struct VenueAck {
    /// Price the venue filled or accepted at
    pub fill_price: Decimal,
}

/// Errors from a venue call
#[derive(Debug, Clone, Error)]
pub enum VenueError {
    /// Terminal rejection (insufficient margin, invalid instrument, ...)
    #[error("Venue rejected order: {reason}")]
    Rejected { reason: String },
    /// Transient: no response in time
    #[error("Venue call timed out")]
    Timeout,
    /// Transient: throttled by the venue
    #[error("Venue rate limit hit")]
    RateLimited,
}

impl VenueError {
    /// Transient errors are retried under backoff; terminal ones are not
    pub fn is_transient(&self) -> bool {
        matches!(self, VenueError::Timeout | VenueError::RateLimited)
    }
}
