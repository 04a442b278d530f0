//! Position lifecycle events
//!
//! Emitted for downstream consumers (notification layer, post-trade review).
//! Strictly one-way: nothing downstream feeds back into live stop or exit
//! decisions.

use crate::position::{Breach, PositionId, Side};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast;

/// A lifecycle event for one position
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Entry fill confirmed, position is live
    Opened {
        position_id: PositionId,
        instrument: String,
        side: Side,
        entry_price: Decimal,
        stop: Option<Decimal>,
        take_profit: Option<Decimal>,
    },
    /// Trailing recomputation tightened the stop
    StopAdjusted {
        position_id: PositionId,
        instrument: String,
        old_stop: Option<Decimal>,
        new_stop: Decimal,
    },
    /// A protective level was breached, close intent emitted
    Exiting {
        position_id: PositionId,
        instrument: String,
        trigger_price: Decimal,
        breach: Breach,
    },
    /// Close fill confirmed, position is done
    Closed {
        position_id: PositionId,
        instrument: String,
        exit_price: Decimal,
    },
    /// Entry confirmation never arrived
    Failed {
        position_id: PositionId,
        instrument: String,
        reason: String,
    },
    /// Operator escalation: exit unconfirmed past the retry budget
    Alert {
        position_id: PositionId,
        instrument: String,
        message: String,
    },
}

impl EngineEvent {
    /// Position the event refers to
    pub fn position_id(&self) -> PositionId {
        match self {
            EngineEvent::Opened { position_id, .. }
            | EngineEvent::StopAdjusted { position_id, .. }
            | EngineEvent::Exiting { position_id, .. }
            | EngineEvent::Closed { position_id, .. }
            | EngineEvent::Failed { position_id, .. }
            | EngineEvent::Alert { position_id, .. } => *position_id,
        }
    }
}

/// Broadcast bus for lifecycle events
///
/// Lossy for lagging consumers; the engine never blocks on a slow listener.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a bus with the given per-subscriber buffer
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current subscribers
    pub fn publish(&self, event: EngineEvent) {
        tracing::debug!(?event, "Lifecycle event");
        // No subscribers is fine; events are advisory
        let _ = self.tx.send(event);
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
