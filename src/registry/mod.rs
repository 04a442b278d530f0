//! Position registry
//!
//! The single shared mutable collection in the engine: a concurrency-safe
//! map from position id to the mailbox of the task that owns it. Tick
//! dispatch operates over a snapshot of live entries, so a pass never
//! observes a half-inserted or half-removed position.

use crate::execution::OrderResult;
use crate::feed::PriceTick;
use crate::position::PositionId;
use crate::telemetry;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};

/// Messages delivered to a position task's mailbox
///
/// One task consumes one mailbox, which keeps that position's transitions
/// strictly sequential even though submission outcomes arrive from spawned
/// tasks.
#[derive(Debug)]
pub enum PositionMsg {
    /// A price tick for the position's instrument
    Tick(PriceTick),
    /// Outcome of the entry intent
    EntryResult(OrderResult),
    /// Outcome of a close intent
    CloseResult(OrderResult),
}

/// Registry entry for one live position
#[derive(Debug, Clone)]
pub struct PositionHandle {
    /// Instrument the position trades
    pub instrument: String,
    /// Mailbox of the owning task
    pub tx: mpsc::UnboundedSender<PositionMsg>,
}

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// `max_open_positions` would be violated; the entry is refused, not queued
    #[error("Registry full: {max} open positions")]
    CapacityExceeded { max: usize },
}

/// Concurrency-safe collection of all live positions
pub struct PositionRegistry {
    positions: RwLock<HashMap<PositionId, PositionHandle>>,
    max_open: usize,
}

impl PositionRegistry {
    /// Create a registry capped at `max_open` positions
    pub fn new(max_open: usize) -> Self {
        Self {
            positions: RwLock::new(HashMap::new()),
            max_open,
        }
    }

    /// Register a position, refusing beyond capacity
    pub async fn add(
        &self,
        id: PositionId,
        handle: PositionHandle,
    ) -> Result<(), RegistryError> {
        let mut positions = self.positions.write().await;
        if positions.len() >= self.max_open {
            return Err(RegistryError::CapacityExceeded { max: self.max_open });
        }
        positions.insert(id, handle);
        telemetry::gauge_open_positions(positions.len());
        Ok(())
    }

    /// Deregister a position; returns whether it was present
    pub async fn remove(&self, id: PositionId) -> bool {
        let mut positions = self.positions.write().await;
        let removed = positions.remove(&id).is_some();
        telemetry::gauge_open_positions(positions.len());
        removed
    }

    /// Whether a position is currently registered
    pub async fn contains(&self, id: PositionId) -> bool {
        self.positions.read().await.contains_key(&id)
    }

    /// Number of live positions
    pub async fn len(&self) -> usize {
        self.positions.read().await.len()
    }

    /// Whether the registry is empty
    pub async fn is_empty(&self) -> bool {
        self.positions.read().await.is_empty()
    }

    /// Deliver a tick to every live position on the tick's instrument
    ///
    /// The pass snapshots the matching mailboxes under the read lock and
    /// sends after releasing it: every position live at snapshot time sees
    /// the tick exactly once, and a position added mid-pass first sees the
    /// next tick. Sends to tasks that already terminated are dropped.
    pub async fn dispatch(&self, tick: &PriceTick) -> usize {
        let targets: Vec<(PositionId, mpsc::UnboundedSender<PositionMsg>)> = {
            let positions = self.positions.read().await;
            positions
                .iter()
                .filter(|(_, h)| h.instrument == tick.instrument)
                .map(|(id, h)| (*id, h.tx.clone()))
                .collect()
        };

        let mut delivered = 0;
        for (id, tx) in targets {
            if tx.send(PositionMsg::Tick(tick.clone())).is_ok() {
                delivered += 1;
            } else {
                tracing::debug!(position_id = %id, "Dropping tick for terminated position task");
            }
        }
        delivered
    }
}
