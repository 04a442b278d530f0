//! Execution coordinator
//!
//! Sits between the state machines and the venue. Deduplicates submissions
//! by idempotency key, retries transient failures under backoff, and
//! guarantees every submitted key resolves to exactly one terminal
//! [`OrderResult`].

use super::backoff::ExponentialBackoff;
use super::{OrderIntent, OrderResult, VenueClient, VenueError};
use crate::position::PositionId;
use crate::telemetry;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};

/// Retry policy for transient venue failures
#[derive(Debug, Clone, Deserialize)]
pub struct RetryPolicy {
    /// Attempts per intent before resolving `TimedOut`
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Initial backoff delay in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Backoff cap in milliseconds
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_max_attempts() -> u32 {
    4
}
fn default_backoff_base_ms() -> u64 {
    250
}
fn default_backoff_max_ms() -> u64 {
    5_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

/// Serializes intent submission against the venue
pub struct ExecutionCoordinator {
    venue: Arc<dyn VenueClient>,
    retry: RetryPolicy,
    /// Keys currently being executed; duplicates subscribe and share the
    /// original outcome instead of hitting the venue again.
    inflight: Mutex<HashMap<String, broadcast::Sender<OrderResult>>>,
    /// Terminal outcomes by key. A resubmitted key returns the recorded
    /// result with no venue-side effect.
    completed: RwLock<HashMap<String, OrderResult>>,
}

impl ExecutionCoordinator {
    /// Create a coordinator over the given venue
    pub fn new(venue: Arc<dyn VenueClient>, retry: RetryPolicy) -> Self {
        Self {
            venue,
            retry,
            inflight: Mutex::new(HashMap::new()),
            completed: RwLock::new(HashMap::new()),
        }
    }

    /// Submit an intent and await its terminal outcome
    pub async fn submit(&self, intent: OrderIntent) -> OrderResult {
        let key = intent.idempotency_key.clone();

        if let Some(result) = self.completed.read().await.get(&key) {
            tracing::debug!(key = %key, "Duplicate intent, returning recorded outcome");
            return result.clone();
        }

        enum Role {
            Leader(broadcast::Sender<OrderResult>),
            Follower(broadcast::Receiver<OrderResult>),
        }

        let role = {
            let mut inflight = self.inflight.lock().await;
            // Re-check under the lock: the leader may have completed between
            // the read above and acquiring this lock.
            if let Some(result) = self.completed.read().await.get(&key) {
                return result.clone();
            }
            match inflight.get(&key) {
                Some(tx) => Role::Follower(tx.subscribe()),
                None => {
                    let (tx, _) = broadcast::channel(1);
                    inflight.insert(key.clone(), tx.clone());
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Follower(mut rx) => {
                tracing::debug!(key = %key, "Joining in-flight submission");
                // Leader always broadcasts after recording the outcome; a
                // recv error would mean it vanished mid-submit.
                rx.recv().await.unwrap_or(OrderResult::TimedOut)
            }
            Role::Leader(tx) => {
                let result = self.execute(&intent).await;
                self.completed
                    .write()
                    .await
                    .insert(key.clone(), result.clone());
                self.inflight.lock().await.remove(&key);
                let _ = tx.send(result.clone());
                result
            }
        }
    }

    /// Drop recorded outcomes for a position that left the registry
    ///
    /// Every idempotency key is namespaced by position id, so eviction is a
    /// prefix sweep. Without it the completed map would grow by one entry
    /// per stop adjustment for the life of the process.
    pub async fn forget_position(&self, position_id: PositionId) {
        let prefix = format!("{position_id}:");
        let mut completed = self.completed.write().await;
        completed.retain(|key, _| !key.starts_with(&prefix));
    }

    /// Drive one intent to a terminal outcome against the venue
    async fn execute(&self, intent: &OrderIntent) -> OrderResult {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(self.retry.backoff_base_ms),
            Duration::from_millis(self.retry.backoff_max_ms),
        );
        telemetry::count_intent_submitted(intent.kind);

        let started = std::time::Instant::now();
        for attempt in 1..=self.retry.max_attempts {
            match self.venue.place(intent).await {
                Ok(ack) => {
                    tracing::info!(
                        position_id = %intent.position_id,
                        kind = %intent.kind,
                        fill_price = %ack.fill_price,
                        attempt,
                        "Intent acknowledged"
                    );
                    telemetry::record_submission_latency(started.elapsed());
                    return OrderResult::Acknowledged {
                        fill_price: ack.fill_price,
                    };
                }
                Err(e @ (VenueError::Timeout | VenueError::RateLimited)) => {
                    tracing::warn!(
                        position_id = %intent.position_id,
                        kind = %intent.kind,
                        attempt,
                        error = %e,
                        "Transient venue failure"
                    );
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(backoff.next_delay()).await;
                    }
                }
                Err(VenueError::Rejected { reason }) => {
                    tracing::warn!(
                        position_id = %intent.position_id,
                        kind = %intent.kind,
                        reason = %reason,
                        "Intent rejected by venue"
                    );
                    telemetry::count_intent_rejected(intent.kind);
                    return OrderResult::Rejected { reason };
                }
            }
        }

        tracing::error!(
            position_id = %intent.position_id,
            kind = %intent.kind,
            attempts = self.retry.max_attempts,
            "Intent unresolved after retry budget"
        );
        OrderResult::TimedOut
    }
}
