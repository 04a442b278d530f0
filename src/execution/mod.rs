//! Execution module
//!
//! Order-intent submission against the trading venue: idempotent
//! coordination, retry with backoff, and the paper venue used for tests and
//! offline runs.

mod backoff;
mod coordinator;
mod paper;
mod types;

pub use backoff::ExponentialBackoff;
pub use coordinator::{ExecutionCoordinator, RetryPolicy};
pub use paper::PaperVenue;
pub use types::{IntentKind, OrderIntent, OrderResult, VenueAck, VenueError};

use async_trait::async_trait;

/// Trait for venue bindings
///
/// One call per attempt; the coordinator owns retries and idempotency. The
/// underlying venue API may be callback-, polling-, or event-based as long
/// as the binding resolves each call to an ack or an error.
#[async_trait]
pub trait VenueClient: Send + Sync {
    /// Place one order attempt at the venue
    async fn place(&self, intent: &OrderIntent) -> Result<VenueAck, VenueError>;
}
