//! Paper venue
//!
//! Acknowledges every intent at its trigger price and records it, so the
//! engine can run end to end without a live venue binding.

use super::{OrderIntent, VenueAck, VenueClient, VenueError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Venue that fills everything instantly at the requested price
#[derive(Default)]
pub struct PaperVenue {
    placed: Arc<RwLock<Vec<OrderIntent>>>,
}

impl PaperVenue {
    /// Create an empty paper venue
    pub fn new() -> Self {
        Self::default()
    }

    /// All intents placed so far, in order
    pub async fn placed(&self) -> Vec<OrderIntent> {
        self.placed.read().await.clone()
    }
}

#[async_trait]
impl VenueClient for PaperVenue {
    async fn place(&self, intent: &OrderIntent) -> Result<VenueAck, VenueError> {
        self.placed.write().await.push(intent.clone());
        tracing::info!(
            position_id = %intent.position_id,
            kind = %intent.kind,
            price = %intent.trigger_price,
            "Paper fill"
        );
        Ok(VenueAck {
            fill_price: intent.trigger_price,
        })
    }
}
