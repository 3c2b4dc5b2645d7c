//! Event types for the CDP event system
//!
//! Provides the shared `CdpEvent` enum and a broadcast `EventBus`. Events are
//! emitted in-process by the ingestion/apply layer and mirrored durably into
//! the campaign_events table (see `db::events`).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use crate::types::ProductType;

/// CDP event types
///
/// Events are broadcast via EventBus; every variant carries enough context
/// to be consumed without a database read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CdpEvent {
    /// A new offer was written as Active
    OfferCreated {
        customer_id: Uuid,
        offer_id: Uuid,
        product_type: ProductType,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An active offer was expired by a higher-priority arrival
    OfferExpired {
        offer_id: Uuid,
        superseded_by: ProductType,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An incoming offer was recorded as a Duplicate of a kept offer
    OfferDuplicate {
        offer_id: Uuid,
        kept_offer_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An incoming offer was rejected outright (nothing written)
    OfferRejected {
        customer_id: Uuid,
        product_type: ProductType,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An Enrich record refreshed an existing active offer in place
    EnrichApplied {
        offer_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Supplied identifiers matched more than one existing customer
    IdentifierConflict {
        winner: Uuid,
        losers: Vec<Uuid>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A journey-started callback flipped an offer's journey flag
    JourneyStarted {
        offer_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A batch ingestion run finished
    BatchCompleted {
        source: String,
        total: usize,
        success: usize,
        errors: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Broadcast bus for CdpEvent
///
/// Thin wrapper over a tokio broadcast channel. Having no subscribers is
/// normal (batch runs), so emit never fails.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CdpEvent>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers, returning the subscriber count
    pub fn emit(&self, event: CdpEvent) -> usize {
        match self.tx.send(event) {
            Ok(count) => count,
            Err(_) => {
                trace!("Event emitted with no subscribers");
                0
            }
        }
    }
}
