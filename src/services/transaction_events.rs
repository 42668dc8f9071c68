//! Broadcast of accepted transaction mutations
//!
//! Fire-and-forget: sending never fails a mutation, with or without subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::status::{TransactionStatus, TransactionType};
use crate::models::transaction::Transaction;

/// Event sent for every accepted create or update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub id: String,
    pub player_id: String,
    #[serde(rename = "transaction_type")]
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    /// None for creates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<TransactionStatus>,
    pub retry_count: u32,
    pub last_updated: DateTime<Utc>,
}

impl TransactionEvent {
    pub fn new(tx: &Transaction, previous_status: Option<TransactionStatus>) -> Self {
        Self {
            id: tx.id.clone(),
            player_id: tx.player_id.clone(),
            tx_type: tx.tx_type(),
            status: tx.status,
            previous_status,
            retry_count: tx.retry_count,
            last_updated: tx.last_updated,
        }
    }
}

#[derive(Clone)]
pub struct TransactionEventBroadcaster {
    tx: broadcast::Sender<TransactionEvent>,
}

impl TransactionEventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn broadcast(&self, event: TransactionEvent) {
        // Ignore errors if no subscribers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransactionEvent> {
        self.tx.subscribe()
    }
}
