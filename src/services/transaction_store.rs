//! Transaction record store
//!
//! Keyed storage with insert-if-absent and compare-and-swap on `last_updated`.
//! Records are sharded in a `DashMap`, so a write only locks the shard holding
//! its id and unrelated transactions never wait on each other.
//!
//! The store starts empty and is only filled through `put`; nothing resets it.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;

use crate::models::transaction::Transaction;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("transaction {0} not found")]
    NotFound(String),
    /// Carries the record already stored under the id
    #[error("transaction {} already exists", .0.id)]
    AlreadyExists(Box<Transaction>),
    /// Stored `last_updated` no longer matches the caller's expectation
    #[error("transaction {id} was modified concurrently (expected {expected}, found {actual})")]
    Conflict {
        id: String,
        expected: DateTime<Utc>,
        actual: DateTime<Utc>,
    },
}

pub trait TransactionStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Transaction, StoreError>;

    /// Insert if absent
    fn put(&self, tx: Transaction) -> Result<Transaction, StoreError>;

    /// Replace the record only if its `last_updated` still equals `expected_last_updated`
    fn compare_and_swap(
        &self,
        id: &str,
        expected_last_updated: DateTime<Utc>,
        new_record: Transaction,
    ) -> Result<Transaction, StoreError>;

    /// All records for a player, ascending `start_time`, ties broken by `id`
    fn list_by_player(&self, player_id: &str) -> Vec<Transaction>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process store backing the service
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    records: DashMap<String, Transaction>,
    /// player_id -> (start_time, id); both are immutable so entries never move
    by_player: DashMap<String, BTreeSet<(DateTime<Utc>, String)>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionStore for InMemoryTransactionStore {
    fn get(&self, id: &str) -> Result<Transaction, StoreError> {
        self.records
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn put(&self, tx: Transaction) -> Result<Transaction, StoreError> {
        match self.records.entry(tx.id.clone()) {
            Entry::Occupied(existing) => {
                Err(StoreError::AlreadyExists(Box::new(existing.get().clone())))
            }
            Entry::Vacant(slot) => {
                let key = (tx.start_time, tx.id.clone());
                let player_id = tx.player_id.clone();
                slot.insert(tx.clone());
                // record shard lock is released before touching the index
                self.by_player.entry(player_id).or_default().insert(key);
                Ok(tx)
            }
        }
    }

    fn compare_and_swap(
        &self,
        id: &str,
        expected_last_updated: DateTime<Utc>,
        new_record: Transaction,
    ) -> Result<Transaction, StoreError> {
        debug_assert_eq!(id, new_record.id);
        let mut entry = self
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if entry.last_updated != expected_last_updated {
            return Err(StoreError::Conflict {
                id: id.to_string(),
                expected: expected_last_updated,
                actual: entry.last_updated,
            });
        }

        *entry = new_record.clone();
        Ok(new_record)
    }

    fn list_by_player(&self, player_id: &str) -> Vec<Transaction> {
        let keys: Vec<String> = match self.by_player.get(player_id) {
            Some(index) => index.iter().map(|(_, id)| id.clone()).collect(),
            None => return Vec::new(),
        };

        // records are inserted before their index entry
        keys.iter()
            .filter_map(|id| self.records.get(id).map(|entry| entry.value().clone()))
            .collect()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
