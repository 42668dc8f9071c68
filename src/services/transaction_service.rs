//! Transaction service
//!
//! Orchestrates create, partial update and listing over the record store.
//! Each update is read → validate → compare-and-swap; a lost race re-reads and
//! tries again a fixed number of times before the conflict is surfaced.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::models::status::TransactionStatus;
use crate::models::transaction::{
    CreateTransactionRequest, Transaction, TransactionPage, UpdateTransactionRequest,
};
use crate::services::clock::{Clock, SystemClock};
use crate::services::pagination::{self, TransactionFilter};
use crate::services::transaction_events::{TransactionEvent, TransactionEventBroadcaster};
use crate::services::transaction_store::{InMemoryTransactionStore, StoreError, TransactionStore};
use crate::services::validation::{self, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Create reused an id with a different payload
    DuplicateId,
    /// Another writer won every compare-and-swap attempt
    ConcurrentModification,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::DuplicateId => write!(f, "id already used by a different transaction"),
            ConflictKind::ConcurrentModification => write!(f, "modified concurrently, re-read and retry"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("transaction {id} not found")]
    NotFound { id: String },
    #[error("transaction {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: TransactionStatus,
        to: TransactionStatus,
    },
    #[error("transaction {id} is {status} and cannot be modified")]
    TerminalState {
        id: String,
        status: TransactionStatus,
        attempted: Option<TransactionStatus>,
    },
    #[error("transaction {id} conflict: {kind}")]
    Conflict { id: String, kind: ConflictKind },
    #[error("transaction {id} already retried {retry_count} of {max_retries} times")]
    RetryLimitExceeded {
        id: String,
        retry_count: u32,
        max_retries: u32,
    },
}

impl TransactionError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            TransactionError::Validation(_) => "validation_error",
            TransactionError::NotFound { .. } => "not_found",
            TransactionError::InvalidTransition { .. } => "invalid_transition",
            TransactionError::TerminalState { .. } => "terminal_state",
            TransactionError::Conflict { .. } => "conflict",
            TransactionError::RetryLimitExceeded { .. } => "retry_limit_exceeded",
        }
    }

    pub fn current_status(&self) -> Option<TransactionStatus> {
        match self {
            TransactionError::InvalidTransition { from, .. } => Some(*from),
            TransactionError::TerminalState { status, .. } => Some(*status),
            TransactionError::RetryLimitExceeded { .. } => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    pub fn attempted_status(&self) -> Option<TransactionStatus> {
        match self {
            TransactionError::InvalidTransition { to, .. } => Some(*to),
            TransactionError::TerminalState { attempted, .. } => *attempted,
            _ => None,
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            TransactionError::Validation(e) => e.field(),
            TransactionError::InvalidTransition { .. } | TransactionError::TerminalState { .. } => {
                Some("status")
            }
            TransactionError::RetryLimitExceeded { .. } => Some("retry_count"),
            _ => None,
        }
    }
}

impl From<StoreError> for TransactionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => TransactionError::NotFound { id },
            StoreError::AlreadyExists(existing) => TransactionError::Conflict {
                id: existing.id,
                kind: ConflictKind::DuplicateId,
            },
            StoreError::Conflict { id, .. } => TransactionError::Conflict {
                id,
                kind: ConflictKind::ConcurrentModification,
            },
        }
    }
}

/// Result of a create call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(Transaction),
    /// Identical resubmission; the stored record is returned untouched
    Existing(Transaction),
}

impl CreateOutcome {
    pub fn transaction(&self) -> &Transaction {
        match self {
            CreateOutcome::Created(tx) | CreateOutcome::Existing(tx) => tx,
        }
    }

    pub fn into_transaction(self) -> Transaction {
        match self {
            CreateOutcome::Created(tx) | CreateOutcome::Existing(tx) => tx,
        }
    }
}

#[derive(Clone)]
pub struct TransactionService {
    store: Arc<dyn TransactionStore>,
    clock: Arc<dyn Clock>,
    events: TransactionEventBroadcaster,
    config: ServiceConfig,
}

impl TransactionService {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        clock: Arc<dyn Clock>,
        config: ServiceConfig,
    ) -> Self {
        let config = config.normalized();
        info!(
            max_retries = config.max_retries,
            cas_attempts = config.cas_attempts,
            "Initializing TransactionService"
        );
        Self {
            store,
            clock,
            events: TransactionEventBroadcaster::new(config.event_capacity),
            config,
        }
    }

    /// Empty in-memory store on the wall clock
    pub fn in_memory(config: ServiceConfig) -> Self {
        Self::new(
            Arc::new(InMemoryTransactionStore::new()),
            Arc::new(SystemClock),
            config,
        )
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransactionEvent> {
        self.events.subscribe()
    }

    pub fn count(&self) -> usize {
        self.store.len()
    }

    /// Create a transaction, or return the stored one for an identical resubmission
    pub fn create(&self, input: CreateTransactionRequest) -> Result<CreateOutcome, TransactionError> {
        let candidate = validation::validate_create(&input, self.clock.now())?;

        match self.store.put(candidate.clone()) {
            Ok(stored) => {
                info!(
                    id = %stored.id,
                    player_id = %stored.player_id,
                    tx_type = %stored.tx_type(),
                    "Transaction created"
                );
                self.events.broadcast(TransactionEvent::new(&stored, None));
                Ok(CreateOutcome::Created(stored))
            }
            Err(StoreError::AlreadyExists(existing)) => {
                let same_times = input.start_time.is_none_or(|t| t == existing.start_time)
                    && input.last_updated.is_none_or(|t| t == existing.last_updated);
                if same_times && existing.same_submission(&candidate) {
                    debug!(id = %existing.id, "Duplicate create, returning stored transaction");
                    Ok(CreateOutcome::Existing(*existing))
                } else {
                    warn!(id = %existing.id, "Create reused an existing id with a different payload");
                    Err(StoreError::AlreadyExists(existing).into())
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get(&self, id: &str) -> Result<Transaction, TransactionError> {
        validation::check_identifier("id", id)?;
        Ok(self.store.get(id)?)
    }

    /// Apply a partial update with transition enforcement
    pub fn update(
        &self,
        id: &str,
        patch: UpdateTransactionRequest,
    ) -> Result<Transaction, TransactionError> {
        validation::check_identifier("id", id)?;
        let attempts = self.config.cas_attempts.max(1);

        for attempt in 1..=attempts {
            let current = self.store.get(id)?;

            if current.status.is_terminal() && !validation::is_sanctioned_retry(&current, &patch) {
                let attempted: Option<TransactionStatus> = patch.status.as_deref().and_then(|raw| raw.parse().ok());
                warn!(
                    id = %id,
                    status = %current.status,
                    attempted = ?attempted,
                    "Rejected update to terminal transaction"
                );
                return Err(TransactionError::TerminalState {
                    id: id.to_string(),
                    status: current.status,
                    attempted,
                });
            }

            let (next, kind) = validation::validate_update(
                &current,
                &patch,
                self.clock.now(),
                self.config.max_retries,
            )
            .inspect_err(|e| {
                if let TransactionError::InvalidTransition { from, to, .. } = e {
                    warn!(id = %id, from = %from, to = %to, "Rejected out-of-order status report");
                }
            })?;

            match self.store.compare_and_swap(id, current.last_updated, next) {
                Ok(stored) => {
                    info!(
                        id = %id,
                        from = %current.status,
                        to = %stored.status,
                        kind = ?kind,
                        retry_count = stored.retry_count,
                        "Transaction updated"
                    );
                    self.events
                        .broadcast(TransactionEvent::new(&stored, Some(current.status)));
                    return Ok(stored);
                }
                Err(StoreError::Conflict { .. }) => {
                    warn!(id = %id, attempt, attempts, "Compare-and-swap lost, re-reading");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(TransactionError::Conflict {
            id: id.to_string(),
            kind: ConflictKind::ConcurrentModification,
        })
    }

    /// Page through a player's transactions
    pub fn query(
        &self,
        player_id: &str,
        filter: TransactionFilter,
    ) -> Result<TransactionPage, TransactionError> {
        validation::check_identifier("player_id", player_id)?;
        filter.validate(self.config.max_page_size)?;

        let records = self.store.list_by_player(player_id);
        Ok(pagination::paginate(records, &filter))
    }

    /// Every active transaction of a player, walked page by page
    pub fn active_snapshot(&self, player_id: &str) -> Result<Vec<Transaction>, TransactionError> {
        let mut transactions = Vec::new();
        let mut offset = 0;

        loop {
            let filter = TransactionFilter::new(self.config.max_page_size, offset).active_only();
            let page = self.query(player_id, filter)?;
            offset += page.items.len();
            transactions.extend(page.items);
            if !page.has_more {
                break;
            }
        }

        Ok(transactions)
    }
}
