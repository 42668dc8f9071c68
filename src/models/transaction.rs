//! Transaction record and request/response models
//!
//! Models for the /api/transactions endpoints. Request bodies reject unknown
//! fields so nothing outside the record layout is silently accepted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::status::{TransactionStatus, TransactionType};

/// Type-dependent fields, tagged by the transaction `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionPayload {
    PlantSeed { seed_type: u32, amount: String },
    HarvestSeed { seed_id: String },
    ClaimYield { seed_id: String },
}

impl TransactionPayload {
    pub fn tx_type(&self) -> TransactionType {
        match self {
            TransactionPayload::PlantSeed { .. } => TransactionType::PlantSeed,
            TransactionPayload::HarvestSeed { .. } => TransactionType::HarvestSeed,
            TransactionPayload::ClaimYield { .. } => TransactionType::ClaimYield,
        }
    }

    pub fn seed_type(&self) -> Option<u32> {
        match self {
            TransactionPayload::PlantSeed { seed_type, .. } => Some(*seed_type),
            _ => None,
        }
    }

    pub fn amount(&self) -> Option<&str> {
        match self {
            TransactionPayload::PlantSeed { amount, .. } => Some(amount.as_str()),
            _ => None,
        }
    }

    pub fn seed_id(&self) -> Option<&str> {
        match self {
            TransactionPayload::HarvestSeed { seed_id } | TransactionPayload::ClaimYield { seed_id } => {
                Some(seed_id.as_str())
            }
            TransactionPayload::PlantSeed { .. } => None,
        }
    }
}

/// A tracked player action crossing Saga, Axelar and Arbitrum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Caller-assigned unique id
    pub id: String,
    /// Owning player
    pub player_id: String,
    #[serde(flatten)]
    pub payload: TransactionPayload,
    pub status: TransactionStatus,
    /// Saga chainlet transaction hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saga_tx_hash: Option<String>,
    /// Arbitrum transaction hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arbitrum_tx_hash: Option<String>,
    /// Axelar relay message id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub axelar_tx_id: Option<String>,
    /// Axelar relay transaction hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub axelar_tx_hash: Option<String>,
    pub start_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_completion_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_estimate: Option<String>,
    /// Status that was active when the record moved to failed
    #[serde(skip)]
    pub failed_from: Option<TransactionStatus>,
}

impl Transaction {
    pub fn tx_type(&self) -> TransactionType {
        self.payload.tx_type()
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// True when both records describe the same submission, ignoring
    /// server-assigned timestamps and retry bookkeeping.
    pub fn same_submission(&self, other: &Transaction) -> bool {
        self.id == other.id
            && self.player_id == other.player_id
            && self.payload == other.payload
            && self.status == other.status
            && self.saga_tx_hash == other.saga_tx_hash
            && self.arbitrum_tx_hash == other.arbitrum_tx_hash
            && self.axelar_tx_id == other.axelar_tx_id
            && self.axelar_tx_hash == other.axelar_tx_hash
            && self.estimated_completion_time == other.estimated_completion_time
            && self.error_message == other.error_message
            && self.gas_estimate == other.gas_estimate
    }
}

/// Request body for POST /api/transactions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTransactionRequest {
    pub id: Option<String>,
    pub player_id: Option<String>,
    #[serde(rename = "type")]
    pub tx_type: Option<String>,
    pub status: Option<String>,
    pub saga_tx_hash: Option<String>,
    pub arbitrum_tx_hash: Option<String>,
    pub axelar_tx_id: Option<String>,
    pub axelar_tx_hash: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub estimated_completion_time: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub retry_count: Option<u32>,
    pub seed_type: Option<u32>,
    pub amount: Option<String>,
    pub seed_id: Option<String>,
    pub gas_estimate: Option<String>,
}

/// Request body for PUT/PATCH /api/transactions/{id}
///
/// Every field is optional; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTransactionRequest {
    pub id: Option<String>,
    pub player_id: Option<String>,
    #[serde(rename = "type")]
    pub tx_type: Option<String>,
    pub status: Option<String>,
    pub saga_tx_hash: Option<String>,
    pub arbitrum_tx_hash: Option<String>,
    pub axelar_tx_id: Option<String>,
    pub axelar_tx_hash: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub estimated_completion_time: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub retry_count: Option<u32>,
    pub seed_type: Option<u32>,
    pub amount: Option<String>,
    pub seed_id: Option<String>,
    pub gas_estimate: Option<String>,
}

impl UpdateTransactionRequest {
    /// Patch carrying only a status report
    pub fn status(status: TransactionStatus) -> Self {
        Self {
            status: Some(status.as_str().to_string()),
            ..Default::default()
        }
    }
}

/// Query parameters for GET /api/transactions
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTransactionsQuery {
    pub player_id: Option<String>,
    /// Exclude completed and failed transactions
    pub active_only: Option<bool>,
    /// Page size (default: 20, max: 100)
    pub limit: Option<i64>,
    /// Offset for pagination (default: 0)
    pub offset: Option<i64>,
}

/// Response for GET /api/transactions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    pub items: Vec<Transaction>,
    /// Count after filtering, before pagination
    pub total: usize,
    pub has_more: bool,
    pub limit: usize,
    pub offset: usize,
}

/// Error body returned by every transaction endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_status: Option<TransactionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempted_status: Option<TransactionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}
