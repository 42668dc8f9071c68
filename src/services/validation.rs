//! Validation of inbound create and update requests
//!
//! `validate_create` turns a raw request into a fresh record.
//! `validate_update` applies a patch to an existing record, enforcing field
//! immutability, write-once identifiers and the status transition table.

use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::models::status::{TransactionStatus, TransactionType, TransitionKind};
use crate::models::transaction::{
    CreateTransactionRequest, Transaction, TransactionPayload, UpdateTransactionRequest,
};
use crate::services::transaction_service::TransactionError;

lazy_static! {
    static ref IDENTIFIER_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
    static ref DIGITS_REGEX: Regex = Regex::new(r"^[0-9]+$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{field} '{value}' must match [a-zA-Z0-9_-]+")]
    InvalidIdentifier { field: &'static str, value: String },
    #[error("unknown transaction type '{0}'")]
    UnknownType(String),
    #[error("unknown transaction status '{0}'")]
    UnknownStatus(String),
    #[error("{field} is required for {tx_type}")]
    MissingPayloadField {
        tx_type: TransactionType,
        field: &'static str,
    },
    #[error("{field} is not accepted for {tx_type}")]
    UnexpectedPayloadField {
        tx_type: TransactionType,
        field: &'static str,
    },
    #[error("{field} '{value}' must be a non-negative integer string")]
    InvalidAmount { field: &'static str, value: String },
    #[error("{0} cannot be changed")]
    ImmutableField(&'static str),
    #[error("{0} is assigned by the server")]
    ServerAssignedField(&'static str),
    #[error("{field} is already set to '{current}'")]
    IdentifierAlreadySet { field: &'static str, current: String },
    #[error("error_message is only accepted with status failed, not {0}")]
    UnexpectedErrorMessage(TransactionStatus),
    #[error("transactions must be created as preparing, not {0}")]
    InvalidCreateStatus(TransactionStatus),
    #[error("last_updated cannot be earlier than start_time")]
    InvalidTimestamps,
    #[error("{0}")]
    InvalidPagination(String),
}

impl ValidationError {
    /// Field the error refers to, when there is one
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::MissingField(field)
            | ValidationError::ImmutableField(field)
            | ValidationError::ServerAssignedField(field) => Some(*field),
            ValidationError::InvalidIdentifier { field, .. }
            | ValidationError::MissingPayloadField { field, .. }
            | ValidationError::UnexpectedPayloadField { field, .. }
            | ValidationError::InvalidAmount { field, .. }
            | ValidationError::IdentifierAlreadySet { field, .. } => Some(*field),
            ValidationError::UnknownType(_) => Some("type"),
            ValidationError::UnknownStatus(_) | ValidationError::InvalidCreateStatus(_) => {
                Some("status")
            }
            ValidationError::UnexpectedErrorMessage(_) => Some("error_message"),
            ValidationError::InvalidTimestamps => Some("last_updated"),
            ValidationError::InvalidPagination(_) => None,
        }
    }
}

pub fn is_identifier(value: &str) -> bool {
    IDENTIFIER_REGEX.is_match(value)
}

/// Validate a create request and build the record to store.
///
/// `start_time` and `last_updated` default to `now`; `retry_count` starts at 0.
pub fn validate_create(
    input: &CreateTransactionRequest,
    now: DateTime<Utc>,
) -> Result<Transaction, ValidationError> {
    let id = required_identifier("id", input.id.as_deref())?;
    let player_id = required_identifier("player_id", input.player_id.as_deref())?;

    let tx_type = match input.tx_type.as_deref() {
        None | Some("") => return Err(ValidationError::MissingField("type")),
        Some(raw) => parse_type(raw)?,
    };

    let status = match input.status.as_deref() {
        None => TransactionStatus::Preparing,
        Some(raw) => parse_status(raw)?,
    };
    if status != TransactionStatus::Preparing {
        return Err(ValidationError::InvalidCreateStatus(status));
    }

    let payload = build_payload(tx_type, input)?;

    for (field, value) in [
        ("saga_tx_hash", &input.saga_tx_hash),
        ("arbitrum_tx_hash", &input.arbitrum_tx_hash),
        ("axelar_tx_id", &input.axelar_tx_id),
        ("axelar_tx_hash", &input.axelar_tx_hash),
    ] {
        if let Some(value) = value {
            check_identifier(field, value)?;
        }
    }
    if let Some(gas) = &input.gas_estimate {
        check_amount("gas_estimate", gas)?;
    }
    if input.error_message.is_some() {
        return Err(ValidationError::UnexpectedErrorMessage(status));
    }
    if input.retry_count.is_some_and(|count| count != 0) {
        return Err(ValidationError::ServerAssignedField("retry_count"));
    }

    let start_time = input.start_time.unwrap_or(now);
    let last_updated = input.last_updated.unwrap_or(now).max(start_time);
    if input.last_updated.is_some_and(|t| t < start_time) {
        return Err(ValidationError::InvalidTimestamps);
    }

    Ok(Transaction {
        id,
        player_id,
        payload,
        status,
        saga_tx_hash: input.saga_tx_hash.clone(),
        arbitrum_tx_hash: input.arbitrum_tx_hash.clone(),
        axelar_tx_id: input.axelar_tx_id.clone(),
        axelar_tx_hash: input.axelar_tx_hash.clone(),
        start_time,
        last_updated,
        estimated_completion_time: input.estimated_completion_time,
        error_message: None,
        retry_count: 0,
        gas_estimate: input.gas_estimate.clone(),
        failed_from: None,
    })
}

/// Apply `patch` to `existing`, returning the next record and the kind of
/// status move it represents.
///
/// The returned record's `last_updated` is strictly later than the existing one.
pub fn validate_update(
    existing: &Transaction,
    patch: &UpdateTransactionRequest,
    now: DateTime<Utc>,
    max_retries: u32,
) -> Result<(Transaction, TransitionKind), TransactionError> {
    check_unchanged("id", patch.id.as_deref(), Some(existing.id.as_str()))?;
    check_unchanged("player_id", patch.player_id.as_deref(), Some(existing.player_id.as_str()))?;
    if let Some(raw) = patch.tx_type.as_deref() {
        if parse_type(raw)? != existing.tx_type() {
            return Err(ValidationError::ImmutableField("type").into());
        }
    }
    if patch.start_time.is_some_and(|t| t != existing.start_time) {
        return Err(ValidationError::ImmutableField("start_time").into());
    }
    if patch.retry_count.is_some_and(|count| count != existing.retry_count) {
        return Err(ValidationError::ImmutableField("retry_count").into());
    }
    if patch.last_updated.is_some() {
        return Err(ValidationError::ServerAssignedField("last_updated").into());
    }
    if patch.seed_type.is_some() && patch.seed_type != existing.payload.seed_type() {
        return Err(ValidationError::ImmutableField("seed_type").into());
    }
    check_unchanged("amount", patch.amount.as_deref(), existing.payload.amount())?;
    check_unchanged("seed_id", patch.seed_id.as_deref(), existing.payload.seed_id())?;

    let target = match patch.status.as_deref() {
        Some(raw) => parse_status(raw)?,
        None => existing.status,
    };
    let kind = existing
        .status
        .transition_to(target, existing.failed_from)
        .ok_or_else(|| TransactionError::InvalidTransition {
            id: existing.id.clone(),
            from: existing.status,
            to: target,
        })?;
    if kind == TransitionKind::Retry && existing.retry_count >= max_retries {
        return Err(TransactionError::RetryLimitExceeded {
            id: existing.id.clone(),
            retry_count: existing.retry_count,
            max_retries,
        });
    }

    if patch.error_message.is_some() && target != TransactionStatus::Failed {
        return Err(ValidationError::UnexpectedErrorMessage(target).into());
    }

    let mut next = existing.clone();
    next.status = target;
    set_once("saga_tx_hash", &mut next.saga_tx_hash, &patch.saga_tx_hash)?;
    set_once("arbitrum_tx_hash", &mut next.arbitrum_tx_hash, &patch.arbitrum_tx_hash)?;
    set_once("axelar_tx_id", &mut next.axelar_tx_id, &patch.axelar_tx_id)?;
    set_once("axelar_tx_hash", &mut next.axelar_tx_hash, &patch.axelar_tx_hash)?;

    if let Some(gas) = &patch.gas_estimate {
        check_amount("gas_estimate", gas)?;
        next.gas_estimate = Some(gas.clone());
    }
    if patch.estimated_completion_time.is_some() {
        next.estimated_completion_time = patch.estimated_completion_time;
    }

    match kind {
        TransitionKind::Fail => {
            next.failed_from = Some(existing.status);
            next.error_message = patch.error_message.clone();
        }
        TransitionKind::Retry => {
            next.retry_count += 1;
            next.failed_from = None;
            next.error_message = None;
        }
        TransitionKind::Advance | TransitionKind::Refresh => {}
    }

    next.last_updated = now.max(existing.last_updated + Duration::milliseconds(1));
    Ok((next, kind))
}

/// True when `patch` is the one move allowed out of a terminal record:
/// failed back to the status it failed from.
pub fn is_sanctioned_retry(existing: &Transaction, patch: &UpdateTransactionRequest) -> bool {
    existing.status == TransactionStatus::Failed
        && patch
            .status
            .as_deref()
            .and_then(|raw| raw.parse::<TransactionStatus>().ok())
            .is_some_and(|target| Some(target) == existing.failed_from)
}

fn required_identifier(field: &'static str, value: Option<&str>) -> Result<String, ValidationError> {
    match value {
        None | Some("") => Err(ValidationError::MissingField(field)),
        Some(value) => {
            check_identifier(field, value)?;
            Ok(value.to_string())
        }
    }
}

pub fn check_identifier(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if is_identifier(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidIdentifier {
            field,
            value: value.to_string(),
        })
    }
}

fn check_amount(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if DIGITS_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidAmount {
            field,
            value: value.to_string(),
        })
    }
}

fn parse_type(raw: &str) -> Result<TransactionType, ValidationError> {
    raw.parse()
        .map_err(|_| ValidationError::UnknownType(raw.to_string()))
}

fn parse_status(raw: &str) -> Result<TransactionStatus, ValidationError> {
    raw.parse()
        .map_err(|_| ValidationError::UnknownStatus(raw.to_string()))
}

fn check_unchanged(
    field: &'static str,
    requested: Option<&str>,
    current: Option<&str>,
) -> Result<(), ValidationError> {
    match requested {
        Some(value) if Some(value) != current => Err(ValidationError::ImmutableField(field)),
        _ => Ok(()),
    }
}

fn set_once(
    field: &'static str,
    slot: &mut Option<String>,
    requested: &Option<String>,
) -> Result<(), ValidationError> {
    let Some(value) = requested else {
        return Ok(());
    };
    check_identifier(field, value)?;
    if let Some(current) = slot.as_deref() {
        if current != value.as_str() {
            return Err(ValidationError::IdentifierAlreadySet {
                field,
                current: current.to_string(),
            });
        }
        return Ok(());
    }
    *slot = Some(value.clone());
    Ok(())
}

fn build_payload(
    tx_type: TransactionType,
    input: &CreateTransactionRequest,
) -> Result<TransactionPayload, ValidationError> {
    let missing = |field| ValidationError::MissingPayloadField { tx_type, field };
    let unexpected = |field| ValidationError::UnexpectedPayloadField { tx_type, field };

    match tx_type {
        TransactionType::PlantSeed => {
            if input.seed_id.is_some() {
                return Err(unexpected("seed_id"));
            }
            let seed_type = input.seed_type.ok_or_else(|| missing("seed_type"))?;
            let amount = input.amount.clone().ok_or_else(|| missing("amount"))?;
            check_amount("amount", &amount)?;
            Ok(TransactionPayload::PlantSeed { seed_type, amount })
        }
        TransactionType::HarvestSeed | TransactionType::ClaimYield => {
            if input.seed_type.is_some() {
                return Err(unexpected("seed_type"));
            }
            if input.amount.is_some() {
                return Err(unexpected("amount"));
            }
            let seed_id = match input.seed_id.as_deref() {
                None | Some("") => return Err(missing("seed_id")),
                Some(seed_id) => seed_id,
            };
            check_identifier("seed_id", seed_id)?;
            let seed_id = seed_id.to_string();
            Ok(if tx_type == TransactionType::HarvestSeed {
                TransactionPayload::HarvestSeed { seed_id }
            } else {
                TransactionPayload::ClaimYield { seed_id }
            })
        }
    }
}
