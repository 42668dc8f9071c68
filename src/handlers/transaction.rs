//! Transaction handlers
//!
//! POST /api/transactions, GET /api/transactions, GET|PUT|PATCH /api/transactions/{id}.
//! Watchers for Saga, Axelar and Arbitrum report progress through the update
//! endpoint; the player's client creates and lists.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use tracing::{debug, warn};

use crate::AppState;
use crate::models::transaction::{
    CreateTransactionRequest, ErrorResponse, ListTransactionsQuery, Transaction, TransactionPage,
    UpdateTransactionRequest,
};
use crate::services::pagination;
use crate::services::transaction_service::{CreateOutcome, TransactionError};

type ApiError = (StatusCode, Json<ErrorResponse>);

/// POST /api/transactions
///
/// 201 with the stored record on first submission, 200 with the unchanged
/// record when the exact same transaction is submitted again.
pub async fn create_transaction(
    State(state): State<AppState>,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let Json(request) = payload.map_err(|r| rejection_response(r.body_text()))?;

    match state.transactions.create(request).map_err(error_response)? {
        CreateOutcome::Created(tx) => Ok((StatusCode::CREATED, Json(tx))),
        CreateOutcome::Existing(tx) => Ok((StatusCode::OK, Json(tx))),
    }
}

/// GET /api/transactions/{id}
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    state
        .transactions
        .get(&id)
        .map(Json)
        .map_err(error_response)
}

/// PUT|PATCH /api/transactions/{id}
///
/// Partial update; absent fields are left as they are.
pub async fn update_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTransactionRequest>, JsonRejection>,
) -> Result<Json<Transaction>, ApiError> {
    let Json(patch) = payload.map_err(|r| rejection_response(r.body_text()))?;

    state
        .transactions
        .update(&id, patch)
        .map(Json)
        .map_err(error_response)
}

/// GET /api/transactions?playerId=&activeOnly=&limit=&offset=
///
/// # Response
///
/// ```json
/// {
///   "items": [{ "id": "tx1", "player_id": "p1", "type": "plant_seed", "status": "saga_pending", ... }],
///   "total": 2,
///   "hasMore": true,
///   "limit": 1,
///   "offset": 0
/// }
/// ```
pub async fn list_transactions(
    State(state): State<AppState>,
    query: Result<Query<ListTransactionsQuery>, QueryRejection>,
) -> Result<Json<TransactionPage>, ApiError> {
    let Query(query) = query.map_err(|r| rejection_response(r.body_text()))?;
    let (player_id, filter) = pagination::parse_list_query(&query, state.transactions.config())
        .map_err(|e| error_response(e.into()))?;

    let page = state
        .transactions
        .query(&player_id, filter)
        .map_err(error_response)?;

    debug!(
        player_id = %player_id,
        count = page.items.len(),
        total = page.total,
        has_more = page.has_more,
        "Transaction list returned"
    );
    Ok(Json(page))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "transactions": state.transactions.count(),
    }))
}

pub fn status_code(e: &TransactionError) -> StatusCode {
    match e {
        TransactionError::Validation(_) => StatusCode::BAD_REQUEST,
        TransactionError::NotFound { .. } => StatusCode::NOT_FOUND,
        TransactionError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        TransactionError::TerminalState { .. } => StatusCode::CONFLICT,
        TransactionError::Conflict { .. } => StatusCode::CONFLICT,
        TransactionError::RetryLimitExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn error_response(e: TransactionError) -> ApiError {
    let status = status_code(&e);
    if status != StatusCode::NOT_FOUND {
        warn!(code = e.code(), error = %e, "Transaction request rejected");
    }

    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
            code: e.code().to_string(),
            current_status: e.current_status(),
            attempted_status: e.attempted_status(),
            field: e.field().map(str::to_string),
        }),
    )
}

/// Body or query string that failed to deserialize
fn rejection_response(error: String) -> ApiError {
    warn!(error = %error, "Malformed transaction request");
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error,
            code: "validation_error".to_string(),
            current_status: None,
            attempted_status: None,
            field: None,
        }),
    )
}
