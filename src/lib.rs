// src/lib.rs

use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use services::transaction_service::TransactionService;

#[derive(Clone)]
pub struct AppState {
    pub transactions: TransactionService,
}

pub mod config;

pub mod models {
    pub mod status;
    pub mod transaction;
}

pub mod services {
    pub mod clock;
    pub mod pagination;
    pub mod transaction_events;
    pub mod transaction_service;
    pub mod transaction_store;
    pub mod validation;
}

pub mod handlers {
    pub mod transaction;
    pub mod transaction_ws;
}

/// Full router with every transaction endpoint
pub fn app(state: AppState) -> Router {
    use handlers::{transaction, transaction_ws};

    Router::new()
        .route("/", get(hello))
        .route("/health", get(transaction::health))
        .route(
            "/api/transactions",
            get(transaction::list_transactions).post(transaction::create_transaction),
        )
        .route("/api/transactions/ws", get(transaction_ws::transactions_websocket))
        .route(
            "/api/transactions/{id}",
            get(transaction::get_transaction)
                .put(transaction::update_transaction)
                .patch(transaction::update_transaction),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn hello() -> &'static str {
    "Hello from the Saga farm transaction tracker!"
}
