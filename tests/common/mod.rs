use std::sync::Arc;

use axum::{Router, body::Body, http::Request, http::StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use saga_farm_tx_tracker::{
    AppState,
    config::ServiceConfig,
    services::{
        clock::ManualClock, transaction_service::TransactionService,
        transaction_store::InMemoryTransactionStore,
    },
};
use serde_json::Value;
use tower::ServiceExt;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
}

/// Service over an empty in-memory store and a manual clock
pub fn test_service() -> (TransactionService, Arc<ManualClock>) {
    test_service_with(ServiceConfig::default())
}

pub fn test_service_with(config: ServiceConfig) -> (TransactionService, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_time()));
    let service = TransactionService::new(
        Arc::new(InMemoryTransactionStore::new()),
        clock.clone(),
        config,
    );
    (service, clock)
}

/// Router over a fresh test service
#[allow(dead_code)]
pub fn test_app() -> (Router, Arc<ManualClock>) {
    let (transactions, clock) = test_service();
    (saga_farm_tx_tracker::app(AppState { transactions }), clock)
}

/// Router over a fresh service with custom knobs
#[allow(dead_code)]
pub fn test_app_with(config: ServiceConfig) -> Router {
    let (transactions, _) = test_service_with(config);
    saga_farm_tx_tracker::app(AppState { transactions })
}

/// Send a request and decode the JSON body
#[allow(dead_code)]
pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
