//! WebSocket handler for real-time transaction status streaming
//!
//! Provides `/api/transactions/ws` for clients to follow a player's
//! transactions as watchers report progress.

use std::time::Duration;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::AppState;
use crate::models::transaction::Transaction;
use crate::services::transaction_events::TransactionEvent;
use crate::services::validation::is_identifier;

const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(30);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket request from client
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsRequest {
    /// subscribe, unsubscribe, ping
    pub action: String,
    /// Player to follow (required for subscribe)
    pub player_id: Option<String>,
}

/// WebSocket message to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    Subscribed {
        #[serde(rename = "playerId")]
        player_id: String,
    },
    /// Player's active transactions at subscription time
    Initial { transactions: Vec<Transaction> },
    Transaction(TransactionEvent),
    Error { message: String },
    Pong,
}

/// GET /api/transactions/ws
///
/// Client sends:
/// ```json
/// { "action": "subscribe", "playerId": "p1" }
/// ```
///
/// Server streams:
/// ```json
/// { "type": "transaction", "id": "tx1", "player_id": "p1", "status": "saga_pending", ... }
/// ```
pub async fn transactions_websocket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let player_id = match wait_for_subscription(&mut receiver).await {
        Ok(player_id) => player_id,
        Err(message) => {
            let _ = send(&mut sender, &WsMessage::Error { message }).await;
            return;
        }
    };

    info!(player_id = %player_id, "Transaction stream subscribed");

    // subscribe before the snapshot so nothing between the two is lost
    let mut events = state.transactions.subscribe();

    if send(
        &mut sender,
        &WsMessage::Subscribed {
            player_id: player_id.clone(),
        },
    )
    .await
    .is_err()
    {
        return;
    }

    match state.transactions.active_snapshot(&player_id) {
        Ok(transactions) => {
            let _ = send(&mut sender, &WsMessage::Initial { transactions }).await;
        }
        Err(e) => warn!(player_id = %player_id, error = %e, "Initial snapshot failed"),
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);

    loop {
        tokio::select! {
            result = events.recv() => {
                match result {
                    Ok(event) => {
                        if event.player_id == player_id
                            && send(&mut sender, &WsMessage::Transaction(event)).await.is_err()
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(player_id = %player_id, missed = n, "Transaction stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            _ = heartbeat.tick() => {
                if let Err(e) = sender.send(Message::Ping(axum::body::Bytes::new())).await {
                    debug!("Heartbeat failed: {}", e);
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(req) = serde_json::from_str::<WsRequest>(&text) {
                            match req.action.as_str() {
                                "ping" => {
                                    let _ = send(&mut sender, &WsMessage::Pong).await;
                                }
                                "unsubscribe" => break,
                                _ => {}
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        error!("WebSocket receive error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!(player_id = %player_id, "Transaction stream closed");
}

async fn send(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &WsMessage,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to encode WebSocket message: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await
}

async fn wait_for_subscription(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
) -> Result<String, String> {
    let wait = async {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => return parse_subscription(&text),
                Ok(Message::Close(_)) => {
                    return Err("Connection closed before subscription".to_string());
                }
                Err(e) => return Err(format!("WebSocket error: {}", e)),
                _ => continue,
            }
        }
        Err("Connection ended before subscription".to_string())
    };

    tokio::time::timeout(SUBSCRIBE_TIMEOUT, wait)
        .await
        .map_err(|_| "Subscription timeout".to_string())?
}

fn parse_subscription(text: &str) -> Result<String, String> {
    let req: WsRequest = serde_json::from_str(text).map_err(|e| format!("Invalid request: {}", e))?;

    if req.action != "subscribe" {
        return Err("First message must be subscribe action".to_string());
    }

    let player_id = req
        .player_id
        .ok_or_else(|| "playerId is required for subscription".to_string())?;
    if !is_identifier(&player_id) {
        return Err("Invalid playerId format".to_string());
    }

    Ok(player_id)
}
