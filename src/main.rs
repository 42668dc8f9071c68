use saga_farm_tx_tracker::{AppState, app, config::Config, services::transaction_service::TransactionService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,saga_farm_tx_tracker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    let state = AppState {
        transactions: TransactionService::in_memory(config.service.clone()),
    };

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind listen address");

    match listener.local_addr() {
        Ok(addr) => tracing::info!("Server listening on {}", addr),
        Err(e) => tracing::warn!("Server listening, local address unavailable: {}", e),
    }

    if let Err(e) = axum::serve(listener, app(state)).await {
        tracing::error!("Server error: {}", e);
    }
}
