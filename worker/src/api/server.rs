/// Axum HTTP server setup and routing

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use transfer_enrichment::{TransactionService, CONNECT_TRANSACTIONS};

use super::handlers::{connect_transactions_handler, health_check};

pub fn create_router(service: Arc<TransactionService>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            &format!("/jobs/{}", CONNECT_TRANSACTIONS),
            post(connect_transactions_handler),
        )
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_server(addr: &str, service: Arc<TransactionService>) -> anyhow::Result<()> {
    let app = create_router(service);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Job intake listening on http://{}", addr);
    log::info!("Accepting jobs at POST /jobs/{}", CONNECT_TRANSACTIONS);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Handle graceful shutdown signals (Ctrl+C, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            log::info!("Received SIGTERM signal");
        },
    }

    // In-flight jobs finish before the server returns
    log::info!("Shutdown signal received, exiting gracefully...");
}
