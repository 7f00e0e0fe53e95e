use axum::{
    Router, routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;
use tracing::info;
use crate::{
    api::handler::{
        AppState, delete_balance, get_balance, health_check, pod_info, reconcile_balance,
        reconcile_batch,
    },
    ledger::BalanceGateway,
};

pub fn create_app<G: BalanceGateway>(state: AppState<G>) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    let app = Router::new()
        .route("/health", get(health_check::<G>))
        .route("/info", get(pod_info::<G>))
        .nest("/api/v1",
            Router::new()
                .route("/balance", post(reconcile_balance::<G>))
                .route("/balance/batch", post(reconcile_batch::<G>))
                .route("/balance/:account_id", get(get_balance::<G>))
                // Admin endpoint
                .route("/balance/id/:id", delete(delete_balance::<G>))
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(
    app: Router,
    bind_address: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown signal received");
}
