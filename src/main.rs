use anyhow::Context;
use balance_worker::{bootstrap, config::Config, server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing::info;


// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,tower_http=debug,balance_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before anything reads the environment
    dotenv::dotenv().ok();

    init_tracing();

    info!("🚀 Starting balance reconciliation worker");

    let config = Config::from_env().context("failed to load configuration")?;

    let state = bootstrap::initialize_app_state(&config)
        .await
        .context("failed to initialize application state")?;

    let app = server::create_app(state);

    server::run_server(app, &config.bind_address)
        .await
        .map_err(|e| anyhow::anyhow!("server error: {}", e))?;

    info!("👋 Worker stopped");

    Ok(())
}
