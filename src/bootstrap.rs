use std::sync::Arc;
use tracing::info;
use crate::{
    api::handler::{AppState, PodInfo},
    config::Config,
    error::AppResult,
    ledger::BalanceRepository,
    reconcile::ReconciliationService,
};

pub async fn initialize_app_state(config: &Config) -> AppResult<AppState<BalanceRepository>> {
    info!("Initializing application components ...");

    let repository = BalanceRepository::connect(config).await?;
    run_migrations(&repository).await?;

    let service = Arc::new(ReconciliationService::new(Arc::new(repository)));
    info!("✅ Reconciliation service initialized");

    Ok(AppState {
        service,
        db_timeout: config.db_timeout(),
        pod: Arc::new(PodInfo::from_config(config)),
    })
}

/// Apply the embedded `balance_cdc` schema migrations.
pub async fn run_migrations(repository: &BalanceRepository) -> AppResult<()> {
    info!("🔄 Running database migrations...");
    sqlx::migrate!("./migrations").run(repository.pool()).await?;

    info!("✓ Database initialized");
    Ok(())
}
