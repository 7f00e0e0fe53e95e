use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use validator::Validate;

use super::models::*;
use crate::{
    config::Config,
    context::OpContext,
    error::{AppError, AppResult},
    ledger::{Balance, BalanceGateway, ReconcileOutcome},
    reconcile::ReconciliationService,
};

pub struct AppState<G: BalanceGateway> {
    pub service: Arc<ReconciliationService<G>>,
    pub db_timeout: Duration,
    pub pod: Arc<PodInfo>,
}

impl<G: BalanceGateway> Clone for AppState<G> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            db_timeout: self.db_timeout,
            pod: Arc::clone(&self.pod),
        }
    }
}

impl<G: BalanceGateway> AppState<G> {
    /// Fresh per-request context bounded by the configured store deadline.
    fn request_context(&self) -> OpContext {
        OpContext::background().with_timeout(self.db_timeout)
    }
}

/// Static facts about this worker instance, reported by `/info`
#[derive(Debug, Clone, Serialize)]
pub struct PodInfo {
    pub pod_name: String,
    pub api_version: String,
    pub os_pid: u32,
    pub availability_zone: String,
    pub database_host: String,
}

impl PodInfo {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pod_name: config.pod_name.clone(),
            api_version: config.api_version.clone(),
            os_pid: std::process::id(),
            availability_zone: config.availability_zone.clone(),
            database_host: config.db_host.clone(),
        }
    }
}

fn validate_event(event: &BalanceEvent) -> AppResult<()> {
    event.validate().map_err(|e| {
        let errors = e
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let error_messages: Vec<String> = errors
                    .iter()
                    .map(|e| e.message.as_ref().map(|s| s.to_string()).unwrap_or_default())
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<String>>()
            .join("; ");

        AppError::InvalidInput(format!("Validation failed: {}", errors))
    })
}

/// GET /health - store liveness probe
pub async fn health_check<G: BalanceGateway>(
    State(state): State<AppState<G>>,
) -> (StatusCode, Json<HealthResponse>) {
    match state.service.ping(&state.request_context()).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                timestamp: Utc::now(),
                error_code: None,
            }),
        ),
        Err(err) => {
            warn!("Health check failed: {}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable".to_string(),
                    timestamp: Utc::now(),
                    error_code: Some(err.kind().as_str().to_string()),
                }),
            )
        }
    }
}

/// GET /info
pub async fn pod_info<G: BalanceGateway>(State(state): State<AppState<G>>) -> Json<PodInfo> {
    Json(state.pod.as_ref().clone())
}

/// POST /api/v1/balance - reconcile one balance event
pub async fn reconcile_balance<G: BalanceGateway>(
    State(state): State<AppState<G>>,
    Json(event): Json<BalanceEvent>,
) -> AppResult<Json<ReconcileOutcome>> {
    validate_event(&event)?;
    info!("Reconciling balance for account {}", event.account_id);

    let balance = Balance::from(event);
    let outcome = state
        .service
        .reconcile(&state.request_context(), &balance)
        .await?;

    Ok(Json(outcome))
}

/// POST /api/v1/balance/batch - reconcile many events, one task each
pub async fn reconcile_batch<G: BalanceGateway>(
    State(state): State<AppState<G>>,
    Json(events): Json<Vec<BalanceEvent>>,
) -> AppResult<Json<BatchResponse>> {
    for event in &events {
        validate_event(event)?;
    }
    info!("Reconciling batch of {} balance events", events.len());

    let balances: Vec<Balance> = events.into_iter().map(Balance::from).collect();
    let account_ids: Vec<String> = balances.iter().map(|b| b.account_id.clone()).collect();

    let results = state
        .service
        .reconcile_batch(&state.request_context(), balances)
        .await;

    let results: Vec<BatchItemResult> = account_ids
        .into_iter()
        .zip(results)
        .map(|(account_id, result)| BatchItemResult::new(account_id, result))
        .collect();
    let failed = results.iter().filter(|r| r.error_code.is_some()).count();

    Ok(Json(BatchResponse {
        succeeded: results.len() - failed,
        failed,
        results,
    }))
}

/// GET /api/v1/balance/:account_id
pub async fn get_balance<G: BalanceGateway>(
    State(state): State<AppState<G>>,
    Path(account_id): Path<String>,
) -> AppResult<Json<Balance>> {
    let balance = state
        .service
        .current(&state.request_context(), &account_id)
        .await?;
    Ok(Json(balance))
}

/// DELETE /api/v1/balance/:id - administrative removal
pub async fn delete_balance<G: BalanceGateway>(
    State(state): State<AppState<G>>,
    Path(id): Path<i64>,
) -> AppResult<Json<DeleteResponse>> {
    info!("Deleting balance {}", id);

    let deleted = state.service.remove(&state.request_context(), id).await?;
    Ok(Json(DeleteResponse { id, deleted }))
}
