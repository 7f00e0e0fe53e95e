use crate::error::StoreError;
use crate::ledger::models::*;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

// ========== REQUEST MODELS ==========

/// Balance change event as delivered by the upstream change feed
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BalanceEvent {
    #[validate(length(min = 1, message = "account_id is required"))]
    pub account_id: String,

    pub person_id: Option<String>,

    /// ISO-4217 style code, e.g. "USD"
    #[validate(custom = "validate_currency")]
    pub currency: String,

    pub amount: Decimal,

    pub tenant_id: Option<String>,
}

fn validate_currency(currency: &str) -> Result<(), ValidationError> {
    if currency.len() == 3 && currency.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("currency");
        err.message = Some("currency must be a 3-letter code".into());
        Err(err)
    }
}

impl From<BalanceEvent> for Balance {
    fn from(event: BalanceEvent) -> Self {
        Self {
            id: None,
            account_id: event.account_id,
            person_id: event.person_id,
            currency: event.currency.to_ascii_uppercase(),
            amount: event.amount,
            created_at: None,
            updated_at: None,
            tenant_id: event.tenant_id,
            last_updated_by: None,
        }
    }
}

// ========== RESPONSE MODELS ==========

/// Per-item result of a batch reconcile
#[derive(Debug, Serialize)]
pub struct BatchItemResult {
    pub account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ReconcileOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItemResult {
    pub fn new(account_id: String, result: Result<ReconcileOutcome, StoreError>) -> Self {
        match result {
            Ok(outcome) => Self {
                account_id,
                outcome: Some(outcome),
                error_code: None,
                error: None,
            },
            Err(err) => Self {
                account_id,
                outcome: None,
                error_code: Some(err.kind().as_str().to_string()),
                error: Some(err.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchItemResult>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub id: i64,
    pub deleted: bool,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}
