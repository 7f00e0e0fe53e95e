use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::StoreError;

/// Provenance tag stamped on every row this worker writes.
pub const PROVENANCE_CDC: &str = "CDC";

/// Balance entity - one row per account, keyed by `account_id`.
///
/// A value built from an upstream event carries no `id`, `created_at` or
/// `updated_at`; those are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub account_id: String,
    #[serde(default)]
    pub person_id: Option<String>,
    pub currency: String,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_by: Option<String>,
}

impl Balance {
    pub fn new(
        account_id: impl Into<String>,
        currency: impl Into<String>,
        amount: Decimal,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            account_id: account_id.into(),
            person_id: None,
            currency: currency.into(),
            amount,
            created_at: None,
            updated_at: None,
            tenant_id: Some(tenant_id.into()),
            last_updated_by: None,
        }
    }

    pub fn with_person(mut self, person_id: impl Into<String>) -> Self {
        self.person_id = Some(person_id.into());
        self
    }
}

/// Raw `balance_cdc` row as the driver hands it back.
#[derive(Debug, FromRow)]
pub(crate) struct BalanceRow {
    pub id: i64,
    pub account_id: String,
    pub person_id: Option<String>,
    pub currency: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub tenant_id: Option<String>,
    pub last_updated_by: Option<String>,
}

impl TryFrom<BalanceRow> for Balance {
    type Error = StoreError;

    fn try_from(row: BalanceRow) -> Result<Self, Self::Error> {
        if row.account_id.is_empty() {
            return Err(StoreError::DecodeFailure(format!(
                "row {} has an empty account_id",
                row.id
            )));
        }

        Ok(Balance {
            id: Some(row.id),
            account_id: row.account_id,
            person_id: row.person_id,
            currency: row.currency,
            amount: row.amount,
            created_at: Some(row.created_at),
            updated_at: row.updated_at,
            tenant_id: row.tenant_id,
            last_updated_by: row.last_updated_by,
        })
    }
}

/// Outcome of a natural-key lookup.
///
/// A miss is an ordinary answer here, not an error; failures travel as
/// `Err(StoreError)` beside it.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(Balance),
    Absent,
}

impl Lookup {
    /// Promote a miss to [`StoreError::NotFound`] for callers that need a row.
    pub fn found_or_not_found(self, account_id: &str) -> Result<Balance, StoreError> {
        match self {
            Lookup::Found(balance) => Ok(balance),
            Lookup::Absent => Err(StoreError::NotFound(account_id.to_string())),
        }
    }
}

/// Which branch a reconciliation took.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ReconcileOutcome {
    Inserted { balance: Balance },
    Updated { id: i64 },
}

impl ReconcileOutcome {
    pub fn id(&self) -> Option<i64> {
        match self {
            ReconcileOutcome::Inserted { balance } => balance.id,
            ReconcileOutcome::Updated { id } => Some(*id),
        }
    }
}
