use super::gateway::{BalanceGateway, BalanceTx};
use super::models::*;
use crate::context::OpContext;
use crate::error::StoreError;
use crate::config::Config;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use std::time::Duration;
use tracing::{debug, error, info};

/// Postgres-backed balance repository - the durable side of reconciliation
#[derive(Clone)]
pub struct BalanceRepository {
    pool: PgPool,
}

impl BalanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build the pool from configuration and prove it with one round trip.
    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        info!("📊 Connecting to database at {}:{}...", config.db_host, config.db_port);

        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(&config.database_url())
            .await
            .map_err(StoreError::connection)?;

        info!("✓ Database pool configured: {} max connections", config.db_max_connections);
        Ok(Self::new(pool))
    }

    /// Live pool handle, shared by every transaction.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BalanceGateway for BalanceRepository {
    type Tx = PgBalanceTx;

    async fn ping(&self, ctx: &OpContext) -> Result<bool, StoreError> {
        debug!(parent: ctx.span(), "ping");

        ctx.run(async {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(StoreError::connection)?;
            Ok(true)
        })
        .await
    }

    async fn begin(&self, ctx: &OpContext) -> Result<PgBalanceTx, StoreError> {
        debug!(parent: ctx.span(), "begin transaction");

        let tx = ctx
            .run(async { self.pool.begin().await.map_err(StoreError::session) })
            .await?;
        Ok(PgBalanceTx { tx })
    }
}

/// One open Postgres transaction. Dropped without commit, it rolls back.
pub struct PgBalanceTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl BalanceTx for PgBalanceTx {
    async fn lookup_by_account(
        &mut self,
        ctx: &OpContext,
        account_id: &str,
    ) -> Result<Lookup, StoreError> {
        debug!(parent: ctx.span(), account_id, "lookup by account");

        let row = ctx
            .run(async {
                sqlx::query_as::<_, BalanceRow>(
                    r#"
                    SELECT id, account_id, person_id, currency, amount,
                           created_at, updated_at, tenant_id, last_updated_by
                    FROM balance_cdc
                    WHERE account_id = $1
                    ORDER BY id
                    LIMIT 1
                    FOR UPDATE
                    "#,
                )
                .bind(account_id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(StoreError::query)
            })
            .await?;

        match row {
            Some(row) => Ok(Lookup::Found(Balance::try_from(row)?)),
            None => Ok(Lookup::Absent),
        }
    }

    async fn insert(&mut self, ctx: &OpContext, balance: &Balance) -> Result<Balance, StoreError> {
        debug!(parent: ctx.span(), account_id = %balance.account_id, "insert");

        let row = ctx
            .run(async {
                sqlx::query_as::<_, BalanceRow>(
                    r#"
                    INSERT INTO balance_cdc (
                        account_id, person_id, currency, amount,
                        created_at, tenant_id, last_updated_by
                    )
                    VALUES ($1, $2, $3, $4, NOW(), $5, $6)
                    RETURNING id, account_id, person_id, currency, amount,
                              created_at, updated_at, tenant_id, last_updated_by
                    "#,
                )
                .bind(&balance.account_id)
                .bind(&balance.person_id)
                .bind(&balance.currency)
                .bind(balance.amount)
                .bind(&balance.tenant_id)
                .bind(PROVENANCE_CDC)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(|e| {
                    error!(parent: ctx.span(), error = %e, "insert statement failed");
                    StoreError::insert(&balance.account_id, e)
                })
            })
            .await?;

        Balance::try_from(row)
    }

    async fn update_by_id(
        &mut self,
        ctx: &OpContext,
        id: i64,
        balance: &Balance,
    ) -> Result<bool, StoreError> {
        debug!(parent: ctx.span(), id, "update by id");

        let result = ctx
            .run(async {
                sqlx::query(
                    r#"
                    UPDATE balance_cdc
                    SET account_id = $2,
                        person_id = $3,
                        currency = $4,
                        amount = $5,
                        tenant_id = $6,
                        updated_at = NOW(),
                        last_updated_by = $7
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(&balance.account_id)
                .bind(&balance.person_id)
                .bind(&balance.currency)
                .bind(balance.amount)
                .bind(&balance.tenant_id)
                .bind(PROVENANCE_CDC)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| {
                    error!(parent: ctx.span(), error = %e, "update statement failed");
                    StoreError::update(id, e)
                })
            })
            .await?;

        debug!(parent: ctx.span(), rows_affected = result.rows_affected(), "update applied");
        Ok(true)
    }

    async fn delete(&mut self, ctx: &OpContext, id: i64) -> Result<bool, StoreError> {
        debug!(parent: ctx.span(), id, "delete");

        let result = ctx
            .run(async {
                sqlx::query("DELETE FROM balance_cdc WHERE id = $1")
                    .bind(id)
                    .execute(&mut *self.tx)
                    .await
                    .map_err(|e| StoreError::delete(id, e))
            })
            .await?;

        debug!(parent: ctx.span(), rows_affected = result.rows_affected(), "delete applied");
        Ok(true)
    }

    async fn commit(self, ctx: &OpContext) -> Result<(), StoreError> {
        ctx.check()?;
        debug!(parent: ctx.span(), "commit");

        self.tx.commit().await.map_err(StoreError::session)
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(StoreError::session)
    }
}
