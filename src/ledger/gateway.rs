use async_trait::async_trait;

use super::models::{Balance, Lookup};
use crate::context::OpContext;
use crate::error::StoreError;

/// Persistence gateway - owns the connection pool and hands out transactions.
#[async_trait]
pub trait BalanceGateway: Send + Sync + 'static {
    type Tx: BalanceTx;

    /// Liveness probe. Unreachable store reports `ConnectionFailure`.
    async fn ping(&self, ctx: &OpContext) -> Result<bool, StoreError>;

    /// Open a transaction. Nothing is auto-committed: the caller must call
    /// [`BalanceTx::commit`] or [`BalanceTx::rollback`]. Dropping the handle
    /// rolls back.
    async fn begin(&self, ctx: &OpContext) -> Result<Self::Tx, StoreError>;
}

/// Primitive storage operations scoped to one open transaction.
#[async_trait]
pub trait BalanceTx: Send + Sized {
    /// First row for `account_id`, locked for the rest of the transaction.
    async fn lookup_by_account(
        &mut self,
        ctx: &OpContext,
        account_id: &str,
    ) -> Result<Lookup, StoreError>;

    /// Insert a new row stamped with the store clock and the CDC provenance
    /// tag. Returns the stored row.
    async fn insert(&mut self, ctx: &OpContext, balance: &Balance) -> Result<Balance, StoreError>;

    /// Rewrite the mutable fields of row `id` and stamp `updated_at`.
    ///
    /// Returns `true` once the statement executed; the affected-row count is
    /// only logged.
    async fn update_by_id(
        &mut self,
        ctx: &OpContext,
        id: i64,
        balance: &Balance,
    ) -> Result<bool, StoreError>;

    async fn delete(&mut self, ctx: &OpContext, id: i64) -> Result<bool, StoreError>;

    /// Refuses a context that is already done. Once issued, the commit runs to
    /// completion so its result always reaches the caller.
    async fn commit(self, ctx: &OpContext) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}
