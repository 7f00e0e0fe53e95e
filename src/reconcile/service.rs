// Reconciliation Service - applies one upstream balance record to the store
//
// Per record, inside a single transaction:
// 1. Look up the current row by account_id (row locked)
// 2. Absent -> insert, Found -> update that row's id
// 3. Commit on success, roll back on any failure
//
// No retries here. The upstream collaborator owns redelivery.

use std::sync::Arc;

use tracing::{error, info, info_span, warn, Instrument};

use crate::context::OpContext;
use crate::error::{CancelCause, StoreError};
use crate::ledger::{Balance, BalanceGateway, BalanceTx, Lookup, ReconcileOutcome};

pub struct ReconciliationService<G: BalanceGateway> {
    gateway: Arc<G>,
}

impl<G: BalanceGateway> ReconciliationService<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Upsert `incoming` by its natural key.
    ///
    /// Returns the branch taken once the transaction is committed. Any error
    /// means nothing was written.
    pub async fn reconcile(
        &self,
        ctx: &OpContext,
        incoming: &Balance,
    ) -> Result<ReconcileOutcome, StoreError> {
        let span = info_span!(
            parent: ctx.span(),
            "reconcile",
            account_id = %incoming.account_id,
            tenant_id = incoming.tenant_id.as_deref().unwrap_or_default(),
        );

        async {
            let mut tx = self.gateway.begin(ctx).await?;

            match Self::apply(&mut tx, ctx, incoming).await {
                Ok(outcome) => {
                    tx.commit(ctx).await?;
                    info!(?outcome, "balance reconciled");
                    Ok(outcome)
                }
                Err(err) => {
                    warn!(kind = %err.kind(), error = %err, "reconcile aborted, rolling back");
                    if let Err(rollback_err) = tx.rollback().await {
                        error!(error = %rollback_err, "rollback failed");
                    }
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn apply(
        tx: &mut G::Tx,
        ctx: &OpContext,
        incoming: &Balance,
    ) -> Result<ReconcileOutcome, StoreError> {
        match tx.lookup_by_account(ctx, &incoming.account_id).await? {
            Lookup::Absent => {
                let balance = tx.insert(ctx, incoming).await?;
                Ok(ReconcileOutcome::Inserted { balance })
            }
            Lookup::Found(existing) => {
                let id = existing.id.ok_or_else(|| {
                    StoreError::DecodeFailure(format!(
                        "stored balance for {} has no id",
                        existing.account_id
                    ))
                })?;
                tx.update_by_id(ctx, id, incoming).await?;
                Ok(ReconcileOutcome::Updated { id })
            }
        }
    }

    /// Current stored balance for `account_id`.
    pub async fn current(&self, ctx: &OpContext, account_id: &str) -> Result<Balance, StoreError> {
        let mut tx = self.gateway.begin(ctx).await?;
        let lookup = tx.lookup_by_account(ctx, account_id).await;

        // Read-only: release the transaction without writing.
        if let Err(err) = tx.rollback().await {
            warn!(parent: ctx.span(), error = %err, "rollback after read failed");
        }
        lookup?.found_or_not_found(account_id)
    }

    /// Administrative delete by surrogate id.
    pub async fn remove(&self, ctx: &OpContext, id: i64) -> Result<bool, StoreError> {
        let mut tx = self.gateway.begin(ctx).await?;

        match tx.delete(ctx, id).await {
            Ok(deleted) => {
                tx.commit(ctx).await?;
                info!(parent: ctx.span(), id, "balance removed");
                Ok(deleted)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!(parent: ctx.span(), error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    pub async fn ping(&self, ctx: &OpContext) -> Result<bool, StoreError> {
        self.gateway.ping(ctx).await
    }

    /// Reconcile every item on its own task. Results come back in input order
    /// and one item's failure never affects another.
    pub async fn reconcile_batch(
        self: &Arc<Self>,
        ctx: &OpContext,
        items: Vec<Balance>,
    ) -> Vec<Result<ReconcileOutcome, StoreError>> {
        let handles = items.into_iter().map(|item| {
            let service = Arc::clone(self);
            let ctx = ctx.clone();
            tokio::spawn(async move { service.reconcile(&ctx, &item).await })
        });

        futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => Err(StoreError::Canceled(CancelCause::Canceled)),
            })
            .collect()
    }
}
