//! In-process gateway for unit tests.
//!
//! Follows the Postgres contract closely enough to exercise the service:
//! each transaction keeps a private write overlay that only reaches the shared
//! table on commit. An empty `account_id` is refused on insert, and
//! `account_id` is unique both at insert time and at commit time. Faults and hooks let tests break individual steps.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Barrier, Mutex};
use tracing::debug;

use super::gateway::{BalanceGateway, BalanceTx};
use super::models::{Balance, Lookup, PROVENANCE_CDC};
use crate::context::{CancelHandle, OpContext};
use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Unreachable,
    Begin,
    Lookup,
    Insert,
    Update,
    Delete,
    Commit,
}

#[derive(Default)]
struct Table {
    rows: BTreeMap<i64, Balance>,
    next_id: i64,
}

#[derive(Default)]
struct Hooks {
    cancel_after_lookup: Option<CancelHandle>,
    barrier_after_lookup: Option<Arc<Barrier>>,
}

#[derive(Clone, Default)]
pub struct MemoryGateway {
    table: Arc<Mutex<Table>>,
    faults: Arc<Mutex<HashSet<Fault>>>,
    hooks: Arc<Mutex<Hooks>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn inject(&self, fault: Fault) {
        self.faults.lock().await.insert(fault);
    }

    pub async fn clear(&self, fault: Fault) {
        self.faults.lock().await.remove(&fault);
    }

    /// Cancel `handle` as soon as the next lookup returns.
    pub async fn cancel_after_lookup(&self, handle: CancelHandle) {
        self.hooks.lock().await.cancel_after_lookup = Some(handle);
    }

    /// Make every lookup wait on `barrier` before returning.
    pub async fn barrier_after_lookup(&self, barrier: Arc<Barrier>) {
        self.hooks.lock().await.barrier_after_lookup = Some(barrier);
    }

    /// Committed rows, ordered by id.
    pub async fn rows(&self) -> Vec<Balance> {
        self.table.lock().await.rows.values().cloned().collect()
    }

    pub async fn rows_for(&self, account_id: &str) -> Vec<Balance> {
        self.rows()
            .await
            .into_iter()
            .filter(|b| b.account_id == account_id)
            .collect()
    }

    async fn has(&self, fault: Fault) -> bool {
        self.faults.lock().await.contains(&fault)
    }
}

#[async_trait]
impl BalanceGateway for MemoryGateway {
    type Tx = MemoryTx;

    async fn ping(&self, ctx: &OpContext) -> Result<bool, StoreError> {
        ctx.run(async {
            if self.has(Fault::Unreachable).await {
                return Err(StoreError::ConnectionFailure("store unreachable".into()));
            }
            Ok(true)
        })
        .await
    }

    async fn begin(&self, ctx: &OpContext) -> Result<MemoryTx, StoreError> {
        ctx.run(async {
            if self.has(Fault::Begin).await {
                return Err(StoreError::SessionFailure("cannot open session".into()));
            }
            Ok(MemoryTx {
                gateway: self.clone(),
                writes: BTreeMap::new(),
            })
        })
        .await
    }
}

pub struct MemoryTx {
    gateway: MemoryGateway,
    /// `None` marks a deleted row.
    writes: BTreeMap<i64, Option<Balance>>,
}

impl MemoryTx {
    /// Committed rows with this transaction's writes laid over them.
    fn view(&self, table: &Table) -> BTreeMap<i64, Balance> {
        let mut rows = table.rows.clone();
        for (id, write) in &self.writes {
            match write {
                Some(row) => rows.insert(*id, row.clone()),
                None => rows.remove(id),
            };
        }
        rows
    }
}

#[async_trait]
impl BalanceTx for MemoryTx {
    async fn lookup_by_account(
        &mut self,
        ctx: &OpContext,
        account_id: &str,
    ) -> Result<Lookup, StoreError> {
        let lookup = ctx
            .run(async {
                if self.gateway.has(Fault::Lookup).await {
                    return Err(StoreError::QueryFailure("lookup failed".into()));
                }
                let table = self.gateway.table.lock().await;
                Ok(self
                    .view(&table)
                    .into_values()
                    .find(|b| b.account_id == account_id)
                    .map_or(Lookup::Absent, Lookup::Found))
            })
            .await?;

        let (cancel, barrier) = {
            let mut hooks = self.gateway.hooks.lock().await;
            (
                hooks.cancel_after_lookup.take(),
                hooks.barrier_after_lookup.clone(),
            )
        };
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }
        if let Some(handle) = cancel {
            handle.cancel();
        }

        Ok(lookup)
    }

    async fn insert(&mut self, ctx: &OpContext, balance: &Balance) -> Result<Balance, StoreError> {
        ctx.run(async {
            if self.gateway.has(Fault::Insert).await {
                return Err(StoreError::InsertFailure {
                    account_id: balance.account_id.clone(),
                    conflict: false,
                    message: "write rejected".into(),
                });
            }

            if balance.account_id.is_empty() {
                return Err(StoreError::InsertFailure {
                    account_id: String::new(),
                    conflict: false,
                    message: "account_id must not be empty".into(),
                });
            }

            let mut table = self.gateway.table.lock().await;
            if self
                .view(&table)
                .values()
                .any(|b| b.account_id == balance.account_id)
            {
                return Err(StoreError::InsertFailure {
                    account_id: balance.account_id.clone(),
                    conflict: true,
                    message: "duplicate account_id".into(),
                });
            }

            table.next_id += 1;
            let row = Balance {
                id: Some(table.next_id),
                created_at: Some(Utc::now()),
                updated_at: None,
                last_updated_by: Some(PROVENANCE_CDC.to_string()),
                ..balance.clone()
            };
            self.writes.insert(table.next_id, Some(row.clone()));
            Ok(row)
        })
        .await
    }

    async fn update_by_id(
        &mut self,
        ctx: &OpContext,
        id: i64,
        balance: &Balance,
    ) -> Result<bool, StoreError> {
        ctx.run(async {
            if self.gateway.has(Fault::Update).await {
                return Err(StoreError::UpdateFailure {
                    id,
                    message: "write rejected".into(),
                });
            }

            let table = self.gateway.table.lock().await;
            let existing = self.view(&table).remove(&id);
            drop(table);

            let rows_affected = match existing {
                Some(existing) => {
                    let row = Balance {
                        id: Some(id),
                        created_at: existing.created_at,
                        updated_at: Some(Utc::now()),
                        last_updated_by: Some(PROVENANCE_CDC.to_string()),
                        ..balance.clone()
                    };
                    self.writes.insert(id, Some(row));
                    1
                }
                None => 0,
            };
            debug!(parent: ctx.span(), rows_affected, "update applied");
            Ok(true)
        })
        .await
    }

    async fn delete(&mut self, ctx: &OpContext, id: i64) -> Result<bool, StoreError> {
        ctx.run(async {
            if self.gateway.has(Fault::Delete).await {
                return Err(StoreError::DeleteFailure {
                    id,
                    message: "write rejected".into(),
                });
            }
            self.writes.insert(id, None);
            Ok(true)
        })
        .await
    }

    async fn commit(self, ctx: &OpContext) -> Result<(), StoreError> {
        ctx.check()?;
        if self.gateway.has(Fault::Commit).await {
            return Err(StoreError::SessionFailure("commit failed".into()));
        }

        let mut table = self.gateway.table.lock().await;
        for (id, write) in &self.writes {
            if let Some(row) = write {
                let taken = table
                    .rows
                    .values()
                    .any(|b| b.account_id == row.account_id && b.id != Some(*id));
                if taken {
                    return Err(StoreError::InsertFailure {
                        account_id: row.account_id.clone(),
                        conflict: true,
                        message: "duplicate account_id".into(),
                    });
                }
            }
        }

        for (id, write) in self.writes {
            match write {
                Some(row) => table.rows.insert(id, row),
                None => table.rows.remove(&id),
            };
        }
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
