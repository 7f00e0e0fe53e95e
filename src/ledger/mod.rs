pub mod gateway;
pub mod models;
pub mod repository;

#[cfg(test)]
pub mod memory;

pub use gateway::{BalanceGateway, BalanceTx};
pub use models::{Balance, Lookup, ReconcileOutcome, PROVENANCE_CDC};
pub use repository::{BalanceRepository, PgBalanceTx};
