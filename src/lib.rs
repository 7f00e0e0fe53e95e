pub mod api;
pub mod bootstrap;
pub mod config;
pub mod context;
pub mod error;
pub mod ledger;
pub mod reconcile;
pub mod server;

pub use context::{CancelHandle, OpContext};
pub use error::{AppError, AppResult, ErrorKind, StoreError};
pub use ledger::{Balance, BalanceGateway, BalanceRepository, BalanceTx, Lookup, ReconcileOutcome};
pub use reconcile::ReconciliationService;
