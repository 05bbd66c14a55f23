//! Balance ledger and append-only audit trail.
//!
//! Owns user balances and the available-balance computation (balance minus
//! stakes reserved by unresolved wagers). Every balance mutation in the crate
//! goes through [`repo::apply_change`], which pairs the change with exactly
//! one immutable `balance_history` row in the same transaction.

pub mod errors;
pub mod manager;
pub mod models;
pub mod repo;

pub use errors::{LedgerError, LedgerResult};
pub use manager::AccountManager;
pub use models::{Account, AccountView, BalanceEntry, EntryDetail, TransactionKind, TransferReceipt};
pub use repo::AppliedChange;
