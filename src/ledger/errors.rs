//! Ledger error types.

use thiserror::Error;

use crate::uow::UowError;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unit of work error
    #[error("Unit of work error: {0}")]
    Uow(#[from] UowError),

    /// Audit detail serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Account not found
    #[error("Account not found for user {0}")]
    AccountNotFound(i64),

    /// Amount must be positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Available balance too low for a deduction
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { required: i64, available: i64 },

    /// Transfer to oneself
    #[error("Cannot transfer funds to yourself")]
    SelfTransfer,

    /// History row carries a transaction kind this build does not know
    #[error("Unknown transaction kind in history: {0}")]
    UnknownKind(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
