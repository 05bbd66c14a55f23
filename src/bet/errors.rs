//! Bet error types.

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::uow::UowError;

/// Bet errors
#[derive(Debug, Error)]
pub enum BetError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Ledger error (settlement)
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Unit of work error
    #[error("Unit of work error: {0}")]
    Uow(#[from] UowError),

    /// Stake must be positive
    #[error("Invalid stake: {0}")]
    InvalidStake(i64),

    /// Probability must be strictly between 0 and 1
    #[error("Invalid win probability: {0}")]
    InvalidProbability(f64),

    /// Available balance does not cover the stake
    #[error("User {user_id} has insufficient funds: available {available}, required {required}")]
    InsufficientFunds {
        user_id: i64,
        required: i64,
        available: i64,
    },

    /// Bet would push the user past the daily risk ceiling
    #[error("Daily risk limit of {limit} exceeded: {risked} already at risk, {remaining} remaining")]
    DailyLimitExceeded {
        limit: i64,
        risked: i64,
        remaining: i64,
    },
}

/// Result type for bet operations
pub type BetResult<T> = Result<T, BetError>;
