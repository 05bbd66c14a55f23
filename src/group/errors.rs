//! Group wager error types.

use thiserror::Error;

use super::models::GroupWagerState;
use crate::ledger::LedgerError;
use crate::uow::UowError;

/// Group wager errors
#[derive(Debug, Error)]
pub enum GroupWagerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Ledger error (settlement, availability checks)
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Unit of work error
    #[error("Unit of work error: {0}")]
    Uow(#[from] UowError),

    /// Wager not found
    #[error("Group wager not found: {0}")]
    NotFound(i64),

    /// Option does not belong to the wager
    #[error("Option {option_id} does not belong to wager {wager_id}")]
    OptionNotFound { wager_id: i64, option_id: i64 },

    /// Condition text is empty
    #[error("Wager condition must not be empty")]
    EmptyCondition,

    /// Need at least two options
    #[error("A group wager needs at least two options, got {0}")]
    TooFewOptions(usize),

    /// Voting period outside the configured bounds
    #[error("Voting period of {got_secs}s outside allowed range [{min_secs}s, {max_secs}s]")]
    InvalidVotingPeriod {
        min_secs: i64,
        max_secs: i64,
        got_secs: i64,
    },

    /// Amount must be positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Voting window has elapsed
    #[error("Betting on wager {0} has closed")]
    BettingClosed(i64),

    /// Wager not in the state the operation requires
    #[error("Wager not in correct state: expected {expected}, got {actual}")]
    InvalidState {
        expected: GroupWagerState,
        actual: GroupWagerState,
    },

    /// Wager already settled or cancelled
    #[error("Wager cannot be resolved from state {actual}")]
    NotResolvable { actual: GroupWagerState },

    /// Resolver not on the authorization policy
    #[error("User {0} is not authorized to resolve group wagers")]
    UnauthorizedResolver(i64),

    /// Participant count below the configured minimum
    #[error("Too few participants to resolve: need {needed}, have {current}")]
    TooFewParticipants { needed: i64, current: i64 },

    /// All stakes sit on a single option; there is no opposing side to pay from
    #[error("Wager {0} has stakes on only one option and cannot be resolved")]
    SingleSidedPool(i64),

    /// Another resolution attempt won the race
    #[error("Wager {0} was concurrently resolved")]
    ResolutionConflict(i64),

    /// Available balance does not cover the bet increase
    #[error("User {user_id} has insufficient funds: available {available}, required {required}")]
    InsufficientFunds {
        user_id: i64,
        required: i64,
        available: i64,
    },
}

/// Result type for group wager operations
pub type GroupWagerResult<T> = Result<T, GroupWagerError>;
