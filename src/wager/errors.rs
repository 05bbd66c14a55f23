//! Peer wager error types.

use thiserror::Error;

use super::models::WagerState;
use crate::ledger::LedgerError;
use crate::uow::UowError;

/// Peer wager errors
#[derive(Debug, Error)]
pub enum PeerWagerError {
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
    #[error("Wager not found: {0}")]
    NotFound(i64),

    /// Wagering against oneself
    #[error("Cannot wager against yourself")]
    SelfWager,

    /// Amount must be positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Condition text is empty
    #[error("Wager condition must not be empty")]
    EmptyCondition,

    /// A party's available balance does not cover the stake
    #[error("User {user_id} has insufficient funds: available {available}, required {required}")]
    InsufficientFunds {
        user_id: i64,
        required: i64,
        available: i64,
    },

    /// Someone other than the target tried to respond
    #[error("User {user_id} is not the target of wager {wager_id}")]
    NotTarget { wager_id: i64, user_id: i64 },

    /// Someone other than the proposer tried to cancel
    #[error("User {user_id} is not the proposer of wager {wager_id}")]
    NotProposer { wager_id: i64, user_id: i64 },

    /// Wager not in the state the operation requires
    #[error("Wager not in correct state: expected {expected}, got {actual}")]
    InvalidState {
        expected: WagerState,
        actual: WagerState,
    },

    /// Participants may not vote on their own wager
    #[error("Participants cannot vote on their own wager")]
    ParticipantVote,

    /// Votes must back one of the two participants
    #[error("Vote must back one of the wager participants")]
    VoteForNonParticipant,

    /// Another resolution attempt won the race
    #[error("Wager {0} was concurrently resolved")]
    ResolutionConflict(i64),
}

/// Result type for peer wager operations
pub type PeerWagerResult<T> = Result<T, PeerWagerError>;
