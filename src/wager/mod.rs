//! Peer wager engine.
//!
//! Two-party wagers resolved by a majority vote of third parties. The state
//! machine is `proposed → voting → resolved`, with `proposed → declined` as
//! the only other legal transition.

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{PeerWagerError, PeerWagerResult};
pub use manager::PeerWagerManager;
pub use models::{PeerWager, VoteOutcome, VotePolicy, WagerState, WagerVote};
