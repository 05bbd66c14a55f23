//! Group wager engine.
//!
//! Multi-option pooled wagers: users stake on one of N options inside a
//! time-boxed betting window, and an authorized resolver picks the winning
//! option. Winners split the pot in proportion to their stake within the
//! winning option.

pub mod errors;
pub mod manager;
pub mod models;
pub mod payout;

pub use errors::{GroupWagerError, GroupWagerResult};
pub use manager::{GroupWagerManager, ResolverAllowList, ResolverPolicy};
pub use models::{
    GroupWager, GroupWagerConfig, GroupWagerDetail, GroupWagerOption, GroupWagerParticipant,
    GroupWagerResolution, GroupWagerState,
};
pub use payout::proportional_payout;
