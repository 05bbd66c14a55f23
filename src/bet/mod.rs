//! Single-shot probability bets and the daily risk guard.
//!
//! A bet settles immediately: the outcome is rolled against the chosen win
//! probability and the balance is credited or deducted in the same unit of
//! work. The risk guard caps the total stake a user may put at risk within a
//! rolling daily window.

pub mod errors;
pub mod manager;
pub mod models;
pub mod risk;

pub use errors::{BetError, BetResult};
pub use manager::BetManager;
pub use models::{Bet, PlacedBet, RiskCheck, RiskConfig};
