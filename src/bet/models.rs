//! Bet data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Settled single-shot bet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub id: i64,
    pub user_id: i64,
    pub stake: i64,
    /// Win probability, strictly between 0 and 1.
    pub probability: f64,
    pub won: bool,
    /// Amount credited on a win; fair odds against the probability.
    pub win_amount: i64,
    /// Ledger entry this bet settled through.
    pub entry_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Result of placing a bet: the settled bet plus remaining daily headroom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedBet {
    pub bet: Bet,
    pub balance_after: i64,
    pub risk: RiskCheck,
}

/// Daily risk guard configuration.
#[derive(Debug, Clone, Copy)]
pub struct RiskConfig {
    /// Ceiling on total stakes within one window.
    pub daily_limit: i64,
    /// UTC hour at which the window resets.
    pub reset_hour_utc: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            daily_limit: 5_000,
            reset_hour_utc: 0,
        }
    }
}

/// Risked amount and remaining headroom within the current window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskCheck {
    pub risked: i64,
    pub remaining: i64,
}
