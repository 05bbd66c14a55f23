//! Group wager data models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Group wager lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupWagerState {
    Active,
    PendingResolution,
    Resolved,
    Cancelled,
}

impl GroupWagerState {
    /// States a resolver may settle from.
    pub fn is_resolvable(self) -> bool {
        matches!(self, GroupWagerState::Active | GroupWagerState::PendingResolution)
    }
}

impl std::fmt::Display for GroupWagerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GroupWagerState::Active => "active",
            GroupWagerState::PendingResolution => "pending_resolution",
            GroupWagerState::Resolved => "resolved",
            GroupWagerState::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl FromStr for GroupWagerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(GroupWagerState::Active),
            "pending_resolution" => Ok(GroupWagerState::PendingResolution),
            "resolved" => Ok(GroupWagerState::Resolved),
            "cancelled" => Ok(GroupWagerState::Cancelled),
            other => Err(other.to_string()),
        }
    }
}

/// Pooled wager with N options and a voting window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupWager {
    pub id: i64,
    pub guild_id: i64,
    pub creator_id: i64,
    pub condition: String,
    pub state: GroupWagerState,
    pub min_participants: i64,
    /// Sum of all participant stakes. Always equals the sum of option totals.
    pub pot: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub resolver_id: Option<i64>,
    pub winning_option_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// One option of a group wager, in stable display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupWagerOption {
    pub id: i64,
    pub wager_id: i64,
    pub label: String,
    pub position: i64,
    /// Sum of stakes currently assigned to this option.
    pub total: i64,
}

/// One row per (wager, user): chosen option and current stake. The stake is
/// replaced, not accumulated, when the user changes their bet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupWagerParticipant {
    pub id: i64,
    pub wager_id: i64,
    pub user_id: i64,
    pub option_id: i64,
    pub stake: i64,
    /// Set at resolution: winner's share of the pot, 0 for losers.
    pub payout: Option<i64>,
    /// Ledger entry written at resolution, when the net change was nonzero.
    pub entry_id: Option<i64>,
}

/// Wager with its options and participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupWagerDetail {
    pub wager: GroupWager,
    pub options: Vec<GroupWagerOption>,
    pub participants: Vec<GroupWagerParticipant>,
}

/// Outcome of a resolution: the settled wager and every participant with
/// their payout recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupWagerResolution {
    pub wager: GroupWager,
    pub participants: Vec<GroupWagerParticipant>,
}

/// Group wager engine configuration.
#[derive(Debug, Clone)]
pub struct GroupWagerConfig {
    /// Fewest participants a wager needs before it can be resolved.
    pub min_participants: i64,
    /// Bounds on the voting window requested at creation.
    pub min_voting_period: Duration,
    pub max_voting_period: Duration,
}

impl Default for GroupWagerConfig {
    fn default() -> Self {
        Self {
            min_participants: 2,
            min_voting_period: Duration::minutes(5),
            max_voting_period: Duration::days(7),
        }
    }
}
