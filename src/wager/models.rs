//! Peer wager data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Peer wager lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WagerState {
    Proposed,
    Voting,
    Declined,
    Resolved,
}

impl std::fmt::Display for WagerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WagerState::Proposed => "proposed",
            WagerState::Voting => "voting",
            WagerState::Declined => "declined",
            WagerState::Resolved => "resolved",
        };
        write!(f, "{s}")
    }
}

impl FromStr for WagerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "proposed" => Ok(WagerState::Proposed),
            "voting" => Ok(WagerState::Voting),
            "declined" => Ok(WagerState::Declined),
            "resolved" => Ok(WagerState::Resolved),
            other => Err(other.to_string()),
        }
    }
}

/// Two-party wager on a free-text condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerWager {
    pub id: i64,
    pub guild_id: i64,
    pub proposer_id: i64,
    pub target_id: i64,
    pub amount: i64,
    pub condition: String,
    pub state: WagerState,
    pub winner_id: Option<i64>,
    pub proposer_entry_id: Option<i64>,
    pub target_entry_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl PeerWager {
    /// The participant who is not `user_id`. Caller guarantees `user_id` is a
    /// participant.
    pub fn opponent_of(&self, user_id: i64) -> i64 {
        if user_id == self.proposer_id {
            self.target_id
        } else {
            self.proposer_id
        }
    }

    pub fn is_participant(&self, user_id: i64) -> bool {
        user_id == self.proposer_id || user_id == self.target_id
    }
}

/// One vote per (wager, voter); a later vote replaces the earlier one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WagerVote {
    pub wager_id: i64,
    pub voter_id: i64,
    /// The participant this voter backs.
    pub backed_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Majority threshold for resolving a peer wager.
///
/// A side wins as soon as its vote count reaches `votes_to_win`. The
/// threshold is explicit configuration, not inferred from the voter pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VotePolicy {
    pub votes_to_win: u32,
}

impl VotePolicy {
    pub fn new(votes_to_win: u32) -> Self {
        Self {
            votes_to_win: votes_to_win.max(1),
        }
    }

    /// Whichever participant (if any) has reached the threshold.
    pub fn winner(&self, proposer_votes: u32, target_votes: u32, wager: &PeerWager) -> Option<i64> {
        if proposer_votes >= self.votes_to_win {
            Some(wager.proposer_id)
        } else if target_votes >= self.votes_to_win {
            Some(wager.target_id)
        } else {
            None
        }
    }
}

impl Default for VotePolicy {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Result of recording a vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub wager: PeerWager,
    pub proposer_votes: u32,
    pub target_votes: u32,
    /// Set when this vote pushed a side past the threshold and the wager was
    /// settled inline.
    pub resolved: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wager() -> PeerWager {
        PeerWager {
            id: 1,
            guild_id: 1,
            proposer_id: 10,
            target_id: 20,
            amount: 100,
            condition: "it rains tomorrow".to_string(),
            state: WagerState::Voting,
            winner_id: None,
            proposer_entry_id: None,
            target_entry_id: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    #[test]
    fn test_policy_requires_threshold() {
        let policy = VotePolicy::new(2);
        let w = wager();
        assert_eq!(policy.winner(1, 1, &w), None);
        assert_eq!(policy.winner(2, 1, &w), Some(10));
        assert_eq!(policy.winner(0, 2, &w), Some(20));
    }

    #[test]
    fn test_policy_floor_is_one_vote() {
        let policy = VotePolicy::new(0);
        let w = wager();
        assert_eq!(policy.winner(0, 0, &w), None);
        assert_eq!(policy.winner(1, 0, &w), Some(10));
    }

    #[test]
    fn test_state_round_trips_through_text() {
        for state in [
            WagerState::Proposed,
            WagerState::Voting,
            WagerState::Declined,
            WagerState::Resolved,
        ] {
            assert_eq!(state.to_string().parse::<WagerState>().unwrap(), state);
        }
    }
}
