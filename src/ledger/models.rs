//! Ledger data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// User account row. Mutated only through ledger operations, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub user_id: i64,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Point-in-time read of a balance. `available` is recomputed on every read:
/// balance minus stakes tied up in unresolved wagers. Never cached.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AccountView {
    pub user_id: i64,
    pub balance: i64,
    pub available: i64,
}

/// Why a balance changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    InitialGrant,
    BetWin,
    BetLoss,
    PeerWagerWin,
    PeerWagerLoss,
    GroupWagerWin,
    GroupWagerLoss,
    TransferIn,
    TransferOut,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionKind::InitialGrant => "initial_grant",
            TransactionKind::BetWin => "bet_win",
            TransactionKind::BetLoss => "bet_loss",
            TransactionKind::PeerWagerWin => "peer_wager_win",
            TransactionKind::PeerWagerLoss => "peer_wager_loss",
            TransactionKind::GroupWagerWin => "group_wager_win",
            TransactionKind::GroupWagerLoss => "group_wager_loss",
            TransactionKind::TransferIn => "transfer_in",
            TransactionKind::TransferOut => "transfer_out",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial_grant" => Ok(TransactionKind::InitialGrant),
            "bet_win" => Ok(TransactionKind::BetWin),
            "bet_loss" => Ok(TransactionKind::BetLoss),
            "peer_wager_win" => Ok(TransactionKind::PeerWagerWin),
            "peer_wager_loss" => Ok(TransactionKind::PeerWagerLoss),
            "group_wager_win" => Ok(TransactionKind::GroupWagerWin),
            "group_wager_loss" => Ok(TransactionKind::GroupWagerLoss),
            "transfer_in" => Ok(TransactionKind::TransferIn),
            "transfer_out" => Ok(TransactionKind::TransferOut),
            other => Err(other.to_string()),
        }
    }
}

/// Kind-specific audit payload, persisted as JSON next to each history row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryDetail {
    /// Initial account grant.
    Grant,
    /// Single-shot probability bet.
    Bet { probability: f64, won: bool },
    /// Peer wager settlement against an opponent.
    PeerWager { opponent_id: i64 },
    /// Group wager settlement on a chosen option.
    GroupWager { option_id: i64 },
    /// Transfer to or from another user.
    Transfer { counterpart_id: i64 },
}

/// Immutable audit record of one balance mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub id: i64,
    pub user_id: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    /// Signed change; always `balance_after - balance_before`.
    pub amount: i64,
    pub kind: TransactionKind,
    pub detail: EntryDetail,
    /// Originating wager or bet, when there is one.
    pub wager_ref: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Result of a funds transfer between two users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub from_entry_id: i64,
    pub to_entry_id: i64,
    pub from_balance: i64,
    pub to_balance: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_text() {
        let kinds = [
            TransactionKind::InitialGrant,
            TransactionKind::BetWin,
            TransactionKind::BetLoss,
            TransactionKind::PeerWagerWin,
            TransactionKind::PeerWagerLoss,
            TransactionKind::GroupWagerWin,
            TransactionKind::GroupWagerLoss,
            TransactionKind::TransferIn,
            TransactionKind::TransferOut,
        ];
        for kind in kinds {
            let parsed: TransactionKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!("house_edge".parse::<TransactionKind>().is_err());
    }

    #[test]
    fn test_detail_serializes_tagged() {
        let detail = EntryDetail::Bet {
            probability: 0.25,
            won: true,
        };
        let json = serde_json::to_string(&detail).unwrap();
        assert!(json.contains("\"type\":\"bet\""));
        let back: EntryDetail = serde_json::from_str(&json).unwrap();
        assert_eq!(back, detail);
    }
}
