//! Single-shot bet placement and settlement.

use chrono::Utc;
use rand::Rng;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::sync::Arc;

use super::errors::{BetError, BetResult};
use super::models::{Bet, PlacedBet, RiskCheck, RiskConfig};
use super::risk;
use crate::ledger::{EntryDetail, TransactionKind, repo as ledger_repo};
use crate::uow::{DomainEvent, EventKind, EventSink, UnitOfWork};

/// Bet manager
#[derive(Clone)]
pub struct BetManager {
    pool: SqlitePool,
    sink: Arc<dyn EventSink>,
    risk: RiskConfig,
}

impl BetManager {
    /// Create a new bet manager
    pub fn new(pool: SqlitePool, sink: Arc<dyn EventSink>, risk: RiskConfig) -> Self {
        Self { pool, sink, risk }
    }

    /// Place and settle a bet at the given win probability.
    ///
    /// The stake must be covered by the user's available balance and admitted
    /// by the daily risk guard. The outcome is rolled immediately; a win
    /// credits the fair-odds win amount, a loss deducts the stake, and either
    /// way the bet is stored with a link to its ledger entry.
    pub async fn place_bet(
        &self,
        user_id: i64,
        stake: i64,
        probability: f64,
    ) -> BetResult<PlacedBet> {
        if stake <= 0 {
            return Err(BetError::InvalidStake(stake));
        }
        if !(probability > 0.0 && probability < 1.0) {
            return Err(BetError::InvalidProbability(probability));
        }

        let now = Utc::now();
        let mut uow = UnitOfWork::begin(&self.pool, self.sink.clone()).await?;

        let check = risk::admit(uow.conn()?, &self.risk, user_id, stake, now).await?;

        let view = ledger_repo::fetch_view(uow.conn()?, user_id).await?;
        if view.available < stake {
            return Err(BetError::InsufficientFunds {
                user_id,
                required: stake,
                available: view.available,
            });
        }

        let won = rand::rng().random_bool(probability);
        // Fair odds: stake × (1 − p) / p, never less than one unit.
        let win_amount =
            (((stake as f64) * (1.0 - probability) / probability).round() as i64).max(1);

        let bet_id: i64 = sqlx::query_scalar(
            "INSERT INTO bets (user_id, stake, probability, won, win_amount, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING id",
        )
        .bind(user_id)
        .bind(stake)
        .bind(probability)
        .bind(won)
        .bind(win_amount)
        .bind(now)
        .fetch_one(uow.conn()?)
        .await?;

        let (net, kind) = if won {
            (win_amount, TransactionKind::BetWin)
        } else {
            (-stake, TransactionKind::BetLoss)
        };
        let change = ledger_repo::apply_change(
            uow.conn()?,
            user_id,
            net,
            kind,
            &EntryDetail::Bet { probability, won },
            Some(bet_id),
        )
        .await?;

        sqlx::query("UPDATE bets SET entry_id = ?1 WHERE id = ?2")
            .bind(change.entry_id)
            .bind(bet_id)
            .execute(uow.conn()?)
            .await?;

        let bet = fetch_bet(uow.conn()?, bet_id).await?;
        uow.publish(DomainEvent::new(EventKind::BalanceChanged {
            user_id,
            kind,
            amount: net,
            balance_after: change.balance_after,
        }));
        uow.commit().await?;

        log::info!(
            "User {user_id} bet {stake} at p={probability:.3} and {}",
            if won { "won" } else { "lost" }
        );
        Ok(PlacedBet {
            bet,
            balance_after: change.balance_after,
            risk: check,
        })
    }

    /// Current window usage without placing a bet.
    pub async fn daily_risk(&self, user_id: i64) -> BetResult<RiskCheck> {
        let mut conn = self.pool.acquire().await?;
        let since = risk::window_start(Utc::now(), self.risk.reset_hour_utc);
        let risked = risk::risked_since(&mut *conn, user_id, since).await?;
        Ok(RiskCheck {
            risked,
            remaining: (self.risk.daily_limit - risked).max(0),
        })
    }
}

async fn fetch_bet(conn: &mut SqliteConnection, bet_id: i64) -> BetResult<Bet> {
    let row = sqlx::query(
        "SELECT id, user_id, stake, probability, won, win_amount, entry_id, created_at
         FROM bets WHERE id = ?1",
    )
    .bind(bet_id)
    .fetch_one(conn)
    .await?;

    Ok(Bet {
        id: row.get("id"),
        user_id: row.get("user_id"),
        stake: row.get("stake"),
        probability: row.get("probability"),
        won: row.get("won"),
        win_amount: row.get("win_amount"),
        entry_id: row.get("entry_id"),
        created_at: row.get("created_at"),
    })
}
