//! Peer wager state machine and settlement.

use chrono::Utc;
use sqlx::{Row, SqliteConnection, SqlitePool, sqlite::SqliteRow};
use std::str::FromStr;
use std::sync::Arc;

use super::errors::{PeerWagerError, PeerWagerResult};
use super::models::{PeerWager, VoteOutcome, VotePolicy, WagerState};
use crate::ledger::{EntryDetail, TransactionKind, repo as ledger_repo};
use crate::uow::{DomainEvent, EventKind, EventSink, UnitOfWork};

/// Peer wager manager
#[derive(Clone)]
pub struct PeerWagerManager {
    pool: SqlitePool,
    sink: Arc<dyn EventSink>,
    policy: VotePolicy,
}

impl PeerWagerManager {
    /// Create a new peer wager manager with the given majority policy
    pub fn new(pool: SqlitePool, sink: Arc<dyn EventSink>, policy: VotePolicy) -> Self {
        Self { pool, sink, policy }
    }

    /// Propose a wager against another user.
    ///
    /// Both parties must currently have the stake available. Funds are not
    /// held in a separate table; the reservation is implicit in the
    /// available-balance computation, which counts this wager from the moment
    /// it exists in `proposed`.
    pub async fn propose(
        &self,
        guild_id: i64,
        proposer_id: i64,
        target_id: i64,
        amount: i64,
        condition: &str,
    ) -> PeerWagerResult<PeerWager> {
        if proposer_id == target_id {
            return Err(PeerWagerError::SelfWager);
        }
        if amount <= 0 {
            return Err(PeerWagerError::InvalidAmount(amount));
        }
        let condition = condition.trim();
        if condition.is_empty() {
            return Err(PeerWagerError::EmptyCondition);
        }

        let mut uow = UnitOfWork::begin(&self.pool, self.sink.clone()).await?;

        for user_id in [proposer_id, target_id] {
            require_available(uow.conn()?, user_id, amount).await?;
        }

        let wager_id: i64 = sqlx::query_scalar(
            "INSERT INTO peer_wagers
                 (guild_id, proposer_id, target_id, amount, condition, state, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING id",
        )
        .bind(guild_id)
        .bind(proposer_id)
        .bind(target_id)
        .bind(amount)
        .bind(condition)
        .bind(WagerState::Proposed.to_string())
        .bind(Utc::now())
        .fetch_one(uow.conn()?)
        .await?;

        let wager = fetch_wager(uow.conn()?, wager_id).await?;
        uow.publish(DomainEvent::new(EventKind::PeerWagerProposed {
            wager_id,
            proposer_id,
            target_id,
            amount,
        }));
        uow.commit().await?;

        log::info!("User {proposer_id} proposed wager {wager_id} against {target_id} for {amount}");
        Ok(wager)
    }

    /// Accept or decline a proposed wager. Only the target may respond.
    ///
    /// Accepting re-validates that both parties' balances still back the
    /// stake, which may have changed since the proposal, and moves the wager
    /// to `voting`. Declining is terminal.
    pub async fn respond(
        &self,
        wager_id: i64,
        responder_id: i64,
        accept: bool,
    ) -> PeerWagerResult<PeerWager> {
        let mut uow = UnitOfWork::begin(&self.pool, self.sink.clone()).await?;

        let wager = fetch_wager(uow.conn()?, wager_id).await?;
        if responder_id != wager.target_id {
            return Err(PeerWagerError::NotTarget {
                wager_id,
                user_id: responder_id,
            });
        }
        if wager.state != WagerState::Proposed {
            return Err(PeerWagerError::InvalidState {
                expected: WagerState::Proposed,
                actual: wager.state,
            });
        }

        let next = if accept {
            // This wager's stake already sits inside both parties'
            // reservations, so re-validation checks that each balance still
            // backs its full reserved amount rather than demanding the stake
            // a second time on top of the reservation.
            for user_id in [wager.proposer_id, wager.target_id] {
                let view = ledger_repo::fetch_view(uow.conn()?, user_id).await?;
                if view.available < 0 {
                    return Err(PeerWagerError::InsufficientFunds {
                        user_id,
                        required: wager.amount,
                        available: view.available + wager.amount,
                    });
                }
            }
            WagerState::Voting
        } else {
            WagerState::Declined
        };
        transition(uow.conn()?, wager_id, WagerState::Proposed, next).await?;

        let wager = fetch_wager(uow.conn()?, wager_id).await?;
        uow.publish(DomainEvent::new(if accept {
            EventKind::PeerWagerAccepted { wager_id }
        } else {
            EventKind::PeerWagerDeclined { wager_id }
        }));
        uow.commit().await?;

        log::info!(
            "User {responder_id} {} wager {wager_id}",
            if accept { "accepted" } else { "declined" }
        );
        Ok(wager)
    }

    /// Record a third-party vote on a wager in `voting`.
    ///
    /// Votes upsert per voter. If this vote pushes one side past the majority
    /// threshold, the wager is settled inline, in the same transaction.
    pub async fn vote(
        &self,
        wager_id: i64,
        voter_id: i64,
        backed_id: i64,
    ) -> PeerWagerResult<VoteOutcome> {
        let mut uow = UnitOfWork::begin(&self.pool, self.sink.clone()).await?;

        let wager = fetch_wager(uow.conn()?, wager_id).await?;
        if wager.state != WagerState::Voting {
            return Err(PeerWagerError::InvalidState {
                expected: WagerState::Voting,
                actual: wager.state,
            });
        }
        if wager.is_participant(voter_id) {
            return Err(PeerWagerError::ParticipantVote);
        }
        if !wager.is_participant(backed_id) {
            return Err(PeerWagerError::VoteForNonParticipant);
        }

        sqlx::query(
            "INSERT INTO wager_votes (wager_id, voter_id, backed_id, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (wager_id, voter_id)
             DO UPDATE SET backed_id = excluded.backed_id, created_at = excluded.created_at",
        )
        .bind(wager_id)
        .bind(voter_id)
        .bind(backed_id)
        .bind(Utc::now())
        .execute(uow.conn()?)
        .await?;

        let (proposer_votes, target_votes) = tally(uow.conn()?, &wager).await?;

        let mut resolved = false;
        if let Some(winner_id) = self.policy.winner(proposer_votes, target_votes, &wager) {
            self.settle(&mut uow, &wager, winner_id).await?;
            resolved = true;
        }

        let wager = fetch_wager(uow.conn()?, wager_id).await?;
        uow.commit().await?;

        Ok(VoteOutcome {
            wager,
            proposer_votes,
            target_votes,
            resolved,
        })
    }

    /// Cancel a wager. Only the proposer may cancel, and only while the wager
    /// has not entered `voting` or been resolved.
    pub async fn cancel(&self, wager_id: i64, user_id: i64) -> PeerWagerResult<PeerWager> {
        let mut uow = UnitOfWork::begin(&self.pool, self.sink.clone()).await?;

        let wager = fetch_wager(uow.conn()?, wager_id).await?;
        if user_id != wager.proposer_id {
            return Err(PeerWagerError::NotProposer { wager_id, user_id });
        }
        if wager.state != WagerState::Proposed {
            return Err(PeerWagerError::InvalidState {
                expected: WagerState::Proposed,
                actual: wager.state,
            });
        }
        transition(uow.conn()?, wager_id, WagerState::Proposed, WagerState::Declined).await?;

        let wager = fetch_wager(uow.conn()?, wager_id).await?;
        uow.publish(DomainEvent::new(EventKind::PeerWagerCancelled { wager_id }));
        uow.commit().await?;

        log::info!("User {user_id} cancelled wager {wager_id}");
        Ok(wager)
    }

    /// Fetch a wager.
    pub async fn get(&self, wager_id: i64) -> PeerWagerResult<PeerWager> {
        let mut conn = self.pool.acquire().await?;
        fetch_wager(&mut *conn, wager_id).await
    }

    /// Settle a wager that reached the majority threshold.
    ///
    /// The state transition runs first as a conditional update keyed on
    /// `voting`; zero rows affected means another attempt already won and the
    /// whole operation fails with a conflict. Within this transaction the
    /// wager no longer reserves funds once resolved, so the loser's deduction
    /// is covered by the stake that reservation was holding.
    async fn settle(
        &self,
        uow: &mut UnitOfWork,
        wager: &PeerWager,
        winner_id: i64,
    ) -> PeerWagerResult<()> {
        let loser_id = wager.opponent_of(winner_id);
        let now = Utc::now();

        let transitioned = sqlx::query(
            "UPDATE peer_wagers
             SET state = ?1, winner_id = ?2, resolved_at = ?3
             WHERE id = ?4 AND state = ?5",
        )
        .bind(WagerState::Resolved.to_string())
        .bind(winner_id)
        .bind(now)
        .bind(wager.id)
        .bind(WagerState::Voting.to_string())
        .execute(uow.conn()?)
        .await?
        .rows_affected();
        if transitioned == 0 {
            return Err(PeerWagerError::ResolutionConflict(wager.id));
        }

        // Full transfer of the staked amount, no house edge.
        let loss = ledger_repo::apply_change(
            uow.conn()?,
            loser_id,
            -wager.amount,
            TransactionKind::PeerWagerLoss,
            &EntryDetail::PeerWager {
                opponent_id: winner_id,
            },
            Some(wager.id),
        )
        .await?;
        let win = ledger_repo::apply_change(
            uow.conn()?,
            winner_id,
            wager.amount,
            TransactionKind::PeerWagerWin,
            &EntryDetail::PeerWager {
                opponent_id: loser_id,
            },
            Some(wager.id),
        )
        .await?;

        let (proposer_entry, target_entry) = if winner_id == wager.proposer_id {
            (win.entry_id, loss.entry_id)
        } else {
            (loss.entry_id, win.entry_id)
        };
        sqlx::query(
            "UPDATE peer_wagers SET proposer_entry_id = ?1, target_entry_id = ?2 WHERE id = ?3",
        )
        .bind(proposer_entry)
        .bind(target_entry)
        .bind(wager.id)
        .execute(uow.conn()?)
        .await?;

        uow.publish(DomainEvent::new(EventKind::PeerWagerResolved {
            wager_id: wager.id,
            winner_id,
            loser_id,
            amount: wager.amount,
        }));

        log::info!(
            "Wager {} resolved: user {winner_id} won {} from user {loser_id}",
            wager.id,
            wager.amount
        );
        Ok(())
    }
}

/// Point-in-time available balance check for a stake.
async fn require_available(
    conn: &mut SqliteConnection,
    user_id: i64,
    amount: i64,
) -> PeerWagerResult<()> {
    let view = ledger_repo::fetch_view(conn, user_id).await?;
    if view.available < amount {
        return Err(PeerWagerError::InsufficientFunds {
            user_id,
            required: amount,
            available: view.available,
        });
    }
    Ok(())
}

/// Conditional state transition; zero rows affected means the wager left
/// `from` under our feet.
async fn transition(
    conn: &mut SqliteConnection,
    wager_id: i64,
    from: WagerState,
    to: WagerState,
) -> PeerWagerResult<()> {
    let updated = sqlx::query("UPDATE peer_wagers SET state = ?1 WHERE id = ?2 AND state = ?3")
        .bind(to.to_string())
        .bind(wager_id)
        .bind(from.to_string())
        .execute(conn)
        .await?
        .rows_affected();
    if updated == 0 {
        return Err(PeerWagerError::ResolutionConflict(wager_id));
    }
    Ok(())
}

async fn tally(conn: &mut SqliteConnection, wager: &PeerWager) -> PeerWagerResult<(u32, u32)> {
    let rows = sqlx::query(
        "SELECT backed_id, COUNT(*) AS votes FROM wager_votes WHERE wager_id = ?1 GROUP BY backed_id",
    )
    .bind(wager.id)
    .fetch_all(conn)
    .await?;

    let mut proposer_votes = 0u32;
    let mut target_votes = 0u32;
    for row in rows {
        let backed_id: i64 = row.get("backed_id");
        let votes: i64 = row.get("votes");
        if backed_id == wager.proposer_id {
            proposer_votes = votes as u32;
        } else if backed_id == wager.target_id {
            target_votes = votes as u32;
        }
    }
    Ok((proposer_votes, target_votes))
}

async fn fetch_wager(conn: &mut SqliteConnection, wager_id: i64) -> PeerWagerResult<PeerWager> {
    let row = sqlx::query(
        "SELECT id, guild_id, proposer_id, target_id, amount, condition, state, winner_id,
                proposer_entry_id, target_entry_id, created_at, resolved_at
         FROM peer_wagers WHERE id = ?1",
    )
    .bind(wager_id)
    .fetch_optional(conn)
    .await?
    .ok_or(PeerWagerError::NotFound(wager_id))?;

    wager_from_row(&row)
}

fn wager_from_row(row: &SqliteRow) -> PeerWagerResult<PeerWager> {
    let state_text: String = row.get("state");
    let state = WagerState::from_str(&state_text)
        .map_err(|s| sqlx::Error::Decode(format!("unknown wager state: {s}").into()))?;

    Ok(PeerWager {
        id: row.get("id"),
        guild_id: row.get("guild_id"),
        proposer_id: row.get("proposer_id"),
        target_id: row.get("target_id"),
        amount: row.get("amount"),
        condition: row.get("condition"),
        state,
        winner_id: row.get("winner_id"),
        proposer_entry_id: row.get("proposer_entry_id"),
        target_entry_id: row.get("target_entry_id"),
        created_at: row.get("created_at"),
        resolved_at: row.get("resolved_at"),
    })
}
