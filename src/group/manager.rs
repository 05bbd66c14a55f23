//! Group wager creation, betting, and resolution.

use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, SqliteConnection, SqlitePool, sqlite::SqliteRow};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use super::errors::{GroupWagerError, GroupWagerResult};
use super::models::{
    GroupWager, GroupWagerConfig, GroupWagerDetail, GroupWagerOption, GroupWagerParticipant,
    GroupWagerResolution, GroupWagerState,
};
use super::payout::proportional_payout;
use crate::ledger::{EntryDetail, TransactionKind, repo as ledger_repo};
use crate::uow::{DomainEvent, EventKind, EventSink, UnitOfWork};

/// Decides who may resolve group wagers. Queried per resolve call; no global
/// mutable state.
pub trait ResolverPolicy: Send + Sync {
    fn can_resolve(&self, user_id: i64) -> bool;
}

/// Fixed allow-list of resolver identities.
pub struct ResolverAllowList {
    resolvers: HashSet<i64>,
}

impl ResolverAllowList {
    pub fn new(resolvers: impl IntoIterator<Item = i64>) -> Self {
        Self {
            resolvers: resolvers.into_iter().collect(),
        }
    }
}

impl ResolverPolicy for ResolverAllowList {
    fn can_resolve(&self, user_id: i64) -> bool {
        self.resolvers.contains(&user_id)
    }
}

/// Group wager manager
#[derive(Clone)]
pub struct GroupWagerManager {
    pool: SqlitePool,
    sink: Arc<dyn EventSink>,
    config: GroupWagerConfig,
    resolvers: Arc<dyn ResolverPolicy>,
}

impl GroupWagerManager {
    /// Create a new group wager manager
    pub fn new(
        pool: SqlitePool,
        sink: Arc<dyn EventSink>,
        config: GroupWagerConfig,
        resolvers: Arc<dyn ResolverPolicy>,
    ) -> Self {
        Self {
            pool,
            sink,
            config,
            resolvers,
        }
    }

    /// Create a wager with its options. The wager starts `active` with the
    /// voting window open from now.
    pub async fn create(
        &self,
        guild_id: i64,
        creator_id: i64,
        condition: &str,
        options: &[&str],
        voting_period: Duration,
    ) -> GroupWagerResult<GroupWagerDetail> {
        let condition = condition.trim();
        if condition.is_empty() {
            return Err(GroupWagerError::EmptyCondition);
        }
        if options.len() < 2 {
            return Err(GroupWagerError::TooFewOptions(options.len()));
        }
        if voting_period < self.config.min_voting_period
            || voting_period > self.config.max_voting_period
        {
            return Err(GroupWagerError::InvalidVotingPeriod {
                min_secs: self.config.min_voting_period.num_seconds(),
                max_secs: self.config.max_voting_period.num_seconds(),
                got_secs: voting_period.num_seconds(),
            });
        }

        let now = Utc::now();
        let mut uow = UnitOfWork::begin(&self.pool, self.sink.clone()).await?;

        let wager_id: i64 = sqlx::query_scalar(
            "INSERT INTO group_wagers
                 (guild_id, creator_id, condition, state, min_participants, pot,
                  starts_at, ends_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?6)
             RETURNING id",
        )
        .bind(guild_id)
        .bind(creator_id)
        .bind(condition)
        .bind(GroupWagerState::Active.to_string())
        .bind(self.config.min_participants)
        .bind(now)
        .bind(now + voting_period)
        .fetch_one(uow.conn()?)
        .await?;

        for (position, label) in options.iter().enumerate() {
            sqlx::query(
                "INSERT INTO group_wager_options (wager_id, label, position, total)
                 VALUES (?1, ?2, ?3, 0)",
            )
            .bind(wager_id)
            .bind(label)
            .bind(position as i64)
            .execute(uow.conn()?)
            .await?;
        }

        let detail = fetch_detail(uow.conn()?, wager_id).await?;
        uow.publish(DomainEvent::new(EventKind::GroupWagerCreated {
            wager_id,
            guild_id,
        }));
        uow.commit().await?;

        log::info!(
            "User {creator_id} created group wager {wager_id} in guild {guild_id} with {} options",
            options.len()
        );
        Ok(detail)
    }

    /// Place or change a bet while the wager is `active` and its window open.
    ///
    /// A first bet adds the full amount to the chosen option and the pot. A
    /// change to the same option moves option total and pot by the net
    /// difference. A change to a different option removes the previous amount
    /// from the old option and adds the full new amount to the new one, while
    /// the pot still moves by the net: option totals must always equal the
    /// sum of stakes currently assigned to them.
    pub async fn place_bet(
        &self,
        wager_id: i64,
        user_id: i64,
        option_id: i64,
        amount: i64,
    ) -> GroupWagerResult<GroupWagerParticipant> {
        if amount <= 0 {
            return Err(GroupWagerError::InvalidAmount(amount));
        }

        let mut uow = UnitOfWork::begin(&self.pool, self.sink.clone()).await?;

        let wager = fetch_wager(uow.conn()?, wager_id).await?;
        if wager.state != GroupWagerState::Active {
            return Err(GroupWagerError::InvalidState {
                expected: GroupWagerState::Active,
                actual: wager.state,
            });
        }
        if Utc::now() >= wager.ends_at {
            return Err(GroupWagerError::BettingClosed(wager_id));
        }
        require_option(uow.conn()?, wager_id, option_id).await?;

        let existing = fetch_participant(uow.conn()?, wager_id, user_id).await?;
        let previous_stake = existing.as_ref().map_or(0, |p| p.stake);
        let net = amount - previous_stake;

        // The previous stake is already reserved against this wager, so only
        // the increase needs available funds.
        if net > 0 {
            let view = ledger_repo::fetch_view(uow.conn()?, user_id).await?;
            if view.available < net {
                return Err(GroupWagerError::InsufficientFunds {
                    user_id,
                    required: net,
                    available: view.available,
                });
            }
        }

        match existing {
            None => {
                sqlx::query(
                    "INSERT INTO group_wager_participants (wager_id, user_id, option_id, stake)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .bind(wager_id)
                .bind(user_id)
                .bind(option_id)
                .bind(amount)
                .execute(uow.conn()?)
                .await?;
                adjust_option_total(uow.conn()?, option_id, amount).await?;
            }
            Some(ref p) if p.option_id == option_id => {
                sqlx::query("UPDATE group_wager_participants SET stake = ?1 WHERE id = ?2")
                    .bind(amount)
                    .bind(p.id)
                    .execute(uow.conn()?)
                    .await?;
                adjust_option_total(uow.conn()?, option_id, net).await?;
            }
            Some(ref p) => {
                sqlx::query(
                    "UPDATE group_wager_participants SET option_id = ?1, stake = ?2 WHERE id = ?3",
                )
                .bind(option_id)
                .bind(amount)
                .bind(p.id)
                .execute(uow.conn()?)
                .await?;
                adjust_option_total(uow.conn()?, p.option_id, -p.stake).await?;
                adjust_option_total(uow.conn()?, option_id, amount).await?;
            }
        }

        sqlx::query("UPDATE group_wagers SET pot = pot + ?1 WHERE id = ?2")
            .bind(net)
            .bind(wager_id)
            .execute(uow.conn()?)
            .await?;

        let participant = fetch_participant(uow.conn()?, wager_id, user_id)
            .await?
            .ok_or(GroupWagerError::NotFound(wager_id))?;
        uow.publish(DomainEvent::new(EventKind::GroupBetPlaced {
            wager_id,
            user_id,
            option_id,
            amount,
        }));
        uow.commit().await?;

        log::info!("User {user_id} staked {amount} on option {option_id} of wager {wager_id}");
        Ok(participant)
    }

    /// Resolve a wager to its winning option and settle every participant.
    ///
    /// Restricted to the resolver policy. Requires enough participants and
    /// stakes on at least two distinct options. Exactly one of any concurrent
    /// resolution attempts succeeds; the rest fail with a conflict.
    pub async fn resolve(
        &self,
        wager_id: i64,
        resolver_id: i64,
        winning_option_id: i64,
    ) -> GroupWagerResult<GroupWagerResolution> {
        if !self.resolvers.can_resolve(resolver_id) {
            return Err(GroupWagerError::UnauthorizedResolver(resolver_id));
        }

        let mut uow = UnitOfWork::begin(&self.pool, self.sink.clone()).await?;

        let wager = fetch_wager(uow.conn()?, wager_id).await?;
        if !wager.state.is_resolvable() {
            return Err(GroupWagerError::NotResolvable {
                actual: wager.state,
            });
        }
        require_option(uow.conn()?, wager_id, winning_option_id).await?;

        let participants = fetch_participants(uow.conn()?, wager_id).await?;
        let current = participants.len() as i64;
        if current < wager.min_participants {
            return Err(GroupWagerError::TooFewParticipants {
                needed: wager.min_participants,
                current,
            });
        }
        let backed_options: HashSet<i64> = participants.iter().map(|p| p.option_id).collect();
        if backed_options.len() < 2 {
            return Err(GroupWagerError::SingleSidedPool(wager_id));
        }

        // Resolution exclusivity: conditional transition keyed on the current
        // state. Zero rows affected means another attempt already won.
        let transitioned = sqlx::query(
            "UPDATE group_wagers
             SET state = ?1, resolver_id = ?2, winning_option_id = ?3, resolved_at = ?4
             WHERE id = ?5 AND state IN ('active', 'pending_resolution')",
        )
        .bind(GroupWagerState::Resolved.to_string())
        .bind(resolver_id)
        .bind(winning_option_id)
        .bind(Utc::now())
        .bind(wager_id)
        .execute(uow.conn()?)
        .await?
        .rows_affected();
        if transitioned == 0 {
            return Err(GroupWagerError::ResolutionConflict(wager_id));
        }

        let winning_total: i64 = participants
            .iter()
            .filter(|p| p.option_id == winning_option_id)
            .map(|p| p.stake)
            .sum();

        // Once resolved, these participations no longer reserve funds inside
        // this transaction, so a loser's deduction is covered by their stake.
        for participant in &participants {
            let won = participant.option_id == winning_option_id;
            let (payout, net, kind) = if won {
                let payout = proportional_payout(participant.stake, wager.pot, winning_total);
                (payout, payout - participant.stake, TransactionKind::GroupWagerWin)
            } else {
                (0, -participant.stake, TransactionKind::GroupWagerLoss)
            };

            let entry_id = if net != 0 {
                let change = ledger_repo::apply_change(
                    uow.conn()?,
                    participant.user_id,
                    net,
                    kind,
                    &EntryDetail::GroupWager {
                        option_id: participant.option_id,
                    },
                    Some(wager_id),
                )
                .await?;
                Some(change.entry_id)
            } else {
                None
            };

            sqlx::query(
                "UPDATE group_wager_participants SET payout = ?1, entry_id = ?2 WHERE id = ?3",
            )
            .bind(payout)
            .bind(entry_id)
            .bind(participant.id)
            .execute(uow.conn()?)
            .await?;
        }

        let wager = fetch_wager(uow.conn()?, wager_id).await?;
        let participants = fetch_participants(uow.conn()?, wager_id).await?;
        uow.publish(DomainEvent::new(EventKind::GroupWagerResolved {
            wager_id,
            winning_option_id,
            pot: wager.pot,
        }));
        uow.commit().await?;

        log::info!(
            "User {resolver_id} resolved group wager {wager_id} to option {winning_option_id}, pot {}",
            wager.pot
        );
        Ok(GroupWagerResolution {
            wager,
            participants,
        })
    }

    /// Move an `active` wager whose window has elapsed to
    /// `pending_resolution`. Returns whether the transition happened; a
    /// `false` just means another sweep got there first or the window is
    /// still open.
    pub async fn mark_pending_resolution(&self, wager_id: i64) -> GroupWagerResult<bool> {
        let mut uow = UnitOfWork::begin(&self.pool, self.sink.clone()).await?;
        let updated = sqlx::query(
            "UPDATE group_wagers
             SET state = ?1
             WHERE id = ?2 AND state = ?3 AND ends_at <= ?4",
        )
        .bind(GroupWagerState::PendingResolution.to_string())
        .bind(wager_id)
        .bind(GroupWagerState::Active.to_string())
        .bind(Utc::now())
        .execute(uow.conn()?)
        .await?
        .rows_affected();
        uow.commit().await?;

        if updated > 0 {
            log::info!("Group wager {wager_id} moved to pending resolution");
        }
        Ok(updated > 0)
    }

    /// Wager with options and participants.
    pub async fn get(&self, wager_id: i64) -> GroupWagerResult<GroupWagerDetail> {
        let mut conn = self.pool.acquire().await?;
        fetch_detail(&mut *conn, wager_id).await
    }

    /// `active` wagers whose voting window has elapsed. Scheduler input for
    /// the `active → pending_resolution` sweep.
    pub async fn list_expired_active(
        &self,
        now: DateTime<Utc>,
    ) -> GroupWagerResult<Vec<GroupWager>> {
        let sql = format!("{WAGER_COLUMNS} WHERE state = ?1 AND ends_at <= ?2 ORDER BY ends_at");
        let rows = sqlx::query(&sql)
            .bind(GroupWagerState::Active.to_string())
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(wager_from_row).collect()
    }

    /// Wagers awaiting a resolver.
    pub async fn list_pending_resolution(&self) -> GroupWagerResult<Vec<GroupWager>> {
        let rows = sqlx::query(WAGER_COLUMNS_WHERE_STATE)
            .bind(GroupWagerState::PendingResolution.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(wager_from_row).collect()
    }

    /// Guilds that currently have wagers in `active` or `pending_resolution`.
    pub async fn list_guilds_with_active(&self) -> GroupWagerResult<Vec<i64>> {
        let guilds = sqlx::query_scalar(
            "SELECT DISTINCT guild_id FROM group_wagers
             WHERE state IN ('active', 'pending_resolution')
             ORDER BY guild_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(guilds)
    }
}

const WAGER_COLUMNS: &str = "SELECT id, guild_id, creator_id, condition, state, min_participants,
    pot, starts_at, ends_at, resolver_id, winning_option_id, created_at, resolved_at
    FROM group_wagers";

const WAGER_COLUMNS_WHERE_STATE: &str = "SELECT id, guild_id, creator_id, condition, state,
    min_participants, pot, starts_at, ends_at, resolver_id, winning_option_id, created_at,
    resolved_at
    FROM group_wagers WHERE state = ?1 ORDER BY ends_at";

async fn fetch_wager(conn: &mut SqliteConnection, wager_id: i64) -> GroupWagerResult<GroupWager> {
    let sql = format!("{WAGER_COLUMNS} WHERE id = ?1");
    let row = sqlx::query(&sql)
        .bind(wager_id)
        .fetch_optional(conn)
        .await?
        .ok_or(GroupWagerError::NotFound(wager_id))?;
    wager_from_row(&row)
}

fn wager_from_row(row: &SqliteRow) -> GroupWagerResult<GroupWager> {
    let state_text: String = row.get("state");
    let state = GroupWagerState::from_str(&state_text)
        .map_err(|s| sqlx::Error::Decode(format!("unknown group wager state: {s}").into()))?;

    Ok(GroupWager {
        id: row.get("id"),
        guild_id: row.get("guild_id"),
        creator_id: row.get("creator_id"),
        condition: row.get("condition"),
        state,
        min_participants: row.get("min_participants"),
        pot: row.get("pot"),
        starts_at: row.get("starts_at"),
        ends_at: row.get("ends_at"),
        resolver_id: row.get("resolver_id"),
        winning_option_id: row.get("winning_option_id"),
        created_at: row.get("created_at"),
        resolved_at: row.get("resolved_at"),
    })
}

async fn require_option(
    conn: &mut SqliteConnection,
    wager_id: i64,
    option_id: i64,
) -> GroupWagerResult<()> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM group_wager_options WHERE id = ?1 AND wager_id = ?2",
    )
    .bind(option_id)
    .bind(wager_id)
    .fetch_optional(conn)
    .await?;
    if found.is_none() {
        return Err(GroupWagerError::OptionNotFound {
            wager_id,
            option_id,
        });
    }
    Ok(())
}

async fn adjust_option_total(
    conn: &mut SqliteConnection,
    option_id: i64,
    delta: i64,
) -> GroupWagerResult<()> {
    sqlx::query("UPDATE group_wager_options SET total = total + ?1 WHERE id = ?2")
        .bind(delta)
        .bind(option_id)
        .execute(conn)
        .await?;
    Ok(())
}

async fn fetch_options(
    conn: &mut SqliteConnection,
    wager_id: i64,
) -> GroupWagerResult<Vec<GroupWagerOption>> {
    let rows = sqlx::query(
        "SELECT id, wager_id, label, position, total
         FROM group_wager_options WHERE wager_id = ?1 ORDER BY position",
    )
    .bind(wager_id)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| GroupWagerOption {
            id: row.get("id"),
            wager_id: row.get("wager_id"),
            label: row.get("label"),
            position: row.get("position"),
            total: row.get("total"),
        })
        .collect())
}

async fn fetch_participant(
    conn: &mut SqliteConnection,
    wager_id: i64,
    user_id: i64,
) -> GroupWagerResult<Option<GroupWagerParticipant>> {
    let row = sqlx::query(
        "SELECT id, wager_id, user_id, option_id, stake, payout, entry_id
         FROM group_wager_participants WHERE wager_id = ?1 AND user_id = ?2",
    )
    .bind(wager_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(|row| participant_from_row(&row)))
}

async fn fetch_participants(
    conn: &mut SqliteConnection,
    wager_id: i64,
) -> GroupWagerResult<Vec<GroupWagerParticipant>> {
    let rows = sqlx::query(
        "SELECT id, wager_id, user_id, option_id, stake, payout, entry_id
         FROM group_wager_participants WHERE wager_id = ?1 ORDER BY id",
    )
    .bind(wager_id)
    .fetch_all(conn)
    .await?;

    Ok(rows.iter().map(participant_from_row).collect())
}

fn participant_from_row(row: &SqliteRow) -> GroupWagerParticipant {
    GroupWagerParticipant {
        id: row.get("id"),
        wager_id: row.get("wager_id"),
        user_id: row.get("user_id"),
        option_id: row.get("option_id"),
        stake: row.get("stake"),
        payout: row.get("payout"),
        entry_id: row.get("entry_id"),
    }
}

async fn fetch_detail(
    conn: &mut SqliteConnection,
    wager_id: i64,
) -> GroupWagerResult<GroupWagerDetail> {
    let wager = fetch_wager(conn, wager_id).await?;
    let options = fetch_options(conn, wager_id).await?;
    let participants = fetch_participants(conn, wager_id).await?;
    Ok(GroupWagerDetail {
        wager,
        options,
        participants,
    })
}
