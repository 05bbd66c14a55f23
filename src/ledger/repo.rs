//! Transaction-scoped ledger repository.
//!
//! All functions run against the connection of an open unit of work.
//! [`apply_change`] is the single call site pairing a balance mutation with
//! its audit row; settlement code must never touch `users.balance` directly.

use chrono::Utc;
use sqlx::{Row, SqliteConnection};
use std::str::FromStr;

use super::errors::{LedgerError, LedgerResult};
use super::models::{Account, AccountView, BalanceEntry, EntryDetail, TransactionKind};

/// Outcome of one applied balance change.
#[derive(Debug, Clone, Copy)]
pub struct AppliedChange {
    pub entry_id: i64,
    pub balance_before: i64,
    pub balance_after: i64,
}

/// Stakes currently reserved by the user's unresolved wagers: peer wagers in
/// `proposed`/`voting` where the user is a participant, plus group wager
/// participations whose wager is still `active`/`pending_resolution`.
const RESERVED_SQL: &str = "
    COALESCE((SELECT SUM(amount) FROM peer_wagers
              WHERE (proposer_id = ?1 OR target_id = ?1)
                AND state IN ('proposed', 'voting')), 0)
  + COALESCE((SELECT SUM(p.stake) FROM group_wager_participants p
              JOIN group_wagers w ON w.id = p.wager_id
              WHERE p.user_id = ?1
                AND w.state IN ('active', 'pending_resolution')), 0)";

/// Fetch an account, or create it with the initial grant.
///
/// Returns the account and whether it was created by this call. Creation
/// writes the paired `initial_grant` history row.
pub async fn get_or_create(
    conn: &mut SqliteConnection,
    user_id: i64,
    initial_balance: i64,
) -> LedgerResult<(Account, bool)> {
    let now = Utc::now();
    let inserted = sqlx::query(
        "INSERT INTO users (id, balance, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(user_id)
    .bind(initial_balance)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if inserted == 1 && initial_balance > 0 {
        insert_entry(
            conn,
            user_id,
            0,
            initial_balance,
            TransactionKind::InitialGrant,
            &EntryDetail::Grant,
            None,
        )
        .await?;
    }

    let account = fetch_account(conn, user_id).await?;
    Ok((account, inserted == 1))
}

/// Fetch an account row.
pub async fn fetch_account(conn: &mut SqliteConnection, user_id: i64) -> LedgerResult<Account> {
    let row = sqlx::query(
        "SELECT id, balance, created_at, updated_at FROM users WHERE id = ?1",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(LedgerError::AccountNotFound(user_id))?;

    Ok(Account {
        user_id: row.get("id"),
        balance: row.get("balance"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Balance plus recomputed available balance.
pub async fn fetch_view(conn: &mut SqliteConnection, user_id: i64) -> LedgerResult<AccountView> {
    let sql = format!(
        "SELECT balance, balance - ({RESERVED_SQL}) AS available FROM users WHERE id = ?1"
    );
    let row = sqlx::query(&sql)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(LedgerError::AccountNotFound(user_id))?;

    Ok(AccountView {
        user_id,
        balance: row.get("balance"),
        available: row.get("available"),
    })
}

/// Apply one signed balance change and write its audit row.
///
/// A positive amount is an unconditional credit. A negative amount is a
/// single atomic conditional update that only succeeds while the available
/// balance (recomputed inside the same statement) covers the deduction, so
/// two concurrent deductions can never both pass the limit.
pub async fn apply_change(
    conn: &mut SqliteConnection,
    user_id: i64,
    amount: i64,
    kind: TransactionKind,
    detail: &EntryDetail,
    wager_ref: Option<i64>,
) -> LedgerResult<AppliedChange> {
    if amount == 0 {
        return Err(LedgerError::InvalidAmount(0));
    }
    let now = Utc::now();

    let balance_after: i64 = if amount > 0 {
        sqlx::query_scalar(
            "UPDATE users SET balance = balance + ?1, updated_at = ?2
             WHERE id = ?3
             RETURNING balance",
        )
        .bind(amount)
        .bind(now)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(LedgerError::AccountNotFound(user_id))?
    } else {
        let deduction = -amount;
        let sql = format!(
            "UPDATE users SET balance = balance - ?2, updated_at = ?3
             WHERE id = ?1 AND balance - ?2 >= ({RESERVED_SQL})
             RETURNING balance"
        );
        let updated: Option<i64> = sqlx::query_scalar(&sql)
            .bind(user_id)
            .bind(deduction)
            .bind(now)
            .fetch_optional(&mut *conn)
            .await?;

        match updated {
            Some(balance) => balance,
            None => {
                // Zero rows: missing account or insufficient availability.
                let view = fetch_view(conn, user_id).await?;
                return Err(LedgerError::InsufficientFunds {
                    required: deduction,
                    available: view.available,
                });
            }
        }
    };

    let entry_id = insert_entry(
        conn,
        user_id,
        balance_after - amount,
        balance_after,
        kind,
        detail,
        wager_ref,
    )
    .await?;

    log::debug!(
        "Applied {kind} of {amount} to user {user_id}, balance {} -> {balance_after}",
        balance_after - amount
    );

    Ok(AppliedChange {
        entry_id,
        balance_before: balance_after - amount,
        balance_after,
    })
}

async fn insert_entry(
    conn: &mut SqliteConnection,
    user_id: i64,
    balance_before: i64,
    balance_after: i64,
    kind: TransactionKind,
    detail: &EntryDetail,
    wager_ref: Option<i64>,
) -> LedgerResult<i64> {
    let detail_json = serde_json::to_string(detail)?;
    let id = sqlx::query_scalar(
        "INSERT INTO balance_history
             (user_id, balance_before, balance_after, amount, kind, detail, wager_ref, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         RETURNING id",
    )
    .bind(user_id)
    .bind(balance_before)
    .bind(balance_after)
    .bind(balance_after - balance_before)
    .bind(kind.to_string())
    .bind(detail_json)
    .bind(wager_ref)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Most recent history entries for a user.
pub async fn history(
    conn: &mut SqliteConnection,
    user_id: i64,
    limit: i64,
) -> LedgerResult<Vec<BalanceEntry>> {
    let rows = sqlx::query(
        "SELECT id, user_id, balance_before, balance_after, amount, kind, detail,
                wager_ref, created_at
         FROM balance_history
         WHERE user_id = ?1
         ORDER BY id DESC
         LIMIT ?2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|row| {
            let kind_text: String = row.get("kind");
            let kind = TransactionKind::from_str(&kind_text)
                .map_err(LedgerError::UnknownKind)?;
            let detail_text: String = row.get("detail");
            let detail: EntryDetail = serde_json::from_str(&detail_text)?;
            Ok(BalanceEntry {
                id: row.get("id"),
                user_id: row.get("user_id"),
                balance_before: row.get("balance_before"),
                balance_after: row.get("balance_after"),
                amount: row.get("amount"),
                kind,
                detail,
                wager_ref: row.get("wager_ref"),
                created_at: row.get("created_at"),
            })
        })
        .collect()
}
