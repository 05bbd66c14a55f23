//! Embedded schema definition.
//!
//! The schema is applied on startup with idempotent `CREATE TABLE IF NOT
//! EXISTS` statements. `balance_history` is append-only: nothing in this
//! crate updates or deletes its rows.

use sqlx::SqlitePool;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id         INTEGER PRIMARY KEY,
        balance    INTEGER NOT NULL DEFAULT 0,
        created_at TEXT    NOT NULL,
        updated_at TEXT    NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS balance_history (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id        INTEGER NOT NULL REFERENCES users(id),
        balance_before INTEGER NOT NULL,
        balance_after  INTEGER NOT NULL,
        amount         INTEGER NOT NULL,
        kind           TEXT    NOT NULL,
        detail         TEXT    NOT NULL,
        wager_ref      INTEGER,
        created_at     TEXT    NOT NULL,
        CHECK (balance_after - balance_before = amount)
    )",
    "CREATE TABLE IF NOT EXISTS bets (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id     INTEGER NOT NULL REFERENCES users(id),
        stake       INTEGER NOT NULL,
        probability REAL    NOT NULL,
        won         INTEGER NOT NULL,
        win_amount  INTEGER NOT NULL,
        entry_id    INTEGER REFERENCES balance_history(id),
        created_at  TEXT    NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS peer_wagers (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        guild_id          INTEGER NOT NULL,
        proposer_id       INTEGER NOT NULL REFERENCES users(id),
        target_id         INTEGER NOT NULL REFERENCES users(id),
        amount            INTEGER NOT NULL,
        condition         TEXT    NOT NULL,
        state             TEXT    NOT NULL,
        winner_id         INTEGER,
        proposer_entry_id INTEGER REFERENCES balance_history(id),
        target_entry_id   INTEGER REFERENCES balance_history(id),
        created_at        TEXT    NOT NULL,
        resolved_at       TEXT
    )",
    "CREATE TABLE IF NOT EXISTS wager_votes (
        wager_id   INTEGER NOT NULL REFERENCES peer_wagers(id),
        voter_id   INTEGER NOT NULL,
        backed_id  INTEGER NOT NULL,
        created_at TEXT    NOT NULL,
        UNIQUE (wager_id, voter_id)
    )",
    "CREATE TABLE IF NOT EXISTS group_wagers (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        guild_id          INTEGER NOT NULL,
        creator_id        INTEGER NOT NULL,
        condition         TEXT    NOT NULL,
        state             TEXT    NOT NULL,
        min_participants  INTEGER NOT NULL,
        pot               INTEGER NOT NULL DEFAULT 0,
        starts_at         TEXT    NOT NULL,
        ends_at           TEXT    NOT NULL,
        resolver_id       INTEGER,
        winning_option_id INTEGER,
        created_at        TEXT    NOT NULL,
        resolved_at       TEXT
    )",
    "CREATE TABLE IF NOT EXISTS group_wager_options (
        id       INTEGER PRIMARY KEY AUTOINCREMENT,
        wager_id INTEGER NOT NULL REFERENCES group_wagers(id),
        label    TEXT    NOT NULL,
        position INTEGER NOT NULL,
        total    INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS group_wager_participants (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        wager_id  INTEGER NOT NULL REFERENCES group_wagers(id),
        user_id   INTEGER NOT NULL REFERENCES users(id),
        option_id INTEGER NOT NULL REFERENCES group_wager_options(id),
        stake     INTEGER NOT NULL,
        payout    INTEGER,
        entry_id  INTEGER REFERENCES balance_history(id),
        UNIQUE (wager_id, user_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_history_user ON balance_history(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_bets_user_created ON bets(user_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_peer_wagers_state ON peer_wagers(state)",
    "CREATE INDEX IF NOT EXISTS idx_group_wagers_state ON group_wagers(state)",
];

/// Apply the embedded schema.
pub async fn apply(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
