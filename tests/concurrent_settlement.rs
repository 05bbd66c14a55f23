//! Concurrency tests for the conditional-update guards.
//!
//! The in-memory fixtures elsewhere run on a single pooled connection, which
//! serializes operations before the guards ever race. These tests use a
//! WAL-mode temp-file database with a larger pool so two tasks genuinely
//! contend, and assert that exactly one of two racing attempts settles.

use bookie::db::schema;
use bookie::group::{GroupWagerConfig, GroupWagerManager, ResolverAllowList};
use bookie::ledger::AccountManager;
use bookie::uow::NullSink;
use chrono::Duration;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

const RESOLVER: i64 = 999;

async fn shared_pool() -> (SqlitePool, PathBuf) {
    let path = std::env::temp_dir().join(format!("bookie-test-{}.db", Uuid::new_v4()));
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(5))
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .expect("Failed to open shared database");
    schema::apply(&pool).await.expect("Failed to apply schema");
    (pool, path)
}

fn cleanup(path: &PathBuf) {
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}

#[tokio::test]
async fn test_concurrent_deductions_admit_exactly_one() {
    let (pool, path) = shared_pool().await;
    let accounts = AccountManager::new(pool.clone(), Arc::new(NullSink)).with_initial_balance(100);
    accounts.get_or_create(1).await.unwrap();
    accounts.get_or_create(2).await.unwrap();

    let a = accounts.clone();
    let b = accounts.clone();
    let (first, second) = tokio::join!(a.transfer(1, 2, 80), b.transfer(1, 2, 80));

    assert_eq!(
        first.is_ok() as u32 + second.is_ok() as u32,
        1,
        "exactly one of two racing deductions may pass the availability guard"
    );

    // The survivor's deduction landed once; nothing else moved.
    assert_eq!(accounts.view(1).await.unwrap().balance, 20);
    assert_eq!(accounts.view(2).await.unwrap().balance, 180);
    assert_eq!(accounts.history(1, 10).await.unwrap().len(), 2);
    assert_eq!(accounts.history(2, 10).await.unwrap().len(), 2);

    pool.close().await;
    cleanup(&path);
}

#[tokio::test]
async fn test_concurrent_resolutions_settle_exactly_once() {
    let (pool, path) = shared_pool().await;
    let sink = Arc::new(NullSink);
    let accounts = AccountManager::new(pool.clone(), sink.clone()).with_initial_balance(1000);
    let wagers = GroupWagerManager::new(
        pool.clone(),
        sink,
        GroupWagerConfig::default(),
        Arc::new(ResolverAllowList::new([RESOLVER])),
    );
    for user_id in 1..=3 {
        accounts.get_or_create(user_id).await.unwrap();
    }

    let detail = wagers
        .create(7, 1, "race winner", &["red", "blue"], Duration::hours(1))
        .await
        .unwrap();
    let (red, blue) = (detail.options[0].id, detail.options[1].id);
    let wager_id = detail.wager.id;
    wagers.place_bet(wager_id, 2, red, 100).await.unwrap();
    wagers.place_bet(wager_id, 3, blue, 300).await.unwrap();

    // Two resolvers race to opposite outcomes.
    let a = wagers.clone();
    let b = wagers.clone();
    let (first, second) = tokio::join!(
        a.resolve(wager_id, RESOLVER, red),
        b.resolve(wager_id, RESOLVER, blue)
    );
    assert_eq!(
        first.is_ok() as u32 + second.is_ok() as u32,
        1,
        "exactly one of two racing resolutions may transition the wager"
    );

    // The surviving attempt decided the winner and funds moved exactly once.
    let winning = if first.is_ok() { red } else { blue };
    let detail = wagers.get(wager_id).await.unwrap();
    assert_eq!(detail.wager.winning_option_id, Some(winning));
    assert_eq!(accounts.history(2, 10).await.unwrap().len(), 2);
    assert_eq!(accounts.history(3, 10).await.unwrap().len(), 2);

    // Settlement is zero-sum across the participants.
    let total = accounts.view(2).await.unwrap().balance + accounts.view(3).await.unwrap().balance;
    assert_eq!(total, 2000);

    pool.close().await;
    cleanup(&path);
}
