//! Integration tests for the balance ledger and audit trail.
//!
//! Covers account creation with the initial grant, transfers, the
//! available-balance reservation computation, and the pairing of every
//! balance mutation with exactly one immutable history row.

use bookie::db::{Database, DatabaseConfig};
use bookie::ledger::{AccountManager, LedgerError, TransactionKind};
use bookie::uow::{EventKind, MemorySink};
use bookie::wager::{PeerWagerManager, VotePolicy};
use sqlx::SqlitePool;
use std::sync::Arc;

async fn setup() -> (SqlitePool, Arc<MemorySink>) {
    let db = Database::new(&DatabaseConfig::in_memory())
        .await
        .expect("Failed to open in-memory database");
    (db.pool().clone(), Arc::new(MemorySink::new()))
}

#[tokio::test]
async fn test_get_or_create_grants_initial_balance_once() {
    let (pool, sink) = setup().await;
    let accounts = AccountManager::new(pool, sink).with_initial_balance(500);

    let view = accounts.get_or_create(1).await.expect("Should create account");
    assert_eq!(view.balance, 500);
    assert_eq!(view.available, 500);

    // Second call is a plain fetch.
    let view = accounts.get_or_create(1).await.expect("Should fetch account");
    assert_eq!(view.balance, 500);

    let history = accounts.history(1, 10).await.expect("Should list history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, TransactionKind::InitialGrant);
    assert_eq!(history[0].balance_before, 0);
    assert_eq!(history[0].balance_after, 500);
    assert_eq!(history[0].amount, 500);
}

#[tokio::test]
async fn test_transfer_moves_funds_and_writes_paired_entries() {
    let (pool, sink) = setup().await;
    let accounts = AccountManager::new(pool, sink.clone()).with_initial_balance(1000);
    accounts.get_or_create(1).await.unwrap();
    accounts.get_or_create(2).await.unwrap();

    let receipt = accounts.transfer(1, 2, 300).await.expect("Transfer should succeed");
    assert_eq!(receipt.from_balance, 700);
    assert_eq!(receipt.to_balance, 1300);

    let sender_history = accounts.history(1, 10).await.unwrap();
    assert_eq!(sender_history[0].kind, TransactionKind::TransferOut);
    assert_eq!(sender_history[0].amount, -300);
    let receiver_history = accounts.history(2, 10).await.unwrap();
    assert_eq!(receiver_history[0].kind, TransactionKind::TransferIn);
    assert_eq!(receiver_history[0].amount, 300);

    // Before/after amounts always reconcile.
    for entry in sender_history.iter().chain(receiver_history.iter()) {
        assert_eq!(entry.balance_after - entry.balance_before, entry.amount);
    }

    // Events flushed after commit, debit before credit.
    let events = sink.delivered();
    let transfer_events: Vec<_> = events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::BalanceChanged { user_id, kind, .. }
                if matches!(
                    kind,
                    TransactionKind::TransferOut | TransactionKind::TransferIn
                ) =>
            {
                Some(*user_id)
            }
            _ => None,
        })
        .collect();
    assert_eq!(transfer_events, vec![1, 2]);
}

#[tokio::test]
async fn test_transfer_rejects_bad_input() {
    let (pool, sink) = setup().await;
    let accounts = AccountManager::new(pool, sink);
    accounts.get_or_create(1).await.unwrap();
    accounts.get_or_create(2).await.unwrap();

    assert!(matches!(
        accounts.transfer(1, 2, 0).await,
        Err(LedgerError::InvalidAmount(0))
    ));
    assert!(matches!(
        accounts.transfer(1, 2, -5).await,
        Err(LedgerError::InvalidAmount(-5))
    ));
    assert!(matches!(
        accounts.transfer(1, 1, 10).await,
        Err(LedgerError::SelfTransfer)
    ));
}

#[tokio::test]
async fn test_insufficient_funds_rolls_back_everything() {
    let (pool, sink) = setup().await;
    let accounts = AccountManager::new(pool, sink.clone()).with_initial_balance(100);
    accounts.get_or_create(1).await.unwrap();
    accounts.get_or_create(2).await.unwrap();
    let events_before = sink.delivered().len();

    let err = accounts.transfer(1, 2, 500).await.unwrap_err();
    match err {
        LedgerError::InsufficientFunds {
            required,
            available,
        } => {
            assert_eq!(required, 500);
            assert_eq!(available, 100);
        }
        other => panic!("Expected InsufficientFunds, got {other}"),
    }

    // No balances moved, no history written, no events leaked.
    assert_eq!(accounts.view(1).await.unwrap().balance, 100);
    assert_eq!(accounts.view(2).await.unwrap().balance, 100);
    assert_eq!(accounts.history(1, 10).await.unwrap().len(), 1);
    assert_eq!(sink.delivered().len(), events_before);
}

#[tokio::test]
async fn test_sequential_deductions_past_the_limit_fail() {
    // The conditional update admits exactly the deductions the available
    // balance covers, no matter how the attempts are interleaved.
    let (pool, sink) = setup().await;
    let accounts = AccountManager::new(pool, sink).with_initial_balance(100);
    accounts.get_or_create(1).await.unwrap();
    accounts.get_or_create(2).await.unwrap();

    assert!(accounts.transfer(1, 2, 80).await.is_ok());
    assert!(matches!(
        accounts.transfer(1, 2, 80).await,
        Err(LedgerError::InsufficientFunds { .. })
    ));
    assert_eq!(accounts.view(1).await.unwrap().balance, 20);
}

#[tokio::test]
async fn test_available_balance_reserves_open_wagers() {
    let (pool, sink) = setup().await;
    let accounts = AccountManager::new(pool.clone(), sink.clone()).with_initial_balance(1000);
    let wagers = PeerWagerManager::new(pool, sink, VotePolicy::default());
    accounts.get_or_create(1).await.unwrap();
    accounts.get_or_create(2).await.unwrap();

    wagers
        .propose(1, 1, 2, 600, "first to the summit")
        .await
        .expect("Propose should succeed");

    // Both parties have the stake reserved while the wager is open.
    for user_id in [1, 2] {
        let view = accounts.view(user_id).await.unwrap();
        assert_eq!(view.balance, 1000);
        assert_eq!(view.available, 400);
    }

    // The reservation binds deductions.
    assert!(matches!(
        accounts.transfer(1, 2, 500).await,
        Err(LedgerError::InsufficientFunds { available: 400, .. })
    ));
    assert!(accounts.transfer(1, 2, 400).await.is_ok());
}
