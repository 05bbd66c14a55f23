//! Account manager: get-or-create, balance queries, transfers, history.

use sqlx::SqlitePool;
use std::sync::Arc;

use super::errors::LedgerResult;
use super::models::{AccountView, BalanceEntry, EntryDetail, TransactionKind, TransferReceipt};
use super::repo;
use crate::ledger::LedgerError;
use crate::uow::{DomainEvent, EventKind, EventSink, UnitOfWork};

/// Balance granted to an account the first time it is seen.
pub const DEFAULT_INITIAL_BALANCE: i64 = 1000;

/// Account manager
#[derive(Clone)]
pub struct AccountManager {
    pool: SqlitePool,
    sink: Arc<dyn EventSink>,
    initial_balance: i64,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(pool: SqlitePool, sink: Arc<dyn EventSink>) -> Self {
        Self {
            pool,
            sink,
            initial_balance: DEFAULT_INITIAL_BALANCE,
        }
    }

    /// Override the initial grant amount
    pub fn with_initial_balance(mut self, initial_balance: i64) -> Self {
        self.initial_balance = initial_balance;
        self
    }

    /// Fetch the user's account, creating it with the initial grant on first
    /// sight. Returns the current balance view.
    pub async fn get_or_create(&self, user_id: i64) -> LedgerResult<AccountView> {
        let mut uow = UnitOfWork::begin(&self.pool, self.sink.clone()).await?;

        let (account, created) =
            repo::get_or_create(uow.conn()?, user_id, self.initial_balance).await?;
        if created {
            log::info!("Created account for user {user_id} with {} funds", account.balance);
            uow.publish(DomainEvent::new(EventKind::BalanceChanged {
                user_id,
                kind: TransactionKind::InitialGrant,
                amount: account.balance,
                balance_after: account.balance,
            }));
        }
        let view = repo::fetch_view(uow.conn()?, user_id).await?;

        uow.commit().await?;
        Ok(view)
    }

    /// Current balance and recomputed available balance.
    pub async fn view(&self, user_id: i64) -> LedgerResult<AccountView> {
        let mut conn = self.pool.acquire().await?;
        repo::fetch_view(&mut *conn, user_id).await
    }

    /// Transfer funds between two users.
    ///
    /// One unit of work: the sender's conditional deduction and the
    /// receiver's credit, each paired with its history row.
    pub async fn transfer(&self, from: i64, to: i64, amount: i64) -> LedgerResult<TransferReceipt> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if from == to {
            return Err(LedgerError::SelfTransfer);
        }

        let mut uow = UnitOfWork::begin(&self.pool, self.sink.clone()).await?;

        let debit = repo::apply_change(
            uow.conn()?,
            from,
            -amount,
            TransactionKind::TransferOut,
            &EntryDetail::Transfer { counterpart_id: to },
            None,
        )
        .await?;
        let credit = repo::apply_change(
            uow.conn()?,
            to,
            amount,
            TransactionKind::TransferIn,
            &EntryDetail::Transfer {
                counterpart_id: from,
            },
            None,
        )
        .await?;

        uow.publish(DomainEvent::new(EventKind::BalanceChanged {
            user_id: from,
            kind: TransactionKind::TransferOut,
            amount: -amount,
            balance_after: debit.balance_after,
        }));
        uow.publish(DomainEvent::new(EventKind::BalanceChanged {
            user_id: to,
            kind: TransactionKind::TransferIn,
            amount,
            balance_after: credit.balance_after,
        }));

        uow.commit().await?;
        log::info!("Transferred {amount} from user {from} to user {to}");

        Ok(TransferReceipt {
            from_entry_id: debit.entry_id,
            to_entry_id: credit.entry_id,
            from_balance: debit.balance_after,
            to_balance: credit.balance_after,
        })
    }

    /// Most recent history entries for a user.
    pub async fn history(&self, user_id: i64, limit: i64) -> LedgerResult<Vec<BalanceEntry>> {
        let mut conn = self.pool.acquire().await?;
        repo::history(&mut *conn, user_id, limit).await
    }
}
