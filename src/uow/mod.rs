//! Unit of work: one database transaction plus buffered domain events.
//!
//! Every public engine operation opens a unit of work, performs all of its
//! reads and writes through the bound transaction, and commits exactly once.
//! Events published during the operation are buffered and flushed to the sink
//! only after a durable commit; rollback discards them, so a failed operation
//! never appears to have happened.

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::sync::Arc;
use thiserror::Error;

pub mod events;

pub use events::{DomainEvent, EventKind, EventSink, MemorySink, NullSink};

/// Unit of work errors
#[derive(Debug, Error)]
pub enum UowError {
    /// Transaction accessed before `begin` or after commit/rollback
    #[error("Unit of work has not been started")]
    NotStarted,

    /// `begin` called on a unit of work that already holds a transaction
    #[error("Unit of work has already been started")]
    AlreadyBegun,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type UowResult<T> = Result<T, UowError>;

/// One transaction, the repositories bound to it, and the events buffered
/// until it commits.
pub struct UnitOfWork {
    tx: Option<Transaction<'static, Sqlite>>,
    events: Vec<DomainEvent>,
    sink: Arc<dyn EventSink>,
}

impl UnitOfWork {
    /// Create an unstarted unit of work bound to an event sink.
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            tx: None,
            events: Vec::new(),
            sink,
        }
    }

    /// Open a unit of work with its transaction already begun.
    pub async fn begin(pool: &SqlitePool, sink: Arc<dyn EventSink>) -> UowResult<Self> {
        let mut uow = Self::new(sink);
        uow.start(pool).await?;
        Ok(uow)
    }

    /// Open the transaction. Fails if one is already open.
    pub async fn start(&mut self, pool: &SqlitePool) -> UowResult<()> {
        if self.tx.is_some() {
            return Err(UowError::AlreadyBegun);
        }
        self.tx = Some(pool.begin().await?);
        Ok(())
    }

    /// The transaction connection all repository calls run against.
    ///
    /// Returns [`UowError::NotStarted`] before `begin` and after
    /// commit/rollback; repository access outside an open transaction is a
    /// caller bug surfaced as an ordinary error, not a panic.
    pub fn conn(&mut self) -> UowResult<&mut SqliteConnection> {
        match self.tx.as_deref_mut() {
            Some(conn) => Ok(conn),
            None => Err(UowError::NotStarted),
        }
    }

    /// Buffer an event for delivery after commit.
    pub fn publish(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    /// Number of events currently buffered.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Commit the transaction, then flush buffered events in enqueue order.
    pub async fn commit(mut self) -> UowResult<()> {
        let tx = self.tx.take().ok_or(UowError::NotStarted)?;
        tx.commit().await?;
        for event in self.events.drain(..) {
            self.sink.deliver(&event).await;
        }
        Ok(())
    }

    /// Roll back and discard buffered events. Idempotent: safe to call on an
    /// unstarted or already-finished unit of work.
    pub async fn rollback(&mut self) -> UowResult<()> {
        self.events.clear();
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

// Dropping an open unit of work rolls the transaction back (sqlx drop
// behavior) and the buffered events go with it.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, DatabaseConfig};
    use crate::ledger::TransactionKind;

    fn balance_event(user_id: i64, amount: i64) -> DomainEvent {
        DomainEvent::new(EventKind::BalanceChanged {
            user_id,
            kind: TransactionKind::InitialGrant,
            amount,
            balance_after: amount,
        })
    }

    async fn test_pool() -> SqlitePool {
        Database::new(&DatabaseConfig::in_memory())
            .await
            .expect("Failed to open in-memory database")
            .pool()
            .clone()
    }

    #[tokio::test]
    async fn test_conn_before_begin_is_typed_error() {
        let mut uow = UnitOfWork::new(Arc::new(NullSink));
        assert!(matches!(uow.conn(), Err(UowError::NotStarted)));
    }

    #[tokio::test]
    async fn test_double_begin_rejected() {
        let pool = test_pool().await;
        let mut uow = UnitOfWork::begin(&pool, Arc::new(NullSink))
            .await
            .expect("begin should succeed");
        assert!(matches!(uow.start(&pool).await, Err(UowError::AlreadyBegun)));
        uow.rollback().await.expect("rollback should succeed");
    }

    #[tokio::test]
    async fn test_events_flushed_in_order_after_commit() {
        let pool = test_pool().await;
        let sink = Arc::new(MemorySink::new());

        let mut uow = UnitOfWork::begin(&pool, sink.clone()).await.unwrap();
        uow.publish(balance_event(1, 10));
        uow.publish(balance_event(2, 20));

        // Nothing visible before commit.
        assert!(sink.delivered().is_empty());
        assert_eq!(uow.pending_events(), 2);

        uow.commit().await.expect("commit should succeed");

        let delivered = sink.delivered();
        assert_eq!(delivered.len(), 2);
        assert!(matches!(
            delivered[0].kind,
            EventKind::BalanceChanged { user_id: 1, .. }
        ));
        assert!(matches!(
            delivered[1].kind,
            EventKind::BalanceChanged { user_id: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_rollback_discards_events_and_is_idempotent() {
        let pool = test_pool().await;
        let sink = Arc::new(MemorySink::new());

        let mut uow = UnitOfWork::begin(&pool, sink.clone()).await.unwrap();
        uow.publish(balance_event(1, 10));

        uow.rollback().await.expect("first rollback should succeed");
        uow.rollback().await.expect("second rollback should succeed");

        assert!(sink.delivered().is_empty());
        assert!(matches!(uow.conn(), Err(UowError::NotStarted)));
    }

    #[tokio::test]
    async fn test_rolled_back_writes_are_invisible() {
        let pool = test_pool().await;

        let mut uow = UnitOfWork::begin(&pool, Arc::new(NullSink)).await.unwrap();
        sqlx::query("INSERT INTO users (id, balance, created_at, updated_at) VALUES (7, 0, ?, ?)")
            .bind(chrono::Utc::now())
            .bind(chrono::Utc::now())
            .execute(uow.conn().unwrap())
            .await
            .unwrap();
        uow.rollback().await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
