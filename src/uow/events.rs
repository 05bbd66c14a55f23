//! Domain events and the transactional event bus.
//!
//! Events raised during an operation are buffered inside the unit of work and
//! replayed to the real sink only after the transaction commits, in enqueue
//! order. A rolled-back operation never becomes visible to subscribers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

use crate::ledger::TransactionKind;

/// What happened, with enough context for a subscriber to render it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    BalanceChanged {
        user_id: i64,
        kind: TransactionKind,
        amount: i64,
        balance_after: i64,
    },
    PeerWagerProposed {
        wager_id: i64,
        proposer_id: i64,
        target_id: i64,
        amount: i64,
    },
    PeerWagerAccepted {
        wager_id: i64,
    },
    PeerWagerDeclined {
        wager_id: i64,
    },
    PeerWagerCancelled {
        wager_id: i64,
    },
    PeerWagerResolved {
        wager_id: i64,
        winner_id: i64,
        loser_id: i64,
        amount: i64,
    },
    GroupWagerCreated {
        wager_id: i64,
        guild_id: i64,
    },
    GroupBetPlaced {
        wager_id: i64,
        user_id: i64,
        option_id: i64,
        amount: i64,
    },
    GroupWagerResolved {
        wager_id: i64,
        winning_option_id: i64,
        pot: i64,
    },
}

/// A domain event. Ordinary value; carries no handles into the transaction
/// that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub kind: EventKind,
}

impl DomainEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            kind,
        }
    }
}

/// Receiver for committed domain events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, event: &DomainEvent);
}

/// Sink that drops everything.
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn deliver(&self, _event: &DomainEvent) {}
}

/// Sink that records events in memory, in delivery order.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<DomainEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything delivered so far.
    pub fn delivered(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn deliver(&self, event: &DomainEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
