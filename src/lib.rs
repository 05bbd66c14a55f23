//! # Bookie
//!
//! A settlement engine for virtual-currency wagers between users, backed by a
//! single relational store and safe under concurrent access.
//!
//! The engine settles three kinds of play:
//!
//! - **Peer wagers**: two-party wagers (`proposed → voting → resolved`)
//!   decided by a majority vote of third parties.
//! - **Group wagers**: multi-option pooled wagers resolved by an authorized
//!   resolver, with proportional payouts from the pot.
//! - **Single-shot bets**: probability bets settled immediately, throttled by
//!   a rolling daily risk limit.
//!
//! All balance mutation flows through the [`ledger`] module, which pairs every
//! change with exactly one append-only history row. Each public operation runs
//! inside a [`uow::UnitOfWork`]: one database transaction plus an event queue
//! that is flushed to subscribers only after a durable commit.
//!
//! Correctness under concurrency relies on the store, not on in-process
//! locks: balance deductions and wager state transitions are single atomic
//! conditional updates, and a zero-rows-affected result is surfaced as a
//! conflict error.
//!
//! ## Core Modules
//!
//! - [`db`]: connection pool and schema
//! - [`uow`]: unit of work and transactional event bus
//! - [`ledger`]: balances, available-balance computation, audit trail
//! - [`wager`]: peer wager engine
//! - [`group`]: group wager engine
//! - [`bet`]: single-shot bets and the daily risk guard

/// Connection pooling and schema management.
pub mod db;
pub use db::{Database, DatabaseConfig};

/// Unit of work: one transaction plus buffered domain events.
pub mod uow;
pub use uow::{DomainEvent, EventKind, EventSink, MemorySink, NullSink, UnitOfWork, UowError};

/// Balance ledger and append-only audit trail.
pub mod ledger;
pub use ledger::{AccountManager, LedgerError, TransactionKind};

/// Peer wager engine.
pub mod wager;
pub use wager::{PeerWagerError, PeerWagerManager, VotePolicy, WagerState};

/// Group wager engine.
pub mod group;
pub use group::{
    GroupWagerConfig, GroupWagerError, GroupWagerManager, GroupWagerState, ResolverAllowList,
    ResolverPolicy,
};

/// Single-shot bets and the daily risk guard.
pub mod bet;
pub use bet::{BetError, BetManager, RiskConfig};
