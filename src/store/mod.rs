//! Linked-account persistence.
//!
//! PostgreSQL in production; an in-memory store when no database is
//! configured and in tests.

pub mod accounts;
pub mod memory;
pub mod postgres;
pub mod refresh;

pub use accounts::{
    AccountInfo, AccountStore, AccountUpsert, LinkedAccount, RefreshCandidate, UpsertOutcome,
    MAX_REFRESH_FAILURES,
};
pub use memory::MemoryAccountStore;
pub use postgres::PgAccountStore;
pub use refresh::{refresh_cycle, refresh_daemon, RefreshSummary};
