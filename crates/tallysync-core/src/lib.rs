//! Core extraction and persistence logic
//!
//! Ties the parser's normalization to the outside world: the upstream HTTP
//! fetch per group, the SQLite store with backup-before-write and
//! replace-all semantics, snapshot aggregation for the API, and the
//! periodic scheduler that drives full cycles.

pub mod error;
pub mod extract;
pub mod scheduler;
pub mod snapshot;
pub mod store;

pub use error::CoreError;
pub use extract::{CycleSummary, Extractor, CREDITOR_GROUP, DEBTOR_GROUP};
pub use snapshot::{DashboardSnapshot, SnapshotSummary};
pub use store::{Store, StoredAccount};

// Re-export the canonical record types for downstream crates
pub use tallysync_parser::{AccountRecord, AccountType};
