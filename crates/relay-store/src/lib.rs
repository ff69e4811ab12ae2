//! SQLite-backed persistence for the relay event pipeline.
//!
//! Three tables drive behavior: the append-only `events` log (unique
//! `event_id` is the idempotency serialization point), the rolling-comment
//! mapping, and the evidence index. A fourth table, `approvals`, is declared
//! for a future approval workflow and is neither written nor read here.

use thiserror::Error;

mod sqlite;

pub use sqlite::SqliteRelayStore;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, RelayStoreError>;

/// Errors returned by the store.
#[derive(Debug, Error)]
pub enum RelayStoreError {
    #[error("invalid persisted value for '{field}': {value}")]
    InvalidPersistedValue { field: &'static str, value: String },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A stored lifecycle event row. `overall_verdict` holds the effective
/// (post-downgrade) verdict; the reported verdict lives inside
/// `payload_json`. Rows are never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub event_id: String,
    pub repo: String,
    pub issue_number: u64,
    pub event_type: String,
    pub role: String,
    pub agent: String,
    pub environment: Option<String>,
    pub overall_verdict: Option<String>,
    pub created_at: String,
    pub payload_hash: String,
    pub payload_json: String,
}

/// Outcome of the idempotent insert protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventInsertOutcome {
    /// New row written; the pipeline continues downstream.
    Inserted,
    /// Same `event_id`, same payload hash. No side effects.
    Idempotent,
    /// Same `event_id`, different payload hash. No side effects.
    Conflict { existing_hash: String },
}

/// Last known forge comment id carrying the status marker for an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollingCommentRow {
    pub comment_id: u64,
    pub updated_at: String,
}

/// One uploaded evidence asset. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceRecord {
    pub id: String,
    pub repo: String,
    pub issue_number: u64,
    pub event_id: Option<String>,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub object_key: String,
    pub created_at: String,
}

/// Row counts surfaced by the status endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub events: u64,
    pub rolling_comments: u64,
    pub evidence: u64,
}
