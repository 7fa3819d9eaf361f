//! Event Store Errors
//!
//! Error types for event store operations.

use uuid::Uuid;

/// Errors that can occur in the event store
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    /// Optimistic concurrency conflict: another writer advanced the
    /// aggregate's version before this append committed.
    #[error("version conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    VersionConflict {
        aggregate_id: Uuid,
        expected: i64,
        actual: i64,
    },

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, EventStoreError::VersionConflict { .. })
    }
}
