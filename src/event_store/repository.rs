//! Event Store Repository
//!
//! Core implementation of the append-only, per-aggregate event log with
//! optimistic concurrency control. A single `append` call is one attempt:
//! conflicts are surfaced to the caller rather than retried transparently,
//! per the command-handler contract (callers reload and decide whether to
//! retry).

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::domain::{OrderEvent, ProductEvent, UserEvent};

use super::EventStoreError;

/// Postgres SQLSTATE for a unique-constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

/// A stored event as read back from `domain_events`.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub version: i64,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// An event that knows its own storage discriminator. Implemented for each
/// of the three domain event enums; keeps `EventStore::append` generic
/// without leaning on stringly-typed discriminators at call sites.
pub trait StorableEvent: Serialize {
    fn event_type(&self) -> &'static str;
}

impl StorableEvent for ProductEvent {
    fn event_type(&self) -> &'static str {
        ProductEvent::event_type(self)
    }
}

impl StorableEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        OrderEvent::event_type(self)
    }
}

impl StorableEvent for UserEvent {
    fn event_type(&self) -> &'static str {
        UserEvent::event_type(self)
    }
}

/// The append-only event log.
#[derive(Debug, Clone)]
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one or more events for a single aggregate at `expected_version`.
    /// Assigns versions `expected_version+1 ..= expected_version+events.len()`.
    /// Atomic: either every event is persisted, or none are. A concurrent
    /// writer that raced ahead surfaces as `EventStoreError::VersionConflict`
    /// — detected via the unique `(aggregate_id, version)` index violation,
    /// never by matching on an error message.
    pub async fn append<E: StorableEvent>(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
        events: &[E],
        expected_version: i64,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(events.len());

        for (offset, event) in events.iter().enumerate() {
            let version = expected_version + 1 + offset as i64;
            let event_type = event.event_type();
            let event_data = serde_json::to_value(event)?;

            let row: Result<(Uuid, DateTime<Utc>), sqlx::Error> = sqlx::query_as(
                r#"
                INSERT INTO domain_events (aggregate_type, aggregate_id, version, event_type, event_data)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, created_at
                "#,
            )
            .bind(aggregate_type)
            .bind(aggregate_id)
            .bind(version)
            .bind(event_type)
            .bind(&event_data)
            .fetch_one(&mut *tx)
            .await;

            match row {
                Ok((id, created_at)) => stored.push(StoredEvent {
                    id,
                    aggregate_type: aggregate_type.to_string(),
                    aggregate_id,
                    version,
                    event_type: event_type.to_string(),
                    event_data,
                    created_at,
                }),
                Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                    drop(tx);
                    let actual = self.current_version(aggregate_id).await?;
                    return Err(EventStoreError::VersionConflict {
                        aggregate_id,
                        expected: expected_version,
                        actual,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit().await?;
        Ok(stored)
    }

    /// Current version of an aggregate (0 if it has no events yet).
    pub async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, EventStoreError> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM domain_events WHERE aggregate_id = $1")
                .bind(aggregate_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(version.unwrap_or(0))
    }

    /// Load every event for an aggregate, ordered by version ascending.
    /// Returns an empty vector when the aggregate has no events.
    pub async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows: Vec<(Uuid, String, Uuid, i64, String, serde_json::Value, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT id, aggregate_type, aggregate_id, version, event_type, event_data, created_at
            FROM domain_events
            WHERE aggregate_id = $1
            ORDER BY version ASC
            "#,
        )
        .bind(aggregate_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, aggregate_type, aggregate_id, version, event_type, event_data, created_at)| StoredEvent {
                    id,
                    aggregate_type,
                    aggregate_id,
                    version,
                    event_type,
                    event_data,
                    created_at,
                },
            )
            .collect())
    }

    /// Rebuild an aggregate by replaying its full event history. No
    /// snapshotting: always a full replay, per design. Returns `None` when
    /// the aggregate has never had an event appended.
    pub async fn load_aggregate<A>(&self, aggregate_id: Uuid) -> Result<Option<A>, EventStoreError>
    where
        A: Aggregate + Default,
        A::Event: DeserializeOwned,
    {
        let events = self.load_events(aggregate_id).await?;
        if events.is_empty() {
            return Ok(None);
        }

        let mut aggregate = A::default();
        for stored in events {
            let event: A::Event = serde_json::from_value(stored.event_data)?;
            aggregate = aggregate.apply(event);
        }

        Ok(Some(aggregate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storable_event_type_dispatch() {
        use chrono::Utc;

        let event = ProductEvent::ProductDeleted {
            product_id: Uuid::new_v4(),
            deleted_at: Utc::now(),
        };
        assert_eq!(StorableEvent::event_type(&event), "ProductDeleted");
    }
}
