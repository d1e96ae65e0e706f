//! Repository for the `events` table.

use sqlx::{PgExecutor, PgPool};

use chronicle_core::types::{DbId, Timestamp};

use crate::models::event::Event;

/// Column list for `events` queries.
const EVENT_COLUMNS: &str = "id, event_type_id, payload, occurred_at, created_at";

/// Provides read/write operations for stored events.
pub struct EventRepo;

impl EventRepo {
    /// Insert a new event row, returning the generated ID.
    ///
    /// Takes any executor so the insert can share a transaction with a
    /// newly created `event_types` row.
    pub async fn insert(
        executor: impl PgExecutor<'_>,
        event_type_id: DbId,
        payload: &serde_json::Value,
        occurred_at: Timestamp,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO events (event_type_id, payload, occurred_at) \
             VALUES ($1, $2, $3) \
             RETURNING id",
        )
        .bind(event_type_id)
        .bind(payload)
        .bind(occurred_at)
        .fetch_one(executor)
        .await
    }

    /// List recent events ordered newest-first.
    pub async fn list_recent(
        pool: &PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Event>, sqlx::Error> {
        let query = format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY occurred_at DESC LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
