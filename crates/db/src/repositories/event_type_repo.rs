//! Repository for the `event_types` lookup table.

use sqlx::{PgExecutor, PgPool};

use chronicle_core::types::DbId;

use crate::models::event::EventType;

/// Provides read/write operations for normalized event types.
pub struct EventTypeRepo;

impl EventTypeRepo {
    /// Find an event type by its unique name.
    pub async fn get_by_name(pool: &PgPool, name: &str) -> Result<Option<EventType>, sqlx::Error> {
        sqlx::query_as::<_, EventType>("SELECT id, name FROM event_types WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Resolve a batch of names to `(id, name)` pairs with one query.
    ///
    /// Binds one parameter per name; callers are responsible for keeping
    /// the batch below the backend's bind-parameter ceiling (see
    /// [`BatchFetcher`](crate::fetch::BatchFetcher)). Names with no
    /// matching row are simply absent from the result.
    pub async fn select_ids_by_names(
        pool: &PgPool,
        names: &[String],
    ) -> Result<Vec<(DbId, String)>, sqlx::Error> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("${i}")).collect();
        let query = format!(
            "SELECT id, name FROM event_types WHERE name IN ({})",
            placeholders.join(", ")
        );

        let mut q = sqlx::query_as::<_, (DbId, String)>(&query);
        for name in names {
            q = q.bind(name);
        }
        q.fetch_all(pool).await
    }

    /// Insert a new event type row, returning the generated ID.
    ///
    /// Takes any executor so it can run inside the caller's transaction;
    /// the generated id must not be cached until that transaction commits.
    pub async fn insert(executor: impl PgExecutor<'_>, name: &str) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar("INSERT INTO event_types (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(executor)
            .await
    }

    /// Delete event types no longer referenced by any event.
    ///
    /// Returns the purged names so callers can evict them from the
    /// resolver cache.
    pub async fn purge_unused(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "DELETE FROM event_types \
             WHERE id NOT IN (SELECT DISTINCT event_type_id FROM events) \
             RETURNING name",
        )
        .fetch_all(pool)
        .await
    }
}
