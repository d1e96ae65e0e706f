//! Data access layer for the chronicle recorder.
//!
//! Provides the `events` / `event_types` models and repositories, the
//! [`EventTypeStore`](store::EventTypeStore) seam, and the event-type
//! resolution cache ([`EventTypeResolver`](resolver::EventTypeResolver))
//! used on the hot path of every event write.

use sqlx::postgres::PgPoolOptions;

pub mod error;
pub mod fetch;
pub mod models;
pub mod repositories;
pub mod resolver;
pub mod retry;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::StoreError;
pub use resolver::{EventTypeResolver, RefreshEventTypes, ResolverConfig};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply any pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
