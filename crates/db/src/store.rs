//! Seam between the resolver and the underlying event store.
//!
//! The resolver and batch fetcher only need one read-only operation, so
//! they depend on this trait rather than on `PgPool` directly. Production
//! code uses the [`sqlx::PgPool`] implementation; tests substitute mocks
//! with call-count instrumentation.

use async_trait::async_trait;
use sqlx::PgPool;

use chronicle_core::types::DbId;

use crate::error::StoreError;
use crate::repositories::EventTypeRepo;

/// Read-only access to the `event_types` table.
#[async_trait]
pub trait EventTypeStore: Send + Sync {
    /// Resolve `names` to `(id, name)` pairs with a single query.
    ///
    /// Names with no matching row are absent from the result; absence is
    /// not an error.
    async fn select_event_type_ids(
        &self,
        names: &[String],
    ) -> Result<Vec<(DbId, String)>, StoreError>;
}

#[async_trait]
impl EventTypeStore for PgPool {
    async fn select_event_type_ids(
        &self,
        names: &[String],
    ) -> Result<Vec<(DbId, String)>, StoreError> {
        EventTypeRepo::select_ids_by_names(self, names)
            .await
            .map_err(StoreError::from)
    }
}
