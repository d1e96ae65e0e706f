//! Chunked batch lookup of event-type ids.
//!
//! SQL backends cap the number of bind parameters a single statement may
//! carry, so a large name set is split into chunks and resolved with one
//! query per chunk. Each query runs under the [`RetryPolicy`].

use std::collections::HashMap;

use chronicle_core::types::DbId;

use crate::error::StoreError;
use crate::retry::RetryPolicy;
use crate::store::EventTypeStore;

/// Default bind-parameter ceiling per statement.
///
/// Conservative enough for backends with a hard cap (SQLite allows 999);
/// adjust per backend via [`BatchFetcher::new`].
pub const DEFAULT_MAX_BIND_VARS: usize = 990;

/// Resolves batches of event-type names against the store, one chunked
/// query at a time.
#[derive(Debug, Clone)]
pub struct BatchFetcher {
    max_bind_vars: usize,
    retry: RetryPolicy,
}

impl Default for BatchFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BIND_VARS, RetryPolicy::default())
    }
}

impl BatchFetcher {
    /// Create a fetcher issuing at most `max_bind_vars` binds per query.
    ///
    /// Panics if `max_bind_vars` is zero.
    pub fn new(max_bind_vars: usize, retry: RetryPolicy) -> Self {
        assert!(max_bind_vars > 0, "max_bind_vars must be non-zero");
        Self {
            max_bind_vars,
            retry,
        }
    }

    /// Resolve `names` to ids, issuing `ceil(names.len() / max_bind_vars)`
    /// queries.
    ///
    /// Names with no matching row are absent from the returned map. Any
    /// query error (after retry exhaustion) fails the whole batch.
    pub async fn fetch_ids<S: EventTypeStore>(
        &self,
        store: &S,
        names: &[String],
    ) -> Result<HashMap<String, DbId>, StoreError> {
        let mut ids = HashMap::with_capacity(names.len());

        for chunk in names.chunks(self.max_bind_vars) {
            let rows = self
                .retry
                .run("event type id lookup", || {
                    let chunk = chunk.to_vec();
                    async move { store.select_event_type_ids(&chunk).await }
                })
                .await?;

            for (id, name) in rows {
                ids.insert(name, id);
            }
        }

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;

    use crate::test_support::MockStore;

    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn issues_one_query_per_chunk() {
        let store = MockStore::new([
            ("a", 1),
            ("b", 2),
            ("c", 3),
            ("d", 4),
            ("e", 5),
        ]);
        let fetcher = BatchFetcher::new(2, RetryPolicy::default());

        let ids = fetcher
            .fetch_ids(&store, &names(&["a", "b", "c", "d", "e"]))
            .await
            .unwrap();

        // ceil(5 / 2) = 3 queries, covering every name.
        assert_eq!(store.query_count(), 3);
        assert_eq!(
            store.queried_chunks(),
            vec![names(&["a", "b"]), names(&["c", "d"]), names(&["e"])]
        );
        assert_eq!(ids.len(), 5);
        assert_eq!(ids["a"], 1);
        assert_eq!(ids["e"], 5);
    }

    #[tokio::test]
    async fn unknown_names_are_absent_not_errors() {
        let store = MockStore::new([("known", 7)]);
        let fetcher = BatchFetcher::default();

        let ids = fetcher
            .fetch_ids(&store, &names(&["known", "unknown"]))
            .await
            .unwrap();

        assert_eq!(ids.len(), 1);
        assert_eq!(ids["known"], 7);
        assert!(!ids.contains_key("unknown"));
    }

    #[tokio::test]
    async fn empty_input_issues_no_queries() {
        let store = MockStore::new([]);
        let fetcher = BatchFetcher::default();

        let ids = fetcher.fetch_ids(&store, &[]).await.unwrap();

        assert!(ids.is_empty());
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_chunk_failure_is_retried() {
        let store = MockStore::new([("a", 1)]);
        store.fail_next_with([StoreError::Backend {
            code: "40P01".to_string(),
            message: "deadlock detected".to_string(),
        }]);
        let fetcher = BatchFetcher::new(10, RetryPolicy::new(3, Duration::from_millis(100)));

        let ids = fetcher.fetch_ids(&store, &names(&["a"])).await.unwrap();

        assert_eq!(store.query_count(), 2);
        assert_eq!(ids["a"], 1);
    }

    #[tokio::test]
    async fn fatal_chunk_failure_fails_the_batch() {
        let store = MockStore::new([("a", 1)]);
        store.fail_next_with([StoreError::Backend {
            code: "42601".to_string(),
            message: "syntax error".to_string(),
        }]);
        let fetcher = BatchFetcher::default();

        let result = fetcher.fetch_ids(&store, &names(&["a"])).await;

        assert_matches!(result, Err(StoreError::Backend { code, .. }) if code == "42601");
        assert_eq!(store.query_count(), 1);
    }
}
