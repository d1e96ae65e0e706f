//! End-to-end tests for the event-type resolution pipeline: resolver,
//! batch fetcher, and retry policy working together over a scripted
//! store, without a live database.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use tokio::sync::mpsc;

use chronicle_db::error::StoreError;
use chronicle_db::models::event::EventType;
use chronicle_db::resolver::{EventTypeResolver, RefreshEventTypes, ResolverConfig};
use chronicle_db::retry::RetryPolicy;
use chronicle_db::store::EventTypeStore;

/// Store double serving a fixed name→id table, with optional scripted
/// failures ahead of the table.
struct ScriptedStore {
    table: HashMap<String, i64>,
    calls: Mutex<Vec<Vec<String>>>,
    failures: Mutex<Vec<StoreError>>,
}

impl ScriptedStore {
    fn new(rows: &[(&str, i64)]) -> Self {
        Self {
            table: rows.iter().map(|(n, id)| (n.to_string(), *id)).collect(),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    fn fail_next(&self, err: StoreError) {
        self.failures.lock().unwrap().push(err);
    }

    fn query_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl EventTypeStore for ScriptedStore {
    async fn select_event_type_ids(
        &self,
        names: &[String],
    ) -> Result<Vec<(i64, String)>, StoreError> {
        self.calls.lock().unwrap().push(names.to_vec());
        let mut failures = self.failures.lock().unwrap();
        if !failures.is_empty() {
            return Err(failures.remove(0));
        }
        Ok(names
            .iter()
            .filter_map(|n| self.table.get(n).map(|id| (*id, n.clone())))
            .collect())
    }
}

fn deadlock() -> StoreError {
    StoreError::Backend {
        code: "40P01".to_string(),
        message: "deadlock detected".to_string(),
    }
}

fn new_resolver(
    config: ResolverConfig,
) -> (
    EventTypeResolver,
    mpsc::UnboundedReceiver<RefreshEventTypes>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventTypeResolver::new(config, tx), rx)
}

#[tokio::test(start_paused = true)]
async fn chunked_lookup_with_transient_failure_resolves_everything() {
    let store = ScriptedStore::new(&[("a", 1), ("b", 2), ("c", 3), ("d", 4)]);
    // First chunk query deadlocks once before succeeding.
    store.fail_next(deadlock());

    let config = ResolverConfig {
        max_bind_vars: 2,
        retry: RetryPolicy::new(3, Duration::from_millis(100)),
        ..ResolverConfig::default()
    };
    let (mut resolver, _rx) = new_resolver(config);

    let names: Vec<String> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let results = resolver.get_many(&names, &store, true).await.unwrap();

    // 3 chunks plus 1 retried query for the failed chunk.
    assert_eq!(store.query_count(), 4);
    assert_eq!(results["a"], Some(1));
    assert_eq!(results["d"], Some(4));
    assert_eq!(results["e"], None);
    assert!(resolver.is_known_absent("e"));

    // Everything is now answered from cache.
    let results = resolver.get_many(&names, &store, true).await.unwrap();
    assert_eq!(store.query_count(), 4);
    assert_eq!(results.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn retry_exhaustion_surfaces_the_last_error() {
    let store = ScriptedStore::new(&[("a", 1)]);
    store.fail_next(deadlock());
    store.fail_next(deadlock());

    let config = ResolverConfig {
        retry: RetryPolicy::new(2, Duration::from_millis(100)),
        ..ResolverConfig::default()
    };
    let (mut resolver, _rx) = new_resolver(config);

    let result = resolver
        .get_many(&["a".to_string()], &store, true)
        .await;

    assert_matches!(result, Err(StoreError::Backend { code, .. }) if code == "40P01");
    assert_eq!(store.query_count(), 2);
}

#[tokio::test]
async fn refreshed_names_become_resolvable_once_created() {
    // An external context observes a miss; the row is then committed by
    // the recorder, and the scheduled refresh resolves it authoritatively.
    let store = ScriptedStore::new(&[]);
    let (mut resolver, mut refresh_rx) = new_resolver(ResolverConfig::default());

    let results = resolver
        .get_many(&["new.event".to_string()], &store, false)
        .await
        .unwrap();
    assert_eq!(results["new.event"], None);
    assert!(!resolver.is_known_absent("new.event"));

    let task = refresh_rx.try_recv().unwrap();
    assert_eq!(task.event_types, vec!["new.event".to_string()]);

    // Recorder commits the row...
    resolver
        .add_pending(EventType {
            id: 77,
            name: "new.event".to_string(),
        })
        .unwrap();
    resolver.post_commit_pending();

    // ...so servicing the refresh finds it cached, with no further I/O.
    let queries_before = store.query_count();
    let results = resolver.get_many(&task.event_types, &store, true).await.unwrap();
    assert_eq!(results["new.event"], Some(77));
    assert_eq!(store.query_count(), queries_before);
}
