//! Event-type name → id resolution with bounded caching.
//!
//! [`EventTypeResolver`] sits on the hot path of every event write. It
//! keeps two bounded LRU maps (resolved ids, and names confirmed absent)
//! plus a buffer of rows inserted but not yet committed, and falls back to
//! chunked store queries only for names in none of the three.
//!
//! The resolver performs no internal locking: it is owned by the single
//! recorder task and all methods take `&mut self`. Lookups on behalf of
//! other contexts must pass `from_recorder = false`; see
//! [`get_many`](EventTypeResolver::get_many) for why absence is only
//! cached from the recorder's own view.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;

use chronicle_core::cache::BoundedCache;
use chronicle_core::types::DbId;
use chronicle_core::CoreError;

use crate::error::StoreError;
use crate::fetch::{BatchFetcher, DEFAULT_MAX_BIND_VARS};
use crate::models::event::EventType;
use crate::retry::{RetryPolicy, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_WAIT};
use crate::store::EventTypeStore;

/// Entries held by each of the id and negative caches.
pub const CACHE_SIZE: usize = 2048;

/// Request to re-resolve names whose absence was observed outside the
/// recorder context, processed later by the recorder itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshEventTypes {
    pub event_types: Vec<String>,
}

/// What the caches know about a name before any store I/O.
enum CacheOutcome {
    Resolved(DbId),
    KnownAbsent,
    Unresolved,
}

/// Resolver configuration.
///
/// All fields have defaults suitable for PostgreSQL; override per backend
/// or via environment variables.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Capacity of the id cache and the negative cache (default: 2048).
    pub cache_capacity: usize,
    /// Bind-parameter ceiling per lookup statement (default: 990).
    pub max_bind_vars: usize,
    /// Retry policy for lookup queries.
    pub retry: RetryPolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_capacity: CACHE_SIZE,
            max_bind_vars: DEFAULT_MAX_BIND_VARS,
            retry: RetryPolicy::default(),
        }
    }
}

impl ResolverConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default |
    /// |--------------------------|---------|
    /// | `EVENT_TYPE_CACHE_SIZE`  | `2048`  |
    /// | `DB_MAX_BIND_VARS`       | `990`   |
    /// | `DB_RETRY_ATTEMPTS`      | `3`     |
    /// | `DB_RETRY_WAIT_MS`       | `100`   |
    pub fn from_env() -> Self {
        let cache_capacity: usize = std::env::var("EVENT_TYPE_CACHE_SIZE")
            .unwrap_or_else(|_| CACHE_SIZE.to_string())
            .parse()
            .expect("EVENT_TYPE_CACHE_SIZE must be a valid usize");

        let max_bind_vars: usize = std::env::var("DB_MAX_BIND_VARS")
            .unwrap_or_else(|_| DEFAULT_MAX_BIND_VARS.to_string())
            .parse()
            .expect("DB_MAX_BIND_VARS must be a valid usize");

        let retry_attempts: u32 = std::env::var("DB_RETRY_ATTEMPTS")
            .unwrap_or_else(|_| DEFAULT_RETRY_ATTEMPTS.to_string())
            .parse()
            .expect("DB_RETRY_ATTEMPTS must be a valid u32");

        let retry_wait_ms: u64 = std::env::var("DB_RETRY_WAIT_MS")
            .unwrap_or_else(|_| DEFAULT_RETRY_WAIT.as_millis().to_string())
            .parse()
            .expect("DB_RETRY_WAIT_MS must be a valid u64");

        Self {
            cache_capacity,
            max_bind_vars,
            retry: RetryPolicy::new(retry_attempts, Duration::from_millis(retry_wait_ms)),
        }
    }
}

/// Caches event-type name → id mappings for the recorder task.
pub struct EventTypeResolver {
    id_cache: BoundedCache<String, DbId>,
    negative_cache: BoundedCache<String, ()>,
    pending: HashMap<String, EventType>,
    fetcher: BatchFetcher,
    refresh_tx: mpsc::UnboundedSender<RefreshEventTypes>,
}

impl EventTypeResolver {
    /// Create a resolver that schedules out-of-band refreshes on
    /// `refresh_tx`.
    pub fn new(config: ResolverConfig, refresh_tx: mpsc::UnboundedSender<RefreshEventTypes>) -> Self {
        Self {
            id_cache: BoundedCache::new(config.cache_capacity),
            negative_cache: BoundedCache::new(config.cache_capacity),
            pending: HashMap::new(),
            fetcher: BatchFetcher::new(config.max_bind_vars, config.retry),
            refresh_tx,
        }
    }

    /// Resolve a single name. Equivalent to `get_many` over one name.
    pub async fn get<S: EventTypeStore>(
        &mut self,
        name: &str,
        store: &S,
        from_recorder: bool,
    ) -> Result<Option<DbId>, StoreError> {
        let key = name.to_string();
        let mut results = self
            .get_many(std::slice::from_ref(&key), store, from_recorder)
            .await?;
        Ok(results.remove(name).flatten())
    }

    /// Resolve `names` to ids, covering exactly the input set.
    ///
    /// Cached and known-absent names are answered without I/O; the rest go
    /// through one chunked batch fetch. A value of `None` means the name
    /// has no row in the store.
    ///
    /// Only calls with `from_recorder = true` may record absence in the
    /// negative cache: the recorder's view of recent inserts is
    /// linearized, while another context may race a concurrent insert and
    /// must not persist a stale "not found". For those callers the
    /// unresolved names are instead sent to the refresh channel, to be
    /// re-resolved later from the recorder context.
    pub async fn get_many<S: EventTypeStore>(
        &mut self,
        names: &[String],
        store: &S,
        from_recorder: bool,
    ) -> Result<HashMap<String, Option<DbId>>, StoreError> {
        let mut results = HashMap::with_capacity(names.len());
        let mut missing: Vec<String> = Vec::new();

        for name in names {
            match self.lookup_cached(name) {
                CacheOutcome::Resolved(id) => {
                    results.insert(name.clone(), Some(id));
                }
                CacheOutcome::KnownAbsent => {
                    results.insert(name.clone(), None);
                }
                CacheOutcome::Unresolved => {
                    if results.insert(name.clone(), None).is_none() {
                        missing.push(name.clone());
                    }
                }
            }
        }

        if missing.is_empty() {
            return Ok(results);
        }

        let fetched = self.fetcher.fetch_ids(store, &missing).await?;
        for (name, id) in &fetched {
            self.id_cache.put(name.clone(), *id);
            results.insert(name.clone(), Some(*id));
        }

        let non_existent: Vec<String> = missing
            .into_iter()
            .filter(|name| !fetched.contains_key(name))
            .collect();
        if !non_existent.is_empty() {
            self.handle_non_existent(non_existent, from_recorder);
        }

        Ok(results)
    }

    /// Register a row inserted in the current transaction but not yet
    /// committed.
    ///
    /// The id becomes visible to lookups only after
    /// [`post_commit_pending`](Self::post_commit_pending); caching it
    /// earlier would survive a rollback. Any stale negative entry for the
    /// name is dropped immediately.
    pub fn add_pending(&mut self, event_type: EventType) -> Result<(), CoreError> {
        if event_type.name.is_empty() {
            return Err(CoreError::Validation(
                "Event type name must not be empty".to_string(),
            ));
        }
        self.negative_cache.remove(&event_type.name);
        self.pending.insert(event_type.name.clone(), event_type);
        Ok(())
    }

    /// Move every pending row into the id cache.
    ///
    /// Must be called exactly once after each successful commit, and never
    /// on rollback.
    pub fn post_commit_pending(&mut self) {
        for (name, event_type) in self.pending.drain() {
            self.negative_cache.remove(&name);
            self.id_cache.put(name, event_type.id);
        }
    }

    /// Discard pending rows after a failed or rolled-back transaction.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// Drop a "confirmed absent" entry, e.g. after the row was created.
    pub fn clear_non_existent(&mut self, name: &str) {
        self.negative_cache.remove(name);
    }

    /// Evict names whose rows were deleted by retention purging.
    ///
    /// Only the id cache is touched: a purged name is unresolved, not
    /// known-absent, so the next lookup goes back to the store.
    pub fn evict_purged<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            self.id_cache.remove(name);
        }
    }

    /// Whether `name` currently has a cached id (no recency refresh).
    pub fn is_cached(&self, name: &str) -> bool {
        self.id_cache.contains(name)
    }

    /// Whether `name` is currently held in the negative cache.
    pub fn is_known_absent(&self, name: &str) -> bool {
        self.negative_cache.contains(name)
    }

    /// Number of rows awaiting commit.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn lookup_cached(&mut self, name: &str) -> CacheOutcome {
        if let Some(id) = self.id_cache.get(name) {
            return CacheOutcome::Resolved(*id);
        }
        if self.negative_cache.contains(name) {
            return CacheOutcome::KnownAbsent;
        }
        CacheOutcome::Unresolved
    }

    fn handle_non_existent(&mut self, names: Vec<String>, from_recorder: bool) {
        if from_recorder {
            for name in names {
                self.negative_cache.put(name, ());
            }
        } else {
            tracing::debug!(
                count = names.len(),
                "Scheduling refresh for event types unresolved outside the recorder"
            );
            if self
                .refresh_tx
                .send(RefreshEventTypes { event_types: names })
                .is_err()
            {
                tracing::warn!("Refresh receiver dropped, unresolved event types not rescheduled");
            }
        }
    }
}
