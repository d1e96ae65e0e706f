//! Single-writer event recording task.
//!
//! [`Recorder`] owns the database pool and the
//! [`EventTypeResolver`]; it is the one context allowed to mutate the
//! resolver state, so everything funnels through its message channel. The
//! loop persists incoming events, answers non-authoritative lookups on
//! behalf of other contexts, re-resolves event types flagged for refresh,
//! and evicts purged types from the cache.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use chronicle_core::types::{DbId, Timestamp};
use chronicle_core::CoreError;
use chronicle_db::models::event::EventType;
use chronicle_db::repositories::{EventRepo, EventTypeRepo};
use chronicle_db::resolver::{EventTypeResolver, RefreshEventTypes, ResolverConfig};
use chronicle_db::{DbPool, StoreError};

/// Capacity of the event submission channel. Submitters are backpressured
/// once this many events are queued.
const EVENT_QUEUE_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// RecordedEvent
// ---------------------------------------------------------------------------

/// An event submitted for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Dot-separated event type name, e.g. `"sensor.updated"`.
    pub event_type: String,

    /// Free-form JSON payload carrying event-specific data.
    #[serde(default = "empty_payload")]
    pub payload: serde_json::Value,

    /// When the event occurred (UTC). Defaults to submission time.
    #[serde(default = "Utc::now")]
    pub occurred_at: Timestamp,
}

fn empty_payload() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

impl RecordedEvent {
    /// Create an event with only the required type name.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: empty_payload(),
            occurred_at: Utc::now(),
        }
    }

    /// Attach a payload to the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Override the occurrence timestamp.
    pub fn with_occurred_at(mut self, occurred_at: Timestamp) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}

// ---------------------------------------------------------------------------
// Errors and messages
// ---------------------------------------------------------------------------

/// Error type for recorder submissions.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// The recorder task has shut down and no longer accepts messages.
    #[error("Recorder is shut down")]
    Closed,

    /// A database operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A caller violated an API contract.
    #[error("Contract violation: {0}")]
    Contract(#[from] CoreError),
}

enum RecorderMessage {
    Record(RecordedEvent),
    Lookup {
        names: Vec<String>,
        reply: oneshot::Sender<Result<HashMap<String, Option<DbId>>, StoreError>>,
    },
    PurgeUnusedEventTypes {
        reply: oneshot::Sender<Result<usize, StoreError>>,
    },
}

// ---------------------------------------------------------------------------
// RecorderHandle
// ---------------------------------------------------------------------------

/// Cloneable handle for submitting work to the recorder task.
///
/// The recorder shuts down once every handle has been dropped and the
/// queue is drained.
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::Sender<RecorderMessage>,
}

impl RecorderHandle {
    /// Queue an event for persistence.
    ///
    /// Persistence is asynchronous; failures are logged by the recorder
    /// rather than reported here.
    pub async fn record(&self, event: RecordedEvent) -> Result<(), RecorderError> {
        self.tx
            .send(RecorderMessage::Record(event))
            .await
            .map_err(|_| RecorderError::Closed)
    }

    /// Resolve event-type names from outside the recorder context.
    ///
    /// Absences observed here are not negative-cached; the recorder
    /// schedules its own refresh for them instead.
    pub async fn lookup(
        &self,
        names: Vec<String>,
    ) -> Result<HashMap<String, Option<DbId>>, RecorderError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RecorderMessage::Lookup { names, reply })
            .await
            .map_err(|_| RecorderError::Closed)?;
        rx.await.map_err(|_| RecorderError::Closed)?.map_err(RecorderError::from)
    }

    /// Delete event types no longer referenced by any event and evict
    /// them from the resolver cache. Returns the number purged.
    pub async fn purge_unused_event_types(&self) -> Result<usize, RecorderError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RecorderMessage::PurgeUnusedEventTypes { reply })
            .await
            .map_err(|_| RecorderError::Closed)?;
        rx.await.map_err(|_| RecorderError::Closed)?.map_err(RecorderError::from)
    }
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

/// Background task that persists events and owns the event-type resolver.
pub struct Recorder {
    pool: DbPool,
    resolver: EventTypeResolver,
    msg_rx: mpsc::Receiver<RecorderMessage>,
    refresh_rx: mpsc::UnboundedReceiver<RefreshEventTypes>,
}

impl Recorder {
    /// Create a recorder and the handle used to feed it.
    pub fn new(pool: DbPool, config: ResolverConfig) -> (Self, RecorderHandle) {
        let (msg_tx, msg_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let recorder = Self {
            pool,
            resolver: EventTypeResolver::new(config, refresh_tx),
            msg_rx,
            refresh_rx,
        };
        (recorder, RecorderHandle { tx: msg_tx })
    }

    /// Run the recorder loop until every [`RecorderHandle`] is dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(task) = self.refresh_rx.recv() => {
                    self.refresh_event_types(task).await;
                }
                msg = self.msg_rx.recv() => match msg {
                    Some(msg) => self.handle_message(msg).await,
                    None => break,
                },
            }
        }
        tracing::info!("Recorder channel closed, shutting down");
    }

    async fn handle_message(&mut self, msg: RecorderMessage) {
        match msg {
            RecorderMessage::Record(event) => {
                if let Err(e) = self.persist(&event).await {
                    tracing::error!(
                        error = %e,
                        event_type = %event.event_type,
                        "Failed to persist event"
                    );
                }
            }
            RecorderMessage::Lookup { names, reply } => {
                let result = self.resolver.get_many(&names, &self.pool, false).await;
                // The caller may have given up; nothing to do then.
                let _ = reply.send(result);
            }
            RecorderMessage::PurgeUnusedEventTypes { reply } => {
                let _ = reply.send(self.purge_unused().await);
            }
        }
    }

    /// Write a single event, creating its `event_types` row when needed.
    ///
    /// A new event type is inserted in the same transaction as the event
    /// row and registered as pending; its id enters the cache only after
    /// the commit succeeds.
    async fn persist(&mut self, event: &RecordedEvent) -> Result<DbId, RecorderError> {
        let resolved = self
            .resolver
            .get_many(std::slice::from_ref(&event.event_type), &self.pool, true)
            .await?;
        let known_id = resolved.get(&event.event_type).copied().flatten();

        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let type_id = match known_id {
            Some(id) => id,
            None => {
                let id = EventTypeRepo::insert(&mut *tx, &event.event_type)
                    .await
                    .map_err(StoreError::from)?;
                self.resolver.add_pending(EventType {
                    id,
                    name: event.event_type.clone(),
                })?;
                id
            }
        };

        let inserted = EventRepo::insert(&mut *tx, type_id, &event.payload, event.occurred_at)
            .await
            .map_err(StoreError::from);
        let event_id = match inserted {
            Ok(id) => id,
            Err(e) => {
                self.resolver.clear_pending();
                return Err(e.into());
            }
        };

        match tx.commit().await {
            Ok(()) => {
                self.resolver.post_commit_pending();
                Ok(event_id)
            }
            Err(e) => {
                self.resolver.clear_pending();
                Err(StoreError::from(e).into())
            }
        }
    }

    /// Re-resolve names whose absence was seen outside the recorder.
    async fn refresh_event_types(&mut self, task: RefreshEventTypes) {
        if let Err(e) = self
            .resolver
            .get_many(&task.event_types, &self.pool, true)
            .await
        {
            tracing::warn!(error = %e, "Event type refresh failed");
        }
    }

    /// Purge unreferenced event types and evict them from the cache.
    async fn purge_unused(&mut self) -> Result<usize, StoreError> {
        let purged = EventTypeRepo::purge_unused(&self.pool).await?;
        self.resolver
            .evict_purged(purged.iter().map(String::as_str));
        if !purged.is_empty() {
            tracing::info!(count = purged.len(), "Purged unused event types");
        }
        Ok(purged.len())
    }
}
