//! Shared test doubles for resolver and fetcher unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use chronicle_core::types::DbId;

use crate::error::StoreError;
use crate::store::EventTypeStore;

/// In-memory [`EventTypeStore`] that serves a fixed name→id table and
/// records the name chunk of every query it receives.
///
/// An optional error script makes the first N queries fail with the given
/// errors before the table is consulted.
pub struct MockStore {
    table: HashMap<String, DbId>,
    calls: Mutex<Vec<Vec<String>>>,
    error_script: Mutex<Vec<StoreError>>,
}

impl MockStore {
    pub fn new(rows: impl IntoIterator<Item = (&'static str, DbId)>) -> Self {
        Self {
            table: rows
                .into_iter()
                .map(|(name, id)| (name.to_string(), id))
                .collect(),
            calls: Mutex::new(Vec::new()),
            error_script: Mutex::new(Vec::new()),
        }
    }

    /// Queue errors to be returned by upcoming queries, oldest first.
    pub fn fail_next_with(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.error_script.lock().unwrap().extend(errors);
    }

    /// Number of queries issued so far.
    pub fn query_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The name chunks of every query issued so far.
    pub fn queried_chunks(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventTypeStore for MockStore {
    async fn select_event_type_ids(
        &self,
        names: &[String],
    ) -> Result<Vec<(DbId, String)>, StoreError> {
        self.calls.lock().unwrap().push(names.to_vec());

        let mut script = self.error_script.lock().unwrap();
        if !script.is_empty() {
            return Err(script.remove(0));
        }
        drop(script);

        Ok(names
            .iter()
            .filter_map(|name| self.table.get(name).map(|id| (*id, name.clone())))
            .collect())
    }
}
