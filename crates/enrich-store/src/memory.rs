//! In-process record store used by tests and dry runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use enrich_core::{EnrichmentOutcome, Provider, RunRecord};

use crate::{RecordStore, StoreError};

#[derive(Default)]
struct Inner {
    providers: BTreeMap<String, Provider>,
    run_records: Vec<RunRecord>,
    update_calls: usize,
    /// Remaining failures to inject per provider id.
    failing_updates: HashMap<String, u32>,
}

/// Provider table held in memory, ordered by id like the HTTP store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new(providers: impl IntoIterator<Item = Provider>) -> Self {
        let store = Self::default();
        {
            let mut inner = store.lock();
            for p in providers {
                inner.providers.insert(p.id.clone(), p);
            }
        }
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a test panicked mid-update; the map is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the next `times` updates for `provider_id` fail with a server error.
    pub fn fail_updates(&self, provider_id: &str, times: u32) {
        self.lock().failing_updates.insert(provider_id.to_string(), times);
    }

    pub fn provider(&self, id: &str) -> Option<Provider> {
        self.lock().providers.get(id).cloned()
    }

    pub fn run_records(&self) -> Vec<RunRecord> {
        self.lock().run_records.clone()
    }

    /// Number of update calls received, failed ones included.
    pub fn update_calls(&self) -> usize {
        self.lock().update_calls
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.lock().providers.len())
    }

    async fn get_page(&self, offset: usize, limit: usize) -> Result<Vec<Provider>, StoreError> {
        Ok(self
            .lock()
            .providers
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn update(&self, outcome: &EnrichmentOutcome) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.update_calls += 1;
        if let Some(remaining) = inner.failing_updates.get_mut(&outcome.provider_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Server {
                    status: 503,
                    body: "injected failure".into(),
                });
            }
        }
        let provider = inner
            .providers
            .get_mut(&outcome.provider_id)
            .ok_or_else(|| StoreError::UnknownProvider(outcome.provider_id.clone()))?;
        provider.apply(outcome);
        Ok(())
    }

    async fn insert_run_record(&self, record: &RunRecord) -> Result<(), StoreError> {
        self.lock().run_records.push(record.clone());
        Ok(())
    }
}
