//! Record store boundary: PostgREST over HTTP for production, in-memory for tests.

mod error;
pub use error::StoreError;

mod memory;
mod postgrest;
mod retry;

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;
pub use retry::{RetryPolicy, retry_write};

use async_trait::async_trait;
use enrich_core::{EnrichmentOutcome, Provider, RunRecord};

/// Record-oriented access to the provider table, keyed by provider id.
///
/// Pages are always returned in ascending id order so that offsets mean the
/// same thing on every invocation.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Total number of providers in the roster.
    async fn count(&self) -> Result<usize, StoreError>;

    async fn get_page(&self, offset: usize, limit: usize) -> Result<Vec<Provider>, StoreError>;

    /// Apply one provider's outcome as a self-contained partial update.
    async fn update(&self, outcome: &EnrichmentOutcome) -> Result<(), StoreError>;

    async fn insert_run_record(&self, record: &RunRecord) -> Result<(), StoreError>;
}
