//! Batch orchestrator: drives one batch of the roster from slice to run record.

use chrono::Utc;
use enrich_core::{
    BatchSpec, EnrichmentOutcome, PartitionError, Provider, RecordError, RunRecord, Source, Tally,
    should_skip, slice,
};
use enrich_source::{Governor, LookupError, SourceAdapter};
use enrich_store::{RecordStore, RetryPolicy, StoreError, retry_write};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid batch: {0}")]
    Partition(#[from] PartitionError),

    #[error("store unavailable: {0}")]
    Persistence(#[from] StoreError),

    #[error("run record: {0}")]
    Record(#[from] RecordError),
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub batch_index: i64,
    pub page_size: i64,
    pub source: Source,
    pub force_refresh: bool,
    pub operator: String,
    pub retry: RetryPolicy,
}

/// What happened to one provider in the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    Skipped,
    Fetched,
    NotFound,
    FetchFailed,
}

#[derive(Debug)]
pub struct BatchReport {
    pub spec: BatchSpec,
    pub tally: Tally,
    pub record: RunRecord,
}

/// Run one batch to completion.
///
/// Providers are visited in id order, one at a time. Lookup failures are
/// logged and left for a later run; only a store write that exhausts its
/// retries stops the batch, and everything written before it stands.
pub async fn run_batch(
    store: &dyn RecordStore,
    source: &dyn SourceAdapter,
    governor: &mut Governor,
    config: &RunConfig,
) -> Result<BatchReport, RunError> {
    enrich_core::validate_operator(&config.operator)?;
    let started_at = Utc::now();

    let roster_size = store.count().await?;
    let spec = slice(roster_size, config.batch_index, config.page_size)?;
    let providers = store.get_page(spec.start, spec.len()).await?;
    if providers.len() < spec.len() {
        warn!(
            expected = spec.len(),
            got = providers.len(),
            "store returned a short page; roster changed since count"
        );
    }
    info!(
        batch_index = spec.batch_index,
        start = spec.start,
        end = spec.end,
        roster_size,
        source = %config.source,
        force_refresh = config.force_refresh,
        "batch started"
    );

    let mut tally = Tally::default();
    let mut lookups = 0usize;
    let total = providers.len();

    for (i, provider) in providers.iter().enumerate() {
        let state = process_provider(store, source, governor, config, provider, &mut lookups).await?;
        match state {
            ProviderState::Skipped => tally.skipped += 1,
            ProviderState::Fetched => tally.fetched += 1,
            ProviderState::NotFound => tally.not_found += 1,
            ProviderState::FetchFailed => tally.failed += 1,
        }
        debug!(n = i + 1, total, provider_id = %provider.id, ?state, "provider done");
    }

    let record = RunRecord::build(
        spec.batch_index,
        config.source,
        &config.operator,
        started_at,
        Utc::now(),
        tally,
    )?;
    let stored = &record;
    retry_write(config.retry, "insert_run_record", move || store.insert_run_record(stored))
        .await
        .map_err(|e| {
            error!(batch_index = spec.batch_index, error = %e, "run record could not be stored");
            e
        })?;
    // Parsed downstream; keep it a single JSON object per line.
    match serde_json::to_string(&record) {
        Ok(json) => info!(target: "run_record", record = %json, "run record"),
        Err(e) => warn!(error = %e, "run record not serialisable for log"),
    }

    info!(
        batch_index = spec.batch_index,
        processed = tally.total(),
        fetched = tally.fetched,
        not_found = tally.not_found,
        failed = tally.failed,
        skipped = tally.skipped,
        found_pct = tally.found_rate(),
        "batch completed"
    );

    Ok(BatchReport { spec, tally, record })
}

async fn process_provider(
    store: &dyn RecordStore,
    source: &dyn SourceAdapter,
    governor: &mut Governor,
    config: &RunConfig,
    provider: &Provider,
    lookups: &mut usize,
) -> Result<ProviderState, RunError> {
    if should_skip(provider, config.force_refresh) {
        return Ok(ProviderState::Skipped);
    }

    if governor.config().is_group_boundary(*lookups) {
        governor.pace_between_groups().await;
    }
    governor.pace_between_requests().await;
    *lookups += 1;

    let identity = governor.next_identity().to_string();
    let result = source
        .lookup(&provider.business_name, &provider.city, &identity)
        .await;

    let (outcome, state) = match result {
        Ok(found) => {
            info!(
                provider_id = %provider.id,
                business_name = %provider.business_name,
                rating = found.rating,
                review_count = ?found.review_count,
                "listing found"
            );
            let outcome = EnrichmentOutcome::found(
                provider.id.clone(),
                found.rating,
                found.review_count,
                found.listing_url,
                Utc::now(),
            );
            (outcome, ProviderState::Fetched)
        }
        Err(LookupError::NotFound) => {
            info!(provider_id = %provider.id, business_name = %provider.business_name, "no listing");
            (
                EnrichmentOutcome::not_found(provider.id.clone(), Utc::now()),
                ProviderState::NotFound,
            )
        }
        Err(LookupError::RateLimited { retry_after }) => {
            warn!(provider_id = %provider.id, ?retry_after, "lookup rate limited; left for a later run");
            governor.back_off(retry_after).await;
            return Ok(ProviderState::FetchFailed);
        }
        Err(e @ LookupError::Transient(_)) => {
            warn!(provider_id = %provider.id, error = %e, "lookup failed; left for a later run");
            return Ok(ProviderState::FetchFailed);
        }
    };

    let outcome = &outcome;
    retry_write(config.retry, "update", move || store.update(outcome))
        .await
        .map_err(|e| {
            error!(provider_id = %outcome.provider_id, error = %e, "provider write failed; aborting batch");
            e
        })?;
    Ok(state)
}
