//! Run records: one append-only entry per completed batch.
//!
//! Every field is measured. Attribution names the automation identity that
//! ran the batch and `automated` is always set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Source;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("run operator identity must not be empty")]
    EmptyOperator,

    #[error("batch finished at {finished_at} before it started at {started_at}")]
    FinishedBeforeStart {
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    },
}

/// Validate the operator identity once at startup.
pub fn validate_operator(operator: &str) -> Result<(), RecordError> {
    if operator.trim().is_empty() {
        return Err(RecordError::EmptyOperator);
    }
    Ok(())
}

/// Per-provider counters accumulated while a batch runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub fetched: usize,
    pub not_found: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Tally {
    pub fn total(&self) -> usize {
        self.fetched + self.not_found + self.failed + self.skipped
    }

    /// Share of looked-up providers that had a listing, in percent.
    pub fn found_rate(&self) -> f64 {
        let looked_up = self.fetched + self.not_found + self.failed;
        if looked_up == 0 {
            return 0.0;
        }
        self.fetched as f64 / looked_up as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub batch_id: usize,
    pub source: Source,
    pub operator: String,
    pub automated: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub providers_processed: usize,
    pub fetched: usize,
    pub not_found: usize,
    pub skipped: usize,
    /// Providers whose lookup failed and are left for a later run.
    pub flagged_count: usize,
    pub notes: Option<String>,
}

impl RunRecord {
    /// Build the record for a finished batch.
    ///
    /// `finished_at` is truncated to whole seconds past `started_at` so that
    /// `finished_at == started_at + duration_seconds` holds exactly.
    pub fn build(
        batch_id: usize,
        source: Source,
        operator: &str,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        tally: Tally,
    ) -> Result<Self, RecordError> {
        validate_operator(operator)?;
        if finished_at < started_at {
            return Err(RecordError::FinishedBeforeStart {
                started_at,
                finished_at,
            });
        }
        let duration_seconds = (finished_at - started_at).num_seconds();
        let finished_at = started_at + chrono::Duration::seconds(duration_seconds);

        let notes = (tally.failed > 0).then(|| {
            format!(
                "{} provider(s) failed lookup and remain unchecked for a later run",
                tally.failed
            )
        });

        Ok(Self {
            batch_id,
            source,
            operator: operator.trim().to_string(),
            automated: true,
            started_at,
            finished_at,
            duration_seconds,
            providers_processed: tally.total(),
            fetched: tally.fetched,
            not_found: tally.not_found,
            skipped: tally.skipped,
            flagged_count: tally.failed,
            notes,
        })
    }
}
