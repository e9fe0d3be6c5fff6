use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// A listing found for a business on the review source.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingResult {
    pub rating: f64,
    pub review_count: Option<u32>,
    pub listing_url: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LookupError {
    /// No listing for this business. Terminal: recorded as checked-but-absent.
    #[error("no listing found")]
    NotFound,

    /// Network failure, unexpected response or server error. Retried by a later run.
    #[error("transient lookup failure: {0}")]
    Transient(String),

    /// The source asked us to slow down.
    #[error("rate limited by source (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
}

impl LookupError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LookupError::NotFound)
    }
}

/// Looks up one business on one review source.
///
/// `identity` is the client identity the request must declare (sent as the
/// `User-Agent`).
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn lookup(
        &self,
        business_name: &str,
        locality: &str,
        identity: &str,
    ) -> Result<RatingResult, LookupError>;
}
