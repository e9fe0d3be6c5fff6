//! HTTP adapter for a JSON rating-lookup API.

use std::time::Duration;

use async_trait::async_trait;
use enrich_core::Source;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::{LookupError, RatingResult, SourceAdapter};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for `GET {base_url}/v1/ratings?source=&name=&locality=`.
///
/// A `200` carries `{rating, review_count, url}`; a `404` or a null rating
/// means the business has no listing.
pub struct HttpLookupSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    source: Source,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    rating: Option<f64>,
    review_count: Option<u32>,
    url: Option<String>,
}

impl HttpLookupSource {
    pub fn new(base_url: String, api_key: Option<String>, source: Source) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LookupError::Transient(format!("building HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            source,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/ratings", self.base_url)
    }
}

#[async_trait]
impl SourceAdapter for HttpLookupSource {
    async fn lookup(
        &self,
        business_name: &str,
        locality: &str,
        identity: &str,
    ) -> Result<RatingResult, LookupError> {
        let source = self.source.to_string();
        let mut req = self
            .client
            .get(self.endpoint())
            .header(reqwest::header::USER_AGENT, identity)
            .query(&[
                ("source", source.as_str()),
                ("name", business_name),
                ("locality", locality),
            ]);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| LookupError::Transient(e.to_string()))?;
        let status = resp.status();
        debug!(business_name, status = status.as_u16(), "lookup response");

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(LookupError::RateLimited { retry_after });
        }
        if status == StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LookupError::Transient(format!("source returned {status}: {body}")));
        }

        let body: LookupResponse = resp
            .json()
            .await
            .map_err(|e| LookupError::Transient(format!("unexpected response shape: {e}")))?;
        into_result(body)
    }
}

fn into_result(body: LookupResponse) -> Result<RatingResult, LookupError> {
    match body.rating {
        Some(rating) if rating.is_finite() => Ok(RatingResult {
            rating,
            review_count: body.review_count,
            listing_url: body.url,
        }),
        Some(rating) => Err(LookupError::Transient(format!("non-finite rating {rating}"))),
        None => Err(LookupError::NotFound),
    }
}

/// `Retry-After` in its delay-seconds form. HTTP-date values are ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
