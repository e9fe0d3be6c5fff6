//! PostgREST store for the shared `providers` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use enrich_core::{EnrichmentOutcome, Provider, RunRecord, Source};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::{RecordStore, StoreError};

const PROVIDERS: &str = "providers";
const RUN_RECORDS: &str = "enrichment_runs";

/// HTTP client for a PostgREST endpoint (e.g. Supabase's `/rest/v1`).
///
/// Provider rows are read and written through `source`'s column prefix.
pub struct PostgrestStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    source: Source,
}

impl PostgrestStore {
    /// `base_url` should be like `https://xyz.supabase.co` (no trailing slash needed).
    pub fn new(base_url: String, api_key: String, source: Source) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            source,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn auth_headers(&self) -> Result<HeaderMap, StoreError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|e| StoreError::Other(format!("invalid API key header: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| StoreError::Other(format!("invalid API key header: {e}")))?;
        headers.insert("apikey", key);
        headers.insert(reqwest::header::AUTHORIZATION, bearer);
        Ok(headers)
    }

    fn select_columns(&self) -> String {
        let s = self.source;
        format!(
            "id,business_name,city,{},{},{},{}",
            s.column("rating"),
            s.column("review_count"),
            s.column("url"),
            s.column("checked_at"),
        )
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl RecordStore for PostgrestStore {
    async fn count(&self) -> Result<usize, StoreError> {
        let resp = self
            .client
            .get(self.table_url(PROVIDERS))
            .headers(self.auth_headers()?)
            .header("Prefer", "count=exact")
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        let range = resp
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or(StoreError::MissingCountHeader)?;
        let count = parse_content_range_total(range).ok_or(StoreError::MissingCountHeader)?;
        info!(count, "counted providers");
        Ok(count)
    }

    async fn get_page(&self, offset: usize, limit: usize) -> Result<Vec<Provider>, StoreError> {
        let offset = offset.to_string();
        let limit = limit.to_string();
        let resp = self
            .client
            .get(self.table_url(PROVIDERS))
            .headers(self.auth_headers()?)
            .query(&[
                ("select", self.select_columns().as_str()),
                ("order", "id.asc"),
                ("offset", offset.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;
        let rows: Vec<Map<String, Value>> = Self::check(resp).await?.json().await?;
        let providers = rows
            .iter()
            .map(|row| provider_from_row(row, self.source))
            .collect::<Result<Vec<_>, _>>()?;
        info!(offset = %offset, count = providers.len(), "fetched provider page");
        Ok(providers)
    }

    async fn update(&self, outcome: &EnrichmentOutcome) -> Result<(), StoreError> {
        let fields = outcome.update_fields(self.source);
        let resp = self
            .client
            .patch(self.table_url(PROVIDERS))
            .headers(self.auth_headers()?)
            .header("Prefer", "return=minimal")
            .query(&[("id", format!("eq.{}", outcome.provider_id))])
            .json(&fields)
            .send()
            .await?;
        Self::check(resp).await?;
        debug!(provider_id = %outcome.provider_id, found = outcome.found, "provider updated");
        Ok(())
    }

    async fn insert_run_record(&self, record: &RunRecord) -> Result<(), StoreError> {
        let resp = self
            .client
            .post(self.table_url(RUN_RECORDS))
            .headers(self.auth_headers()?)
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;
        Self::check(resp).await?;
        info!(batch_id = record.batch_id, "run record stored");
        Ok(())
    }
}

/// Total from a PostgREST `Content-Range` header: `0-0/1234` or `*/0`.
fn parse_content_range_total(header: &str) -> Option<usize> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

/// Build a [`Provider`] from a row selected through `source`'s columns.
///
/// Ids may be numeric or text in the table; both are carried as strings.
fn provider_from_row(row: &Map<String, Value>, source: Source) -> Result<Provider, StoreError> {
    let id = match row.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        other => return Err(StoreError::Other(format!("provider row has unusable id: {other:?}"))),
    };
    let text = |key: &str| row.get(key).and_then(Value::as_str).map(str::to_string);

    let checked_at = match text(&source.column("checked_at")) {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(&raw)
                .map_err(|e| StoreError::Other(format!("provider {id}: bad checked_at {raw:?}: {e}")))?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    Ok(Provider {
        business_name: text("business_name").unwrap_or_default(),
        city: text("city").unwrap_or_default(),
        rating: row.get(&source.column("rating")).and_then(Value::as_f64),
        review_count: row
            .get(&source.column("review_count"))
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok()),
        listing_url: text(&source.column("url")),
        checked_at,
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn store_trims_trailing_slash() {
        let store = PostgrestStore::new("https://db.example.org/".into(), "k".into(), Source::HomeStars);
        assert_eq!(store.table_url(PROVIDERS), "https://db.example.org/rest/v1/providers");
    }

    #[test]
    fn select_uses_source_columns() {
        let store = PostgrestStore::new("https://db".into(), "k".into(), Source::Yelp);
        assert_eq!(
            store.select_columns(),
            "id,business_name,city,yelp_rating,yelp_review_count,yelp_url,yelp_checked_at"
        );
    }

    #[test]
    fn content_range_total() {
        assert_eq!(parse_content_range_total("0-0/1234"), Some(1234));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-24/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn rated_row_parses() {
        let p = provider_from_row(
            &row(json!({
                "id": "9f1c",
                "business_name": "Acme Plumbing",
                "city": "Ottawa",
                "homestars_rating": 9.3,
                "homestars_review_count": 41,
                "homestars_url": "https://reviews.example/acme",
                "homestars_checked_at": "2026-02-21T10:00:00+00:00"
            })),
            Source::HomeStars,
        )
        .unwrap();
        assert_eq!(p.id, "9f1c");
        assert_eq!(p.rating, Some(9.3));
        assert_eq!(p.review_count, Some(41));
        assert_eq!(p.checked_at.unwrap().to_rfc3339(), "2026-02-21T10:00:00+00:00");
    }

    #[test]
    fn unchecked_row_with_numeric_id_parses() {
        let p = provider_from_row(
            &row(json!({
                "id": 512,
                "business_name": "Beta HVAC",
                "city": "Hamilton",
                "bbb_rating": null,
                "bbb_review_count": null,
                "bbb_url": null,
                "bbb_checked_at": null
            })),
            Source::Bbb,
        )
        .unwrap();
        assert_eq!(p.id, "512");
        assert!(p.rating.is_none());
        assert!(p.checked_at.is_none());
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        let err = provider_from_row(
            &row(json!({ "id": "x", "yelp_checked_at": "yesterday" })),
            Source::Yelp,
        )
        .unwrap_err();
        assert!(err.to_string().contains("bad checked_at"));
    }
}
