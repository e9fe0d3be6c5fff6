//! Provider records and the per-provider enrichment outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review source a single invocation enriches from.
///
/// Each source owns a column prefix in the provider table, so a provider row
/// carries `<prefix>_rating`, `<prefix>_review_count`, `<prefix>_url` and
/// `<prefix>_checked_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    HomeStars,
    Yelp,
    Bbb,
}

impl Source {
    pub fn column_prefix(self) -> &'static str {
        match self {
            Source::HomeStars => "homestars",
            Source::Yelp => "yelp",
            Source::Bbb => "bbb",
        }
    }

    pub fn column(self, field: &str) -> String {
        format!("{}_{field}", self.column_prefix())
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column_prefix())
    }
}

/// A business record as seen through one source's columns.
///
/// Owned by the record store; the engine only reads it and applies partial
/// updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub business_name: String,
    pub city: String,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub listing_url: Option<String>,
    pub checked_at: Option<DateTime<Utc>>,
}

impl Provider {
    /// A provider with no enrichment data for the current source.
    pub fn unchecked(id: impl Into<String>, business_name: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            business_name: business_name.into(),
            city: city.into(),
            rating: None,
            review_count: None,
            listing_url: None,
            checked_at: None,
        }
    }

    /// Apply an outcome the way the store applies a partial update.
    pub fn apply(&mut self, outcome: &EnrichmentOutcome) {
        if outcome.found {
            self.rating = outcome.rating;
            self.review_count = outcome.review_count;
            self.listing_url = outcome.listing_url.clone();
        }
        self.checked_at = Some(outcome.checked_at);
    }
}

/// Result of one lookup for one provider, written back as a partial update.
///
/// A not-found outcome carries only `checked_at`: the "checked, absent" marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentOutcome {
    pub provider_id: String,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub listing_url: Option<String>,
    pub found: bool,
    pub checked_at: DateTime<Utc>,
}

impl EnrichmentOutcome {
    pub fn found(
        provider_id: impl Into<String>,
        rating: f64,
        review_count: Option<u32>,
        listing_url: Option<String>,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            rating: Some(rating),
            review_count,
            listing_url,
            found: true,
            checked_at,
        }
    }

    pub fn not_found(provider_id: impl Into<String>, checked_at: DateTime<Utc>) -> Self {
        Self {
            provider_id: provider_id.into(),
            rating: None,
            review_count: None,
            listing_url: None,
            found: false,
            checked_at,
        }
    }

    /// Column/value pairs for a partial update against `source`'s columns.
    ///
    /// Not-found outcomes only touch `<prefix>_checked_at`, leaving any
    /// existing rating in place.
    pub fn update_fields(&self, source: Source) -> serde_json::Map<String, serde_json::Value> {
        let mut fields = serde_json::Map::new();
        if self.found {
            fields.insert(source.column("rating"), serde_json::json!(self.rating));
            fields.insert(source.column("review_count"), serde_json::json!(self.review_count));
            fields.insert(source.column("url"), serde_json::json!(self.listing_url));
        }
        fields.insert(
            source.column("checked_at"),
            serde_json::Value::String(self.checked_at.to_rfc3339()),
        );
        fields
    }
}
