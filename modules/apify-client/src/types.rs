use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Input for X/Twitter keyword search via apidojo/tweet-scraper.
#[derive(Debug, Clone, Serialize)]
pub struct TweetSearchInput {
    #[serde(rename = "searchTerms")]
    pub search_terms: Vec<String>,
    #[serde(rename = "maxItems")]
    pub max_items: u32,
    /// Earliest day to search from (YYYY-MM-DD). Omitted when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
}

impl TweetSearchInput {
    /// Build a single-term search, windowed to `since` when provided.
    /// The actor's `start` parameter has day granularity, so `since` is
    /// truncated to its date.
    pub fn for_term(term: &str, max_items: u32, since: Option<DateTime<Utc>>) -> Self {
        Self {
            search_terms: vec![term.to_string()],
            max_items,
            start: since.map(|t| t.format("%Y-%m-%d").to_string()),
        }
    }
}

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}
