//! Trend page scraping: the production `TrendSource`.

use std::time::Duration;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;

use trendmap_common::TopicName;

use crate::error::{Result, WatchError};
use crate::traits::TrendSource;

/// CSS selector for trend anchors on the trends24 aggregation page.
const TREND_SELECTOR: &str = "span.trend-name a.trend-link";

/// Fetches the trends aggregation page and parses the current topic list
/// out of it.
pub struct TrendPage {
    client: reqwest::Client,
    url: String,
    limit: usize,
}

impl TrendPage {
    pub fn new(url: String, limit: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self { client, url, limit }
    }

    /// Fetch and parse the trend page. Any network or parse problem is
    /// `SourceUnavailable` so the caller retries instead of tearing down
    /// watchers.
    pub async fn scrape(&self) -> Result<Vec<TopicName>> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| WatchError::SourceUnavailable(format!("trend page fetch: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(WatchError::SourceUnavailable(format!(
                "trend page returned {status}"
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| WatchError::SourceUnavailable(format!("trend page body: {e}")))?;

        let topics = parse_trend_page(&body, self.limit)?;
        debug!(count = topics.len(), "Scraped trending topics");
        Ok(topics)
    }
}

#[async_trait]
impl TrendSource for TrendPage {
    async fn fetch_trending(&self) -> AnyResult<Vec<TopicName>> {
        Ok(self.scrape().await?)
    }
}

/// Parse trend anchors out of the page HTML.
///
/// - Anchor text is trimmed and canonicalized to TopicName
/// - Duplicates are dropped, preserving first occurrence
/// - The list is capped at `limit`
/// - Zero parsed topics is an error, not an empty trend list: the page
///   always carries trends, so an empty parse means its structure changed
pub fn parse_trend_page(html: &str, limit: usize) -> Result<Vec<TopicName>> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(TREND_SELECTOR).unwrap();

    let mut topics: Vec<TopicName> = Vec::new();
    for anchor in document.select(&selector) {
        let raw: String = anchor.text().collect();
        let Some(topic) = TopicName::canonicalize(raw.trim()) else {
            continue;
        };
        if !topics.contains(&topic) {
            topics.push(topic);
        }
        if topics.len() == limit {
            break;
        }
    }

    if topics.is_empty() {
        return Err(WatchError::SourceUnavailable(
            "no trends parsed from page".to_string(),
        ));
    }
    Ok(topics)
}
