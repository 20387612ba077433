// Trait abstractions for the watch pipeline's collaborators.
//
// TrendSource: the trends page behind one call.
// ItemSource: per-topic content search (the Apify actor in production).
// LocationResolver: item text + candidate fields → coordinates.
// RecordStore: the geo_records table.
//
// These enable deterministic testing with the mocks in testing.rs:
// no network, no database, no Docker. `cargo test` in seconds.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use trendmap_common::{GeoRecord, TopicName};

#[async_trait]
pub trait TrendSource: Send + Sync {
    /// Fetch the current ordered list of trending topics. Failure is a
    /// single error signal; there is no pagination.
    async fn fetch_trending(&self) -> Result<Vec<TopicName>>;
}

#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Fetch a batch of raw items for a topic. An empty vec means "no
    /// results"; a failed request is an error, never an empty vec.
    async fn fetch_items(
        &self,
        topic: &TopicName,
        max_items: u32,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Value>>;
}

#[async_trait]
pub trait LocationResolver: Send + Sync {
    /// Resolve item text plus candidate location strings to coordinates.
    /// `None` means the resolver could not place the item.
    async fn resolve(&self, text: &str, location_context: &[String])
        -> Result<Option<(f64, f64)>>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a record unless its id is already present. Returns whether a
    /// row was actually written (idempotent by id).
    async fn upsert(&self, record: &GeoRecord) -> Result<bool>;

    /// All records for a topic, newest first.
    async fn records_for_topic(&self, topic: &TopicName) -> Result<Vec<GeoRecord>>;

    /// Every stored record across all topics, newest first.
    async fn all_records(&self) -> Result<Vec<GeoRecord>>;

    /// Delete every record for a topic. Returns the number of rows removed.
    async fn purge_topic(&self, topic: &TopicName) -> Result<u64>;

    /// Distinct topics that currently have stored records.
    async fn topics(&self) -> Result<Vec<TopicName>>;

    /// Delete records created before the cutoff. Returns rows removed.
    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

// ---------------------------------------------------------------------------
// Production impls
// ---------------------------------------------------------------------------

#[async_trait]
impl ItemSource for apify_client::ApifyClient {
    async fn fetch_items(
        &self,
        topic: &TopicName,
        max_items: u32,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Value>> {
        let input = apify_client::TweetSearchInput::for_term(topic.as_str(), max_items, since);
        Ok(self.search_tweets(&input).await?)
    }
}

#[async_trait]
impl LocationResolver for geolocate_client::GeolocateClient {
    async fn resolve(
        &self,
        text: &str,
        location_context: &[String],
    ) -> Result<Option<(f64, f64)>> {
        let resolved = self.extract_location(text, location_context).await?;
        Ok(resolved.map(|location| (location.latitude, location.longitude)))
    }
}

#[async_trait]
impl RecordStore for trendmap_store::GeoStore {
    async fn upsert(&self, record: &GeoRecord) -> Result<bool> {
        Ok(self.upsert(record).await?)
    }

    async fn records_for_topic(&self, topic: &TopicName) -> Result<Vec<GeoRecord>> {
        Ok(self.records_for_topic(topic).await?)
    }

    async fn all_records(&self) -> Result<Vec<GeoRecord>> {
        Ok(self.all_records().await?)
    }

    async fn purge_topic(&self, topic: &TopicName) -> Result<u64> {
        Ok(self.purge_topic(topic).await?)
    }

    async fn topics(&self) -> Result<Vec<TopicName>> {
        Ok(self.topics().await?)
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        Ok(self.prune_older_than(cutoff).await?)
    }
}
