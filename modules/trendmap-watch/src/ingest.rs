//! Per-topic ingestion: fetch a batch of raw items, resolve each to
//! coordinates, store the survivors.
//!
//! One [`ItemIngestor`] is shared by every watcher. Per-item failures are
//! isolated: a bad item is logged and skipped, the batch continues. Only the
//! batch fetch itself fails a pass.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use trendmap_common::{valid_coordinates, GeoRecord, TopicName};

use crate::error::{Result, WatchError};
use crate::extract::{item_author, item_created_at, item_id, item_text, location_fields};
use crate::traits::{ItemSource, LocationResolver, RecordStore};

/// Counters reported by one ingestion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Items returned by the item source.
    pub fetched: usize,
    /// Items that resolved to valid coordinates and produced a new row.
    pub stored: usize,
}

impl fmt::Display for IngestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fetched, {} stored", self.fetched, self.stored)
    }
}

pub struct ItemIngestor {
    items: Arc<dyn ItemSource>,
    resolver: Arc<dyn LocationResolver>,
    store: Arc<dyn RecordStore>,
    max_items: u32,
}

impl ItemIngestor {
    pub fn new(
        items: Arc<dyn ItemSource>,
        resolver: Arc<dyn LocationResolver>,
        store: Arc<dyn RecordStore>,
        max_items: u32,
    ) -> Self {
        Self {
            items,
            resolver,
            store,
            max_items,
        }
    }

    /// Run one fetch-resolve-store pass for a topic.
    ///
    /// The cancellation token is checked between items so a stopping watcher
    /// abandons the batch at the next boundary; already-written items stay
    /// written, which is harmless because the upsert is idempotent by id.
    pub async fn run(
        &self,
        topic: &TopicName,
        cancel: &CancellationToken,
    ) -> Result<IngestOutcome> {
        let items = self
            .items
            .fetch_items(topic, self.max_items, None)
            .await
            .map_err(|e| WatchError::SourceUnavailable(format!("item fetch for {topic}: {e}")))?;

        let mut outcome = IngestOutcome {
            fetched: items.len(),
            stored: 0,
        };

        for item in &items {
            if cancel.is_cancelled() {
                debug!(topic = %topic, "Ingestion cancelled mid-batch");
                break;
            }
            match self.ingest_one(topic, item).await {
                Ok(true) => outcome.stored += 1,
                Ok(false) => {}
                Err(e @ WatchError::ResolveFailure(_)) => {
                    warn!(topic = %topic, error = %e, "Item dropped, batch continues");
                }
                Err(e) => {
                    warn!(topic = %topic, error = %e, "Item not ingested, will be retried on a later pass");
                }
            }
        }

        Ok(outcome)
    }

    /// Ingest a single raw item. `Ok(true)` means a new row was written;
    /// `Ok(false)` means the item was skipped (no id, no text, no usable
    /// location, or already stored).
    async fn ingest_one(&self, topic: &TopicName, item: &Value) -> Result<bool> {
        let Some(id) = item_id(item) else {
            debug!(topic = %topic, "Skipping item without an id");
            return Ok(false);
        };
        let Some(text) = item_text(item) else {
            debug!(topic = %topic, item_id = %id, "Skipping item without text");
            return Ok(false);
        };

        let context: Vec<String> = location_fields(item)
            .into_iter()
            .map(|(path, value)| format!("{path}: {value}"))
            .collect();

        let coordinates = self
            .resolver
            .resolve(&text, &context)
            .await
            .map_err(|e| WatchError::ResolveFailure(format!("item {id}: {e}")))?;
        let Some((latitude, longitude)) = coordinates else {
            debug!(topic = %topic, item_id = %id, "No resolvable location, skipping item");
            return Ok(false);
        };
        if !valid_coordinates(latitude, longitude) {
            debug!(
                topic = %topic,
                item_id = %id,
                latitude,
                longitude,
                "Resolver returned unusable coordinates, skipping item"
            );
            return Ok(false);
        }

        let record = GeoRecord {
            id,
            topic: topic.clone(),
            text,
            author: item_author(item),
            latitude,
            longitude,
            created_at: item_created_at(item),
        };

        let written = self
            .store
            .upsert(&record)
            .await
            .map_err(|e| WatchError::StoreFailure(format!("item {}: {e}", record.id)))?;
        if !written {
            debug!(topic = %topic, item_id = %record.id, "Record already stored");
        }
        Ok(written)
    }
}
