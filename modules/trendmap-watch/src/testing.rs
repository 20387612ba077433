// Test mocks for the watch pipeline.
//
// Four mocks matching the four trait boundaries:
// - MockTrendSource (TrendSource): scripted response sequence
// - MockItemSource (ItemSource): HashMap-based topic→items, optional delay
// - MockResolver (LocationResolver): HashMap-based text→coordinates
// - MemoryStore (RecordStore): stateful in-memory record table
//
// Plus builders for raw test items.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use trendmap_common::{valid_coordinates, GeoRecord, TopicName};

use crate::traits::{ItemSource, LocationResolver, RecordStore, TrendSource};

// ---------------------------------------------------------------------------
// MockTrendSource
// ---------------------------------------------------------------------------

enum TrendResponse {
    Topics(Vec<TopicName>),
    Failure,
}

/// Scripted trend source. Each poll consumes the next registered response;
/// the last one repeats once the script runs out.
pub struct MockTrendSource {
    inner: Mutex<MockTrendSourceInner>,
}

struct MockTrendSourceInner {
    responses: Vec<TrendResponse>,
    next: usize,
    polls: usize,
}

impl MockTrendSource {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MockTrendSourceInner {
                responses: Vec::new(),
                next: 0,
                polls: 0,
            }),
        }
    }

    /// Append a successful poll returning these topics (canonicalized).
    pub fn then_topics(self, names: &[&str]) -> Self {
        let topics = names
            .iter()
            .filter_map(|n| TopicName::canonicalize(n))
            .collect();
        self.inner
            .lock()
            .unwrap()
            .responses
            .push(TrendResponse::Topics(topics));
        self
    }

    /// Append a failing poll.
    pub fn then_failure(self) -> Self {
        self.inner
            .lock()
            .unwrap()
            .responses
            .push(TrendResponse::Failure);
        self
    }

    pub fn poll_count(&self) -> usize {
        self.inner.lock().unwrap().polls
    }
}

#[async_trait]
impl TrendSource for MockTrendSource {
    async fn fetch_trending(&self) -> Result<Vec<TopicName>> {
        let mut inner = self.inner.lock().unwrap();
        inner.polls += 1;
        if inner.responses.is_empty() {
            bail!("MockTrendSource: no responses registered");
        }
        let index = inner.next.min(inner.responses.len() - 1);
        inner.next += 1;
        match &inner.responses[index] {
            TrendResponse::Topics(topics) => Ok(topics.clone()),
            TrendResponse::Failure => bail!("MockTrendSource: scripted failure"),
        }
    }
}

// ---------------------------------------------------------------------------
// MockItemSource
// ---------------------------------------------------------------------------

/// HashMap-based item source. Unregistered topics return no items; topics
/// registered with `with_failure` fail the fetch. An optional delay makes
/// every fetch slow, for timer-coalescing tests under paused time.
pub struct MockItemSource {
    items: HashMap<TopicName, Vec<Value>>,
    failing: HashSet<TopicName>,
    delay: Option<Duration>,
    calls: Mutex<HashMap<TopicName, usize>>,
}

impl MockItemSource {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
            failing: HashSet::new(),
            delay: None,
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_items(mut self, topic: &TopicName, items: impl IntoIterator<Item = Value>) -> Self {
        self.items
            .insert(topic.clone(), items.into_iter().collect());
        self
    }

    pub fn with_failure(mut self, topic: &TopicName) -> Self {
        self.failing.insert(topic.clone());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times a topic has been fetched.
    pub fn fetch_count(&self, topic: &TopicName) -> usize {
        self.calls.lock().unwrap().get(topic).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ItemSource for MockItemSource {
    async fn fetch_items(
        &self,
        topic: &TopicName,
        max_items: u32,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Value>> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(topic.clone())
            .or_insert(0) += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(topic) {
            bail!("MockItemSource: scripted failure for {topic}");
        }

        let mut items = self.items.get(topic).cloned().unwrap_or_default();
        items.truncate(max_items as usize);
        Ok(items)
    }
}

// ---------------------------------------------------------------------------
// MockResolver
// ---------------------------------------------------------------------------

/// HashMap-based location resolver keyed by item text. Unregistered texts
/// resolve to `None`. Records every call so tests can assert on the context
/// the extractor produced. Clones share state.
#[derive(Clone)]
pub struct MockResolver {
    inner: Arc<Mutex<MockResolverInner>>,
}

struct MockResolverInner {
    coords: HashMap<String, (f64, f64)>,
    failing: HashSet<String>,
    calls: Vec<(String, Vec<String>)>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockResolverInner {
                coords: HashMap::new(),
                failing: HashSet::new(),
                calls: Vec::new(),
            })),
        }
    }

    pub fn with_coords(self, text: &str, latitude: f64, longitude: f64) -> Self {
        self.inner
            .lock()
            .unwrap()
            .coords
            .insert(text.to_string(), (latitude, longitude));
        self
    }

    /// Make resolution fail for this exact text.
    pub fn failing_text(self, text: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .failing
            .insert(text.to_string());
        self
    }

    pub fn resolve_count(&self) -> usize {
        self.inner.lock().unwrap().calls.len()
    }

    /// The location context passed with the most recent call.
    pub fn last_context(&self) -> Option<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        inner.calls.last().map(|(_, context)| context.clone())
    }
}

#[async_trait]
impl LocationResolver for MockResolver {
    async fn resolve(
        &self,
        text: &str,
        location_context: &[String],
    ) -> Result<Option<(f64, f64)>> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .calls
            .push((text.to_string(), location_context.to_vec()));
        if inner.failing.contains(text) {
            bail!("MockResolver: scripted failure for {text:?}");
        }
        Ok(inner.coords.get(text).copied())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

struct MemoryStoreInner {
    records: HashMap<String, GeoRecord>,
    fail_upserts: bool,
    fail_purges: bool,
}

/// Stateful in-memory record store. Mirrors the real store's semantics:
/// idempotent by id, refuses invalid coordinates, newest-first reads.
/// Thread-safe via interior Mutex.
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryStoreInner {
                records: HashMap::new(),
                fail_upserts: false,
                fail_purges: false,
            }),
        }
    }

    /// Make every `upsert` return an error.
    pub fn set_fail_upserts(&self, fail: bool) {
        self.inner.lock().unwrap().fail_upserts = fail;
    }

    /// Make every `purge_topic` return an error.
    pub fn set_fail_purges(&self, fail: bool) {
        self.inner.lock().unwrap().fail_purges = fail;
    }

    // --- Assertion helpers ---

    pub fn record_count(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    pub fn has_record(&self, id: &str) -> bool {
        self.inner.lock().unwrap().records.contains_key(id)
    }

    pub fn topic_count(&self, topic: &TopicName) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .records
            .values()
            .filter(|r| r.topic == *topic)
            .count()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn upsert(&self, record: &GeoRecord) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_upserts {
            bail!("MemoryStore: upsert failure injected");
        }
        if !valid_coordinates(record.latitude, record.longitude) {
            bail!(
                "MemoryStore: refusing invalid coordinates ({}, {})",
                record.latitude,
                record.longitude
            );
        }
        if inner.records.contains_key(&record.id) {
            return Ok(false);
        }
        inner.records.insert(record.id.clone(), record.clone());
        Ok(true)
    }

    async fn records_for_topic(&self, topic: &TopicName) -> Result<Vec<GeoRecord>> {
        let inner = self.inner.lock().unwrap();
        let mut records: Vec<GeoRecord> = inner
            .records
            .values()
            .filter(|r| r.topic == *topic)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn all_records(&self) -> Result<Vec<GeoRecord>> {
        let inner = self.inner.lock().unwrap();
        let mut records: Vec<GeoRecord> = inner.records.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn purge_topic(&self, topic: &TopicName) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_purges {
            bail!("MemoryStore: purge failure injected");
        }
        let before = inner.records.len();
        inner.records.retain(|_, r| r.topic != *topic);
        Ok((before - inner.records.len()) as u64)
    }

    async fn topics(&self) -> Result<Vec<TopicName>> {
        let inner = self.inner.lock().unwrap();
        let mut topics: Vec<TopicName> =
            inner.records.values().map(|r| r.topic.clone()).collect();
        topics.sort();
        topics.dedup();
        Ok(topics)
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.records.len();
        inner.records.retain(|_, r| r.created_at >= cutoff);
        Ok((before - inner.records.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Item builders
// ---------------------------------------------------------------------------

/// A raw item shaped like a scraped tweet, with an embedded location object.
pub fn tweet_item(id: &str, text: &str, lat: f64, lon: f64) -> Value {
    json!({
        "id": id,
        "text": text,
        "author": {"userName": "someone"},
        "location": {"lat": lat, "lon": lon},
        "createdAt": Utc::now().to_rfc3339(),
    })
}

/// A raw item with text but no location-indicative fields.
pub fn plain_item(id: &str, text: &str) -> Value {
    json!({
        "id": id,
        "text": text,
        "createdAt": Utc::now().to_rfc3339(),
    })
}

// ---------------------------------------------------------------------------
// Mock self-tests
// ---------------------------------------------------------------------------
