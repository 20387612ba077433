//! Watcher registry: reconciles the running watcher set against the trend
//! list.
//!
//! The registry owns the only map mutated by more than one caller. All
//! mutations happen under a tokio Mutex held across the whole reconcile, so
//! reconciles are serialized with each other and with any topic's
//! start/stop.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{info, warn};

use trendmap_common::TopicName;

use crate::ingest::ItemIngestor;
use crate::traits::RecordStore;
use crate::watcher::{TopicWatcher, WatcherStatus};

/// Topics started and fully stopped by one reconcile call.
///
/// A stop is only complete once the topic's records are purged; a topic
/// whose purge failed is parked and not listed as stopped until a later
/// reconcile finishes the job.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub started: Vec<TopicName>,
    pub stopped: Vec<TopicName>,
}

enum WatcherSlot {
    Live(TopicWatcher),
    /// The watcher is gone but the topic's records could not be purged yet.
    PurgePending,
}

pub struct WatcherRegistry {
    ingestor: Arc<ItemIngestor>,
    store: Arc<dyn RecordStore>,
    refresh: Duration,
    grace: Duration,
    watchers: Mutex<HashMap<TopicName, WatcherSlot>>,
}

impl WatcherRegistry {
    pub fn new(
        ingestor: Arc<ItemIngestor>,
        store: Arc<dyn RecordStore>,
        refresh: Duration,
        grace: Duration,
    ) -> Self {
        Self {
            ingestor,
            store,
            refresh,
            grace,
            watchers: Mutex::new(HashMap::new()),
        }
    }

    /// Bring the running watcher set in line with the desired topic list.
    ///
    /// Watchers for topics that fell off the list are stopped (timer
    /// disarmed, in-flight pass awaited or aborted, records purged);
    /// watchers for topics that newly appeared are started (immediate
    /// backfill, then the refresh timer). Topics present in both sets are
    /// left untouched. Purges that failed in an earlier reconcile are
    /// retried first; a topic stays parked and cannot restart until its
    /// purge succeeds.
    pub async fn reconcile(&self, desired: &[TopicName]) -> ReconcileOutcome {
        let mut watchers = self.watchers.lock().await;
        let mut outcome = ReconcileOutcome::default();

        // Retry purges left over from earlier reconciles.
        let pending: Vec<TopicName> = watchers
            .iter()
            .filter(|(_, slot)| matches!(slot, WatcherSlot::PurgePending))
            .map(|(topic, _)| topic.clone())
            .collect();
        for topic in pending {
            if self.purge(&topic).await {
                watchers.remove(&topic);
                outcome.stopped.push(topic);
            }
        }

        let desired_set: HashSet<&TopicName> = desired.iter().collect();

        // Stop watchers whose topics fell off the trend list.
        let to_stop: Vec<TopicName> = watchers
            .iter()
            .filter(|(topic, slot)| {
                matches!(slot, WatcherSlot::Live(_)) && !desired_set.contains(topic)
            })
            .map(|(topic, _)| topic.clone())
            .collect();

        let stopping: Vec<_> = to_stop
            .iter()
            .filter_map(
                |topic| match watchers.insert(topic.clone(), WatcherSlot::PurgePending) {
                    Some(WatcherSlot::Live(watcher)) => {
                        info!(topic = %topic, "Stopping watcher for dropped topic");
                        Some(watcher.stop())
                    }
                    _ => None,
                },
            )
            .collect();
        join_all(stopping).await;

        for topic in to_stop {
            if self.purge(&topic).await {
                watchers.remove(&topic);
                outcome.stopped.push(topic);
            }
        }

        // Start watchers for topics that newly appeared.
        for topic in desired {
            if watchers.contains_key(topic) {
                continue;
            }
            let watcher = TopicWatcher::start(
                topic.clone(),
                self.ingestor.clone(),
                self.refresh,
                self.grace,
            );
            watchers.insert(topic.clone(), WatcherSlot::Live(watcher));
            outcome.started.push(topic.clone());
        }

        outcome.stopped.sort();
        outcome
    }

    /// Topics with a live watcher, sorted.
    pub async fn active_topics(&self) -> Vec<TopicName> {
        let watchers = self.watchers.lock().await;
        let mut topics: Vec<TopicName> = watchers
            .iter()
            .filter(|(_, slot)| matches!(slot, WatcherSlot::Live(_)))
            .map(|(topic, _)| topic.clone())
            .collect();
        topics.sort();
        topics
    }

    pub async fn watcher_status(&self, topic: &TopicName) -> Option<WatcherStatus> {
        let watchers = self.watchers.lock().await;
        watchers.get(topic).map(|slot| match slot {
            WatcherSlot::Live(watcher) => watcher.status(),
            WatcherSlot::PurgePending => WatcherStatus::Stopping,
        })
    }

    /// Stop every watcher without purging. Stored records survive process
    /// restarts; the retention sweep bounds their age.
    pub async fn shutdown(&self) {
        let mut watchers = self.watchers.lock().await;
        let stopping: Vec<_> = watchers
            .drain()
            .filter_map(|(_, slot)| match slot {
                WatcherSlot::Live(watcher) => Some(watcher.stop()),
                WatcherSlot::PurgePending => None,
            })
            .collect();
        let count = stopping.len();
        join_all(stopping).await;
        info!(watchers = count, "All watchers stopped");
    }

    /// True when the purge succeeded. A failed purge leaves the topic
    /// parked for retry on the next reconcile.
    async fn purge(&self, topic: &TopicName) -> bool {
        match self.store.purge_topic(topic).await {
            Ok(removed) => {
                info!(topic = %topic, removed, "Purged records for stopped topic");
                true
            }
            Err(e) => {
                warn!(topic = %topic, error = %e, "Purge failed, will retry on next reconcile");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{tweet_item, MemoryStore, MockItemSource, MockResolver};
    use crate::traits::RecordStore;

    fn topic(name: &str) -> TopicName {
        TopicName::canonicalize(name).unwrap()
    }

    struct Fixture {
        registry: WatcherRegistry,
        source: Arc<MockItemSource>,
        store: Arc<MemoryStore>,
    }

    fn fixture(source: MockItemSource) -> Fixture {
        let source = Arc::new(source);
        let store = Arc::new(MemoryStore::new());
        let resolver = MockResolver::new().with_coords("hello", 40.0, -75.0);
        let ingestor = Arc::new(ItemIngestor::new(
            source.clone(),
            Arc::new(resolver),
            store.clone(),
            20,
        ));
        let registry = WatcherRegistry::new(
            ingestor,
            store.clone(),
            Duration::from_secs(300),
            Duration::from_secs(5),
        );
        Fixture {
            registry,
            source,
            store,
        }
    }

    /// Let spawned backfill tasks run to completion under paused time.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_diffs_against_running_watchers() {
        let (a, b, c) = (topic("Alpha"), topic("Beta"), topic("Gamma"));
        let f = fixture(MockItemSource::new());

        let first = f.registry.reconcile(&[a.clone(), b.clone()]).await;
        assert_eq!(first.started, vec![a.clone(), b.clone()]);
        assert!(first.stopped.is_empty());
        settle().await;

        let second = f.registry.reconcile(&[b.clone(), c.clone()]).await;
        assert_eq!(second.started, vec![c.clone()]);
        assert_eq!(second.stopped, vec![a.clone()]);
        assert_eq!(f.registry.active_topics().await, vec![b.clone(), c.clone()]);
        settle().await;

        // The unchanged topic kept its watcher: one backfill, no restart.
        assert_eq!(f.source.fetch_count(&b), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_a_topic_purges_its_records() {
        let foo = topic("FooBar");
        let f = fixture(
            MockItemSource::new().with_items(&foo, vec![tweet_item("a", "hello", 40.0, -75.0)]),
        );

        f.registry.reconcile(&[foo.clone()]).await;
        settle().await;
        assert_eq!(f.store.topic_count(&foo), 1);

        let outcome = f.registry.reconcile(&[]).await;
        assert_eq!(outcome.stopped, vec![foo.clone()]);
        assert!(f.store.records_for_topic(&foo).await.unwrap().is_empty());
        assert!(f.registry.active_topics().await.is_empty());
        assert_eq!(f.registry.watcher_status(&foo).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_purge_parks_the_topic_until_retry_succeeds() {
        let foo = topic("FooBar");
        let f = fixture(
            MockItemSource::new().with_items(&foo, vec![tweet_item("a", "hello", 40.0, -75.0)]),
        );

        f.registry.reconcile(&[foo.clone()]).await;
        settle().await;

        f.store.set_fail_purges(true);
        let outcome = f.registry.reconcile(&[]).await;
        assert!(outcome.stopped.is_empty(), "stop is incomplete until purge succeeds");
        assert_eq!(
            f.registry.watcher_status(&foo).await,
            Some(WatcherStatus::Stopping)
        );
        assert!(f.registry.active_topics().await.is_empty());
        assert_eq!(f.store.topic_count(&foo), 1);

        f.store.set_fail_purges(false);
        let retried = f.registry.reconcile(&[]).await;
        assert_eq!(retried.stopped, vec![foo.clone()]);
        assert_eq!(f.store.topic_count(&foo), 0);
        assert_eq!(f.registry.watcher_status(&foo).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn parked_topic_cannot_restart_until_purged() {
        let foo = topic("FooBar");
        let f = fixture(
            MockItemSource::new().with_items(&foo, vec![tweet_item("a", "hello", 40.0, -75.0)]),
        );

        f.registry.reconcile(&[foo.clone()]).await;
        settle().await;
        f.store.set_fail_purges(true);
        f.registry.reconcile(&[]).await;

        // Topic trends again while its purge is still failing: no restart.
        let blocked = f.registry.reconcile(&[foo.clone()]).await;
        assert!(blocked.started.is_empty());
        assert_eq!(
            f.registry.watcher_status(&foo).await,
            Some(WatcherStatus::Stopping)
        );

        // Once the purge goes through the topic stops cleanly and restarts
        // in the same reconcile.
        f.store.set_fail_purges(false);
        let outcome = f.registry.reconcile(&[foo.clone()]).await;
        assert_eq!(outcome.stopped, vec![foo.clone()]);
        assert_eq!(outcome.started, vec![foo.clone()]);
        assert_eq!(f.registry.active_topics().await, vec![foo.clone()]);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_desired_topics_start_one_watcher() {
        let foo = topic("FooBar");
        let f = fixture(MockItemSource::new());

        let outcome = f.registry.reconcile(&[foo.clone(), foo.clone()]).await;
        assert_eq!(outcome.started, vec![foo.clone()]);
        assert_eq!(f.registry.active_topics().await, vec![foo]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_watchers_but_keeps_records() {
        let foo = topic("FooBar");
        let f = fixture(
            MockItemSource::new().with_items(&foo, vec![tweet_item("a", "hello", 40.0, -75.0)]),
        );

        f.registry.reconcile(&[foo.clone()]).await;
        settle().await;
        assert_eq!(f.store.topic_count(&foo), 1);

        f.registry.shutdown().await;
        assert!(f.registry.active_topics().await.is_empty());
        assert_eq!(f.store.topic_count(&foo), 1);
    }
}
