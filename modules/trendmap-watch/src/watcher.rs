//! A single topic's recurring ingestion task.
//!
//! `TopicWatcher::start` spawns the task: one immediate backfill pass, then
//! one pass per refresh interval. Passes run inline in the task, so a topic
//! never runs two ingestion passes concurrently; ticks that fire while a
//! pass is still executing are coalesced into one late tick, never queued.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use trendmap_common::TopicName;

use crate::ingest::ItemIngestor;

/// Observable lifecycle of a watcher. A topic with no watcher at all is the
/// implicit inactive state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherStatus {
    /// Spawned; the backfill pass has not finished yet.
    Starting,
    /// Backfill done; ticking on the refresh interval.
    Running,
    /// `stop` was called; the task is winding down.
    Stopping,
}

/// Owns the timer task and cancellation token for one topic.
pub struct TopicWatcher {
    topic: TopicName,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    status: Arc<Mutex<WatcherStatus>>,
    grace: Duration,
}

impl TopicWatcher {
    /// Spawn the watcher task for a topic. The backfill pass starts
    /// immediately; the first scheduled tick follows one full refresh
    /// interval later.
    pub fn start(
        topic: TopicName,
        ingestor: Arc<ItemIngestor>,
        refresh: Duration,
        grace: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let status = Arc::new(Mutex::new(WatcherStatus::Starting));
        let handle = tokio::spawn(run_loop(
            topic.clone(),
            ingestor,
            cancel.clone(),
            status.clone(),
            refresh,
        ));
        info!(topic = %topic, "Watcher started");

        Self {
            topic,
            cancel,
            handle,
            status,
            grace,
        }
    }

    pub fn status(&self) -> WatcherStatus {
        *self.status.lock().unwrap()
    }

    /// Stop the watcher: disarm the timer, signal cancellation to any
    /// in-flight pass, and wait up to the grace period before aborting the
    /// task outright. An aborted pass's partial writes are harmless because
    /// the per-item upsert is idempotent.
    pub async fn stop(mut self) {
        *self.status.lock().unwrap() = WatcherStatus::Stopping;
        self.cancel.cancel();

        match time::timeout(self.grace, &mut self.handle).await {
            Ok(Ok(())) => debug!(topic = %self.topic, "Watcher task finished"),
            Ok(Err(e)) => warn!(topic = %self.topic, error = %e, "Watcher task failed"),
            Err(_) => {
                warn!(
                    topic = %self.topic,
                    grace_secs = self.grace.as_secs(),
                    "Watcher did not stop within grace period, aborting task"
                );
                self.handle.abort();
            }
        }
        info!(topic = %self.topic, "Watcher stopped");
    }
}

async fn run_loop(
    topic: TopicName,
    ingestor: Arc<ItemIngestor>,
    cancel: CancellationToken,
    status: Arc<Mutex<WatcherStatus>>,
    refresh: Duration,
) {
    // Backfill before the first scheduled tick.
    run_pass(&topic, &ingestor, &cancel).await;
    {
        let mut status = status.lock().unwrap();
        if *status == WatcherStatus::Starting {
            *status = WatcherStatus::Running;
        }
    }

    let mut ticks = time::interval_at(Instant::now() + refresh, refresh);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticks.tick() => run_pass(&topic, &ingestor, &cancel).await,
        }
    }
    debug!(topic = %topic, "Watcher loop exited");
}

async fn run_pass(topic: &TopicName, ingestor: &ItemIngestor, cancel: &CancellationToken) {
    if cancel.is_cancelled() {
        return;
    }
    match ingestor.run(topic, cancel).await {
        Ok(outcome) => info!(topic = %topic, %outcome, "Ingestion pass complete"),
        Err(e) => {
            warn!(topic = %topic, error = %e, "Ingestion pass failed, will retry next tick")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{tweet_item, MemoryStore, MockItemSource, MockResolver};

    fn topic(name: &str) -> TopicName {
        TopicName::canonicalize(name).unwrap()
    }

    fn ingestor_for(source: Arc<MockItemSource>, store: Arc<MemoryStore>) -> Arc<ItemIngestor> {
        let resolver = MockResolver::new().with_coords("hello", 40.0, -75.0);
        Arc::new(ItemIngestor::new(source, Arc::new(resolver), store, 20))
    }

    #[tokio::test(start_paused = true)]
    async fn backfill_runs_before_first_tick() {
        let topic = topic("FooBar");
        let source = Arc::new(
            MockItemSource::new().with_items(&topic, vec![tweet_item("a", "hello", 40.0, -75.0)]),
        );
        let store = Arc::new(MemoryStore::new());
        let watcher = TopicWatcher::start(
            topic.clone(),
            ingestor_for(source.clone(), store.clone()),
            Duration::from_secs(300),
            Duration::from_secs(5),
        );

        // Well before the first 300s tick, the backfill has stored the item.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.topic_count(&topic), 1);
        assert_eq!(source.fetch_count(&topic), 1);
        assert_eq!(watcher.status(), WatcherStatus::Running);

        watcher.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_passes_coalesce_ticks_instead_of_queueing() {
        let topic = topic("FooBar");
        let source = Arc::new(MockItemSource::new().with_delay(Duration::from_millis(300)));
        let store = Arc::new(MemoryStore::new());
        let watcher = TopicWatcher::start(
            topic.clone(),
            ingestor_for(source.clone(), store),
            Duration::from_millis(50),
            Duration::from_secs(5),
        );

        tokio::time::sleep(Duration::from_millis(400)).await;
        watcher.stop().await;

        // 400ms with a 50ms refresh would be eight ticks; each pass holds
        // the loop for 300ms, so the source sees only the backfill plus one
        // coalesced tick.
        assert_eq!(source.fetch_count(&topic), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_aborts_a_stuck_pass_after_grace() {
        let topic = topic("FooBar");
        let source = Arc::new(MockItemSource::new().with_delay(Duration::from_secs(600)));
        let store = Arc::new(MemoryStore::new());
        let watcher = TopicWatcher::start(
            topic.clone(),
            ingestor_for(source.clone(), store),
            Duration::from_secs(300),
            Duration::from_secs(1),
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(watcher.status(), WatcherStatus::Starting);

        // stop() must return after the grace period, not after the 600s
        // fetch.
        watcher.stop().await;
        assert_eq!(source.fetch_count(&topic), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recurring_ticks_fetch_again() {
        let topic = topic("FooBar");
        let source = Arc::new(MockItemSource::new());
        let store = Arc::new(MemoryStore::new());
        let watcher = TopicWatcher::start(
            topic.clone(),
            ingestor_for(source.clone(), store),
            Duration::from_secs(300),
            Duration::from_secs(5),
        );

        tokio::time::sleep(Duration::from_secs(301)).await;
        watcher.stop().await;

        // Backfill plus the first scheduled tick.
        assert_eq!(source.fetch_count(&topic), 2);
    }
}
