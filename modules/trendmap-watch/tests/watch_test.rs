//! End-to-end tests for the watch pipeline: trend poll, reconcile, watcher
//! backfill, ingestion, store. Every external boundary is mocked.

use std::sync::Arc;
use std::time::Duration;

use trendmap_common::TopicName;
use trendmap_watch::ingest::ItemIngestor;
use trendmap_watch::poller::TrendPoller;
use trendmap_watch::registry::WatcherRegistry;
use trendmap_watch::testing::{
    tweet_item, MemoryStore, MockItemSource, MockResolver, MockTrendSource,
};

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

fn topic(name: &str) -> TopicName {
    TopicName::canonicalize(name).unwrap()
}

struct Pipeline {
    poller: TrendPoller,
    registry: Arc<WatcherRegistry>,
    source: Arc<MockItemSource>,
    store: Arc<MemoryStore>,
}

fn pipeline(trends: MockTrendSource, items: MockItemSource, resolver: MockResolver) -> Pipeline {
    let source = Arc::new(items);
    let store = Arc::new(MemoryStore::new());
    let ingestor = Arc::new(ItemIngestor::new(
        source.clone(),
        Arc::new(resolver),
        store.clone(),
        20,
    ));
    let registry = Arc::new(WatcherRegistry::new(
        ingestor,
        store.clone(),
        Duration::from_secs(300),
        Duration::from_secs(5),
    ));
    let poller = TrendPoller::new(Arc::new(trends), registry.clone(), Duration::from_secs(60));
    Pipeline {
        poller,
        registry,
        source,
        store,
    }
}

/// Let spawned watcher tasks run to completion under paused time.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn trending_topic_flows_from_poll_to_stored_record() {
    let grizzlies = topic("Memphis Grizzlies");
    let trends = MockTrendSource::new().then_topics(&["Memphis Grizzlies"]);
    let items = MockItemSource::new().with_items(
        &grizzlies,
        [tweet_item("t1", "game night downtown", 35.1, -90.0)],
    );
    let resolver = MockResolver::new().with_coords("game night downtown", 35.1, -90.0);
    let p = pipeline(trends, items, resolver);

    p.poller.poll_once().await;
    settle().await;

    assert_eq!(p.poller.snapshot(), vec![grizzlies.clone()]);
    assert_eq!(p.registry.active_topics().await, vec![grizzlies.clone()]);
    assert!(p.store.has_record("t1"));
    assert_eq!(p.store.topic_count(&grizzlies), 1);

    // A repeat poll with an unchanged list neither restarts nor re-ingests.
    p.poller.poll_once().await;
    settle().await;

    assert_eq!(p.source.fetch_count(&grizzlies), 1);
    assert_eq!(p.store.topic_count(&grizzlies), 1);

    p.registry.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn topic_falling_off_the_list_is_stopped_and_purged() {
    let (ucla, race) = (topic("UCLA"), topic("F1"));
    let trends = MockTrendSource::new()
        .then_topics(&["UCLA", "F1"])
        .then_topics(&["F1"]);
    let items = MockItemSource::new()
        .with_items(&ucla, [tweet_item("u1", "campus rally", 34.07, -118.44)])
        .with_items(&race, [tweet_item("r1", "race weekend", 30.13, -97.64)]);
    let resolver = MockResolver::new()
        .with_coords("campus rally", 34.07, -118.44)
        .with_coords("race weekend", 30.13, -97.64);
    let p = pipeline(trends, items, resolver);

    p.poller.poll_once().await;
    settle().await;
    assert_eq!(p.store.record_count(), 2);

    p.poller.poll_once().await;
    settle().await;

    assert_eq!(p.registry.active_topics().await, vec![race.clone()]);
    assert_eq!(p.store.topic_count(&ucla), 0);
    assert_eq!(p.store.topic_count(&race), 1);

    p.registry.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn source_outage_keeps_the_last_good_watcher_set() {
    let marathon = topic("Marathon");
    let trends = MockTrendSource::new().then_topics(&["Marathon"]).then_failure();
    let items =
        MockItemSource::new().with_items(&marathon, [tweet_item("m1", "finish line", 42.35, -71.08)]);
    let resolver = MockResolver::new().with_coords("finish line", 42.35, -71.08);
    let p = pipeline(trends, items, resolver);

    p.poller.poll_once().await;
    settle().await;

    p.poller.poll_once().await;
    settle().await;

    // An unreachable source is not an empty trend list: the snapshot, the
    // watcher, and the stored records all survive the failed poll.
    assert_eq!(p.poller.snapshot(), vec![marathon.clone()]);
    assert_eq!(p.registry.active_topics().await, vec![marathon.clone()]);
    assert_eq!(p.store.topic_count(&marathon), 1);

    p.registry.shutdown().await;
}
