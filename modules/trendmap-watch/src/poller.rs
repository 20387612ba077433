//! Periodic trend polling driving watcher reconciliation.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use trendmap_common::TopicName;

use crate::error::{Result, WatchError};
use crate::registry::WatcherRegistry;
use crate::traits::TrendSource;

/// Polls the trend source on a fixed interval and reconciles the watcher
/// registry against each successful poll. The most recent successful topic
/// list is kept as a snapshot; a failed poll leaves both the snapshot and
/// the watcher set untouched.
pub struct TrendPoller {
    source: Arc<dyn TrendSource>,
    registry: Arc<WatcherRegistry>,
    interval: Duration,
    snapshot: Mutex<Vec<TopicName>>,
}

impl TrendPoller {
    pub fn new(
        source: Arc<dyn TrendSource>,
        registry: Arc<WatcherRegistry>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            registry,
            interval,
            snapshot: Mutex::new(Vec::new()),
        }
    }

    /// One on-demand poll. Touches neither the snapshot nor the registry,
    /// so interactive reads never disturb watcher lifecycle.
    pub async fn poll(&self) -> Result<Vec<TopicName>> {
        self.source
            .fetch_trending()
            .await
            .map_err(|e| WatchError::SourceUnavailable(format!("trend fetch: {e}")))
    }

    /// The topic list from the most recent successful scheduled poll.
    pub fn snapshot(&self) -> Vec<TopicName> {
        self.snapshot.lock().unwrap().clone()
    }

    /// One scheduled poll-and-reconcile cycle. A fetch failure is never
    /// treated as an empty trend list; that would tear down every watcher.
    pub async fn poll_once(&self) {
        let topics = match self.poll().await {
            Ok(topics) => topics,
            Err(e) => {
                warn!(error = %e, "Trend poll failed, keeping current watchers");
                return;
            }
        };

        *self.snapshot.lock().unwrap() = topics.clone();
        let outcome = self.registry.reconcile(&topics).await;
        info!(
            topics = topics.len(),
            started = outcome.started.len(),
            stopped = outcome.stopped.len(),
            "Reconciled watchers against trend poll"
        );
    }

    /// Poll immediately, then on every interval tick until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticks = time::interval(self.interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticks.tick() => self.poll_once().await,
            }
        }
        info!("Trend poller stopped");
    }
}
