//! Retention sweep: bounds the age of stored records.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::traits::RecordStore;

/// Deletes records older than the retention window on a fixed interval.
/// A failed sweep is logged and retried on the next interval.
pub struct RetentionSweeper {
    store: Arc<dyn RecordStore>,
    retention: chrono::Duration,
    sweep_interval: Duration,
}

impl RetentionSweeper {
    pub fn new(
        store: Arc<dyn RecordStore>,
        retention_hours: i64,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            store,
            retention: chrono::Duration::hours(retention_hours),
            sweep_interval,
        }
    }

    /// One sweep pass.
    pub async fn sweep(&self) {
        let cutoff = Utc::now() - self.retention;
        match self.store.prune_older_than(cutoff).await {
            Ok(0) => {}
            Ok(removed) => info!(removed, %cutoff, "Pruned expired records"),
            Err(e) => warn!(error = %e, "Retention sweep failed, will retry next interval"),
        }
    }

    /// Sweep immediately, then on every interval tick until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticks = time::interval(self.sweep_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticks.tick() => self.sweep().await,
            }
        }
        info!("Retention sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use crate::traits::RecordStore;
    use trendmap_common::{GeoRecord, TopicName};

    fn record(id: &str, age_hours: i64) -> GeoRecord {
        GeoRecord {
            id: id.to_string(),
            topic: TopicName::canonicalize("FooBar").unwrap(),
            text: "text".to_string(),
            author: "someone".to_string(),
            latitude: 40.0,
            longitude: -75.0,
            created_at: Utc::now() - chrono::Duration::hours(age_hours),
        }
    }

    #[tokio::test]
    async fn sweep_prunes_only_expired_records() {
        let store = Arc::new(MemoryStore::new());
        store.upsert(&record("stale", 48)).await.unwrap();
        store.upsert(&record("fresh", 1)).await.unwrap();

        let sweeper = RetentionSweeper::new(store.clone(), 24, Duration::from_secs(600));
        sweeper.sweep().await;

        assert!(!store.has_record("stale"));
        assert!(store.has_record("fresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn run_sweeps_immediately_and_stops_on_cancel() {
        let store = Arc::new(MemoryStore::new());
        store.upsert(&record("stale", 48)).await.unwrap();

        let sweeper = Arc::new(RetentionSweeper::new(
            store.clone(),
            24,
            Duration::from_secs(600),
        ));
        let cancel = CancellationToken::new();
        let task = {
            let sweeper = sweeper.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { sweeper.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!store.has_record("stale"));

        cancel.cancel();
        task.await.unwrap();
    }
}
