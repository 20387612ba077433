use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use apify_client::ApifyClient;
use geolocate_client::GeolocateClient;
use trendmap_common::Config;
use trendmap_store::GeoStore;
use trendmap_watch::ingest::ItemIngestor;
use trendmap_watch::poller::TrendPoller;
use trendmap_watch::registry::WatcherRegistry;
use trendmap_watch::retention::RetentionSweeper;
use trendmap_watch::traits::RecordStore;
use trendmap_watch::trends::TrendPage;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("trendmap=info".parse()?))
        .init();

    info!("Trendmap watch daemon starting...");

    let config = Config::watch_from_env();
    info!(
        trend_url = config.trend_url.as_str(),
        trend_limit = config.trend_limit,
        poll_secs = config.trend_poll_secs,
        refresh_secs = config.topic_refresh_secs,
        "Loaded config"
    );

    // The only fatal failure: everything downstream retries instead.
    let store = GeoStore::connect(&config.database_url)
        .await
        .context("Failed to connect to Postgres")?;
    let store: Arc<dyn RecordStore> = Arc::new(store);
    info!("Connected to Postgres, migrations applied");

    let ingestor = Arc::new(ItemIngestor::new(
        Arc::new(ApifyClient::new(config.apify_token.clone())),
        Arc::new(GeolocateClient::new(&config.geolocate_url)),
        store.clone(),
        config.max_items_per_fetch,
    ));

    let registry = Arc::new(WatcherRegistry::new(
        ingestor,
        store.clone(),
        Duration::from_secs(config.topic_refresh_secs),
        Duration::from_secs(config.stop_grace_secs),
    ));

    let poller = TrendPoller::new(
        Arc::new(TrendPage::new(config.trend_url.clone(), config.trend_limit)),
        registry.clone(),
        Duration::from_secs(config.trend_poll_secs),
    );

    let sweeper = RetentionSweeper::new(
        store,
        config.retention_hours,
        Duration::from_secs(config.retention_sweep_secs),
    );

    let cancel = CancellationToken::new();

    let poll_cancel = cancel.clone();
    let poll_task = tokio::spawn(async move { poller.run(poll_cancel).await });

    let sweep_cancel = cancel.clone();
    let sweep_task = tokio::spawn(async move { sweeper.run(sweep_cancel).await });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    // Stop the poller and sweeper, then wind down watchers. Shutdown does
    // not purge records.
    cancel.cancel();
    let _ = poll_task.await;
    let _ = sweep_task.await;
    registry.shutdown().await;

    info!("Watch daemon stopped");
    Ok(())
}
