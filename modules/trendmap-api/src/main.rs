use std::sync::Arc;

use anyhow::Result;
use axum::{routing::get, Router};
use tracing::info;
use tracing_subscriber::EnvFilter;

use trendmap_common::Config;
use trendmap_store::GeoStore;
use trendmap_watch::trends::TrendPage;

mod rest;

pub struct AppState {
    pub store: GeoStore,
    pub trends: TrendPage,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("trendmap=info".parse()?))
        .init();

    let config = Config::web_from_env();

    let store = GeoStore::connect(&config.database_url).await?;
    let trends = TrendPage::new(config.trend_url.clone(), config.trend_limit);

    let state = Arc::new(AppState { store, trends });

    let app = Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // REST API
        .route("/api/trends", get(rest::api_trends))
        .route("/api/topics", get(rest::api_topics))
        .route("/api/records", get(rest::api_records))
        .route("/api/flattened/{topic}", get(rest::api_flattened))
        .with_state(state)
        // CORS
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Logging layer: method + path only (no query params)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("Trendmap API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
