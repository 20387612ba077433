use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::warn;

use trendmap_common::{valid_coordinates, GeoRecord, TopicName};

use crate::AppState;

// --- Query structs ---

#[derive(Deserialize)]
pub struct RecordsQuery {
    topic: Option<String>,
}

// --- Helpers ---

/// Drop records whose coordinates are out of range or at the origin.
/// The store rejects them on write; rows predating that check stay
/// invisible to clients.
fn presentable(records: Vec<GeoRecord>) -> Vec<GeoRecord> {
    records
        .into_iter()
        .filter(|r| valid_coordinates(r.latitude, r.longitude))
        .collect()
}

fn trends_to_json(topics: &[TopicName]) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = topics
        .iter()
        .map(|t| serde_json::json!({ "name": t }))
        .collect();
    serde_json::Value::Array(entries)
}

// --- Handlers ---

pub async fn api_trends(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.trends.scrape().await {
        Ok(topics) => Json(trends_to_json(&topics)).into_response(),
        Err(e) => {
            warn!(error = %e, "Trend source unavailable");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

pub async fn api_topics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.topics().await {
        Ok(topics) => Json(topics).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to load topics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_records(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecordsQuery>,
) -> impl IntoResponse {
    let records = match params.topic.as_deref() {
        Some(raw) => {
            let Some(topic) = TopicName::canonicalize(raw) else {
                return StatusCode::BAD_REQUEST.into_response();
            };
            state.store.records_for_topic(&topic).await
        }
        None => state.store.all_records().await,
    };

    match records {
        Ok(records) => Json(presentable(records)).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to load records");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_flattened(
    State(state): State<Arc<AppState>>,
    Path(topic): Path<String>,
) -> impl IntoResponse {
    let Some(topic) = TopicName::canonicalize(&topic) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match state.store.records_for_topic(&topic).await {
        Ok(records) => Json(presentable(records)).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to load records for topic");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
