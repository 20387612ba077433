pub mod error;

pub use error::{GeolocateError, Result};

use std::time::Duration;

use serde::Deserialize;

/// A location the extraction service managed to place.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    /// Human-readable place name, e.g. "San Francisco, California, USA".
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Wire response from POST /extract-location.
#[derive(Debug, Deserialize)]
struct ExtractResponse {
    extracted_location: Option<String>,
    /// `[lat, lon]`, or null when the service could not place the text.
    coordinates: Option<(f64, f64)>,
}

pub struct GeolocateClient {
    client: reqwest::Client,
    base_url: String,
}

impl GeolocateClient {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Ask the extraction service to place an item. `location_context` is the
    /// already-formatted `"path: value"` hints the caller pulled from the
    /// item's metadata; they are joined with `"; "` for the prompt.
    ///
    /// Returns `Ok(None)` when the service answered but could not resolve a
    /// location. The caller is responsible for rejecting the (0,0) sentinel.
    pub async fn extract_location(
        &self,
        text: &str,
        location_context: &[String],
    ) -> Result<Option<ResolvedLocation>> {
        let endpoint = format!("{}/extract-location", self.base_url);
        let body = serde_json::json!({
            "tweet_text": text,
            "location_context": location_context.join("; "),
        });

        let resp = self.client.post(&endpoint).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GeolocateError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ExtractResponse = resp.json().await?;
        match parsed.coordinates {
            Some((latitude, longitude)) => Ok(Some(ResolvedLocation {
                name: parsed.extracted_location.unwrap_or_default(),
                latitude,
                longitude,
            })),
            None => {
                tracing::debug!(
                    location = parsed.extracted_location.as_deref().unwrap_or("Unknown"),
                    "Service returned no coordinates"
                );
                Ok(None)
            }
        }
    }
}
