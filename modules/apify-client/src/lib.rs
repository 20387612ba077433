pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{RunData, TweetSearchInput};

use std::time::{Duration, Instant};

use serde_json::Value;

use types::ApiResponse;

const BASE_URL: &str = "https://api.apify.com/v2";

/// Actor ID for apidojo/tweet-scraper.
const TWEET_SCRAPER: &str = "61RPP7dywgiy0JPD0";

/// Upper bound on a single actor run, start to finish. Runs still pending
/// past this are reported as timed out and retried by the caller's next tick.
const MAX_RUN_WAIT_SECS: u64 = 300;

pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        // The run-status endpoint long-polls for up to 60s, so the request
        // timeout has to sit well above that.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .expect("Failed to build HTTP client");

        Self { client, token }
    }

    /// Start a tweet-search run. Returns immediately with run metadata.
    pub async fn start_search(&self, input: &TweetSearchInput) -> Result<RunData> {
        let url = format!("{}/acts/{}/runs", BASE_URL, TWEET_SCRAPER);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let api_resp: ApiResponse<RunData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Poll until a run completes. Uses `waitForFinish=60` for efficient
    /// long-polling, bounded by `MAX_RUN_WAIT_SECS` overall.
    pub async fn wait_for_run(&self, run_id: &str) -> Result<RunData> {
        let deadline = Instant::now() + Duration::from_secs(MAX_RUN_WAIT_SECS);
        loop {
            let url = format!("{}/actor-runs/{}?waitForFinish=60", BASE_URL, run_id);
            let resp = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(ApifyError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let api_resp: ApiResponse<RunData> = resp.json().await?;
            match api_resp.data.status.as_str() {
                "SUCCEEDED" => return Ok(api_resp.data),
                "FAILED" | "ABORTED" | "TIMED-OUT" => {
                    return Err(ApifyError::RunFailed(api_resp.data.status));
                }
                _ => {
                    if Instant::now() >= deadline {
                        return Err(ApifyError::RunTimeout(MAX_RUN_WAIT_SECS));
                    }
                    tracing::debug!(run_id, status = %api_resp.data.status, "Run still in progress");
                }
            }
        }
    }

    /// Fetch dataset items from a completed run as raw JSON values.
    /// Items stay untyped: the actor's output schema shifts, and the ingest
    /// pipeline does schema-free field discovery over whatever comes back.
    pub async fn dataset_items(&self, dataset_id: &str) -> Result<Vec<Value>> {
        let url = format!("{}/datasets/{}/items?format=json", BASE_URL, dataset_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let items: Vec<Value> = resp.json().await?;
        Ok(items)
    }

    /// Search recent tweets end-to-end: start run, poll, fetch results.
    pub async fn search_tweets(&self, input: &TweetSearchInput) -> Result<Vec<Value>> {
        tracing::info!(
            terms = ?input.search_terms,
            max_items = input.max_items,
            "Starting tweet search"
        );

        let run = self.start_search(input).await?;
        tracing::info!(run_id = %run.id, "Apify run started, polling for completion");

        let completed = self.wait_for_run(&run.id).await?;
        tracing::info!(
            run_id = %completed.id,
            dataset_id = %completed.default_dataset_id,
            "Run completed, fetching results"
        );

        let items = self.dataset_items(&completed.default_dataset_id).await?;
        tracing::info!(count = items.len(), "Fetched tweets");

        Ok(items)
    }
}
