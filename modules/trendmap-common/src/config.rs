use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Collaborator services
    pub apify_token: String,
    pub geolocate_url: String,

    // Trend source
    pub trend_url: String,
    pub trend_limit: usize,

    // Watch cadence (seconds)
    pub trend_poll_secs: u64,
    pub topic_refresh_secs: u64,
    pub stop_grace_secs: u64,

    // Ingestion
    pub max_items_per_fetch: u32,

    // Retention
    pub retention_hours: i64,
    pub retention_sweep_secs: u64,

    // Web server
    pub web_host: String,
    pub web_port: u16,
}

const DEFAULT_TREND_URL: &str = "https://trends24.in/united-states/";

impl Config {
    /// Load the full configuration for the watch daemon.
    /// Panics with a clear message if required vars are missing.
    pub fn watch_from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            apify_token: required_env("APIFY_TOKEN"),
            geolocate_url: required_env("GEOLOCATE_URL"),
            trend_url: env::var("TREND_URL").unwrap_or_else(|_| DEFAULT_TREND_URL.to_string()),
            trend_limit: parsed_env("TREND_LIMIT", 20),
            trend_poll_secs: parsed_env("TREND_POLL_SECS", 60),
            topic_refresh_secs: parsed_env("TOPIC_REFRESH_SECS", 300),
            stop_grace_secs: parsed_env("STOP_GRACE_SECS", 5),
            max_items_per_fetch: parsed_env("MAX_ITEMS_PER_FETCH", 20),
            retention_hours: parsed_env("RETENTION_HOURS", 24),
            retention_sweep_secs: parsed_env("RETENTION_SWEEP_SECS", 600),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: parsed_env("WEB_PORT", 3000),
        }
    }

    /// Load a minimal config for the read API (no collaborator credentials).
    pub fn web_from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            apify_token: String::new(),
            geolocate_url: String::new(),
            trend_url: env::var("TREND_URL").unwrap_or_else(|_| DEFAULT_TREND_URL.to_string()),
            trend_limit: parsed_env("TREND_LIMIT", 20),
            trend_poll_secs: parsed_env("TREND_POLL_SECS", 60),
            topic_refresh_secs: parsed_env("TOPIC_REFRESH_SECS", 300),
            stop_grace_secs: parsed_env("STOP_GRACE_SECS", 5),
            max_items_per_fetch: parsed_env("MAX_ITEMS_PER_FETCH", 20),
            retention_hours: parsed_env("RETENTION_HOURS", 24),
            retention_sweep_secs: parsed_env("RETENTION_SWEEP_SECS", 600),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: parsed_env("WEB_PORT", 3000),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number")),
        Err(_) => default,
    }
}
