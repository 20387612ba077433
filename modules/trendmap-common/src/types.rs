use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Topic identity ---

/// Canonical identity for a trend: the raw label with whitespace and
/// punctuation stripped, case preserved (`"Foo Bar"` → `"FooBar"`,
/// `"#FooBar"` → `"FooBar"`). Two raw labels that canonicalize identically
/// are the same topic; the canonical form is the store partition key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicName(String);

impl TopicName {
    /// Canonicalize a raw trend label. Returns `None` when nothing survives
    /// the strip (labels that are all punctuation or whitespace).
    pub fn canonicalize(raw: &str) -> Option<Self> {
        let canonical: String = raw.chars().filter(|c| c.is_alphanumeric()).collect();
        if canonical.is_empty() {
            None
        } else {
            Some(Self(canonical))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for TopicName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// --- Geo records ---

/// A persisted, geolocated content item. One row per source item id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRecord {
    /// Source item identifier (e.g. the tweet id). Unique per record.
    pub id: String,
    pub topic: TopicName,
    pub text: String,
    pub author: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
}

impl GeoRecord {
    pub fn has_valid_coordinates(&self) -> bool {
        valid_coordinates(self.latitude, self.longitude)
    }
}

/// True when the pair is a plausible resolved location: latitude in
/// [-90, 90], longitude in [-180, 180], and not the (0, 0) sentinel the
/// resolver uses for "unresolved". NaN fails the range checks.
pub fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return false;
    }
    !(latitude == 0.0 && longitude == 0.0)
}
