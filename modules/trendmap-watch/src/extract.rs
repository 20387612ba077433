//! Location-field extraction from untyped source items.
//!
//! Pure functions over `serde_json::Value`: a depth-first walk that collects
//! location-indicative fields as `(path, value)` pairs, plus best-effort
//! accessors for the loosely-schema'd fields a raw item is expected to carry
//! (text, author, id, creation time). Nothing here touches the network or the
//! store.

use chrono::{DateTime, Utc};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Key sets
// ---------------------------------------------------------------------------

/// Field names that indicate location data, matched case-insensitively.
const LOCATION_KEYS: [&str; 14] = [
    "location",
    "place",
    "city",
    "country",
    "region",
    "state",
    "geo",
    "coordinates",
    "coords",
    "lat",
    "latitude",
    "lon",
    "lng",
    "longitude",
];

/// Aliases for the item's text body, in lookup order.
const TEXT_KEYS: [&str; 6] = ["text", "full_text", "fullText", "content", "caption", "body"];

/// Aliases for the item's author, in lookup order. Dots denote nesting.
const AUTHOR_KEYS: [&str; 5] = [
    "author.userName",
    "author.name",
    "username",
    "user.screen_name",
    "user.name",
];

/// Aliases for the item's unique identifier, in lookup order.
const ID_KEYS: [&str; 4] = ["id", "id_str", "tweetId", "tweet_id"];

/// Aliases for the item's creation timestamp, in lookup order.
const CREATED_AT_KEYS: [&str; 3] = ["createdAt", "created_at", "timestamp"];

/// Timestamp layout used by the tweet APIs, e.g. `Thu Sep 12 13:45:30 +0000 2024`.
const TWEET_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

// ---------------------------------------------------------------------------
// Location-field walk
// ---------------------------------------------------------------------------

/// Collect location-indicative fields from a raw item.
///
/// Walk rules:
/// 1. An object key matching [`LOCATION_KEYS`] (case-insensitive) roots a
///    collection subtree: every scalar leaf beneath it is emitted with its
///    full path.
/// 2. Non-matching keys are descended through in search of deeper matches
///    (`user/location`, `media/0/geo/lat`, ...).
/// 3. Arrays are traversed by index and indices appear in paths.
/// 4. Path segments join with `/`; emission order follows map iteration
///    order, which is deterministic but not source declaration order.
///
/// Null and blank string values carry no signal and are skipped.
pub fn location_fields(item: &Value) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    walk(item, "", false, &mut fields);
    fields
}

fn walk(value: &Value, path: &str, collecting: bool, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = join_path(path, key);
                walk(child, &child_path, collecting || is_location_key(key), out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                let child_path = join_path(path, &index.to_string());
                walk(child, &child_path, collecting, out);
            }
        }
        scalar => {
            if collecting {
                if let Some(text) = scalar_text(scalar) {
                    out.push((path.to_string(), text));
                }
            }
        }
    }
}

fn is_location_key(key: &str) -> bool {
    LOCATION_KEYS.iter().any(|k| key.eq_ignore_ascii_case(k))
}

fn join_path(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}/{segment}")
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Best-effort item field accessors
// ---------------------------------------------------------------------------

/// The item's text body, from the first matching alias. `None` when the item
/// has no usable text.
pub fn item_text(item: &Value) -> Option<String> {
    lookup_string(item, &TEXT_KEYS)
}

/// The item's author handle, from the first matching alias. Falls back to
/// `"unknown"` so an anonymous item can still be stored.
pub fn item_author(item: &Value) -> String {
    lookup_string(item, &AUTHOR_KEYS).unwrap_or_else(|| "unknown".to_string())
}

/// The item's unique identifier, stringified. Items without one cannot be
/// deduplicated and are skipped by the ingestor.
pub fn item_id(item: &Value) -> Option<String> {
    for key in &ID_KEYS {
        match lookup(item, key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// The item's creation time. Accepts RFC 3339, the classic tweet layout, or a
/// unix-seconds number; anything else falls back to the time of ingestion.
pub fn item_created_at(item: &Value) -> DateTime<Utc> {
    for key in &CREATED_AT_KEYS {
        match lookup(item, key) {
            Some(Value::String(s)) => {
                if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
                    return parsed.with_timezone(&Utc);
                }
                if let Ok(parsed) = DateTime::parse_from_str(s, TWEET_TIME_FORMAT) {
                    return parsed.with_timezone(&Utc);
                }
            }
            Some(Value::Number(n)) => {
                if let Some(parsed) = n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0))
                {
                    return parsed;
                }
            }
            _ => {}
        }
    }
    Utc::now()
}

/// Resolve a possibly-dotted alias against an item, one object level per
/// segment.
fn lookup<'a>(item: &'a Value, dotted: &str) -> Option<&'a Value> {
    let mut current = item;
    for part in dotted.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

fn lookup_string(item: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = lookup(item, key).and_then(Value::as_str) {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

// ===========================================================================
// Unit tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ===================================================================
    // location_fields
    // ===================================================================

    #[test]
    fn finds_nested_location_field() {
        let item = json!({"user": {"location": "Memphis, Tennessee"}});
        assert_eq!(
            location_fields(&item),
            vec![("user/location".to_string(), "Memphis, Tennessee".to_string())]
        );
    }

    #[test]
    fn key_match_is_case_insensitive() {
        let item = json!({"LOCATION": "Paris", "GeO": {"Lat": 48.85}});
        let fields = location_fields(&item);
        assert!(fields.contains(&("LOCATION".to_string(), "Paris".to_string())));
        assert!(fields.contains(&("GeO/Lat".to_string(), "48.85".to_string())));
    }

    #[test]
    fn matched_container_collects_every_leaf() {
        let item = json!({"location": {"lat": 40.0, "lon": -75.0}});
        assert_eq!(
            location_fields(&item),
            vec![
                ("location/lat".to_string(), "40.0".to_string()),
                ("location/lon".to_string(), "-75.0".to_string()),
            ]
        );
    }

    #[test]
    fn matched_array_is_traversed_by_index() {
        let item = json!({"coordinates": [35.1, -90.0]});
        assert_eq!(
            location_fields(&item),
            vec![
                ("coordinates/0".to_string(), "35.1".to_string()),
                ("coordinates/1".to_string(), "-90.0".to_string()),
            ]
        );
    }

    #[test]
    fn arrays_of_objects_are_searched() {
        let item = json!({"media": [{"caption": "x"}, {"location": "San Francisco"}]});
        assert_eq!(
            location_fields(&item),
            vec![("media/1/location".to_string(), "San Francisco".to_string())]
        );
    }

    #[test]
    fn deeply_nested_leaves_keep_full_paths() {
        let item = json!({"geo": {"bbox": {"corners": [{"x": 1.5}]}}});
        assert_eq!(
            location_fields(&item),
            vec![("geo/bbox/corners/0/x".to_string(), "1.5".to_string())]
        );
    }

    #[test]
    fn null_and_blank_values_are_skipped() {
        let item = json!({"location": null, "city": "   ", "place": {"name": null}});
        assert!(location_fields(&item).is_empty());
    }

    #[test]
    fn items_without_location_keys_yield_nothing() {
        let item = json!({"text": "hello", "user": {"name": "someone"}});
        assert!(location_fields(&item).is_empty());
    }

    #[test]
    fn emission_order_is_deterministic() {
        let item = json!({"place": "B", "city": "A"});
        // Map iteration is key-sorted, so the same item always emits the
        // same sequence regardless of source declaration order.
        assert_eq!(
            location_fields(&item),
            vec![
                ("city".to_string(), "A".to_string()),
                ("place".to_string(), "B".to_string()),
            ]
        );
    }

    // ===================================================================
    // Field accessors
    // ===================================================================

    #[test]
    fn text_prefers_first_alias() {
        let item = json!({"text": "primary", "full_text": "secondary"});
        assert_eq!(item_text(&item), Some("primary".to_string()));
    }

    #[test]
    fn text_falls_through_aliases() {
        let item = json!({"full_text": "from the long field"});
        assert_eq!(item_text(&item), Some("from the long field".to_string()));
        assert_eq!(item_text(&json!({"unrelated": 1})), None);
    }

    #[test]
    fn blank_text_is_treated_as_missing() {
        let item = json!({"text": "   ", "content": "real"});
        assert_eq!(item_text(&item), Some("real".to_string()));
    }

    #[test]
    fn author_resolves_dotted_aliases() {
        let item = json!({"author": {"userName": "jsmith"}});
        assert_eq!(item_author(&item), "jsmith");

        let item = json!({"user": {"screen_name": "jdoe"}});
        assert_eq!(item_author(&item), "jdoe");
    }

    #[test]
    fn author_defaults_to_unknown() {
        assert_eq!(item_author(&json!({"text": "hi"})), "unknown");
    }

    #[test]
    fn id_accepts_strings_and_numbers() {
        assert_eq!(item_id(&json!({"id": "abc123"})), Some("abc123".to_string()));
        assert_eq!(item_id(&json!({"id": 98765})), Some("98765".to_string()));
        assert_eq!(item_id(&json!({"tweet_id": "t-1"})), Some("t-1".to_string()));
        assert_eq!(item_id(&json!({"text": "no id"})), None);
    }

    #[test]
    fn created_at_parses_both_timestamp_layouts() {
        let rfc = json!({"createdAt": "2024-09-12T13:45:30Z"});
        assert_eq!(item_created_at(&rfc).to_rfc3339(), "2024-09-12T13:45:30+00:00");

        let tweet = json!({"created_at": "Thu Sep 12 13:45:30 +0000 2024"});
        assert_eq!(item_created_at(&tweet).to_rfc3339(), "2024-09-12T13:45:30+00:00");
    }

    #[test]
    fn created_at_falls_back_to_now_on_garbage() {
        let before = Utc::now();
        let parsed = item_created_at(&json!({"createdAt": "not a time"}));
        assert!(parsed >= before);
    }
}
