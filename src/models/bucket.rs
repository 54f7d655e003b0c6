//! Bucket records as reported by the data service's bucket inventory.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Bucket type carrying user-presence (AFK) heartbeats.
pub const AFK_BUCKET_TYPE: &str = "afkstatus";

/// Bucket type carrying active-window heartbeats.
pub const WINDOW_BUCKET_TYPE: &str = "currentwindow";

/// Id prefix of window buckets produced by the Android watcher.
pub const ANDROID_WATCHER_PREFIX: &str = "aw-watcher-android";

/// A named, typed time-series source tracked by the data service.
///
/// Fields the engine does not use are ignored during deserialization.
/// Used fields of an unexpected JSON type degrade instead of dropping the
/// bucket: scalars become their text form, a non-string timestamp is absent.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Bucket {
    /// Bucket identifier.
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    /// Bucket type, e.g. [`AFK_BUCKET_TYPE`].
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    pub bucket_type: String,
    /// Raw ISO-8601 timestamp of the last event, possibly without timezone.
    #[serde(default, deserialize_with = "string_or_none")]
    pub last_updated: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        _ => None,
    })
}

impl Bucket {
    /// Parsed `last_updated`, or `None` when absent or unparsable.
    #[must_use]
    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        self.last_updated.as_deref().and_then(parse_timestamp)
    }

    /// Whether this bucket reports user presence.
    #[must_use]
    pub fn is_afk(&self) -> bool {
        self.bucket_type == AFK_BUCKET_TYPE
    }

    /// Whether this bucket reports active windows, of any source.
    #[must_use]
    pub fn is_window(&self) -> bool {
        self.bucket_type == WINDOW_BUCKET_TYPE
    }

    /// Whether this bucket feeds the "tracking is live" signal for windows.
    ///
    /// Android window buckets are excluded.
    #[must_use]
    pub fn is_desktop_window(&self) -> bool {
        self.is_window() && !self.id.starts_with(ANDROID_WATCHER_PREFIX)
    }

    /// Whether this bucket participates in `last_seen`.
    #[must_use]
    pub fn is_relevant(&self) -> bool {
        self.is_afk() || self.is_window()
    }
}

/// Convert the `GET /api/0/buckets/` body into bucket records.
///
/// Entries that are not objects are skipped. A missing `id` falls back
/// to the map key.
#[must_use]
pub fn buckets_from_inventory(inventory: &Map<String, Value>) -> Vec<Bucket> {
    inventory
        .iter()
        .filter(|(_, value)| value.is_object())
        .filter_map(|(key, value)| {
            let mut bucket = Bucket::deserialize(value).ok()?;
            if bucket.id.is_empty() {
                bucket.id.clone_from(key);
            }
            Some(bucket)
        })
        .collect()
}

/// Zoned forms beyond RFC 3339. `%#z` takes `Z`, `+hh`, `+hhmm` and `+hh:mm`.
const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%#z",
    "%Y%m%dT%H%M%S%.f%#z",
    "%Y%m%dT%H%M%#z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M",
];

/// Parse an ISO-8601 timestamp in extended or basic format, to second or
/// minute precision. Values without a timezone are taken as UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ZONED_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(raw, format) {
            return Some(ts.with_timezone(&Utc));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
