//! Unit tests for bucket parsing and timestamp handling.

use chrono::{TimeZone, Utc};
use serde_json::json;

use aw_supervisor::models::bucket::{buckets_from_inventory, parse_timestamp, Bucket};

#[test]
fn parses_rfc3339_with_offset() {
    let ts = parse_timestamp("2026-03-01T14:00:00+02:00").expect("parses");
    assert_eq!(ts, Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
}

#[test]
fn parses_zulu_with_fraction() {
    let ts = parse_timestamp("2026-03-01T12:00:00.500Z").expect("parses");
    assert_eq!(ts.timestamp(), Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap().timestamp());
    assert_eq!(ts.timestamp_subsec_millis(), 500);
}

#[test]
fn naive_timestamp_assumed_utc() {
    let ts = parse_timestamp("2026-03-01T12:00:00").expect("parses");
    assert_eq!(ts, Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());

    let spaced = parse_timestamp("2026-03-01 12:00:00").expect("parses");
    assert_eq!(spaced, ts);
}

#[test]
fn offset_without_colon_is_accepted() {
    let ts = parse_timestamp("2026-03-01T13:00:00+0100").expect("parses");
    assert_eq!(ts, Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
}

#[test]
fn date_only_is_midnight_utc() {
    let ts = parse_timestamp("2026-03-01").expect("parses");
    assert_eq!(ts, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
}

#[test]
fn garbage_and_empty_timestamps_are_rejected() {
    assert!(parse_timestamp("").is_none());
    assert!(parse_timestamp("   ").is_none());
    assert!(parse_timestamp("not a date").is_none());
    assert!(parse_timestamp("2026-13-45T99:00:00").is_none());
}

#[test]
fn inventory_keeps_used_fields_and_ignores_the_rest() {
    let inventory = json!({
        "aw-watcher-afk_host": {
            "id": "aw-watcher-afk_host",
            "type": "afkstatus",
            "client": "aw-watcher-afk",
            "hostname": "host",
            "created": "2026-01-01T00:00:00+00:00",
            "last_updated": "2026-03-01T12:00:00+00:00"
        }
    });
    let buckets = buckets_from_inventory(inventory.as_object().unwrap());
    assert_eq!(
        buckets,
        vec![Bucket {
            id: "aw-watcher-afk_host".into(),
            bucket_type: "afkstatus".into(),
            last_updated: Some("2026-03-01T12:00:00+00:00".into()),
        }]
    );
    assert!(buckets[0].is_afk());
    assert!(buckets[0].is_relevant());
}

#[test]
fn inventory_falls_back_to_key_for_missing_id() {
    let inventory = json!({
        "aw-watcher-window_host": { "type": "currentwindow" }
    });
    let buckets = buckets_from_inventory(inventory.as_object().unwrap());
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].id, "aw-watcher-window_host");
    assert!(buckets[0].is_desktop_window());
    assert_eq!(buckets[0].last_updated_at(), None);
}

#[test]
fn inventory_skips_entries_that_are_not_objects() {
    let inventory = json!({
        "broken": 42,
        "also-broken": ["x"],
        "ok": { "id": "ok", "type": "afkstatus" }
    });
    let buckets = buckets_from_inventory(inventory.as_object().unwrap());
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].id, "ok");
}

#[test]
fn android_prefix_excludes_window_bucket() {
    let android = Bucket {
        id: "aw-watcher-android-test".into(),
        bucket_type: "currentwindow".into(),
        last_updated: None,
    };
    assert!(android.is_window());
    assert!(!android.is_desktop_window());
    assert!(android.is_relevant());
}

#[test]
fn minute_precision_with_zone_is_accepted() {
    let expected = Utc.with_ymd_and_hms(2026, 3, 1, 11, 59, 0).unwrap();
    assert_eq!(parse_timestamp("2026-03-01T11:59+00:00"), Some(expected));
    assert_eq!(parse_timestamp("2026-03-01T11:59Z"), Some(expected));
    assert_eq!(parse_timestamp("2026-03-01T13:59+0200"), Some(expected));
}

#[test]
fn hour_only_offset_is_accepted() {
    let ts = parse_timestamp("2026-03-01T11:59:00+02").expect("parses");
    assert_eq!(ts, Utc.with_ymd_and_hms(2026, 3, 1, 9, 59, 0).unwrap());
}

#[test]
fn basic_format_is_accepted() {
    let expected = Utc.with_ymd_and_hms(2026, 3, 1, 11, 59, 0).unwrap();
    assert_eq!(parse_timestamp("20260301T115900Z"), Some(expected));
    assert_eq!(parse_timestamp("20260301T135900+0200"), Some(expected));
    assert_eq!(parse_timestamp("20260301T115900"), Some(expected));
}

#[test]
fn mistyped_fields_keep_the_bucket() {
    let inventory = json!({
        "42": { "id": 42, "type": "afkstatus", "last_updated": "2026-03-01T12:00:00Z" },
        "odd": { "id": "odd", "type": null, "last_updated": 1_772_366_400 }
    });
    let buckets = buckets_from_inventory(inventory.as_object().unwrap());
    assert_eq!(buckets.len(), 2);

    let numeric = buckets.iter().find(|b| b.id == "42").expect("numeric id kept");
    assert!(numeric.is_afk());
    assert!(numeric.last_updated_at().is_some());

    let odd = buckets.iter().find(|b| b.id == "odd").expect("bucket kept");
    assert!(!odd.is_relevant());
    assert_eq!(odd.last_updated, None);
}
