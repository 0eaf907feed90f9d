//! Tests for iCalendar export and the export → import round trip.

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use stay_engine::dates::{add_days, parse_date, sub_days};
use stay_engine::feed::export::{escape_text, feed_filename, summary_for, X_PROPERTY_ID, X_SOURCE};
use stay_engine::{export_feed, import_feed, BlockSource, BlockedRange, FeedMetadata};
use uuid::Uuid;

fn d(s: &str) -> NaiveDate {
    parse_date(s).unwrap()
}

fn block(property_id: &str, start: &str, end: &str, source: BlockSource, reason: &str) -> BlockedRange {
    BlockedRange {
        id: Uuid::new_v4(),
        property_id: property_id.to_string(),
        start: d(start),
        end: d(end),
        source,
        reason: reason.to_string(),
        reservation_id: None,
    }
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 8, 30, 0).unwrap()
}

// ── Structure ───────────────────────────────────────────────────────────────

#[test]
fn export_wraps_events_in_calendar() {
    let ranges = vec![block("condo-1", "2026-02-01", "2026-02-04", BlockSource::Manual, "Repairs")];
    let feed = export_feed("condo-1", &ranges, &FeedMetadata::default(), now());

    assert!(feed.starts_with("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n"));
    assert!(feed.ends_with("END:VCALENDAR\r\n"));
    assert_eq!(feed.matches("BEGIN:VEVENT").count(), 1);
    assert!(feed.contains("DTSTAMP:20260115T083000Z\r\n"));
    assert!(feed.contains("SUMMARY:Repairs\r\n"));
}

#[test]
fn dtend_is_stored_end_plus_one_day() {
    let ranges = vec![block("condo-1", "2026-02-27", "2026-02-28", BlockSource::Manual, "")];
    let feed = export_feed("condo-1", &ranges, &FeedMetadata::default(), now());

    assert!(feed.contains("DTSTART;VALUE=DATE:20260227\r\n"));
    assert!(feed.contains("DTEND;VALUE=DATE:20260301\r\n"));
}

#[test]
fn uid_combines_property_index_and_timestamp() {
    let ranges = vec![
        block("condo-1", "2026-02-01", "2026-02-02", BlockSource::Manual, ""),
        block("condo-1", "2026-03-01", "2026-03-02", BlockSource::Booking, ""),
    ];
    let feed = export_feed("condo-1", &ranges, &FeedMetadata::default(), now());
    let ts = now().timestamp();

    assert!(feed.contains(&format!("UID:condo-1-0-{}@stay-engine.local", ts)));
    assert!(feed.contains(&format!("UID:condo-1-1-{}@stay-engine.local", ts)));
}

#[test]
fn ranges_of_other_properties_are_skipped() {
    let ranges = vec![
        block("condo-1", "2026-02-01", "2026-02-02", BlockSource::Manual, "mine"),
        block("condo-2", "2026-02-01", "2026-02-02", BlockSource::Manual, "theirs"),
    ];
    let feed = export_feed("condo-1", &ranges, &FeedMetadata::default(), now());
    assert_eq!(feed.matches("BEGIN:VEVENT").count(), 1);
    assert!(!feed.contains("theirs"));
}

#[test]
fn extensions_tag_source_and_property() {
    let ranges = vec![block("condo-1", "2026-02-01", "2026-02-02", BlockSource::Imported, "")];
    let feed = export_feed("condo-1", &ranges, &FeedMetadata::default(), now());

    assert!(feed.contains(&format!("{}:imported\r\n", X_SOURCE)));
    assert!(feed.contains(&format!("{}:condo-1\r\n", X_PROPERTY_ID)));
}

#[test]
fn extensions_can_be_omitted() {
    let metadata = FeedMetadata {
        include_extensions: false,
        ..FeedMetadata::default()
    };
    let ranges = vec![block("condo-1", "2026-02-01", "2026-02-02", BlockSource::Manual, "")];
    let feed = export_feed("condo-1", &ranges, &metadata, now());

    assert!(!feed.contains("X-STAY-"));
    assert_eq!(import_feed(&feed).unwrap().events.len(), 1);
}

#[test]
fn calendar_name_is_escaped() {
    let metadata = FeedMetadata {
        calendar_name: Some("Condo, Tower 2; Unit 5".to_string()),
        ..FeedMetadata::default()
    };
    let feed = export_feed("condo-1", &[], &metadata, now());
    assert!(feed.contains("X-WR-CALNAME:Condo\\, Tower 2\\; Unit 5\r\n"));
}

#[test]
fn long_lines_are_folded_at_75_octets() {
    let reason = "Deep cleaning, aircon servicing and repainting of the balcony railings before peak season";
    let ranges = vec![block("condo-1", "2026-02-01", "2026-02-02", BlockSource::Manual, reason)];
    let feed = export_feed("condo-1", &ranges, &FeedMetadata::default(), now());

    for line in feed.split("\r\n") {
        assert!(line.len() <= 75, "line too long: {:?}", line);
    }
    let imported = import_feed(&feed).unwrap();
    assert_eq!(imported.events[0].summary.as_deref(), Some(reason));
}

#[test]
fn folding_never_splits_multibyte_characters() {
    let reason = "Ñ".repeat(60);
    let ranges = vec![block("condo-1", "2026-02-01", "2026-02-02", BlockSource::Manual, &reason)];
    let feed = export_feed("condo-1", &ranges, &FeedMetadata::default(), now());

    let imported = import_feed(&feed).unwrap();
    assert_eq!(imported.events[0].summary.as_deref(), Some(reason.as_str()));
}

// ── Helpers ─────────────────────────────────────────────────────────────────

#[test]
fn summary_falls_back_to_source_label() {
    assert_eq!(
        summary_for(&block("p", "2026-01-01", "2026-01-02", BlockSource::Booking, "  ")),
        "Reserved"
    );
    assert_eq!(
        summary_for(&block("p", "2026-01-01", "2026-01-02", BlockSource::Manual, "")),
        "Blocked"
    );
    assert_eq!(
        summary_for(&block("p", "2026-01-01", "2026-01-02", BlockSource::Imported, "Airbnb")),
        "Airbnb"
    );
}

#[test]
fn filename_is_slugged_property_name() {
    assert_eq!(feed_filename("Cozy Condo – Tower 2!"), "cozy-condo-tower-2.ics");
    assert_eq!(feed_filename("   "), "calendar.ics");
}

#[test]
fn escape_text_handles_reserved_characters() {
    assert_eq!(escape_text("a,b;c\\d\ne"), "a\\,b\\;c\\\\d\\ne");
}

// ── Round trip ──────────────────────────────────────────────────────────────

#[test]
fn export_then_import_recovers_ranges() {
    let ranges = vec![
        block("condo-1", "2026-02-01", "2026-02-04", BlockSource::Manual, "Repairs"),
        block("condo-1", "2026-01-10", "2026-01-12", BlockSource::Booking, ""),
    ];
    let feed = export_feed("condo-1", &ranges, &FeedMetadata::default(), now());
    let imported = import_feed(&feed).unwrap();

    let recovered: Vec<(NaiveDate, NaiveDate)> = imported
        .events
        .iter()
        .map(|e| (e.start_date, sub_days(e.end_date, 1)))
        .collect();
    // Import sorts by start.
    assert_eq!(
        recovered,
        vec![(d("2026-01-10"), d("2026-01-12")), (d("2026-02-01"), d("2026-02-04"))]
    );
    assert_eq!(imported.events[1].extensions.get(X_SOURCE).map(String::as_str), Some("manual"));
}

fn arb_block() -> impl Strategy<Value = (u64, u64, String)> {
    (0u64..1500, 1u64..45, "[A-Za-z0-9 ,;\\\\]{0,90}")
}

proptest! {
    #[test]
    fn round_trip_preserves_every_range(specs in prop::collection::vec(arb_block(), 0..12)) {
        let origin = d("2025-01-01");
        let ranges: Vec<BlockedRange> = specs
            .iter()
            .map(|(offset, len, reason)| {
                let start = add_days(origin, *offset);
                BlockedRange {
                    id: Uuid::new_v4(),
                    property_id: "condo-1".to_string(),
                    start,
                    end: add_days(start, *len),
                    source: BlockSource::Manual,
                    reason: reason.clone(),
                    reservation_id: None,
                }
            })
            .collect();

        let feed = export_feed("condo-1", &ranges, &FeedMetadata::default(), now());
        let imported = import_feed(&feed).unwrap();
        prop_assert_eq!(imported.events.len(), ranges.len());
        prop_assert_eq!(imported.dropped, 0);

        let mut expected: Vec<(NaiveDate, NaiveDate)> =
            ranges.iter().map(|r| (r.start, r.end)).collect();
        let mut actual: Vec<(NaiveDate, NaiveDate)> = imported
            .events
            .iter()
            .map(|e| (e.start_date, sub_days(e.end_date, 1)))
            .collect();
        expected.sort();
        actual.sort();
        prop_assert_eq!(actual, expected);
    }
}
