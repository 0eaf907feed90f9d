//! Tests for availability reconciliation across reservations and blocked ranges.

use chrono::NaiveDate;
use stay_engine::availability::{
    check_availability, find_overlaps, free_ranges, merge_busy_ranges, Occupant,
};
use stay_engine::dates::parse_date;
use stay_engine::{BlockSource, BlockedRange, DateRange, Reservation, ReservationStatus};
use uuid::Uuid;

// ── Helpers ─────────────────────────────────────────────────────────────────

fn d(s: &str) -> NaiveDate {
    parse_date(s).unwrap()
}

fn range(start: &str, end: &str) -> DateRange {
    DateRange::parse(start, end).unwrap()
}

fn reservation(check_in: &str, check_out: &str, status: ReservationStatus) -> Reservation {
    Reservation {
        id: Uuid::new_v4(),
        property_id: "condo-1".to_string(),
        check_in: d(check_in),
        check_out: d(check_out),
        guests: 2,
        status,
    }
}

fn block(start: &str, end: &str, source: BlockSource) -> BlockedRange {
    BlockedRange {
        id: Uuid::new_v4(),
        property_id: "condo-1".to_string(),
        start: d(start),
        end: d(end),
        source,
        reason: String::new(),
        reservation_id: None,
    }
}

// ── Reservations ────────────────────────────────────────────────────────────

#[test]
fn overlapping_reservation_reports_clipped_dates() {
    let existing = vec![reservation("2025-12-20", "2025-12-25", ReservationStatus::Confirmed)];

    let result = check_availability(&existing, &[], range("2025-12-22", "2025-12-27"));

    assert!(!result.available);
    assert_eq!(
        result.conflicting_dates,
        vec![d("2025-12-22"), d("2025-12-23"), d("2025-12-24")]
    );
    assert_eq!(result.nights, 5);
}

#[test]
fn back_to_back_stay_is_available() {
    let existing = vec![reservation("2025-12-20", "2025-12-25", ReservationStatus::Paid)];

    let result = check_availability(&existing, &[], range("2025-12-25", "2025-12-28"));

    assert!(result.available);
    assert!(result.conflicting_dates.is_empty());
    assert_eq!(result.nights, 3);
}

#[test]
fn stay_ending_on_existing_checkin_is_available() {
    let existing = vec![reservation("2025-12-20", "2025-12-25", ReservationStatus::Pending)];
    let result = check_availability(&existing, &[], range("2025-12-17", "2025-12-20"));
    assert!(result.available);
}

#[test]
fn cancelled_and_refunded_reservations_are_ignored() {
    let existing = vec![
        reservation("2025-12-20", "2025-12-25", ReservationStatus::Cancelled),
        reservation("2025-12-20", "2025-12-25", ReservationStatus::Refunded),
    ];
    let result = check_availability(&existing, &[], range("2025-12-21", "2025-12-23"));
    assert!(result.available);
}

#[test]
fn every_occupying_status_blocks() {
    for status in [
        ReservationStatus::Pending,
        ReservationStatus::Paid,
        ReservationStatus::Confirmed,
        ReservationStatus::CheckedIn,
        ReservationStatus::CheckedOut,
    ] {
        let existing = vec![reservation("2026-01-10", "2026-01-12", status)];
        let result = check_availability(&existing, &[], range("2026-01-11", "2026-01-13"));
        assert!(!result.available, "{:?} should occupy its dates", status);
    }
}

// ── Blocked ranges ──────────────────────────────────────────────────────────

#[test]
fn blocked_ranges_of_every_source_conflict() {
    for source in [BlockSource::Manual, BlockSource::Imported, BlockSource::Booking] {
        let blocked = vec![block("2026-02-01", "2026-02-03", source)];
        let result = check_availability(&[], &blocked, range("2026-01-30", "2026-02-02"));
        assert!(!result.available);
        assert_eq!(result.conflicting_dates, vec![d("2026-02-01")]);
    }
}

#[test]
fn conflicting_dates_are_union_of_sources_deduplicated_and_sorted() {
    let reservations = vec![reservation("2026-03-05", "2026-03-08", ReservationStatus::Confirmed)];
    let blocked = vec![
        block("2026-03-07", "2026-03-10", BlockSource::Imported),
        block("2026-03-01", "2026-03-03", BlockSource::Manual),
    ];

    let result = check_availability(&reservations, &blocked, range("2026-03-02", "2026-03-09"));

    assert!(!result.available);
    assert_eq!(
        result.conflicting_dates,
        vec![
            d("2026-03-02"),
            d("2026-03-05"),
            d("2026-03-06"),
            d("2026-03-07"),
            d("2026-03-08"),
        ]
    );
}

#[test]
fn no_occupancy_means_available() {
    let result = check_availability(&[], &[], range("2026-04-01", "2026-04-08"));
    assert!(result.available);
    assert_eq!(result.nights, 7);
}

#[test]
fn find_overlaps_names_each_occupant() {
    let r = reservation("2026-05-01", "2026-05-04", ReservationStatus::Paid);
    let b = block("2026-05-03", "2026-05-06", BlockSource::Imported);

    let overlaps = find_overlaps(&[r.clone()], &[b.clone()], range("2026-05-02", "2026-05-05"));

    assert_eq!(overlaps.len(), 2);
    assert_eq!(
        overlaps[0].occupant,
        Occupant::Reservation { id: r.id.to_string() }
    );
    assert_eq!(overlaps[0].overlap, range("2026-05-02", "2026-05-04"));
    assert_eq!(
        overlaps[1].occupant,
        Occupant::Block {
            id: b.id.to_string(),
            source: "imported".to_string()
        }
    );
    assert_eq!(overlaps[1].overlap, range("2026-05-03", "2026-05-05"));
}

// ── Busy/free views ─────────────────────────────────────────────────────────

#[test]
fn merge_busy_ranges_coalesces_touching_and_overlapping() {
    let reservations = vec![
        reservation("2026-06-01", "2026-06-03", ReservationStatus::Confirmed),
        reservation("2026-06-10", "2026-06-12", ReservationStatus::Cancelled),
    ];
    let blocked = vec![
        block("2026-06-03", "2026-06-05", BlockSource::Manual),
        block("2026-06-04", "2026-06-07", BlockSource::Imported),
        block("2026-06-20", "2026-06-21", BlockSource::Booking),
    ];

    let busy = merge_busy_ranges(&reservations, &blocked);

    assert_eq!(
        busy,
        vec![range("2026-06-01", "2026-06-07"), range("2026-06-20", "2026-06-21")]
    );
}

#[test]
fn free_ranges_respect_minimum_nights() {
    let busy = vec![range("2026-06-03", "2026-06-05"), range("2026-06-06", "2026-06-10")];
    let window = range("2026-06-01", "2026-06-15");

    let all = free_ranges(&busy, window, 1);
    assert_eq!(
        all,
        vec![
            range("2026-06-01", "2026-06-03"),
            range("2026-06-05", "2026-06-06"),
            range("2026-06-10", "2026-06-15"),
        ]
    );

    let long = free_ranges(&busy, window, 3);
    assert_eq!(long, vec![range("2026-06-10", "2026-06-15")]);
}
