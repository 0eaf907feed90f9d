//! Availability reconciliation across reservations and blocked ranges.
//!
//! Occupancy for a property comes from several sources at once: guest
//! reservations, manual owner blocks, ranges imported from third-party
//! feeds, and ranges recorded when a booking is paid. This module tests a
//! requested stay against all of them and reports exactly which nights
//! collide. It is pure: callers load the data and decide policy (stay length,
//! guest count, past dates) themselves.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::DateRange;
use crate::model::{BlockedRange, Reservation};

/// Result of an availability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    /// Requested nights already taken, ascending and deduplicated.
    pub conflicting_dates: Vec<NaiveDate>,
    pub nights: i64,
}

/// Which occupancy source a conflict came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Occupant {
    Reservation { id: String },
    Block { id: String, source: String },
}

/// One occupancy range that overlaps the request, with the clipped overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overlap {
    pub occupant: Occupant,
    pub overlap: DateRange,
}

/// Check `requested` against every occupying reservation and blocked range.
///
/// Cancelled and refunded reservations are ignored. When anything overlaps,
/// `conflicting_dates` is the union of the overlapping nights, clipped to the
/// requested range.
pub fn check_availability(
    reservations: &[Reservation],
    blocked: &[BlockedRange],
    requested: DateRange,
) -> Availability {
    let overlaps = find_overlaps(reservations, blocked, requested);

    let dates: BTreeSet<NaiveDate> = overlaps
        .iter()
        .flat_map(|o| o.overlap.days())
        .collect();

    Availability {
        available: dates.is_empty(),
        conflicting_dates: dates.into_iter().collect(),
        nights: requested.nights(),
    }
}

/// List every occupancy range overlapping `requested`, reservations first.
///
/// Adjacent ranges where one ends exactly when the request starts (or the
/// reverse) are not overlaps.
pub fn find_overlaps(
    reservations: &[Reservation],
    blocked: &[BlockedRange],
    requested: DateRange,
) -> Vec<Overlap> {
    let from_reservations = reservations
        .iter()
        .filter(|r| r.status.occupies())
        .filter_map(|r| {
            r.stay().intersection(&requested).map(|overlap| Overlap {
                occupant: Occupant::Reservation { id: r.id.to_string() },
                overlap,
            })
        });

    let from_blocks = blocked.iter().filter_map(|b| {
        b.span().intersection(&requested).map(|overlap| Overlap {
            occupant: Occupant::Block {
                id: b.id.to_string(),
                source: b.source.as_str().to_string(),
            },
            overlap,
        })
    });

    from_reservations.chain(from_blocks).collect()
}

/// Merge occupancy into sorted, non-overlapping busy ranges.
///
/// Touching ranges are coalesced, so `[1, 3)` and `[3, 5)` become `[1, 5)`.
/// Useful for rendering a calendar and for exporting compact feeds.
pub fn merge_busy_ranges(reservations: &[Reservation], blocked: &[BlockedRange]) -> Vec<DateRange> {
    let mut intervals: Vec<DateRange> = reservations
        .iter()
        .filter(|r| r.status.occupies())
        .map(Reservation::stay)
        .chain(blocked.iter().map(BlockedRange::span))
        .filter(|r| r.start < r.end)
        .collect();

    intervals.sort_by_key(|r| (r.start, r.end));

    let mut merged: Vec<DateRange> = Vec::new();
    for range in intervals {
        if let Some(last) = merged.last_mut() {
            if range.start <= last.end {
                last.end = last.end.max(range.end);
                continue;
            }
        }
        merged.push(range);
    }

    merged
}

/// Free gaps of at least `min_nights` inside `window`, given the merged busy ranges.
pub fn free_ranges(busy: &[DateRange], window: DateRange, min_nights: i64) -> Vec<DateRange> {
    let mut free = Vec::new();
    let mut cursor = window.start;

    for range in busy.iter().filter_map(|b| b.intersection(&window)) {
        if cursor < range.start {
            free.push(DateRange {
                start: cursor,
                end: range.start,
            });
        }
        cursor = cursor.max(range.end);
    }

    if cursor < window.end {
        free.push(DateRange {
            start: cursor,
            end: window.end,
        });
    }

    free.retain(|r| r.nights() >= min_nights.max(1));
    free
}
