//! Data model shared between the engine and its storage collaborator.
//!
//! Properties are owned by the surrounding application and are read-only
//! here. Reservations are never deleted; cancellation is a status change.
//! Money is carried in integer minor units (cents/centavos).

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dates::DateRange;

/// An amount of money in the currency's minor unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Build from a whole major-unit amount (`from_major(2500)` is 2500.00).
    pub const fn from_major(units: i64) -> Money {
        Money(units * 100)
    }

    pub const fn minor_units(self) -> i64 {
        self.0
    }

    /// `self * percent / 100`, rounded once to the nearest minor unit.
    pub fn percent(self, percent: f64) -> Money {
        Money((self.0 as f64 * percent / 100.0).round() as i64)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Mul<i64> for Money {
    type Output = Money;

    fn mul(self, rhs: i64) -> Money {
        Money(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// A rentable listing and its fee schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub name: String,
    pub base_price: Money,
    #[serde(default)]
    pub cleaning_fee: Money,
    #[serde(default)]
    pub parking_fee_per_day: Money,
    #[serde(default)]
    pub admin_fee_percent: f64,
    /// Guests included in the base price.
    pub base_occupancy: u32,
    /// Charged per extra guest per night.
    #[serde(default)]
    pub extra_person_fee: Money,
    pub min_nights: u32,
    pub max_nights: u32,
    pub max_guests: u32,
    pub active: bool,
}

/// Reservation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Paid,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
    Refunded,
}

impl ReservationStatus {
    /// Whether a reservation in this status holds its dates.
    pub fn occupies(self) -> bool {
        !matches!(self, ReservationStatus::Cancelled | ReservationStatus::Refunded)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub property_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: u32,
    pub status: ReservationStatus,
}

impl Reservation {
    pub fn stay(&self) -> DateRange {
        DateRange {
            start: self.check_in,
            end: self.check_out,
        }
    }
}

/// A booking request before the store assigns it an identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReservation {
    pub property_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: u32,
    #[serde(default)]
    pub parking_days: Option<u32>,
}

/// Where a blocked range came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockSource {
    Manual,
    Imported,
    Booking,
}

impl BlockSource {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockSource::Manual => "manual",
            BlockSource::Imported => "imported",
            BlockSource::Booking => "booking",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedRange {
    pub id: Uuid,
    pub property_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub source: BlockSource,
    #[serde(default)]
    pub reason: String,
    /// The reservation a `booking` range holds dates for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<Uuid>,
}

impl BlockedRange {
    pub fn span(&self) -> DateRange {
        DateRange {
            start: self.start,
            end: self.end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBlockedRange {
    pub property_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub source: BlockSource,
    #[serde(default)]
    pub reason: String,
}

/// Admin-set nightly price for a single date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceOverride {
    pub property_id: String,
    pub date: NaiveDate,
    pub price: Money,
}

/// One event parsed from a third-party calendar feed. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedEvent {
    pub uid: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Calendar date of `start` in the property's local calendar.
    pub start_date: NaiveDate,
    /// Calendar date of `end` in the property's local calendar.
    pub end_date: NaiveDate,
    pub summary: Option<String>,
    /// `true` for owner/host blocks, `false` for guest bookings.
    pub is_blocked: bool,
    /// Extension (`X-`) properties carried by the event.
    #[serde(default, skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    pub extensions: std::collections::BTreeMap<String, String>,
}
