//! Booking service -- the operations the surrounding application calls.
//!
//! [`StayService`] loads data through a [`StayStore`], applies property
//! policy (active listing, stay length, guest count, pricing floor), and
//! delegates the arithmetic to the pure [`availability`](crate::availability)
//! and [`pricing`](crate::pricing) modules. Feed sync and export run through
//! here too, so they read and write the same blocked ranges the availability
//! check consults.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::availability::{check_availability, Availability};
use crate::config::EngineConfig;
use crate::dates::{add_days, parse_date, sub_days, DateRange};
use crate::error::{Result, StayError};
use crate::feed::export::{self, ExportedFeed, X_SOURCE};
use crate::feed::fetch::FeedFetcher;
use crate::feed::parser::import_feed_with;
use crate::model::{
    BlockSource, BlockedRange, ImportedEvent, Money, NewBlockedRange, NewReservation, Property,
    Reservation, ReservationStatus,
};
use crate::pricing::{price_stay, validate_override, PriceBreakdown};
use crate::store::StayStore;

/// Input of an availability query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityRequest {
    pub property_id: String,
    pub check_in: String,
    pub check_out: String,
    /// Defaults to one guest.
    #[serde(default)]
    pub guests: Option<u32>,
    #[serde(default)]
    pub parking_days: Option<u32>,
}

/// The listing facts a booking form needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySummary {
    pub name: String,
    pub max_guests: u32,
    pub min_nights: u32,
    pub max_nights: u32,
}

impl From<&Property> for PropertySummary {
    fn from(p: &Property) -> Self {
        Self {
            name: p.name.clone(),
            max_guests: p.max_guests,
            min_nights: p.min_nights,
            max_nights: p.max_nights,
        }
    }
}

/// Output of an availability query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityQuote {
    pub available: bool,
    pub conflicting_dates: Vec<NaiveDate>,
    pub nights: i64,
    pub pricing: PriceBreakdown,
    pub property: PropertySummary,
}

/// Overridden prices for a property alongside its base price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideCalendar {
    pub property_id: String,
    pub base_price: Money,
    pub overrides: BTreeMap<NaiveDate, Money>,
}

/// A created reservation and what it costs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub reservation: Reservation,
    pub pricing: PriceBreakdown,
}

/// Result of one feed sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub property_id: String,
    pub event_count: usize,
    pub blocked_count: usize,
    pub booked_count: usize,
    pub dropped: usize,
}

pub struct StayService<S> {
    store: S,
    config: EngineConfig,
}

impl<S: StayStore> StayService<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Availability & pricing ──────────────────────────────────────────

    /// Check `[check_in, check_out)` against reservations and blocked ranges.
    ///
    /// # Errors
    /// `Validation` for malformed or inverted dates, `NotFound` for an unknown property.
    pub fn check_availability(
        &self,
        property_id: &str,
        check_in: &str,
        check_out: &str,
    ) -> Result<Availability> {
        let stay = DateRange::parse(check_in, check_out)?;
        self.store.property(property_id)?;
        Ok(self.availability_for(property_id, stay))
    }

    fn availability_for(&self, property_id: &str, stay: DateRange) -> Availability {
        let reservations = self.store.reservations(property_id);
        let blocked = self.store.blocked_ranges(property_id);
        check_availability(&reservations, &blocked, stay)
    }

    /// Price `[check_in, check_out)` for `guests`.
    pub fn price(
        &self,
        property_id: &str,
        check_in: &str,
        check_out: &str,
        guests: u32,
        parking_days: Option<u32>,
    ) -> Result<PriceBreakdown> {
        let stay = DateRange::parse(check_in, check_out)?;
        let property = self.store.property(property_id)?;
        self.price_for(&property, stay, guests, parking_days)
    }

    fn price_for(
        &self,
        property: &Property,
        stay: DateRange,
        guests: u32,
        parking_days: Option<u32>,
    ) -> Result<PriceBreakdown> {
        let overrides = self.store.price_overrides(
            &property.id,
            Some(stay.start),
            Some(sub_days(stay.end, 1)),
        );
        price_stay(property, &overrides, stay, guests, parking_days)
    }

    /// Availability, pricing and listing facts in one answer.
    ///
    /// # Errors
    /// `Validation`, `NotFound`, or `Policy` when the listing is inactive.
    pub fn availability_query(&self, request: &AvailabilityRequest) -> Result<AvailabilityQuote> {
        let stay = DateRange::parse(&request.check_in, &request.check_out)?;
        let property = self.store.property(&request.property_id)?;
        require_active(&property)?;

        let availability = self.availability_for(&property.id, stay);
        let pricing = self.price_for(
            &property,
            stay,
            request.guests.unwrap_or(1),
            request.parking_days,
        )?;

        Ok(AvailabilityQuote {
            available: availability.available,
            conflicting_dates: availability.conflicting_dates,
            nights: availability.nights,
            pricing,
            property: PropertySummary::from(&property),
        })
    }

    // ── Price overrides ─────────────────────────────────────────────────

    /// Overrides in the inclusive window `[start, end]`, either bound optional.
    pub fn read_price_overrides(
        &self,
        property_id: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<OverrideCalendar> {
        let start = start.map(parse_date).transpose()?;
        let end = end.map(parse_date).transpose()?;
        if let (Some(s), Some(e)) = (start, end) {
            if e < s {
                return Err(StayError::Validation(format!(
                    "override window end {} precedes start {}",
                    e, s
                )));
            }
        }
        let property = self.store.property(property_id)?;
        Ok(OverrideCalendar {
            property_id: property.id.clone(),
            base_price: property.base_price,
            overrides: self.store.price_overrides(property_id, start, end),
        })
    }

    /// Set `price` on every date in `dates`.
    ///
    /// # Errors
    /// `Validation` for an empty date list, `Policy` when `price` is below the
    /// base price. Nothing is written unless every date is accepted.
    pub fn write_price_override(
        &self,
        property_id: &str,
        dates: &[NaiveDate],
        price: Money,
    ) -> Result<usize> {
        if dates.is_empty() {
            return Err(StayError::Validation(
                "at least one override date is required".to_string(),
            ));
        }
        let property = self.store.property(property_id)?;
        validate_override(&property, price)?;

        for date in dates {
            self.store.upsert_price_override(property_id, *date, price)?;
        }
        Ok(dates.len())
    }

    /// Revert `date` to the base price. Returns whether an override existed.
    pub fn delete_price_override(&self, property_id: &str, date: NaiveDate) -> Result<bool> {
        self.store.delete_price_override(property_id, date)
    }

    // ── Reservations ────────────────────────────────────────────────────

    /// Validate policy, then create a `pending` reservation.
    ///
    /// # Errors
    /// - `Validation` for inverted dates, a check-in before `today`, or zero guests
    /// - `NotFound` for an unknown property
    /// - `Policy` for an inactive listing, stay length or guest count out of bounds
    /// - `Conflict` with the taken nights when the dates are unavailable
    pub fn request_booking(&self, request: NewReservation, today: NaiveDate) -> Result<Booking> {
        let stay = DateRange::new(request.check_in, request.check_out)?;
        if stay.start < today {
            return Err(StayError::Validation(format!(
                "check-in {} is in the past",
                stay.start
            )));
        }
        if request.guests == 0 {
            return Err(StayError::Validation("at least one guest is required".to_string()));
        }

        let property = self.store.property(&request.property_id)?;
        require_active(&property)?;
        check_stay_policy(&property, stay, request.guests)?;

        let availability = self.availability_for(&property.id, stay);
        if !availability.available {
            return Err(StayError::Conflict {
                dates: availability.conflicting_dates,
            });
        }

        let pricing = self.price_for(&property, stay, request.guests, request.parking_days)?;
        // The store re-checks under its own lock; a racing request loses here.
        let reservation = self.store.insert_reservation(request)?;
        info!(
            reservation = %reservation.id,
            property = %reservation.property_id,
            nights = stay.nights(),
            "reservation created"
        );

        Ok(Booking {
            reservation,
            pricing,
        })
    }

    /// Move a reservation to `paid` and hold its dates with a `booking` range.
    pub fn mark_paid(&self, reservation_id: Uuid) -> Result<Reservation> {
        self.transition(reservation_id, ReservationStatus::Paid)
    }

    /// Cancel a reservation, releasing any `booking` range holding its dates.
    pub fn cancel(&self, reservation_id: Uuid) -> Result<Reservation> {
        self.transition(reservation_id, ReservationStatus::Cancelled)
    }

    /// Refund a reservation, releasing any `booking` range holding its dates.
    pub fn refund(&self, reservation_id: Uuid) -> Result<Reservation> {
        self.transition(reservation_id, ReservationStatus::Refunded)
    }

    /// Apply a lifecycle transition.
    ///
    /// Entering `paid` stores a `booking` range for the stay in the same store
    /// call; leaving the occupying states removes it.
    ///
    /// # Errors
    /// `Policy` when the transition is not allowed from the current status.
    pub fn transition(&self, reservation_id: Uuid, to: ReservationStatus) -> Result<Reservation> {
        let current = self.store.reservation(reservation_id)?;
        if !can_transition(current.status, to) {
            return Err(StayError::Policy(format!(
                "reservation {} cannot move from {:?} to {:?}",
                reservation_id, current.status, to
            )));
        }

        let hold = (to == ReservationStatus::Paid).then(|| NewBlockedRange {
            property_id: current.property_id.clone(),
            start: current.check_in,
            end: current.check_out,
            source: BlockSource::Booking,
            reason: format!("Reservation {}", current.id),
        });
        let updated = self.store.set_reservation_status(reservation_id, to, hold)?;
        info!(reservation = %reservation_id, status = ?to, "reservation status changed");
        Ok(updated)
    }

    // ── Blocked ranges ──────────────────────────────────────────────────

    pub fn add_manual_block(
        &self,
        property_id: &str,
        start: &str,
        end: &str,
        reason: &str,
    ) -> Result<BlockedRange> {
        let span = DateRange::parse(start, end)?;
        self.store.insert_blocked_range(NewBlockedRange {
            property_id: property_id.to_string(),
            start: span.start,
            end: span.end,
            source: BlockSource::Manual,
            reason: reason.trim().to_string(),
        })
    }

    pub fn delete_blocked_range(&self, id: Uuid) -> Result<BlockedRange> {
        self.store.delete_blocked_range(id)
    }

    // ── Feed sync ───────────────────────────────────────────────────────

    /// Fetch `url`, parse it, and replace the property's imported ranges.
    ///
    /// # Errors
    /// `UpstreamFetch` when the download fails, `Parse` when the body is not a
    /// calendar. Stored ranges are untouched on error.
    pub fn sync_feed(
        &self,
        property_id: &str,
        url: &str,
        fetcher: &impl FeedFetcher,
    ) -> Result<SyncOutcome> {
        self.store.property(property_id)?;
        let body = fetcher.fetch(url)?;
        self.sync_feed_text(property_id, &body)
    }

    /// Parse already-downloaded feed text and replace the property's imported ranges.
    pub fn sync_feed_text(&self, property_id: &str, body: &str) -> Result<SyncOutcome> {
        self.store.property(property_id)?;
        let options = self.config.import_options()?;
        let import = import_feed_with(body, &options)?;

        let ranges: Vec<NewBlockedRange> = import
            .events
            .iter()
            .map(|e| imported_range(property_id, e))
            .collect();
        let blocked_count = import.events.iter().filter(|e| e.is_blocked).count();
        let event_count = self.store.replace_imported_ranges(property_id, ranges)?;

        let outcome = SyncOutcome {
            property_id: property_id.to_string(),
            event_count,
            blocked_count,
            booked_count: event_count - blocked_count,
            dropped: import.dropped,
        };
        info!(
            property = %property_id,
            events = outcome.event_count,
            dropped = outcome.dropped,
            "calendar feed synced"
        );
        Ok(outcome)
    }

    /// Sync several properties; one property's failure does not stop the others.
    pub fn sync_many(
        &self,
        feeds: &[(String, String)],
        fetcher: &impl FeedFetcher,
    ) -> Vec<(String, Result<SyncOutcome>)> {
        feeds
            .iter()
            .map(|(property_id, url)| {
                let result = self.sync_feed(property_id, url, fetcher);
                if let Err(e) = &result {
                    warn!(property = %property_id, error = %e, "calendar feed sync failed");
                }
                (property_id.clone(), result)
            })
            .collect()
    }

    /// Render the property's blocked ranges as a feed.
    pub fn export_feed(&self, property_id: &str, now: DateTime<Utc>) -> Result<ExportedFeed> {
        let property = self.store.property(property_id)?;
        let ranges = self.store.blocked_ranges(property_id);

        let mut metadata = self.config.export.clone();
        if metadata.calendar_name.is_none() {
            metadata.calendar_name = Some(property.name.clone());
        }

        let body = export::export_feed(property_id, &ranges, &metadata, now);
        info!(property = %property_id, events = ranges.len(), "calendar feed exported");

        Ok(ExportedFeed {
            body,
            content_type: export::CONTENT_TYPE.to_string(),
            filename: export::feed_filename(&property.name),
            cache_control: format!("public, max-age={}", metadata.cache_max_age_secs),
            event_count: ranges.len(),
        })
    }
}

fn require_active(property: &Property) -> Result<()> {
    if !property.active {
        return Err(StayError::Policy(format!(
            "property '{}' is not accepting bookings",
            property.id
        )));
    }
    Ok(())
}

fn check_stay_policy(property: &Property, stay: DateRange, guests: u32) -> Result<()> {
    let nights = stay.nights();
    if nights < i64::from(property.min_nights) {
        return Err(StayError::Policy(format!(
            "minimum stay is {} nights, requested {}",
            property.min_nights, nights
        )));
    }
    if property.max_nights > 0 && nights > i64::from(property.max_nights) {
        return Err(StayError::Policy(format!(
            "maximum stay is {} nights, requested {}",
            property.max_nights, nights
        )));
    }
    if guests > property.max_guests {
        return Err(StayError::Policy(format!(
            "maximum occupancy is {} guests, requested {}",
            property.max_guests, guests
        )));
    }
    Ok(())
}

fn can_transition(from: ReservationStatus, to: ReservationStatus) -> bool {
    use ReservationStatus::*;
    matches!(
        (from, to),
        (Pending, Paid)
            | (Pending, Cancelled)
            | (Paid, Confirmed)
            | (Paid, Cancelled)
            | (Paid, Refunded)
            | (Confirmed, CheckedIn)
            | (Confirmed, Cancelled)
            | (Confirmed, Refunded)
            | (CheckedIn, CheckedOut)
    )
}

/// Convert an imported event into a blocked range for `property_id`.
///
/// Feeds written by this engine's exporter (tagged with `X-STAY-SOURCE`) have
/// their plus-one-day end reversed. Single-day events occupy one night.
pub fn imported_range(property_id: &str, event: &ImportedEvent) -> NewBlockedRange {
    let start = event.start_date;
    let mut end = event.end_date;
    if event.extensions.contains_key(X_SOURCE) && end > start {
        end = sub_days(end, 1);
    }
    if end <= start {
        end = add_days(start, 1);
    }

    let reason = match &event.summary {
        Some(summary) => summary.clone(),
        None if event.is_blocked => "Imported block".to_string(),
        None => "Imported booking".to_string(),
    };

    NewBlockedRange {
        property_id: property_id.to_string(),
        start,
        end,
        source: BlockSource::Imported,
        reason,
    }
}
