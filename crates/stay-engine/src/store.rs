//! Storage seam and an in-memory implementation.
//!
//! The engine's checks are pure reads, so "check availability, then insert"
//! is a check-then-act race if two requests for the same dates arrive
//! together. The overlap invariant is therefore enforced by the store:
//! [`StayStore::insert_reservation`] must test and insert atomically (a
//! serializable transaction or an exclusion constraint in a database, a
//! single write lock in [`MemoryStore`]).

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::availability::check_availability;
use crate::dates::DateRange;
use crate::error::{Result, StayError};
use crate::model::{
    BlockSource, BlockedRange, Money, NewBlockedRange, NewReservation, PriceOverride, Property,
    Reservation, ReservationStatus,
};

/// Persistence operations the engine needs.
pub trait StayStore: Send + Sync {
    /// # Errors
    /// `StayError::NotFound` for an unknown id.
    fn property(&self, property_id: &str) -> Result<Property>;

    /// All reservations for a property, in every status.
    fn reservations(&self, property_id: &str) -> Vec<Reservation>;

    fn reservation(&self, id: Uuid) -> Result<Reservation>;

    fn blocked_ranges(&self, property_id: &str) -> Vec<BlockedRange>;

    /// Overrides for a property whose date lies in `[from, to]` (either bound optional).
    fn price_overrides(
        &self,
        property_id: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> BTreeMap<NaiveDate, Money>;

    fn upsert_price_override(&self, property_id: &str, date: NaiveDate, price: Money) -> Result<()>;

    /// Returns whether an override existed.
    fn delete_price_override(&self, property_id: &str, date: NaiveDate) -> Result<bool>;

    /// Insert a `pending` reservation iff its dates are still free.
    ///
    /// Implementations must make the overlap test and the insert one atomic
    /// step.
    ///
    /// # Errors
    /// `StayError::Conflict` carrying the taken nights.
    fn insert_reservation(&self, new: NewReservation) -> Result<Reservation>;

    /// Change a reservation's status in one atomic step.
    ///
    /// `hold` is stored as a range linked to the reservation. When `status`
    /// no longer occupies dates, every range linked to the reservation is
    /// removed, so a cancelled or refunded stay frees its nights.
    fn set_reservation_status(
        &self,
        id: Uuid,
        status: ReservationStatus,
        hold: Option<NewBlockedRange>,
    ) -> Result<Reservation>;

    fn insert_blocked_range(&self, new: NewBlockedRange) -> Result<BlockedRange>;

    /// Delete a manually created range.
    ///
    /// # Errors
    /// `StayError::Policy` for imported or booking ranges.
    fn delete_blocked_range(&self, id: Uuid) -> Result<BlockedRange>;

    /// Atomically swap a property's `imported` ranges for `ranges`.
    fn replace_imported_ranges(&self, property_id: &str, ranges: Vec<NewBlockedRange>)
        -> Result<usize>;
}

/// Serializable contents of a store, used to seed a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub reservations: Vec<Reservation>,
    #[serde(default)]
    pub blocked_ranges: Vec<BlockedRange>,
    #[serde(default)]
    pub price_overrides: Vec<PriceOverride>,
}

#[derive(Debug, Default)]
struct Tables {
    properties: HashMap<String, Property>,
    reservations: Vec<Reservation>,
    blocked: Vec<BlockedRange>,
    overrides: BTreeMap<(String, NaiveDate), Money>,
}

impl Tables {
    fn require_property(&self, property_id: &str) -> Result<&Property> {
        self.properties
            .get(property_id)
            .ok_or_else(|| StayError::NotFound(format!("property '{}'", property_id)))
    }
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot, validating every stored range.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self> {
        for r in &snapshot.reservations {
            DateRange::new(r.check_in, r.check_out)?;
        }
        for b in &snapshot.blocked_ranges {
            DateRange::new(b.start, b.end)?;
        }

        let tables = Tables {
            properties: snapshot
                .properties
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect(),
            reservations: snapshot.reservations,
            blocked: snapshot.blocked_ranges,
            overrides: snapshot
                .price_overrides
                .into_iter()
                .map(|o| ((o.property_id, o.date), o.price))
                .collect(),
        };
        Ok(Self {
            tables: RwLock::new(tables),
        })
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let tables = self.tables.read();
        let mut properties: Vec<Property> = tables.properties.values().cloned().collect();
        properties.sort_by(|a, b| a.id.cmp(&b.id));
        StoreSnapshot {
            properties,
            reservations: tables.reservations.clone(),
            blocked_ranges: tables.blocked.clone(),
            price_overrides: tables
                .overrides
                .iter()
                .map(|((property_id, date), price)| PriceOverride {
                    property_id: property_id.clone(),
                    date: *date,
                    price: *price,
                })
                .collect(),
        }
    }

    pub fn insert_property(&self, property: Property) {
        self.tables
            .write()
            .properties
            .insert(property.id.clone(), property);
    }
}

fn new_blocked(new: NewBlockedRange) -> Result<BlockedRange> {
    DateRange::new(new.start, new.end)?;
    Ok(BlockedRange {
        id: Uuid::new_v4(),
        property_id: new.property_id,
        start: new.start,
        end: new.end,
        source: new.source,
        reason: new.reason,
        reservation_id: None,
    })
}

impl StayStore for MemoryStore {
    fn property(&self, property_id: &str) -> Result<Property> {
        self.tables.read().require_property(property_id).cloned()
    }

    fn reservations(&self, property_id: &str) -> Vec<Reservation> {
        self.tables
            .read()
            .reservations
            .iter()
            .filter(|r| r.property_id == property_id)
            .cloned()
            .collect()
    }

    fn reservation(&self, id: Uuid) -> Result<Reservation> {
        self.tables
            .read()
            .reservations
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| StayError::NotFound(format!("reservation {}", id)))
    }

    fn blocked_ranges(&self, property_id: &str) -> Vec<BlockedRange> {
        self.tables
            .read()
            .blocked
            .iter()
            .filter(|b| b.property_id == property_id)
            .cloned()
            .collect()
    }

    fn price_overrides(
        &self,
        property_id: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> BTreeMap<NaiveDate, Money> {
        let from = from.unwrap_or(NaiveDate::MIN);
        let to = to.unwrap_or(NaiveDate::MAX);
        if to < from {
            return BTreeMap::new();
        }
        self.tables
            .read()
            .overrides
            .range((property_id.to_string(), from)..=(property_id.to_string(), to))
            .map(|((_, date), price)| (*date, *price))
            .collect()
    }

    fn upsert_price_override(&self, property_id: &str, date: NaiveDate, price: Money) -> Result<()> {
        let mut tables = self.tables.write();
        tables.require_property(property_id)?;
        tables.overrides.insert((property_id.to_string(), date), price);
        Ok(())
    }

    fn delete_price_override(&self, property_id: &str, date: NaiveDate) -> Result<bool> {
        let mut tables = self.tables.write();
        tables.require_property(property_id)?;
        Ok(tables
            .overrides
            .remove(&(property_id.to_string(), date))
            .is_some())
    }

    fn insert_reservation(&self, new: NewReservation) -> Result<Reservation> {
        let stay = DateRange::new(new.check_in, new.check_out)?;

        // Check and insert under one write lock.
        let mut tables = self.tables.write();
        tables.require_property(&new.property_id)?;

        let reservations: Vec<Reservation> = tables
            .reservations
            .iter()
            .filter(|r| r.property_id == new.property_id)
            .cloned()
            .collect();
        let blocked: Vec<BlockedRange> = tables
            .blocked
            .iter()
            .filter(|b| b.property_id == new.property_id)
            .cloned()
            .collect();

        let availability = check_availability(&reservations, &blocked, stay);
        if !availability.available {
            return Err(StayError::Conflict {
                dates: availability.conflicting_dates,
            });
        }

        let reservation = Reservation {
            id: Uuid::new_v4(),
            property_id: new.property_id,
            check_in: new.check_in,
            check_out: new.check_out,
            guests: new.guests,
            status: ReservationStatus::Pending,
        };
        tables.reservations.push(reservation.clone());
        Ok(reservation)
    }

    fn set_reservation_status(
        &self,
        id: Uuid,
        status: ReservationStatus,
        hold: Option<NewBlockedRange>,
    ) -> Result<Reservation> {
        let hold = hold
            .map(|h| {
                new_blocked(h).map(|range| BlockedRange {
                    reservation_id: Some(id),
                    ..range
                })
            })
            .transpose()?;

        let mut tables = self.tables.write();
        let index = tables
            .reservations
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| StayError::NotFound(format!("reservation {}", id)))?;
        if let Some(range) = &hold {
            tables.require_property(&range.property_id)?;
        }

        tables.reservations[index].status = status;
        if !status.occupies() {
            tables.blocked.retain(|b| b.reservation_id != Some(id));
        }
        tables.blocked.extend(hold);
        Ok(tables.reservations[index].clone())
    }

    fn insert_blocked_range(&self, new: NewBlockedRange) -> Result<BlockedRange> {
        let mut tables = self.tables.write();
        tables.require_property(&new.property_id)?;
        let range = new_blocked(new)?;
        tables.blocked.push(range.clone());
        Ok(range)
    }

    fn delete_blocked_range(&self, id: Uuid) -> Result<BlockedRange> {
        let mut tables = self.tables.write();
        let index = tables
            .blocked
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| StayError::NotFound(format!("blocked range {}", id)))?;
        if tables.blocked[index].source != BlockSource::Manual {
            return Err(StayError::Policy(format!(
                "blocked range {} has source '{}'; only manual ranges can be deleted",
                id,
                tables.blocked[index].source.as_str()
            )));
        }
        Ok(tables.blocked.remove(index))
    }

    fn replace_imported_ranges(
        &self,
        property_id: &str,
        ranges: Vec<NewBlockedRange>,
    ) -> Result<usize> {
        let fresh = ranges
            .into_iter()
            .map(|r| {
                if r.property_id != property_id || r.source != BlockSource::Imported {
                    return Err(StayError::Validation(format!(
                        "range for '{}' with source '{}' cannot replace imported ranges of '{}'",
                        r.property_id,
                        r.source.as_str(),
                        property_id
                    )));
                }
                new_blocked(r)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut tables = self.tables.write();
        tables.require_property(property_id)?;
        tables
            .blocked
            .retain(|b| !(b.property_id == property_id && b.source == BlockSource::Imported));
        let count = fresh.len();
        tables.blocked.extend(fresh);
        Ok(count)
    }
}
