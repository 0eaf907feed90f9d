//! Per-night price resolution and fee breakdown.
//!
//! Each night costs the property's base price unless a date-level override
//! exists for it. On top of the nightly subtotal come a flat cleaning fee,
//! a per-day parking fee, a per-guest-per-night fee for guests above the base
//! occupancy, and an admin fee expressed as a percentage of the subtotal.
//!
//! All arithmetic is in integer minor units. The admin fee is the only
//! fractional step and is rounded once, to the nearest minor unit.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::DateRange;
use crate::error::{Result, StayError};
use crate::model::{Money, Property};

/// Full cost breakdown for a stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub per_night: BTreeMap<NaiveDate, Money>,
    pub nights: i64,
    pub subtotal: Money,
    pub cleaning_fee: Money,
    pub parking_fee: Money,
    pub extra_person_fee: Money,
    pub admin_fee: Money,
    pub total: Money,
}

/// Price a stay.
///
/// # Arguments
/// - `property` -- fee schedule to apply
/// - `overrides` -- date-level nightly prices; dates outside the stay are ignored
/// - `stay` -- the half-open `[check_in, check_out)` range
/// - `guests` -- party size; guests above `base_occupancy` pay the extra-person fee
/// - `parking_days` -- requested parking days, clamped to `[0, nights]`
///
/// # Errors
/// Returns `StayError::Validation` if the stay has no nights.
pub fn price_stay(
    property: &Property,
    overrides: &BTreeMap<NaiveDate, Money>,
    stay: DateRange,
    guests: u32,
    parking_days: Option<u32>,
) -> Result<PriceBreakdown> {
    let nights = stay.nights();
    if nights <= 0 {
        return Err(StayError::Validation(format!(
            "stay {} has no nights",
            stay
        )));
    }

    let per_night: BTreeMap<NaiveDate, Money> = stay
        .days()
        .into_iter()
        .map(|date| {
            let price = overrides.get(&date).copied().unwrap_or(property.base_price);
            (date, price)
        })
        .collect();

    let subtotal: Money = per_night.values().copied().sum();
    let cleaning_fee = property.cleaning_fee;

    let parking_days = i64::from(parking_days.unwrap_or(0)).clamp(0, nights);
    let parking_fee = property.parking_fee_per_day * parking_days;

    let extra_guests = i64::from(guests.saturating_sub(property.base_occupancy));
    let extra_person_fee = property.extra_person_fee * extra_guests * nights;

    let admin_fee = subtotal.percent(property.admin_fee_percent);

    let total = subtotal + cleaning_fee + parking_fee + extra_person_fee + admin_fee;

    Ok(PriceBreakdown {
        per_night,
        nights,
        subtotal,
        cleaning_fee,
        parking_fee,
        extra_person_fee,
        admin_fee,
        total,
    })
}

/// Reject an override below the property's base price.
pub fn validate_override(property: &Property, price: Money) -> Result<()> {
    if price < property.base_price {
        return Err(StayError::Policy(format!(
            "override price {} is below the base price {} of property '{}'",
            price, property.base_price, property.id
        )));
    }
    Ok(())
}
