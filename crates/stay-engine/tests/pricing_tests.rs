//! Tests for per-night price resolution and the fee breakdown.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use stay_engine::dates::parse_date;
use stay_engine::pricing::{price_stay, validate_override};
use stay_engine::{DateRange, Money, Property, StayError};

fn d(s: &str) -> NaiveDate {
    parse_date(s).unwrap()
}

fn range(start: &str, end: &str) -> DateRange {
    DateRange::parse(start, end).unwrap()
}

/// A property with only a nightly price; fees are zero unless a test sets them.
fn plain_property() -> Property {
    Property {
        id: "condo-1".to_string(),
        name: "Cozy Condo".to_string(),
        base_price: Money::from_major(2500),
        cleaning_fee: Money::ZERO,
        parking_fee_per_day: Money::ZERO,
        admin_fee_percent: 0.0,
        base_occupancy: 2,
        extra_person_fee: Money::ZERO,
        min_nights: 1,
        max_nights: 30,
        max_guests: 4,
        active: true,
    }
}

#[test]
fn override_replaces_base_price_for_its_date() {
    let property = plain_property();
    let overrides = BTreeMap::from([(d("2026-01-01"), Money::from_major(5000))]);

    let quote = price_stay(&property, &overrides, range("2025-12-31", "2026-01-02"), 2, None).unwrap();

    assert_eq!(quote.nights, 2);
    assert_eq!(quote.per_night[&d("2025-12-31")], Money::from_major(2500));
    assert_eq!(quote.per_night[&d("2026-01-01")], Money::from_major(5000));
    assert_eq!(quote.subtotal, Money::from_major(7500));
    assert_eq!(quote.total, Money::from_major(7500));
}

#[test]
fn overrides_outside_the_stay_are_ignored() {
    let property = plain_property();
    let overrides = BTreeMap::from([
        (d("2026-01-02"), Money::from_major(9000)), // checkout date: not a night
        (d("2025-12-30"), Money::from_major(9000)),
    ]);

    let quote = price_stay(&property, &overrides, range("2025-12-31", "2026-01-02"), 1, None).unwrap();

    assert_eq!(quote.subtotal, Money::from_major(5000));
    assert_eq!(quote.per_night.len(), 2);
}

#[test]
fn full_fee_breakdown() {
    let property = Property {
        cleaning_fee: Money::from_major(800),
        parking_fee_per_day: Money::from_major(200),
        admin_fee_percent: 5.0,
        extra_person_fee: Money::from_major(500),
        ..plain_property()
    };

    // 3 nights, 4 guests (2 extra), 2 parking days.
    let quote = price_stay(&property, &BTreeMap::new(), range("2026-02-10", "2026-02-13"), 4, Some(2))
        .unwrap();

    assert_eq!(quote.subtotal, Money::from_major(7500));
    assert_eq!(quote.cleaning_fee, Money::from_major(800));
    assert_eq!(quote.parking_fee, Money::from_major(400));
    assert_eq!(quote.extra_person_fee, Money::from_major(3000)); // 2 × 500 × 3
    assert_eq!(quote.admin_fee, Money::from_major(375)); // 5% of 7500
    assert_eq!(quote.total, Money::from_major(7500 + 800 + 400 + 3000 + 375));
}

#[test]
fn parking_days_clamped_to_nights() {
    let property = Property {
        parking_fee_per_day: Money::from_major(150),
        ..plain_property()
    };

    let quote = price_stay(&property, &BTreeMap::new(), range("2026-02-10", "2026-02-12"), 1, Some(10))
        .unwrap();
    assert_eq!(quote.parking_fee, Money::from_major(300));

    let none = price_stay(&property, &BTreeMap::new(), range("2026-02-10", "2026-02-12"), 1, None)
        .unwrap();
    assert_eq!(none.parking_fee, Money::ZERO);
}

#[test]
fn guests_within_base_occupancy_pay_no_extra() {
    let property = Property {
        extra_person_fee: Money::from_major(500),
        ..plain_property()
    };
    for guests in [0, 1, 2] {
        let quote =
            price_stay(&property, &BTreeMap::new(), range("2026-02-10", "2026-02-12"), guests, None)
                .unwrap();
        assert_eq!(quote.extra_person_fee, Money::ZERO);
    }
}

#[test]
fn admin_fee_rounds_once_to_minor_unit() {
    let property = Property {
        base_price: Money(3333),
        admin_fee_percent: 3.5,
        ..plain_property()
    };

    // subtotal 9999 minor units; 3.5% = 349.965 → 350
    let quote = price_stay(&property, &BTreeMap::new(), range("2026-03-01", "2026-03-04"), 1, None)
        .unwrap();
    assert_eq!(quote.subtotal, Money(9999));
    assert_eq!(quote.admin_fee, Money(350));
    assert_eq!(quote.total, Money(10349));
}

#[test]
fn money_displays_major_and_minor_units() {
    assert_eq!(Money(750_000).to_string(), "7500.00");
    assert_eq!(Money(5).to_string(), "0.05");
    assert_eq!(Money(-1250).to_string(), "-12.50");
}

#[test]
fn override_below_base_price_is_rejected() {
    let property = plain_property();
    assert!(matches!(
        validate_override(&property, Money::from_major(2499)),
        Err(StayError::Policy(_))
    ));
    assert!(validate_override(&property, Money::from_major(2500)).is_ok());
}
