//! # stay-engine
//!
//! Availability reconciliation, nightly pricing and iCalendar feed sync for
//! short-term rental properties.
//!
//! A booking request passes through the availability check first (reject
//! early if any night is taken), then pricing. Independently, feed sync
//! imports a third-party listing's calendar into blocked ranges and exports
//! the property's own blocked ranges for other platforms to consume. Both
//! sides meet in the same storage the availability check reads.
//!
//! All ranges are half-open `[start, end)` calendar-date intervals, so
//! back-to-back stays never conflict.
//!
//! ## Modules
//!
//! - [`dates`]: half-open date-range arithmetic
//! - [`availability`]: conflict detection across reservations and blocked ranges
//! - [`pricing`]: per-night resolution with overrides and fee breakdown
//! - [`feed`]: iCalendar import (parse, classify, fetch, recurrence) and export
//! - [`store`]: storage seam with an atomic overlap guard, in-memory implementation
//! - [`service`]: policy checks and the operations callers use
//! - [`config`]: TOML-loadable engine configuration
//! - [`model`]: properties, reservations, blocked ranges, money
//! - [`error`]: error taxonomy

pub mod availability;
pub mod config;
pub mod dates;
pub mod error;
pub mod feed;
pub mod model;
pub mod pricing;
pub mod service;
pub mod store;

pub use availability::{check_availability, Availability};
pub use config::EngineConfig;
pub use dates::{enumerate_days, overlaps, DateRange};
pub use error::StayError;
pub use feed::{export_feed, import_feed, ExportedFeed, FeedImport, FeedMetadata};
pub use model::{
    BlockSource, BlockedRange, ImportedEvent, Money, NewBlockedRange, NewReservation, Property,
    Reservation, ReservationStatus,
};
pub use pricing::{price_stay, PriceBreakdown};
pub use service::{AvailabilityQuote, AvailabilityRequest, StayService, SyncOutcome};
pub use store::{MemoryStore, StayStore, StoreSnapshot};
