//! Error types for stay-engine operations.

use chrono::NaiveDate;
use thiserror::Error;

use crate::dates::format_date;

/// Errors surfaced by availability, pricing, booking and feed operations.
#[derive(Error, Debug)]
pub enum StayError {
    /// Malformed or illogical input (bad date, empty range, missing field).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown property, reservation or blocked range.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request is well-formed but violates a property rule
    /// (inactive listing, stay length, guest count, pricing floor).
    #[error("Policy violation: {0}")]
    Policy(String),

    /// The requested range overlaps existing occupancy.
    #[error("Dates unavailable: {}", join_dates(.dates))]
    Conflict { dates: Vec<NaiveDate> },

    /// The third-party feed could not be fetched.
    #[error("Upstream fetch failed: {0}")]
    UpstreamFetch(String),

    /// The feed body is not calendar data at all.
    #[error("Feed parse error: {0}")]
    Parse(String),

    /// Engine configuration could not be read or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StayError {
    /// Conflicting dates carried by a [`StayError::Conflict`], empty otherwise.
    pub fn conflicting_dates(&self) -> &[NaiveDate] {
        match self {
            StayError::Conflict { dates } => dates,
            _ => &[],
        }
    }
}

fn join_dates(dates: &[NaiveDate]) -> String {
    dates
        .iter()
        .map(|d| format_date(*d))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convenience alias used throughout stay-engine.
pub type Result<T> = std::result::Result<T, StayError>;
