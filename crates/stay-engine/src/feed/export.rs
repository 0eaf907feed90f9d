//! iCalendar feed export -- a property's blocked ranges as an `.ics` feed.
//!
//! Output follows RFC 5545: CRLF line endings, content lines folded at 75
//! octets, TEXT values escaped, all-day `VALUE=DATE` boundaries. Stored ranges
//! are half-open, but consuming calendar clients display `DTEND` inclusively,
//! so each event's `DTEND` is the stored end plus one day. Importers reverse
//! that adjustment.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::dates::add_days;
use crate::model::{BlockSource, BlockedRange};

pub const CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

/// Extension property carrying the range's [`BlockSource`].
pub const X_SOURCE: &str = "X-STAY-SOURCE";
/// Extension property carrying the owning property id.
pub const X_PROPERTY_ID: &str = "X-STAY-PROPERTY-ID";

const MAX_LINE_OCTETS: usize = 75;

/// Feed-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedMetadata {
    /// `X-WR-CALNAME`; defaults to the property name when exporting through the service.
    pub calendar_name: Option<String>,
    pub product_id: String,
    /// Right-hand side of generated UIDs.
    pub uid_domain: String,
    /// Emit the `X-STAY-*` extension properties.
    pub include_extensions: bool,
    pub cache_max_age_secs: u64,
}

impl Default for FeedMetadata {
    fn default() -> Self {
        Self {
            calendar_name: None,
            product_id: "-//stay-engine//Availability Feed//EN".to_string(),
            uid_domain: "stay-engine.local".to_string(),
            include_extensions: true,
            cache_max_age_secs: 3600,
        }
    }
}

/// A rendered feed plus the response metadata an HTTP endpoint needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedFeed {
    pub body: String,
    pub content_type: String,
    pub filename: String,
    pub cache_control: String,
    pub event_count: usize,
}

/// Render the blocked ranges belonging to `property_id` as a feed.
///
/// Ranges for other properties are skipped. `now` stamps `DTSTAMP` and the
/// generated UIDs.
pub fn export_feed(
    property_id: &str,
    ranges: &[BlockedRange],
    metadata: &FeedMetadata,
    now: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let stamp = now.format("%Y%m%dT%H%M%SZ").to_string();

    push_line(&mut out, "BEGIN:VCALENDAR");
    push_line(&mut out, "VERSION:2.0");
    push_line(&mut out, &format!("PRODID:{}", metadata.product_id));
    push_line(&mut out, "CALSCALE:GREGORIAN");
    push_line(&mut out, "METHOD:PUBLISH");
    if let Some(name) = &metadata.calendar_name {
        push_line(&mut out, &format!("X-WR-CALNAME:{}", escape_text(name)));
    }

    let owned = ranges.iter().filter(|r| r.property_id == property_id);
    for (index, range) in owned.enumerate() {
        push_line(&mut out, "BEGIN:VEVENT");
        push_line(
            &mut out,
            &format!(
                "UID:{}-{}-{}@{}",
                property_id,
                index,
                now.timestamp(),
                metadata.uid_domain
            ),
        );
        push_line(&mut out, &format!("DTSTAMP:{}", stamp));
        push_line(&mut out, &format!("DTSTART;VALUE=DATE:{}", ical_date(range.start)));
        push_line(
            &mut out,
            &format!("DTEND;VALUE=DATE:{}", ical_date(add_days(range.end, 1))),
        );
        push_line(&mut out, &format!("SUMMARY:{}", escape_text(&summary_for(range))));
        if metadata.include_extensions {
            push_line(&mut out, &format!("{}:{}", X_SOURCE, range.source.as_str()));
            push_line(
                &mut out,
                &format!("{}:{}", X_PROPERTY_ID, escape_text(&range.property_id)),
            );
        }
        push_line(&mut out, "END:VEVENT");
    }

    push_line(&mut out, "END:VCALENDAR");
    out
}

/// Human-readable summary for a range: its reason, or a label for its source.
pub fn summary_for(range: &BlockedRange) -> String {
    let reason = range.reason.trim();
    if !reason.is_empty() {
        return reason.to_string();
    }
    match range.source {
        BlockSource::Booking => "Reserved".to_string(),
        BlockSource::Imported => "Not available".to_string(),
        BlockSource::Manual => "Blocked".to_string(),
    }
}

/// Suggested download filename: the property name slugged, plus `.ics`.
pub fn feed_filename(property_name: &str) -> String {
    let mut slug = String::new();
    for ch in property_name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "calendar.ics".to_string()
    } else {
        format!("{}.ics", slug)
    }
}

/// RFC 5545 TEXT escaping.
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}

fn ical_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Append one content line, folded at 75 octets without splitting a character.
fn push_line(out: &mut String, line: &str) {
    let mut width = 0;
    for ch in line.chars() {
        let len = ch.len_utf8();
        if width + len > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(ch);
        width += len;
    }
    out.push_str("\r\n");
}
