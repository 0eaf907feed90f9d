//! iCalendar feed parser -- raw feed text to a sorted list of [`ImportedEvent`]s.
//!
//! Third-party listing sites publish availability as RFC 5545 feeds, and real
//! ones are rarely clean. The parser is tolerant by construction:
//!
//! - A missing `BEGIN:VCALENDAR` wrapper is the only fatal condition.
//! - Folded lines (continuations starting with a space or tab) are unfolded
//!   before anything else.
//! - Each `VEVENT` is parsed independently; one that lacks a `UID` or a
//!   usable `DTSTART` is dropped and counted, never fatal.
//! - Sub-components nested inside an event (`VALARM`) are skipped so their
//!   properties cannot shadow the event's own.
//!
//! # Date values
//!
//! `YYYYMMDD` is an all-day value at UTC midnight. `YYYYMMDDTHHMMSS` is a
//! floating local time unless it ends in `Z` (UTC) or carries a `TZID`
//! parameter naming an IANA zone. Timestamped values are mapped onto the
//! property's calendar using the configured timezone.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StayError};
use crate::feed::classify::{EventClassifier, PhraseClassifier};
use crate::feed::recurrence;
use crate::model::ImportedEvent;

/// Outcome of a successful import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedImport {
    pub success: bool,
    /// Parsed events, ascending by start.
    pub events: Vec<ImportedEvent>,
    /// Event blocks that were skipped as malformed.
    pub dropped: usize,
}

/// Knobs for [`import_feed_with`].
pub struct ImportOptions {
    pub(crate) timezone: Tz,
    pub(crate) classifier: Box<dyn EventClassifier>,
    pub(crate) expand_recurrences: bool,
    pub(crate) max_occurrences: u16,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            classifier: Box::new(PhraseClassifier::default()),
            expand_recurrences: true,
            max_occurrences: 366,
        }
    }
}

impl ImportOptions {
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_classifier(mut self, classifier: impl EventClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn with_recurrence(mut self, expand: bool, max_occurrences: u16) -> Self {
        self.expand_recurrences = expand;
        self.max_occurrences = max_occurrences;
        self
    }
}

/// Parse a feed with the default options (UTC calendar, phrase classifier).
pub fn import_feed(raw: &str) -> Result<FeedImport> {
    import_feed_with(raw, &ImportOptions::default())
}

/// Parse a feed.
///
/// # Errors
/// Returns `StayError::Parse` if the text has no `BEGIN:VCALENDAR` line.
/// Malformed events are not errors; see [`FeedImport::dropped`].
pub fn import_feed_with(raw: &str, options: &ImportOptions) -> Result<FeedImport> {
    let lines = unfold_lines(raw);

    let has_wrapper = lines
        .iter()
        .any(|l| l.trim().eq_ignore_ascii_case("BEGIN:VCALENDAR"));
    if !has_wrapper {
        return Err(StayError::Parse(
            "no BEGIN:VCALENDAR wrapper found".to_string(),
        ));
    }

    let (blocks, unterminated) = event_blocks(&lines);
    let mut dropped = unterminated;
    let mut events = Vec::new();

    for block in &blocks {
        match parse_event(block, options) {
            Ok(mut parsed) => events.append(&mut parsed),
            Err(reason) => {
                dropped += 1;
                debug!(reason = %reason, "dropping malformed feed event");
            }
        }
    }

    events.sort_by_key(|e| e.start);

    Ok(FeedImport {
        success: true,
        events,
        dropped,
    })
}

/// Join folded continuation lines onto their logical line.
///
/// A physical line starting with a space or tab continues the previous one;
/// exactly one leading whitespace character is removed. Blank lines vanish.
pub fn unfold_lines(raw: &str) -> Vec<String> {
    let mut logical: Vec<String> = Vec::new();

    for line in raw.lines() {
        if let Some(rest) = line.strip_prefix([' ', '\t']) {
            if let Some(last) = logical.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        if line.trim().is_empty() {
            continue;
        }
        logical.push(line.to_string());
    }

    logical
}

/// One `NAME;PARAM=VALUE:value` content line.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentLine {
    /// Upper-cased property name.
    pub name: String,
    /// Upper-cased parameter names with unquoted values.
    pub params: Vec<(String, String)>,
    pub value: String,
}

impl ContentLine {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Split a logical line into name, parameters and value.
///
/// The value starts after the first `:` that is not inside a double-quoted
/// parameter value. Returns `None` when there is no such colon or no name.
pub fn parse_content_line(line: &str) -> Option<ContentLine> {
    let mut in_quotes = false;
    let mut colon = None;
    for (i, ch) in line.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ':' if !in_quotes => {
                colon = Some(i);
                break;
            }
            _ => {}
        }
    }
    let colon = colon?;
    let head = &line[..colon];
    let value = line[colon + 1..].to_string();

    let mut parts = split_unquoted(head, ';').into_iter();
    let name = parts.next()?.trim().to_ascii_uppercase();
    if name.is_empty() {
        return None;
    }

    let params = parts
        .filter_map(|p| {
            let (k, v) = p.split_once('=')?;
            Some((
                k.trim().to_ascii_uppercase(),
                v.trim().trim_matches('"').to_string(),
            ))
        })
        .collect();

    Some(ContentLine {
        name,
        params,
        value,
    })
}

fn split_unquoted(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        if ch == '"' {
            in_quotes = !in_quotes;
        } else if ch == sep && !in_quotes {
            parts.push(&text[start..i]);
            start = i + ch.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Collect the content lines of each top-level `VEVENT`.
///
/// Returns the blocks plus the number of events left unterminated, either at
/// end of input or because another `BEGIN:VEVENT` opened before their `END`.
fn event_blocks(lines: &[String]) -> (Vec<Vec<ContentLine>>, usize) {
    let mut blocks = Vec::new();
    let mut current: Option<Vec<ContentLine>> = None;
    let mut unterminated = 0usize;
    // Depth of components nested inside the current event (VALARM etc.).
    let mut nested = 0usize;

    for line in lines {
        let Some(content) = parse_content_line(line) else {
            continue;
        };
        let is_begin = content.name == "BEGIN";
        let is_end = content.name == "END";
        let is_event = content.value.trim().eq_ignore_ascii_case("VEVENT");

        if is_begin && is_event {
            if current.is_some() {
                unterminated += 1;
                debug!("VEVENT opened before the previous one ended");
            }
            current = Some(Vec::new());
            nested = 0;
            continue;
        }
        if current.is_none() {
            continue;
        }

        if is_begin {
            nested += 1;
        } else if is_end && nested > 0 {
            nested -= 1;
        } else if is_end && is_event {
            blocks.extend(current.take());
        } else if nested == 0 {
            if let Some(block) = current.as_mut() {
                block.push(content);
            }
        }
    }

    unterminated += usize::from(current.is_some());
    (blocks, unterminated)
}

/// A normalized feed date/time value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FeedTime {
    pub instant: DateTime<Utc>,
    /// Wall-clock value as written in the feed.
    pub naive: NaiveDateTime,
    pub kind: TimeKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TimeKind {
    AllDay,
    Floating,
    Utc,
    Zoned(Tz),
}

impl FeedTime {
    /// Calendar date in the property's local calendar.
    pub fn local_date(&self, property_tz: Tz) -> NaiveDate {
        match self.kind {
            TimeKind::AllDay | TimeKind::Floating => self.naive.date(),
            TimeKind::Utc | TimeKind::Zoned(_) => {
                self.instant.with_timezone(&property_tz).date_naive()
            }
        }
    }
}

/// Normalize a `DTSTART`/`DTEND`/`EXDATE` value.
pub(crate) fn parse_feed_time(
    value: &str,
    tzid: Option<&str>,
) -> std::result::Result<FeedTime, String> {
    let value = value.trim();
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());

    if value.len() == 8 && digits(value) {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d")
            .map_err(|_| format!("invalid date '{}'", value))?;
        let naive = date.and_time(NaiveTime::MIN);
        return Ok(FeedTime {
            instant: naive.and_utc(),
            naive,
            kind: TimeKind::AllDay,
        });
    }

    let (body, is_utc) = match value.strip_suffix(['Z', 'z']) {
        Some(body) => (body, true),
        None => (value, false),
    };
    let well_formed = body.is_ascii()
        && body.len() == 15
        && body.as_bytes()[8].eq_ignore_ascii_case(&b'T')
        && digits(&body[..8])
        && digits(&body[9..]);
    if !well_formed {
        return Err(format!("unrecognized date-time '{}'", value));
    }
    let naive = NaiveDateTime::parse_from_str(&body.to_ascii_uppercase(), "%Y%m%dT%H%M%S")
        .map_err(|_| format!("invalid date-time '{}'", value))?;

    if is_utc {
        return Ok(FeedTime {
            instant: naive.and_utc(),
            naive,
            kind: TimeKind::Utc,
        });
    }

    if let Some(zone) = tzid.and_then(|id| id.parse::<Tz>().ok()) {
        // A wall time inside a DST gap has no instant; take the first valid one after it.
        let local = zone
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| {
                zone.from_local_datetime(&(naive + chrono::Duration::hours(1)))
                    .earliest()
            });
        if let Some(local) = local {
            return Ok(FeedTime {
                instant: local.with_timezone(&Utc),
                naive,
                kind: TimeKind::Zoned(zone),
            });
        }
    }

    Ok(FeedTime {
        instant: naive.and_utc(),
        naive,
        kind: TimeKind::Floating,
    })
}

/// Undo RFC 5545 TEXT escaping.
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn parse_event(
    block: &[ContentLine],
    options: &ImportOptions,
) -> std::result::Result<Vec<ImportedEvent>, String> {
    let first = |name: &str| block.iter().find(|l| l.name == name);

    let uid = first("UID")
        .map(|l| l.value.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or("missing UID")?;

    let dtstart = first("DTSTART").ok_or_else(|| format!("event {} has no DTSTART", uid))?;
    let start = parse_feed_time(&dtstart.value, dtstart.param("TZID"))
        .map_err(|e| format!("event {}: DTSTART {}", uid, e))?;

    let end = match first("DTEND") {
        Some(dtend) => parse_feed_time(&dtend.value, dtend.param("TZID"))
            .map_err(|e| format!("event {}: DTEND {}", uid, e))?,
        None => start,
    };
    if end.instant < start.instant {
        return Err(format!("event {} ends before it starts", uid));
    }

    let summary = first("SUMMARY")
        .map(|l| unescape_text(l.value.trim()))
        .filter(|s| !s.is_empty());

    let extensions: BTreeMap<String, String> = block
        .iter()
        .filter(|l| l.name.starts_with("X-"))
        .map(|l| (l.name.clone(), unescape_text(l.value.trim())))
        .collect();

    let tz = options.timezone;
    let event = ImportedEvent {
        is_blocked: options.classifier.is_blocked(summary.as_deref()),
        uid,
        start: start.instant,
        end: end.instant,
        start_date: start.local_date(tz),
        end_date: end.local_date(tz),
        summary,
        extensions,
    };

    let rrule = first("RRULE").map(|l| l.value.trim()).filter(|v| !v.is_empty());
    match rrule {
        Some(rule) if options.expand_recurrences => {
            let exdates: Vec<FeedTime> = block
                .iter()
                .filter(|l| l.name == "EXDATE")
                .flat_map(|l| {
                    l.value
                        .split(',')
                        .filter_map(|v| parse_feed_time(v, l.param("TZID")).ok())
                        .collect::<Vec<_>>()
                })
                .collect();
            Ok(recurrence::expand_occurrences(
                &event,
                &start,
                rule,
                &exdates,
                options.max_occurrences,
                tz,
            ))
        }
        _ => Ok(vec![event]),
    }
}
