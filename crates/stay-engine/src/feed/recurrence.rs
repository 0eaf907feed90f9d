//! Recurring imported events -- expand an event's `RRULE` into occurrences.
//!
//! Owner blocks in personal calendars are often recurring ("closed every
//! Sunday"). Each occurrence becomes its own [`ImportedEvent`] so the rest of
//! the engine only ever sees concrete ranges. Expansion uses the `rrule` crate
//! and is capped at `max_occurrences` instances.
//!
//! A rule the crate rejects is not fatal: the event degrades to its single
//! base occurrence and a warning is logged.

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;
use tracing::warn;

use crate::feed::parser::{parse_feed_time, FeedTime, TimeKind};
use crate::model::ImportedEvent;

/// Expand `base` according to `rule`, excluding `exdates`.
pub(crate) fn expand_occurrences(
    base: &ImportedEvent,
    start: &FeedTime,
    rule: &str,
    exdates: &[FeedTime],
    max_occurrences: u16,
    property_tz: Tz,
) -> Vec<ImportedEvent> {
    let rrule_text = build_rrule_text(start, rule, exdates);

    let rrule_set: RRuleSet = match rrule_text.parse() {
        Ok(set) => set,
        Err(e) => {
            warn!(uid = %base.uid, error = %e, "unparseable RRULE, keeping base occurrence");
            return vec![base.clone()];
        }
    };

    let duration = base.end - base.start;
    let instances = rrule_set.all(max_occurrences.max(1));

    instances
        .dates
        .into_iter()
        .map(|dt| {
            let occurrence_start: DateTime<Utc> = dt.with_timezone(&Utc);
            let occurrence = FeedTime {
                instant: occurrence_start,
                naive: dt.naive_local(),
                kind: start.kind,
            };
            let occurrence_end = FeedTime {
                instant: occurrence_start + duration,
                naive: dt.naive_local() + duration,
                kind: start.kind,
            };
            let start_date = occurrence.local_date(property_tz);
            ImportedEvent {
                uid: format!("{}/{}", base.uid, start_date.format("%Y%m%d")),
                start: occurrence.instant,
                end: occurrence_end.instant,
                start_date,
                end_date: occurrence_end.local_date(property_tz),
                summary: base.summary.clone(),
                is_blocked: base.is_blocked,
                extensions: base.extensions.clone(),
            }
        })
        .collect()
}

/// Build the DTSTART/RRULE/EXDATE block the `rrule` crate parses.
///
/// Zoned starts are written with their `TZID`; everything else is anchored in
/// UTC. `UNTIL` is rewritten into the same form as `DTSTART`.
fn build_rrule_text(start: &FeedTime, rule: &str, exdates: &[FeedTime]) -> String {
    let rule = normalize_until(rule, start);

    let mut text = match start.kind {
        TimeKind::Zoned(tz) => format!(
            "DTSTART;TZID={}:{}\nRRULE:{}",
            tz.name(),
            start.naive.format("%Y%m%dT%H%M%S"),
            rule
        ),
        _ => format!(
            "DTSTART:{}Z\nRRULE:{}",
            start.naive.format("%Y%m%dT%H%M%S"),
            rule
        ),
    };

    if !exdates.is_empty() {
        let values: Vec<String> = exdates.iter().map(|ex| anchored(ex, start.kind)).collect();
        match start.kind {
            TimeKind::Zoned(tz) => {
                text.push_str(&format!("\nEXDATE;TZID={}:{}", tz.name(), values.join(",")))
            }
            _ => text.push_str(&format!("\nEXDATE:{}", values.join(","))),
        }
    }

    text
}

/// Format `time` in the anchoring used for DTSTART of kind `anchor`.
fn anchored(time: &FeedTime, anchor: TimeKind) -> String {
    match anchor {
        TimeKind::Zoned(tz) => time
            .instant
            .with_timezone(&tz)
            .naive_local()
            .format("%Y%m%dT%H%M%S")
            .to_string(),
        TimeKind::Utc => format!("{}Z", time.instant.format("%Y%m%dT%H%M%S")),
        // All-day and floating starts are anchored on their wall-clock value.
        TimeKind::AllDay | TimeKind::Floating => {
            format!("{}Z", time.naive.format("%Y%m%dT%H%M%S"))
        }
    }
}

/// Rewrite `UNTIL` to match the anchoring of DTSTART.
///
/// With a `TZID` start, `UNTIL` must be a UTC instant. A date-only or
/// floating `UNTIL` is then read as wall-clock time in that zone.
fn normalize_until(rule: &str, start: &FeedTime) -> String {
    rule.split(';')
        .map(|part| {
            let Some((key, value)) = part.split_once('=') else {
                return part.to_string();
            };
            if !key.trim().eq_ignore_ascii_case("UNTIL") {
                return part.to_string();
            }
            match parse_feed_time(value, None) {
                Ok(until) => {
                    // Date-only UNTIL includes the whole final day.
                    let until = match until.kind {
                        TimeKind::AllDay => FeedTime {
                            instant: until.instant + Duration::seconds(86_399),
                            naive: until.naive + Duration::seconds(86_399),
                            kind: TimeKind::Floating,
                        },
                        _ => until,
                    };
                    format!("UNTIL={}", until_value(&until, start.kind))
                }
                Err(_) => part.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn until_value(until: &FeedTime, anchor: TimeKind) -> String {
    match anchor {
        TimeKind::Zoned(tz) => {
            let instant = match until.kind {
                TimeKind::Utc | TimeKind::Zoned(_) => until.instant,
                TimeKind::AllDay | TimeKind::Floating => tz
                    .from_local_datetime(&until.naive)
                    .earliest()
                    .map(|local| local.with_timezone(&Utc))
                    .unwrap_or(until.instant),
            };
            format!("{}Z", instant.format("%Y%m%dT%H%M%S"))
        }
        _ => anchored(until, anchor),
    }
}
