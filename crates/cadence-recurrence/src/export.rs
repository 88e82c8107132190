//! iCalendar content lines for a recurring origin event.
//!
//! The calendar exporter writes one `VEVENT` for the series and one per
//! modified occurrence. This module supplies the recurrence-related lines of
//! those components; property folding and escaping stay with the writer.

use chrono::{DateTime, NaiveTime, Utc};
use rrule::Tz;

use crate::error::RecurrenceResult;
use crate::expand::{build_rrule_set, parse_exception_date, resolve_timezone};
use crate::model::{Event, ExceptionStatus};

const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const LOCAL_FORMAT: &str = "%Y%m%dT%H%M%S";
const DATE_FORMAT: &str = "%Y%m%d";

/// Zone name for a `TZID` parameter, or `None` when the series is in UTC.
fn tzid(tz: &Tz) -> Option<&'static str> {
    match tz {
        Tz::Tz(zone) if *zone != chrono_tz::Tz::UTC => Some(zone.name()),
        _ => None,
    }
}

fn dtstart_line(event: &Event, tz: &Tz) -> String {
    let local = event.start.with_timezone(tz);
    if event.all_day {
        return format!("DTSTART;VALUE=DATE:{}", local.format(DATE_FORMAT));
    }
    match tzid(tz) {
        Some(name) => format!("DTSTART;TZID={name}:{}", local.format(LOCAL_FORMAT)),
        None => format!("DTSTART:{}", event.start.format(UTC_FORMAT)),
    }
}

/// Formats an occurrence reference (`EXDATE`, `RECURRENCE-ID`) in the same
/// value type as `DTSTART`.
fn occurrence_line(name: &str, event: &Event, tz: &Tz, instant: DateTime<Utc>) -> String {
    if event.all_day {
        let date = instant.with_timezone(tz).date_naive();
        return format!("{name};VALUE=DATE:{}", date.format(DATE_FORMAT));
    }
    format!("{name}:{}", instant.format(UTC_FORMAT))
}

/// Resolves each usable exception of `status` to the instant it targets.
fn exception_instants(
    event: &Event,
    tz: &Tz,
    status: ExceptionStatus,
) -> Vec<DateTime<Utc>> {
    let local_time: NaiveTime = event.start.with_timezone(tz).time();
    let mut instants: Vec<DateTime<Utc>> = event
        .exceptions
        .iter()
        .filter(|exception| exception.status == status)
        .filter(|exception| {
            status != ExceptionStatus::Modified || exception.modified_event.is_some()
        })
        .filter_map(|exception| {
            let text = exception.date.as_deref()?;
            let instant = parse_exception_date(text).and_then(|p| p.to_instant(tz, local_time));
            if instant.is_none() {
                tracing::debug!(
                    event_id = %event.id,
                    date = text,
                    "Exception date not exportable, skipping"
                );
            }
            instant
        })
        .collect();
    instants.sort_unstable();
    instants.dedup();
    instants
}

/// ## Summary
/// Produces the `DTSTART`, `RRULE` and `EXDATE` lines of a recurring event.
///
/// Returns `Ok(None)` for events without a recurrence rule. One `EXDATE` is
/// written per cancelled exception whose date can be resolved; unusable
/// entries are left out.
///
/// ## Errors
/// Returns `RecurrenceError::InvalidRule` if the rule would not expand.
pub fn recurrence_lines(event: &Event) -> RecurrenceResult<Option<Vec<String>>> {
    let Some(rule) = &event.recurrence else {
        return Ok(None);
    };
    let tz = resolve_timezone(event.timezone.as_deref());
    build_rrule_set(rule, event.start.with_timezone(&tz))?;

    let mut lines = vec![dtstart_line(event, &tz), format!("RRULE:{rule}")];
    lines.extend(
        exception_instants(event, &tz, ExceptionStatus::Cancelled)
            .into_iter()
            .map(|instant| occurrence_line("EXDATE", event, &tz, instant)),
    );
    Ok(Some(lines))
}

/// `RECURRENCE-ID` lines for the modified occurrences of `event`, one per
/// override component the exporter has to emit.
#[must_use]
pub fn override_recurrence_ids(event: &Event) -> Vec<String> {
    if !event.is_recurring() {
        return Vec::new();
    }
    let tz = resolve_timezone(event.timezone.as_deref());
    exception_instants(event, &tz, ExceptionStatus::Modified)
        .into_iter()
        .map(|instant| occurrence_line("RECURRENCE-ID", event, &tz, instant))
        .collect()
}
