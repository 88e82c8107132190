//! Pairing of exception entries with generated occurrences.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rrule::Tz;

use super::ExceptionMatch;
use crate::error::{MalformedException, MalformedReason};
use crate::model::{Exception, ExceptionStatus};

/// An exception date as written by the calling layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExceptionPoint {
    /// RFC 3339 timestamp with an offset.
    Instant(DateTime<Utc>),
    /// Timestamp without offset, read in the series' timezone.
    Local(NaiveDateTime),
    /// Calendar date only.
    Date(NaiveDate),
}

/// ## Summary
/// Parses exception date text.
///
/// Accepts RFC 3339 (`2024-01-15T09:00:00Z`), an offset-less timestamp
/// (`2024-01-15T09:00:00`), a plain date (`2024-01-15`) and the compact
/// iCalendar forms (`20240115T090000Z`, `20240115`).
pub(crate) fn parse_exception_date(text: &str) -> Option<ExceptionPoint> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(ExceptionPoint::Instant(dt.with_timezone(&Utc)));
    }
    if let Some(compact) = text.strip_suffix('Z') {
        if let Ok(naive) = NaiveDateTime::parse_from_str(compact, "%Y%m%dT%H%M%S") {
            return Some(ExceptionPoint::Instant(naive.and_utc()));
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y%m%dT%H%M%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(ExceptionPoint::Local(naive));
        }
    }
    for format in ["%Y-%m-%d", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(ExceptionPoint::Date(date));
        }
    }
    None
}

fn local_to_utc(naive: NaiveDateTime, tz: &Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

impl ExceptionPoint {
    /// Resolves the point to an instant.
    ///
    /// A date-only point takes `local_time` on that date in `tz`.
    pub(crate) fn to_instant(self, tz: &Tz, local_time: NaiveTime) -> Option<DateTime<Utc>> {
        match self {
            Self::Instant(instant) => Some(instant),
            Self::Local(naive) => local_to_utc(naive, tz),
            Self::Date(date) => local_to_utc(date.and_time(local_time), tz),
        }
    }

    fn key(self, mode: ExceptionMatch, tz: &Tz) -> Option<MatchKey> {
        match mode {
            ExceptionMatch::CalendarDate => Some(MatchKey::Date(match self {
                Self::Instant(instant) => instant.with_timezone(tz).date_naive(),
                Self::Local(naive) => naive.date(),
                Self::Date(date) => date,
            })),
            ExceptionMatch::Instant => self.to_instant(tz, NaiveTime::MIN).map(MatchKey::Instant),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum MatchKey {
    Date(NaiveDate),
    Instant(DateTime<Utc>),
}

/// Usable exceptions of one origin event, keyed for occurrence lookup.
#[derive(Debug)]
pub(crate) struct ExceptionIndex<'a> {
    entries: HashMap<MatchKey, &'a Exception>,
    mode: ExceptionMatch,
}

impl<'a> ExceptionIndex<'a> {
    /// ## Summary
    /// Indexes `exceptions`, returning the entries that had to be skipped.
    ///
    /// When two entries target the same occurrence the first one wins.
    pub(crate) fn build(
        exceptions: &'a [Exception],
        mode: ExceptionMatch,
        tz: &Tz,
    ) -> (Self, Vec<MalformedException>) {
        let mut entries = HashMap::with_capacity(exceptions.len());
        let mut skipped = Vec::new();

        for (index, exception) in exceptions.iter().enumerate() {
            let reason = match Self::key_for(exception, mode, tz) {
                Ok(key) => match entries.entry(key) {
                    Entry::Vacant(slot) => {
                        slot.insert(exception);
                        continue;
                    }
                    Entry::Occupied(_) => {
                        MalformedReason::Duplicate(exception.date.clone().unwrap_or_default())
                    }
                },
                Err(reason) => reason,
            };
            skipped.push(MalformedException { index, reason });
        }

        (Self { entries, mode }, skipped)
    }

    fn key_for(
        exception: &Exception,
        mode: ExceptionMatch,
        tz: &Tz,
    ) -> Result<MatchKey, MalformedReason> {
        let text = exception
            .date
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(MalformedReason::MissingDate)?;
        if exception.status == ExceptionStatus::Modified && exception.modified_event.is_none() {
            return Err(MalformedReason::MissingModifiedEvent);
        }
        parse_exception_date(text)
            .and_then(|point| point.key(mode, tz))
            .ok_or_else(|| MalformedReason::UnparseableDate(text.to_string()))
    }

    /// Returns the exception targeting the occurrence that originally starts at `occurrence`.
    pub(crate) fn lookup(&self, occurrence: &DateTime<Tz>) -> Option<&'a Exception> {
        let key = match self.mode {
            ExceptionMatch::CalendarDate => MatchKey::Date(occurrence.date_naive()),
            ExceptionMatch::Instant => MatchKey::Instant(occurrence.with_timezone(&Utc)),
        };
        self.entries.get(&key).copied()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
