//! Stored recurrence rule and its RRULE value text (RFC 5545 §3.3.10).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{RecurrenceError, RecurrenceResult};

/// Base repeat unit of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// Returns the RRULE `FREQ` token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }

    /// Parses a `FREQ` token (case-insensitive).
    ///
    /// Sub-daily frequencies are not supported and yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_uppercase().as_str() {
            "DAILY" => Self::Daily,
            "WEEKLY" => Self::Weekly,
            "MONTHLY" => Self::Monthly,
            "YEARLY" => Self::Yearly,
            _ => return None,
        })
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the two-letter code of a weekday.
#[must_use]
pub const fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

/// Parses a two-letter weekday code (case-insensitive).
#[must_use]
pub fn parse_weekday(code: &str) -> Option<Weekday> {
    Some(match code.trim().to_ascii_uppercase().as_str() {
        "MO" => Weekday::Mon,
        "TU" => Weekday::Tue,
        "WE" => Weekday::Wed,
        "TH" => Weekday::Thu,
        "FR" => Weekday::Fri,
        "SA" => Weekday::Sat,
        "SU" => Weekday::Sun,
        _ => return None,
    })
}

/// Parses a `BYDAY` entry such as `MO`, `2TU` or `-1FR`.
///
/// Returns the optional ordinal and the weekday. An ordinal of zero or
/// outside `-53..=53` is rejected.
#[must_use]
pub fn parse_by_day(entry: &str) -> Option<(Option<i16>, Weekday)> {
    let entry = entry.trim();
    let split = entry.len().checked_sub(2)?;
    let (ordinal, code) = (entry.get(..split)?, entry.get(split..)?);
    let weekday = parse_weekday(code)?;
    if ordinal.is_empty() {
        return Some((None, weekday));
    }
    let n: i16 = ordinal.parse().ok()?;
    (n != 0 && (-53..=53).contains(&n)).then_some((Some(n), weekday))
}

/// Recurrence rule as stored on an origin event.
///
/// Numeric parts are kept wide so that out-of-range values survive
/// deserialization and are reported as rule errors during expansion.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,

    /// Repeat every N units. Must be at least 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,

    /// Total number of occurrences. Ignored when `until` is also set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,

    /// Last possible occurrence start (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_day: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_month_day: Option<Vec<i32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_month: Option<Vec<i32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_set_pos: Option<Vec<i32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_start: Option<String>,
}

impl RecurrenceRule {
    /// Creates a rule repeating every unit of `frequency`.
    #[must_use]
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency: Some(frequency),
            interval: Some(1),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn daily() -> Self {
        Self::new(Frequency::Daily)
    }

    #[must_use]
    pub fn weekly() -> Self {
        Self::new(Frequency::Weekly)
    }

    #[must_use]
    pub fn monthly() -> Self {
        Self::new(Frequency::Monthly)
    }

    #[must_use]
    pub fn yearly() -> Self {
        Self::new(Frequency::Yearly)
    }

    #[must_use]
    pub fn with_interval(mut self, interval: i64) -> Self {
        self.interval = Some(interval);
        self
    }

    #[must_use]
    pub fn with_count(mut self, count: i64) -> Self {
        self.count = Some(count);
        self
    }

    #[must_use]
    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    #[must_use]
    pub fn with_by_day<I, S>(mut self, days: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.by_day = Some(days.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_by_month_day(mut self, days: Vec<i32>) -> Self {
        self.by_month_day = Some(days);
        self
    }

    #[must_use]
    pub fn with_by_month(mut self, months: Vec<i32>) -> Self {
        self.by_month = Some(months);
        self
    }

    #[must_use]
    pub fn with_by_set_pos(mut self, positions: Vec<i32>) -> Self {
        self.by_set_pos = Some(positions);
        self
    }

    #[must_use]
    pub fn with_week_start(mut self, code: impl Into<String>) -> Self {
        self.week_start = Some(code.into());
        self
    }

    /// Returns true if neither `count` nor `until` bounds the series.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.count.is_none() && self.until.is_none()
    }
}

fn join<T: fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Renders the RRULE value text, omitting absent parts.
impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(freq) = self.frequency {
            parts.push(format!("FREQ={freq}"));
        }
        if let Some(interval) = self.interval {
            parts.push(format!("INTERVAL={interval}"));
        }
        if let Some(count) = self.count {
            parts.push(format!("COUNT={count}"));
        }
        if let Some(until) = self.until {
            parts.push(format!("UNTIL={}", until.format("%Y%m%dT%H%M%SZ")));
        }
        if let Some(days) = self.by_day.as_deref().filter(|d| !d.is_empty()) {
            let days: Vec<String> = days.iter().map(|d| d.trim().to_ascii_uppercase()).collect();
            parts.push(format!("BYDAY={}", days.join(",")));
        }
        if let Some(days) = self.by_month_day.as_deref().filter(|d| !d.is_empty()) {
            parts.push(format!("BYMONTHDAY={}", join(days)));
        }
        if let Some(months) = self.by_month.as_deref().filter(|m| !m.is_empty()) {
            parts.push(format!("BYMONTH={}", join(months)));
        }
        if let Some(positions) = self.by_set_pos.as_deref().filter(|p| !p.is_empty()) {
            parts.push(format!("BYSETPOS={}", join(positions)));
        }
        if let Some(wkst) = &self.week_start {
            parts.push(format!("WKST={}", wkst.trim().to_ascii_uppercase()));
        }
        f.write_str(&parts.join(";"))
    }
}

fn parse_number_list(field: &'static str, value: &str) -> RecurrenceResult<Vec<i32>> {
    value
        .split(',')
        .map(|part| {
            part.trim().parse::<i32>().map_err(|err| {
                RecurrenceError::invalid_rule(field, format!("`{part}` is not a number: {err}"))
            })
        })
        .collect()
}

/// Parses an RRULE `UNTIL` value.
///
/// Accepts `YYYYMMDDTHHMMSSZ`, the floating form without `Z` (read as UTC),
/// and a bare `YYYYMMDD` date, which bounds the whole day.
fn parse_until(value: &str) -> RecurrenceResult<DateTime<Utc>> {
    let value = value.trim();
    let stripped = value.strip_suffix('Z').unwrap_or(value);
    if let Ok(naive) = NaiveDateTime::parse_from_str(stripped, "%Y%m%dT%H%M%S") {
        return Ok(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .ok()
        .and_then(|date| date.and_hms_opt(23, 59, 59))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| RecurrenceError::invalid_rule("until", format!("`{value}` is not a date")))
}

/// Parses RRULE value text, with or without a leading `RRULE:`.
///
/// `INTERVAL` defaults to 1. Parts with no counterpart in [`RecurrenceRule`]
/// (`BYHOUR`, `BYWEEKNO`, ...) are ignored.
impl FromStr for RecurrenceRule {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let text = text
            .get(..6)
            .filter(|prefix| prefix.eq_ignore_ascii_case("RRULE:"))
            .map_or(text, |_| &text[6..]);

        let mut rule = Self::default();
        for part in text.split(';').filter(|p| !p.trim().is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                RecurrenceError::invalid_rule("recurrence", format!("malformed part `{part}`"))
            })?;
            match key.trim().to_ascii_uppercase().as_str() {
                "FREQ" => {
                    rule.frequency = Some(Frequency::parse(value.trim()).ok_or_else(|| {
                        RecurrenceError::invalid_rule(
                            "frequency",
                            format!("unsupported frequency `{value}`"),
                        )
                    })?);
                }
                "INTERVAL" => {
                    rule.interval = Some(value.trim().parse().map_err(|err| {
                        RecurrenceError::invalid_rule("interval", format!("{err}"))
                    })?);
                }
                "COUNT" => {
                    rule.count = Some(value.trim().parse().map_err(|err| {
                        RecurrenceError::invalid_rule("count", format!("{err}"))
                    })?);
                }
                "UNTIL" => rule.until = Some(parse_until(value)?),
                "BYDAY" => {
                    let days: Vec<String> = value
                        .split(',')
                        .map(|d| d.trim().to_ascii_uppercase())
                        .collect();
                    if let Some(bad) = days.iter().find(|d| parse_by_day(d).is_none()) {
                        return Err(RecurrenceError::invalid_rule(
                            "byDay",
                            format!("unknown weekday `{bad}`"),
                        ));
                    }
                    rule.by_day = Some(days);
                }
                "BYMONTHDAY" => rule.by_month_day = Some(parse_number_list("byMonthDay", value)?),
                "BYMONTH" => rule.by_month = Some(parse_number_list("byMonth", value)?),
                "BYSETPOS" => rule.by_set_pos = Some(parse_number_list("bySetPos", value)?),
                "WKST" => {
                    if parse_weekday(value).is_none() {
                        return Err(RecurrenceError::invalid_rule(
                            "weekStart",
                            format!("unknown weekday `{value}`"),
                        ));
                    }
                    rule.week_start = Some(value.trim().to_ascii_uppercase());
                }
                other => tracing::trace!(part = %other, "Ignoring unsupported RRULE part"),
            }
        }

        if rule.frequency.is_none() {
            return Err(RecurrenceError::invalid_rule("frequency", "missing FREQ"));
        }
        rule.interval.get_or_insert(1);
        Ok(rule)
    }
}
