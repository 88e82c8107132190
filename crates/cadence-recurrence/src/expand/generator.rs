//! Mapping of a stored rule onto the `rrule` crate's date-sequence generator.

use chrono::{DateTime, Month, TimeDelta, Utc};
use rrule::{NWeekday, RRule, RRuleSet, Tz, Unvalidated};

use crate::error::{RecurrenceError, RecurrenceResult};
use crate::model::{Frequency, RecurrenceRule, parse_by_day, parse_weekday};

impl From<Frequency> for rrule::Frequency {
    fn from(value: Frequency) -> Self {
        match value {
            Frequency::Daily => Self::Daily,
            Frequency::Weekly => Self::Weekly,
            Frequency::Monthly => Self::Monthly,
            Frequency::Yearly => Self::Yearly,
        }
    }
}

fn validate_interval(rule: &RecurrenceRule) -> RecurrenceResult<u16> {
    let value = rule
        .interval
        .ok_or_else(|| RecurrenceError::invalid_rule("interval", "missing"))?;
    if value < 1 {
        return Err(RecurrenceError::invalid_rule(
            "interval",
            format!("must be at least 1, got {value}"),
        ));
    }
    u16::try_from(value)
        .map_err(|_err| RecurrenceError::invalid_rule("interval", format!("{value} is too large")))
}

fn validate_count(value: i64) -> RecurrenceResult<u32> {
    if value < 1 {
        return Err(RecurrenceError::invalid_rule(
            "count",
            format!("must be at least 1, got {value}"),
        ));
    }
    u32::try_from(value)
        .map_err(|_err| RecurrenceError::invalid_rule("count", format!("{value} is too large")))
}

fn by_weekday(days: &[String]) -> RecurrenceResult<Vec<NWeekday>> {
    days.iter()
        .map(|day| match parse_by_day(day) {
            Some((None, weekday)) => Ok(NWeekday::Every(weekday)),
            Some((Some(n), weekday)) => Ok(NWeekday::Nth(n, weekday)),
            None => Err(RecurrenceError::invalid_rule(
                "byDay",
                format!("unknown weekday `{day}`"),
            )),
        })
        .collect()
}

fn by_month_day(days: &[i32]) -> RecurrenceResult<Vec<i8>> {
    days.iter()
        .map(|&day| {
            i8::try_from(day)
                .ok()
                .filter(|d| *d != 0 && (-31..=31).contains(d))
                .ok_or_else(|| {
                    RecurrenceError::invalid_rule(
                        "byMonthDay",
                        format!("{day} is not a day of month"),
                    )
                })
        })
        .collect()
}

fn by_month(months: &[i32]) -> RecurrenceResult<Vec<Month>> {
    months
        .iter()
        .map(|&month| {
            u8::try_from(month)
                .ok()
                .and_then(|m| Month::try_from(m).ok())
                .ok_or_else(|| {
                    RecurrenceError::invalid_rule("byMonth", format!("{month} is not a month"))
                })
        })
        .collect()
}

fn by_set_pos(positions: &[i32]) -> RecurrenceResult<Vec<i32>> {
    if let Some(bad) = positions
        .iter()
        .find(|&&p| p == 0 || !(-366..=366).contains(&p))
    {
        return Err(RecurrenceError::invalid_rule(
            "bySetPos",
            format!("{bad} is not a valid set position"),
        ));
    }
    Ok(positions.to_vec())
}

/// ## Summary
/// Builds the generator for `rule` anchored at `dtstart`.
///
/// `dtstart` should be expressed in the event's timezone so that wall-clock
/// times survive DST transitions. When both `count` and `until` are set,
/// `until` is binding and `count` is ignored.
///
/// Returns `Ok(None)` when `until` precedes `dtstart`, i.e. the series is empty.
///
/// ## Errors
/// Returns `RecurrenceError::InvalidRule` naming the offending field if the
/// rule is missing `frequency`/`interval`, holds an out-of-range value, or is
/// rejected by the generator's own validation.
pub(crate) fn build_rrule_set(
    rule: &RecurrenceRule,
    dtstart: DateTime<Tz>,
) -> RecurrenceResult<Option<RRuleSet>> {
    let frequency = rule
        .frequency
        .ok_or_else(|| RecurrenceError::invalid_rule("frequency", "missing"))?;

    let mut rrule: RRule<Unvalidated> =
        RRule::new(frequency.into()).interval(validate_interval(rule)?);

    match (rule.count, rule.until) {
        (count, Some(until)) => {
            if count.is_some() {
                tracing::debug!(?count, %until, "Both COUNT and UNTIL set, UNTIL is binding");
            }
            let dtstart_utc = dtstart.with_timezone(&Utc);
            if until < dtstart_utc {
                tracing::debug!(
                    %until,
                    dtstart = %dtstart_utc,
                    "UNTIL precedes DTSTART, series is empty"
                );
                return Ok(None);
            }
            rrule = rrule.until(until.with_timezone(&Tz::UTC));
        }
        (Some(value), None) => rrule = rrule.count(validate_count(value)?),
        (None, None) => {}
    }

    if let Some(days) = rule.by_day.as_deref().filter(|d| !d.is_empty()) {
        rrule = rrule.by_weekday(by_weekday(days)?);
    }
    if let Some(days) = rule.by_month_day.as_deref().filter(|d| !d.is_empty()) {
        rrule = rrule.by_month_day(by_month_day(days)?);
    }
    if let Some(months) = rule.by_month.as_deref().filter(|m| !m.is_empty()) {
        rrule = rrule.by_month(&by_month(months)?);
    }
    if let Some(positions) = rule.by_set_pos.as_deref().filter(|p| !p.is_empty()) {
        rrule = rrule.by_set_pos(by_set_pos(positions)?);
    }
    if let Some(code) = &rule.week_start {
        let weekday = parse_weekday(code).ok_or_else(|| {
            RecurrenceError::invalid_rule("weekStart", format!("unknown weekday `{code}`"))
        })?;
        rrule = rrule.week_start(weekday);
    }

    let set = rrule
        .build(dtstart)
        .map_err(|err| RecurrenceError::invalid_rule("recurrence", err.to_string()))?;
    tracing::trace!(rrule = %set, "Built recurrence set");
    Ok(Some(set))
}

/// Occurrence starts produced for one query window.
#[derive(Debug)]
pub(crate) struct Occurrences {
    pub dates: Vec<DateTime<Tz>>,
    /// The generator stopped at the instance cap or its own loop guard.
    pub truncated: bool,
}

/// ## Summary
/// Enumerates the occurrence starts of `set` within `[range_start, range_end]`.
///
/// The generator iterates only up to the window end, so unbounded rules are
/// safe. Its window is widened by a second on each side and the result is
/// filtered here, which keeps both boundaries inclusive.
pub(crate) fn occurrences_within(
    set: RRuleSet,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
    limit: u16,
) -> Occurrences {
    let margin = TimeDelta::seconds(1);
    let after = range_start.checked_sub_signed(margin).unwrap_or(range_start);
    let before = range_end.checked_add_signed(margin).unwrap_or(range_end);

    // One past the cap shows whether anything was cut off; one more covers
    // a date picked up by the leading margin.
    let result = set
        .after(after.with_timezone(&Tz::UTC))
        .before(before.with_timezone(&Tz::UTC))
        .all(limit.saturating_add(2));

    let mut dates: Vec<DateTime<Tz>> = result
        .dates
        .into_iter()
        .filter(|date| {
            let utc = date.with_timezone(&Utc);
            utc >= range_start && utc <= range_end
        })
        .collect();

    // `limited` only covers the generator's internal loop guard.
    let cap = usize::from(limit);
    let truncated = result.limited || dates.len() > cap;
    dates.truncate(cap);

    Occurrences { dates, truncated }
}
