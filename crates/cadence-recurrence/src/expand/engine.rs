//! Materialization of event instances within a query window.

use cadence_core::config::{ExceptionMatchMode, ExpansionConfig};
use chrono::{DateTime, TimeDelta, Utc};
use rrule::Tz;

use super::generator::{build_rrule_set, occurrences_within};
use super::matcher::ExceptionIndex;
use super::timezone::resolve_timezone;
use crate::error::{MalformedException, RecurrenceError, RecurrenceResult};
use crate::model::{Event, EventInstance, EventPatch, Exception, ExceptionStatus};

/// Default cap on instances materialized per event and window.
pub const DEFAULT_MAX_INSTANCES: u16 = 10_000;

/// How exceptions are paired with occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExceptionMatch {
    /// Same calendar date as the occurrence's original start, in the event's timezone.
    #[default]
    CalendarDate,
    /// Same instant as the occurrence's original start.
    Instant,
}

impl From<ExceptionMatchMode> for ExceptionMatch {
    fn from(value: ExceptionMatchMode) -> Self {
        match value {
            ExceptionMatchMode::CalendarDate => Self::CalendarDate,
            ExceptionMatchMode::Instant => Self::Instant,
        }
    }
}

/// Options for recurrence expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionOptions {
    /// Maximum number of occurrences enumerated for one event and window.
    pub max_instances: u16,
    pub exception_match: ExceptionMatch,
}

impl Default for ExpansionOptions {
    fn default() -> Self {
        Self {
            max_instances: DEFAULT_MAX_INSTANCES,
            exception_match: ExceptionMatch::default(),
        }
    }
}

impl ExpansionOptions {
    #[must_use]
    pub fn with_max_instances(mut self, max: u16) -> Self {
        self.max_instances = max;
        self
    }

    #[must_use]
    pub fn with_exception_match(mut self, mode: ExceptionMatch) -> Self {
        self.exception_match = mode;
        self
    }
}

impl TryFrom<&ExpansionConfig> for ExpansionOptions {
    type Error = RecurrenceError;

    fn try_from(config: &ExpansionConfig) -> Result<Self, Self::Error> {
        config.validate()?;
        Ok(Self {
            max_instances: config.max_instances,
            exception_match: config.exception_match.into(),
        })
    }
}

/// Result of expanding one event, including what had to be skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    /// Instances in chronological order of `start`.
    pub instances: Vec<EventInstance>,
    /// Exception entries that could not be applied.
    pub skipped: Vec<MalformedException>,
    /// The instance cap cut the window short.
    pub truncated: bool,
}

impl Expansion {
    fn only(instances: Vec<EventInstance>) -> Self {
        Self {
            instances,
            skipped: Vec::new(),
            truncated: false,
        }
    }
}

/// Stateless expander of recurring events.
///
/// Every call is a pure function of the origin event, its exceptions and the
/// window, so an engine can be shared freely across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecurrenceEngine {
    options: ExpansionOptions,
}

fn check_range(range_start: DateTime<Utc>, range_end: DateTime<Utc>) -> RecurrenceResult<()> {
    if range_start > range_end {
        return Err(RecurrenceError::InvalidRange {
            start: range_start,
            end: range_end,
        });
    }
    Ok(())
}

fn sort_chronologically(instances: &mut [EventInstance]) {
    instances.sort_by(|a, b| a.start().cmp(&b.start()).then_with(|| a.id().cmp(b.id())));
}

impl RecurrenceEngine {
    #[must_use]
    pub fn new(options: ExpansionOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &ExpansionOptions {
        &self.options
    }

    /// ## Summary
    /// Expands `event` into the instances starting within `[range_start, range_end]`.
    ///
    /// Malformed exception entries are skipped and logged.
    ///
    /// ## Errors
    /// Returns `RecurrenceError::InvalidRange` if `range_start > range_end` and
    /// `RecurrenceError::InvalidRule` if the recurrence rule is malformed.
    pub fn expand(
        &self,
        event: &Event,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> RecurrenceResult<Vec<EventInstance>> {
        let expansion = self.expand_with_report(event, range_start, range_end)?;
        for skipped in &expansion.skipped {
            tracing::warn!(event_id = %event.id, %skipped, "Skipping malformed exception");
        }
        Ok(expansion.instances)
    }

    /// ## Summary
    /// Expands `event` like [`Self::expand`], also reporting skipped exception
    /// entries and whether the instance cap was hit.
    ///
    /// ## Errors
    /// Returns `RecurrenceError::InvalidRange` if `range_start > range_end` and
    /// `RecurrenceError::InvalidRule` if the recurrence rule is malformed.
    pub fn expand_with_report(
        &self,
        event: &Event,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> RecurrenceResult<Expansion> {
        check_range(range_start, range_end)?;

        let Some(rule) = &event.recurrence else {
            let in_range = range_start <= event.start && event.start <= range_end;
            let instances = if in_range {
                vec![EventInstance::single(event.clone())]
            } else {
                Vec::new()
            };
            return Ok(Expansion::only(instances));
        };

        let tz = resolve_timezone(event.timezone.as_deref());
        let duration = event.duration();

        let Some(set) = build_rrule_set(rule, event.start.with_timezone(&tz))? else {
            return Ok(Expansion::only(Vec::new()));
        };

        let (index, skipped) =
            ExceptionIndex::build(&event.exceptions, self.options.exception_match, &tz);

        let occurrences =
            occurrences_within(set, range_start, range_end, self.options.max_instances);
        if occurrences.truncated {
            tracing::warn!(
                event_id = %event.id,
                max_instances = self.options.max_instances,
                "Instance cap reached, window truncated"
            );
        }
        tracing::debug!(
            event_id = %event.id,
            occurrences = occurrences.dates.len(),
            unbounded = rule.is_unbounded(),
            has_exceptions = !index.is_empty(),
            "Enumerated occurrences"
        );

        let mut instances = Vec::with_capacity(occurrences.dates.len());
        for occurrence in &occurrences.dates {
            let exception = index.lookup(occurrence);
            if exception.is_some_and(|e| e.status == ExceptionStatus::Cancelled) {
                tracing::trace!(event_id = %event.id, "Occurrence cancelled by exception");
                continue;
            }

            let instance = materialize(event, occurrence, duration, exception);
            if instance.start() < range_start || instance.start() > range_end {
                tracing::debug!(
                    instance_id = %instance.id(),
                    start = %instance.start(),
                    "Modified occurrence moved outside the window"
                );
                continue;
            }
            instances.push(instance);
        }

        sort_chronologically(&mut instances);

        Ok(Expansion {
            instances,
            skipped,
            truncated: occurrences.truncated,
        })
    }

    /// ## Summary
    /// Expands several events for one window and merges the results chronologically.
    ///
    /// An event with a malformed rule is logged and left out so that it cannot
    /// blank out the rest of the calendar.
    ///
    /// ## Errors
    /// Returns `RecurrenceError::InvalidRange` if `range_start > range_end`.
    pub fn expand_all<'a, I>(
        &self,
        events: I,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> RecurrenceResult<Vec<EventInstance>>
    where
        I: IntoIterator<Item = &'a Event>,
    {
        check_range(range_start, range_end)?;

        let mut all = Vec::new();
        for event in events {
            match self.expand(event, range_start, range_end) {
                Ok(mut instances) => all.append(&mut instances),
                Err(err @ RecurrenceError::InvalidRule { .. }) => {
                    tracing::warn!(
                        event_id = %event.id,
                        error = %err,
                        "Skipping event with invalid recurrence"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        sort_chronologically(&mut all);
        Ok(all)
    }
}

/// Builds the instance for one occurrence, applying a modified exception if present.
fn materialize(
    event: &Event,
    occurrence: &DateTime<Tz>,
    duration: TimeDelta,
    exception: Option<&Exception>,
) -> EventInstance {
    let original_start = occurrence.with_timezone(&Utc);
    let id = format!("{}_{}", event.id, occurrence.naive_local().format("%Y%m%d"));

    let mut instance_event = event.clone();
    instance_event.id = id;

    let patch: Option<&EventPatch> = exception.and_then(|e| e.modified_event.as_ref());
    let start = patch.and_then(|p| p.start).unwrap_or(original_start);
    let end = patch
        .and_then(|p| p.end)
        .unwrap_or_else(|| start.checked_add_signed(duration).unwrap_or(start));
    if let Some(patch) = patch {
        patch.apply_descriptive(&mut instance_event);
    }
    instance_event.start = start;
    instance_event.end = end;

    EventInstance::occurrence(
        instance_event,
        event.id.as_str(),
        patch.and(exception).and_then(|e| e.date.clone()),
    )
}

/// ## Summary
/// Expands `event` within `[range_start, range_end]` using default options.
///
/// ## Errors
/// Returns `RecurrenceError::InvalidRange` if `range_start > range_end` and
/// `RecurrenceError::InvalidRule` if the recurrence rule is malformed.
pub fn expand(
    event: &Event,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
) -> RecurrenceResult<Vec<EventInstance>> {
    RecurrenceEngine::default().expand(event, range_start, range_end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecurrenceRule;
    use chrono::{TimeZone, Timelike};

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn weekly_review() -> Event {
        Event::new("rev", "Review", utc(2024, 1, 1, 9), utc(2024, 1, 1, 10))
            .with_location("Room 4")
            .with_description("Weekly review")
            .with_recurrence(RecurrenceRule::weekly())
    }

    #[test]
    fn inverted_range_is_rejected_before_anything_else() {
        let event = Event::new("e", "Broken", utc(2024, 1, 1, 9), utc(2024, 1, 1, 10))
            .with_recurrence(RecurrenceRule::default());
        let result = expand(&event, utc(2024, 2, 1, 0), utc(2024, 1, 1, 0));
        assert!(matches!(result, Err(RecurrenceError::InvalidRange { .. })));
    }

    #[test]
    fn single_event_is_returned_unchanged_when_in_range() {
        let event = Event::new("one", "Lunch", utc(2024, 1, 10, 12), utc(2024, 1, 10, 13));

        let inside = expand(&event, utc(2024, 1, 10, 12), utc(2024, 1, 10, 12)).unwrap();
        assert_eq!(inside, vec![EventInstance::single(event.clone())]);
        assert!(!inside[0].is_recurring_instance);

        let outside = expand(&event, utc(2024, 1, 11, 0), utc(2024, 1, 12, 0)).unwrap();
        assert!(outside.is_empty());
    }

    #[test]
    fn modified_exception_overrides_only_set_fields() {
        let patch = EventPatch {
            title: Some("Rescheduled".to_string()),
            ..EventPatch::default()
        };
        let event = weekly_review().with_exception(Exception::modified("2024-01-15", patch));

        let instances = expand(&event, utc(2024, 1, 1, 0), utc(2024, 1, 31, 0)).unwrap();
        let modified = instances
            .iter()
            .find(|i| i.id() == "rev_20240115")
            .expect("modified occurrence present");

        assert_eq!(modified.event.title, "Rescheduled");
        assert_eq!(modified.event.location.as_deref(), Some("Room 4"));
        assert_eq!(modified.event.description.as_deref(), Some("Weekly review"));
        assert_eq!(modified.start(), utc(2024, 1, 15, 9));
        assert_eq!(modified.end(), utc(2024, 1, 15, 10));
        assert_eq!(modified.exception_date.as_deref(), Some("2024-01-15"));
        assert_eq!(
            instances.iter().filter(|i| i.id() == "rev_20240115").count(),
            1
        );
    }

    #[test]
    fn modified_start_keeps_the_series_duration() {
        let patch = EventPatch {
            start: Some(utc(2024, 1, 15, 14)),
            ..EventPatch::default()
        };
        let event = weekly_review().with_exception(Exception::modified("2024-01-15", patch));

        let instances = expand(&event, utc(2024, 1, 15, 0), utc(2024, 1, 16, 0)).unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].start(), utc(2024, 1, 15, 14));
        assert_eq!(instances[0].end(), utc(2024, 1, 15, 15));
        assert_eq!(instances[0].id(), "rev_20240115");
    }

    #[test]
    fn modified_occurrence_moved_out_of_window_is_dropped() {
        let patch = EventPatch {
            start: Some(utc(2024, 3, 1, 9)),
            end: Some(utc(2024, 3, 1, 10)),
            ..EventPatch::default()
        };
        let event = weekly_review().with_exception(Exception::modified("2024-01-15", patch));

        let instances = expand(&event, utc(2024, 1, 1, 0), utc(2024, 1, 31, 0)).unwrap();
        assert!(instances.iter().all(|i| i.id() != "rev_20240115"));
        assert_eq!(instances.len(), 4);
    }

    #[test_log::test]
    fn report_lists_skipped_exceptions_and_expansion_continues() {
        let event = weekly_review()
            .with_exception(Exception::cancelled("garbage"))
            .with_exception(Exception::cancelled("2024-01-08"));

        let expansion = RecurrenceEngine::default()
            .expand_with_report(&event, utc(2024, 1, 1, 0), utc(2024, 1, 31, 0))
            .unwrap();

        assert_eq!(expansion.skipped.len(), 1);
        assert_eq!(expansion.skipped[0].index, 0);
        assert!(!expansion.truncated);
        let ids: Vec<&str> = expansion.instances.iter().map(EventInstance::id).collect();
        assert_eq!(ids, vec!["rev_20240101", "rev_20240115", "rev_20240122", "rev_20240129"]);
    }

    #[test]
    fn instance_cap_truncates_and_is_reported() {
        let event = Event::new("d", "Daily", utc(2024, 1, 1, 9), utc(2024, 1, 1, 10))
            .with_recurrence(RecurrenceRule::daily());
        let engine = RecurrenceEngine::new(ExpansionOptions::default().with_max_instances(5));

        let expansion = engine
            .expand_with_report(&event, utc(2024, 1, 1, 0), utc(2024, 12, 31, 0))
            .unwrap();
        assert_eq!(expansion.instances.len(), 5);
        assert!(expansion.truncated);
    }

    #[test_log::test]
    fn series_filling_the_cap_is_not_truncated() {
        let event = Event::new("d", "Daily", utc(2024, 1, 1, 9), utc(2024, 1, 1, 10))
            .with_recurrence(RecurrenceRule::daily().with_count(5));
        let engine = RecurrenceEngine::new(ExpansionOptions::default().with_max_instances(5));

        let expansion = engine
            .expand_with_report(&event, utc(2024, 1, 1, 0), utc(2024, 12, 31, 0))
            .unwrap();
        assert_eq!(expansion.instances.len(), 5);
        assert!(!expansion.truncated);
    }

    #[test]
    fn instant_matching_ignores_same_day_exceptions_at_other_times() {
        let event = weekly_review().with_exception(Exception::cancelled("2024-01-08T15:00:00Z"));

        let by_date = expand(&event, utc(2024, 1, 1, 0), utc(2024, 1, 14, 0)).unwrap();
        assert_eq!(by_date.len(), 1);

        let engine = RecurrenceEngine::new(
            ExpansionOptions::default().with_exception_match(ExceptionMatch::Instant),
        );
        let by_instant = engine
            .expand(&event, utc(2024, 1, 1, 0), utc(2024, 1, 14, 0))
            .unwrap();
        assert_eq!(by_instant.len(), 2);
    }

    #[test]
    fn series_keeps_local_time_across_dst() {
        let start = Utc.with_ymd_and_hms(2021, 3, 13, 14, 0, 0).unwrap(); // 09:00 EST
        let event = Event::new("ny", "Standup", start, start + TimeDelta::minutes(15))
            .with_timezone("America/New_York")
            .with_recurrence(RecurrenceRule::daily().with_count(3));

        let instances = expand(&event, utc(2021, 3, 1, 0), utc(2021, 3, 31, 0)).unwrap();
        let starts: Vec<DateTime<Utc>> = instances.iter().map(EventInstance::start).collect();
        assert_eq!(
            starts,
            vec![
                Utc.with_ymd_and_hms(2021, 3, 13, 14, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2021, 3, 14, 13, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2021, 3, 15, 13, 0, 0).unwrap(),
            ]
        );
        assert!(instances.iter().all(|i| i.end() - i.start() == TimeDelta::minutes(15)));
        assert_eq!(instances[1].id(), "ny_20210314");
        assert_eq!(instances[1].start().minute(), 0);
    }

    #[test]
    fn expand_all_merges_and_skips_invalid_rules() {
        let daily = Event::new("a", "Daily", utc(2024, 1, 2, 8), utc(2024, 1, 2, 9))
            .with_recurrence(RecurrenceRule::daily().with_count(2));
        let single = Event::new("b", "Dentist", utc(2024, 1, 2, 12), utc(2024, 1, 2, 13));
        let broken = Event::new("c", "Broken", utc(2024, 1, 2, 7), utc(2024, 1, 2, 8))
            .with_recurrence(RecurrenceRule::weekly().with_interval(0));

        let merged = RecurrenceEngine::default()
            .expand_all([&daily, &single, &broken], utc(2024, 1, 1, 0), utc(2024, 1, 31, 0))
            .unwrap();

        let ids: Vec<&str> = merged.iter().map(EventInstance::id).collect();
        assert_eq!(ids, vec!["a_20240102", "b", "a_20240103"]);

        let inverted = RecurrenceEngine::default().expand_all(
            [&daily],
            utc(2024, 2, 1, 0),
            utc(2024, 1, 1, 0),
        );
        assert!(matches!(inverted, Err(RecurrenceError::InvalidRange { .. })));
    }

    #[test]
    fn options_come_from_configuration() {
        let config = ExpansionConfig {
            max_instances: 42,
            exception_match: ExceptionMatchMode::Instant,
        };
        let options = ExpansionOptions::try_from(&config).unwrap();
        assert_eq!(options.max_instances, 42);
        assert_eq!(options.exception_match, ExceptionMatch::Instant);

        let zero = ExpansionConfig {
            max_instances: 0,
            exception_match: ExceptionMatchMode::CalendarDate,
        };
        assert!(matches!(
            ExpansionOptions::try_from(&zero),
            Err(RecurrenceError::CoreError(_))
        ));
    }
}
