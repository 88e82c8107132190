use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Exception, RecurrenceRule};

/// An origin event as stored by the calling layer.
///
/// Fields the engine does not interpret (owner, attendees, categories, ...)
/// are preserved in `extra` and carried onto every generated instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// IANA timezone name the series is anchored in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrenceRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<Exception>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start,
            end,
            all_day: false,
            description: None,
            location: None,
            color: None,
            timezone: None,
            recurrence: None,
            exceptions: Vec::new(),
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_recurrence(mut self, rule: RecurrenceRule) -> Self {
        self.recurrence = Some(rule);
        self
    }

    #[must_use]
    pub fn with_exception(mut self, exception: Exception) -> Self {
        self.exceptions.push(exception);
        self
    }

    #[must_use]
    pub fn with_timezone(mut self, tz: impl Into<String>) -> Self {
        self.timezone = Some(tz.into());
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns true if the event carries a recurrence rule.
    #[must_use]
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// Length of every occurrence, `end - start`.
    ///
    /// Negative spans are clamped to zero.
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        let span = self.end.signed_duration_since(self.start);
        if span < TimeDelta::zero() {
            tracing::warn!(
                event_id = %self.id,
                start = %self.start,
                end = %self.end,
                "Event ends before it starts, using zero duration"
            );
            return TimeDelta::zero();
        }
        span
    }
}

/// Partial event payload of a modified exception.
///
/// Only the fields that are set replace the base event's values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
}

impl EventPatch {
    /// Overwrites the descriptive fields of `event` that this patch sets.
    ///
    /// `start` and `end` are resolved by the engine, which knows the occurrence.
    pub fn apply_descriptive(&self, event: &mut Event) {
        if let Some(title) = &self.title {
            event.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            event.description = Some(description.clone());
        }
        if let Some(location) = &self.location {
            event.location = Some(location.clone());
        }
        if let Some(color) = &self.color {
            event.color = Some(color.clone());
        }
        if let Some(all_day) = self.all_day {
            event.all_day = all_day;
        }
    }
}

/// Keys written by [`EventInstance`] itself. Stored copies in `Event::extra`
/// would otherwise serialize twice.
const INSTANCE_KEYS: [&str; 3] = ["isRecurringInstance", "originalEventId", "exceptionDate"];

/// A materialized event returned to callers.
///
/// Instances are recomputed from the origin event on every read and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInstance {
    #[serde(flatten)]
    pub event: Event,
    #[serde(default)]
    pub is_recurring_instance: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_event_id: Option<String>,
    /// Date text of the modified exception this instance came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_date: Option<String>,
}

impl EventInstance {
    /// Wraps a non-recurring event.
    #[must_use]
    pub fn single(event: Event) -> Self {
        Self::new(event, None, None)
    }

    /// Builds the instance of a recurring series; `exception_date` names the
    /// modified exception it came from, if any.
    #[must_use]
    pub fn occurrence(
        event: Event,
        original_event_id: impl Into<String>,
        exception_date: Option<String>,
    ) -> Self {
        Self::new(event, Some(original_event_id.into()), exception_date)
    }

    fn new(
        mut event: Event,
        original_event_id: Option<String>,
        exception_date: Option<String>,
    ) -> Self {
        for key in INSTANCE_KEYS {
            if event.extra.remove(key).is_some() {
                tracing::trace!(event_id = %event.id, key, "Dropped stored instance field");
            }
        }
        Self {
            event,
            is_recurring_instance: original_event_id.is_some(),
            original_event_id,
            exception_date,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.event.id
    }

    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.event.start
    }

    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.event.end
    }
}
