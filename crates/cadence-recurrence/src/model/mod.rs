//! Event, recurrence rule and exception shapes exchanged with the calling layer.
//!
//! Field names serialize in camelCase, matching the stored JSON documents.

mod event;
mod exception;
mod rule;

pub use event::{Event, EventInstance, EventPatch};
pub use exception::{Exception, ExceptionStatus};
pub use rule::{Frequency, RecurrenceRule, parse_by_day, parse_weekday, weekday_code};
