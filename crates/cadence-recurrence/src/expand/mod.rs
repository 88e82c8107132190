//! Recurrence expansion for stored events.
//!
//! Rule arithmetic is delegated to the `rrule` crate; this module maps the
//! stored rule onto it, bounds the enumeration by the query window and applies
//! per-occurrence exceptions.

mod engine;
mod generator;
mod matcher;
mod timezone;

pub use engine::{ExceptionMatch, Expansion, ExpansionOptions, RecurrenceEngine, expand};
pub use timezone::resolve_timezone;

pub(crate) use generator::build_rrule_set;
pub(crate) use matcher::parse_exception_date;
