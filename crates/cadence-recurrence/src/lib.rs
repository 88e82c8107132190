//! Materialization of recurring calendar events.
//!
//! An origin [`model::Event`] carries an optional [`model::RecurrenceRule`] and a
//! sparse list of [`model::Exception`]s. [`RecurrenceEngine`] turns that into the
//! concrete [`model::EventInstance`] values intersecting a query window.

pub mod error;
pub mod expand;
pub mod export;
pub mod model;

pub use error::{MalformedException, MalformedReason, RecurrenceError, RecurrenceResult};
pub use expand::{ExceptionMatch, Expansion, ExpansionOptions, RecurrenceEngine, expand};
