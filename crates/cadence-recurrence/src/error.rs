use chrono::{DateTime, Utc};
use thiserror::Error;

/// Recurrence expansion errors
#[derive(Error, Debug)]
pub enum RecurrenceError {
    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Invalid recurrence rule field `{field}`: {reason}")]
    InvalidRule { field: &'static str, reason: String },

    #[error(transparent)]
    CoreError(#[from] cadence_core::error::CoreError),
}

impl RecurrenceError {
    pub(crate) fn invalid_rule(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            field,
            reason: reason.into(),
        }
    }
}

pub type RecurrenceResult<T> = std::result::Result<T, RecurrenceError>;

/// Why an exception entry could not be applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    #[error("missing date")]
    MissingDate,

    #[error("unparseable date `{0}`")]
    UnparseableDate(String),

    #[error("modified exception has no modifiedEvent payload")]
    MissingModifiedEvent,

    #[error("another exception already targets `{0}`")]
    Duplicate(String),
}

/// An exception entry skipped during expansion.
///
/// Skipping is never fatal: the rest of the series still expands.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("exception #{index} skipped: {reason}")]
pub struct MalformedException {
    /// Position of the entry in the origin event's exception list.
    pub index: usize,
    pub reason: MalformedReason,
}
