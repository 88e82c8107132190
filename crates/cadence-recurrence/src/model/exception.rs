use serde::{Deserialize, Serialize};

use super::EventPatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExceptionStatus {
    Cancelled,
    Modified,
}

/// A per-occurrence override of a recurring series.
///
/// `date` identifies the occurrence by its original start. It is kept as the
/// stored text so that a single unreadable entry can be skipped instead of
/// failing the whole event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exception {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub status: ExceptionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_event: Option<EventPatch>,
}

impl Exception {
    /// Cancels the occurrence originally starting at `date`.
    #[must_use]
    pub fn cancelled(date: impl Into<String>) -> Self {
        Self {
            date: Some(date.into()),
            status: ExceptionStatus::Cancelled,
            modified_event: None,
        }
    }

    /// Replaces fields of the occurrence originally starting at `date`.
    #[must_use]
    pub fn modified(date: impl Into<String>, patch: EventPatch) -> Self {
        Self {
            date: Some(date.into()),
            status: ExceptionStatus::Modified,
            modified_event: Some(patch),
        }
    }
}
