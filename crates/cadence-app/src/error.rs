use std::path::PathBuf;

use thiserror::Error;

/// Application-level errors (command line layer)
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    RecurrenceError(#[from] cadence_recurrence::RecurrenceError),

    #[error(transparent)]
    CoreError(#[from] cadence_core::error::CoreError),

    #[error("Failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse events from {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to render output: {0}")]
    RenderError(#[from] serde_json::Error),
}

pub type AppResult<T> = std::result::Result<T, AppError>;
