//! Positional command line of the `cadence` binary.

use std::path::{Path, PathBuf};

use cadence_core::error::CoreError;
use cadence_recurrence::model::Event;
use cadence_recurrence::{RecurrenceEngine, export};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::error::{AppError, AppResult};

pub const USAGE: &str = "usage:
  cadence expand <events.json> <range-start> <range-end>
  cadence rrule <events.json>

<events.json> holds one event object or an array of them.
Range bounds are RFC 3339 timestamps or plain dates (YYYY-MM-DD).";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the instances of every event within the window as JSON.
    Expand {
        path: PathBuf,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    },
    /// Print the iCalendar recurrence lines of every recurring event.
    Rrule { path: PathBuf },
}

/// Which end of the window a bound is parsed for.
#[derive(Debug, Clone, Copy)]
enum Bound {
    Start,
    End,
}

/// ## Summary
/// Parses a window bound.
///
/// A plain date covers the whole day, so it resolves to midnight as a start
/// bound and to the last second of the day as an end bound.
fn parse_bound(value: &str, bound: Bound) -> AppResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|err| {
        CoreError::InvalidInput(format!("`{value}` is neither RFC 3339 nor a date: {err}"))
    })?;
    let time = match bound {
        Bound::Start => NaiveTime::MIN,
        Bound::End => NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN),
    };
    Ok(date.and_time(time).and_utc())
}

fn missing(what: &str) -> AppError {
    CoreError::InvalidInput(format!("missing {what}\n\n{USAGE}")).into()
}

impl Command {
    /// ## Summary
    /// Parses the arguments following the program name.
    ///
    /// ## Errors
    /// Returns `CoreError::InvalidInput` for unknown subcommands, missing
    /// arguments or unreadable window bounds.
    pub fn parse<I>(args: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let subcommand = args.next().ok_or_else(|| missing("subcommand"))?;
        let command = match subcommand.as_str() {
            "expand" => {
                let path = args.next().ok_or_else(|| missing("<events.json>"))?;
                let start = args.next().ok_or_else(|| missing("<range-start>"))?;
                let end = args.next().ok_or_else(|| missing("<range-end>"))?;
                Self::Expand {
                    path: PathBuf::from(path),
                    range_start: parse_bound(&start, Bound::Start)?,
                    range_end: parse_bound(&end, Bound::End)?,
                }
            }
            "rrule" => {
                let path = args.next().ok_or_else(|| missing("<events.json>"))?;
                Self::Rrule {
                    path: PathBuf::from(path),
                }
            }
            other => {
                return Err(CoreError::InvalidInput(format!(
                    "unknown subcommand `{other}`\n\n{USAGE}"
                ))
                .into());
            }
        };

        if let Some(extra) = args.next() {
            return Err(CoreError::InvalidInput(format!("unexpected argument `{extra}`")).into());
        }
        Ok(command)
    }

    /// ## Summary
    /// Runs the command and returns the text to print.
    ///
    /// ## Errors
    /// Returns an error if the events file cannot be read or parsed, or if
    /// expansion fails.
    pub fn run(&self, engine: &RecurrenceEngine) -> AppResult<String> {
        match self {
            Self::Expand {
                path,
                range_start,
                range_end,
            } => {
                let events = read_events(path)?;
                let instances = engine.expand_all(&events, *range_start, *range_end)?;
                tracing::info!(
                    events = events.len(),
                    instances = instances.len(),
                    "Expanded events"
                );
                Ok(serde_json::to_string_pretty(&instances)?)
            }
            Self::Rrule { path } => {
                let events = read_events(path)?;
                let mut out = Vec::new();
                for event in &events {
                    let Some(lines) = export::recurrence_lines(event)? else {
                        tracing::debug!(event_id = %event.id, "Not recurring, no lines");
                        continue;
                    };
                    out.push(format!("# {}", event.id));
                    out.extend(lines);
                    out.extend(export::override_recurrence_ids(event));
                }
                Ok(out.join("\n"))
            }
        }
    }
}

/// ## Summary
/// Reads a JSON file holding either one event or an array of events.
///
/// ## Errors
/// Returns `AppError::ReadError` or `AppError::ParseError` naming the file.
pub fn read_events(path: &Path) -> AppResult<Vec<Event>> {
    let text = std::fs::read_to_string(path).map_err(|source| AppError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    parse_events(&text).map_err(|source| AppError::ParseError {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_events(text: &str) -> Result<Vec<Event>, serde_json::Error> {
    if text.trim_start().starts_with('[') {
        serde_json::from_str(text)
    } else {
        serde_json::from_str::<Event>(text).map(|event| vec![event])
    }
}
