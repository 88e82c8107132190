//! Resolution of an event's timezone name for rule anchoring.

use std::str::FromStr;

use rrule::Tz;

/// Strips decorations some clients put around IANA names,
/// e.g. `/mozilla.org/20050126_1/America/New_York`.
fn normalize_tzid(tzid: &str) -> &str {
    let trimmed = tzid.trim().trim_start_matches('/');
    trimmed
        .strip_prefix("mozilla.org/")
        .and_then(|rest| rest.split_once('/').map(|(_, name)| name))
        .unwrap_or(trimmed)
}

/// ## Summary
/// Resolves an IANA timezone name to the zone a series is anchored in.
///
/// Absent names resolve to UTC. Unknown names also fall back to UTC, with a
/// warning, so that a bad label never blocks expansion.
#[must_use]
pub fn resolve_timezone(name: Option<&str>) -> Tz {
    let Some(name) = name.filter(|n| !n.trim().is_empty()) else {
        return Tz::UTC;
    };

    match chrono_tz::Tz::from_str(normalize_tzid(name)) {
        Ok(tz) => Tz::Tz(tz),
        Err(err) => {
            tracing::warn!(timezone = %name, error = %err, "Unknown timezone, falling back to UTC");
            Tz::UTC
        }
    }
}
