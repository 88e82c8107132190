use cadence_recurrence::model::Event;
use cadence_recurrence::{RecurrenceEngine, RecurrenceResult};
use chrono::{DateTime, Utc};

pub struct ExpandCase {
    pub name: &'static str,
    pub event: &'static str,
    pub range_start: &'static str,
    pub range_end: &'static str,
    /// `(id, start)` of every expected instance, in order.
    pub expected: &'static [(&'static str, &'static str)],
}

#[expect(clippy::too_many_lines)]
pub fn expand_cases() -> Vec<ExpandCase> {
    vec![
        ExpandCase {
            name: "weekly_count_four",
            event: r#"{
                "id": "team",
                "title": "Team sync",
                "start": "2024-01-01T09:00:00Z",
                "end": "2024-01-01T10:00:00Z",
                "recurrence": { "frequency": "weekly", "interval": 1, "count": 4 }
            }"#,
            range_start: "2024-01-01T00:00:00Z",
            range_end: "2024-01-31T23:59:59Z",
            expected: &[
                ("team_20240101", "2024-01-01T09:00:00Z"),
                ("team_20240108", "2024-01-08T09:00:00Z"),
                ("team_20240115", "2024-01-15T09:00:00Z"),
                ("team_20240122", "2024-01-22T09:00:00Z"),
            ],
        },
        ExpandCase {
            name: "daily_until_is_inclusive",
            event: r#"{
                "id": "d",
                "title": "Daily",
                "start": "2024-01-10T09:00:00Z",
                "end": "2024-01-10T09:30:00Z",
                "recurrence": {
                    "frequency": "daily",
                    "interval": 1,
                    "until": "2024-01-12T09:00:00Z"
                }
            }"#,
            range_start: "2024-01-01T00:00:00Z",
            range_end: "2024-02-01T00:00:00Z",
            expected: &[
                ("d_20240110", "2024-01-10T09:00:00Z"),
                ("d_20240111", "2024-01-11T09:00:00Z"),
                ("d_20240112", "2024-01-12T09:00:00Z"),
            ],
        },
        ExpandCase {
            name: "every_other_day_window_slice",
            event: r#"{
                "id": "alt",
                "title": "Alternate",
                "start": "2024-03-01T18:00:00Z",
                "end": "2024-03-01T19:00:00Z",
                "recurrence": { "frequency": "daily", "interval": 2 }
            }"#,
            range_start: "2024-03-04T00:00:00Z",
            range_end: "2024-03-09T23:59:59Z",
            expected: &[
                ("alt_20240305", "2024-03-05T18:00:00Z"),
                ("alt_20240307", "2024-03-07T18:00:00Z"),
                ("alt_20240309", "2024-03-09T18:00:00Z"),
            ],
        },
        ExpandCase {
            name: "monthly_second_tuesday",
            event: r#"{
                "id": "patch",
                "title": "Patch Tuesday",
                "start": "2024-01-09T17:00:00Z",
                "end": "2024-01-09T18:00:00Z",
                "recurrence": {
                    "frequency": "monthly",
                    "interval": 1,
                    "byDay": ["2TU"]
                }
            }"#,
            range_start: "2024-01-01T00:00:00Z",
            range_end: "2024-04-30T00:00:00Z",
            expected: &[
                ("patch_20240109", "2024-01-09T17:00:00Z"),
                ("patch_20240213", "2024-02-13T17:00:00Z"),
                ("patch_20240312", "2024-03-12T17:00:00Z"),
                ("patch_20240409", "2024-04-09T17:00:00Z"),
            ],
        },
        ExpandCase {
            name: "yearly_anniversary",
            event: r#"{
                "id": "anniv",
                "title": "Anniversary",
                "start": "2020-06-15T00:00:00Z",
                "end": "2020-06-16T00:00:00Z",
                "allDay": true,
                "recurrence": { "frequency": "yearly", "interval": 1 }
            }"#,
            range_start: "2023-01-01T00:00:00Z",
            range_end: "2025-12-31T00:00:00Z",
            expected: &[
                ("anniv_20230615", "2023-06-15T00:00:00Z"),
                ("anniv_20240615", "2024-06-15T00:00:00Z"),
                ("anniv_20250615", "2025-06-15T00:00:00Z"),
            ],
        },
        ExpandCase {
            name: "weekdays_with_cancellation",
            event: r#"{
                "id": "gym",
                "title": "Gym",
                "start": "2024-01-01T06:00:00Z",
                "end": "2024-01-01T07:00:00Z",
                "recurrence": {
                    "frequency": "weekly",
                    "interval": 1,
                    "byDay": ["MO", "WE", "FR"]
                },
                "exceptions": [{ "date": "2024-01-03", "status": "cancelled" }]
            }"#,
            range_start: "2024-01-01T00:00:00Z",
            range_end: "2024-01-07T00:00:00Z",
            expected: &[
                ("gym_20240101", "2024-01-01T06:00:00Z"),
                ("gym_20240105", "2024-01-05T06:00:00Z"),
            ],
        },
        ExpandCase {
            name: "zoned_ids_use_local_date",
            event: r#"{
                "id": "late",
                "title": "Late call",
                "start": "2024-01-02T03:00:00Z",
                "end": "2024-01-02T04:00:00Z",
                "timezone": "America/Los_Angeles",
                "recurrence": { "frequency": "daily", "interval": 1, "count": 2 }
            }"#,
            range_start: "2024-01-01T00:00:00Z",
            range_end: "2024-01-10T00:00:00Z",
            expected: &[
                ("late_20240101", "2024-01-02T03:00:00Z"),
                ("late_20240102", "2024-01-03T03:00:00Z"),
            ],
        },
        ExpandCase {
            name: "non_recurring_in_range",
            event: r#"{
                "id": "once",
                "title": "Dentist",
                "start": "2024-02-02T15:00:00Z",
                "end": "2024-02-02T16:00:00Z"
            }"#,
            range_start: "2024-02-01T00:00:00Z",
            range_end: "2024-02-29T00:00:00Z",
            expected: &[("once", "2024-02-02T15:00:00Z")],
        },
        ExpandCase {
            name: "non_recurring_out_of_range",
            event: r#"{
                "id": "once",
                "title": "Dentist",
                "start": "2024-02-02T15:00:00Z",
                "end": "2024-02-02T16:00:00Z"
            }"#,
            range_start: "2024-03-01T00:00:00Z",
            range_end: "2024-03-31T00:00:00Z",
            expected: &[],
        },
    ]
}

pub fn parse_utc(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .unwrap_or_else(|err| panic!("Failed to parse rfc3339 value {value}: {err}"))
        .with_timezone(&Utc)
}

pub fn parse_event(json: &str) -> Event {
    serde_json::from_str(json).unwrap_or_else(|err| panic!("Failed to parse event: {err}"))
}

pub fn run_case(
    engine: &RecurrenceEngine,
    case: &ExpandCase,
) -> RecurrenceResult<Vec<(String, DateTime<Utc>)>> {
    let event = parse_event(case.event);
    let instances = engine.expand(
        &event,
        parse_utc(case.range_start),
        parse_utc(case.range_end),
    )?;
    Ok(instances
        .iter()
        .map(|instance| (instance.id().to_string(), instance.start()))
        .collect())
}

pub fn assert_case(engine: &RecurrenceEngine, case: &ExpandCase) {
    let actual = run_case(engine, case)
        .unwrap_or_else(|err| panic!("Case {} failed to expand: {err}", case.name));
    let expected: Vec<(String, DateTime<Utc>)> = case
        .expected
        .iter()
        .map(|(id, start)| ((*id).to_string(), parse_utc(start)))
        .collect();
    assert_eq!(actual, expected, "Case {} did not match", case.name);
}
