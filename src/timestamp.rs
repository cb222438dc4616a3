use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

pub fn now_unix() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parses a date string to ms since epoch. Non-positive results count as
/// unparseable.
pub fn parse_unix(input: &str) -> Option<i64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let unix = DateTime::parse_from_rfc3339(input)
        .or_else(|_| DateTime::parse_from_rfc2822(input))
        .map(|dt| dt.timestamp_millis())
        .ok()
        .or_else(|| parse_local(input))?;

    (unix > 0).then_some(unix)
}

fn parse_local(input: &str) -> Option<i64> {
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}

/// Local-time rendering for the "since" input.
pub fn format_local(unix: i64) -> String {
    match Local.timestamp_millis_opt(unix).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => String::new(),
    }
}
