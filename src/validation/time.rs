//! Time helpers shared by the timestamp and trip descriptor rules.

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Earliest timestamp accepted as POSIX time (Jan 1, 2005)
pub const MIN_POSIX_TIME: i64 = 1_104_537_600;
/// Latest timestamp accepted as POSIX time (Feb 10, 2033)
pub const MAX_POSIX_TIME: i64 = 1_991_620_134;

/// How far in the future a timestamp may be before E050 fires
pub const IN_FUTURE_TOLERANCE_SECONDS: i64 = 60;

pub fn is_posix(timestamp: i64) -> bool {
    (MIN_POSIX_TIME..=MAX_POSIX_TIME).contains(&timestamp)
}

/// Milliseconds between `current_time_millis` and a timestamp in seconds
pub fn age_millis(current_time_millis: i64, timestamp_sec: i64) -> i64 {
    current_time_millis - timestamp_sec.saturating_mul(1000)
}

pub fn is_in_future(current_time_millis: i64, timestamp_sec: i64, tolerance_sec: i64) -> bool {
    let age = age_millis(current_time_millis, timestamp_sec);
    age < 0 && age.abs() / 1000 > tolerance_sec
}

/// `HH:MM:SS` or `H:MM:SS`, hours up to 29
pub fn is_valid_time_format(value: &str) -> bool {
    if value.len() != 7 && value.len() != 8 {
        return false;
    }
    let parts: Vec<&str> = value.split(':').collect();
    let [hours, minutes, seconds] = parts.as_slice() else {
        return false;
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(hours) || !digits(minutes) || !digits(seconds) {
        return false;
    }
    let hour_ok = match hours.as_bytes() {
        [d] => d.is_ascii_digit(),
        [tens, _] => (b'0'..=b'2').contains(tens),
        _ => false,
    };
    let two_digit_sexagesimal = |s: &str| s.len() == 2 && (b'0'..=b'5').contains(&s.as_bytes()[0]);
    hour_ok && two_digit_sexagesimal(minutes) && two_digit_sexagesimal(seconds)
}

/// A real calendar date in `YYYYMMDD` form
pub fn is_valid_date_format(value: &str) -> bool {
    value.len() == 8
        && value.bytes().all(|b| b.is_ascii_digit())
        && NaiveDate::parse_from_str(value, "%Y%m%d").is_ok()
}

/// Seconds after midnight as `HH:MM:SS` (hours may exceed 23)
pub fn seconds_after_midnight_to_clock(seconds: u32) -> String {
    format!("{:02}:{:02}:{:02}", seconds / 3600, (seconds / 60) % 60, seconds % 60)
}

/// A POSIX timestamp rendered as `HH:MM:SS` in the agency time zone
pub fn posix_to_clock(timestamp_sec: i64, time_zone: Tz) -> String {
    match Utc.timestamp_opt(timestamp_sec, 0).single() {
        Some(utc) => utc.with_timezone(&time_zone).format("%H:%M:%S").to_string(),
        None => timestamp_sec.to_string(),
    }
}

/// Formats elapsed seconds the way timing log lines show them, e.g. `0.25 seconds`
pub fn elapsed_time_string(elapsed_seconds: f64) -> String {
    let text = format!("{:.3}", elapsed_seconds);
    let trimmed = text.trim_end_matches('0');
    let trimmed = if trimmed.ends_with('.') { format!("{}0", trimmed) } else { trimmed.to_string() };
    format!("{} seconds", trimmed)
}

/// Reads the UTC timestamp embedded at the end of an archived feed file name,
/// e.g. `TripUpdates-2017-02-18T20-01-08Z.pb`, returning epoch milliseconds.
pub fn timestamp_from_file_name(file_name: &str) -> Result<i64> {
    let stem = match file_name.rfind('.') {
        Some(dot) => &file_name[..dot],
        None => file_name,
    };
    if stem.len() < 20 || !stem.is_char_boundary(stem.len() - 20) {
        return Err(anyhow!("File name '{}' is too short to contain a timestamp", file_name));
    }
    let stamp = &stem[stem.len() - 20..];
    let parsed = NaiveDateTime::parse_from_str(stamp, "%Y-%m-%dT%H-%M-%SZ")
        .map_err(|e| anyhow!("Couldn't parse timestamp from file name '{}': {}", file_name, e))?;
    Ok(DateTime::<Utc>::from_naive_utc_and_offset(parsed, Utc).timestamp_millis())
}
