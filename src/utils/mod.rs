use chrono::{Local, TimeZone, Utc};
use chrono_tz::Tz;
use std::fs;
use std::path::Path;
use anyhow::{Result, Context};

/// Current wall-clock time in epoch milliseconds
pub fn current_time_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Session start and end times as shown in the past-sessions list, `MM/dd/yyyy HH:mm:ss` local time
pub fn format_session_time(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.format("%m/%d/%Y %H:%M:%S").to_string(),
        None => millis.to_string(),
    }
}

/// Elapsed milliseconds as `Xh Xm Xs`
pub fn format_total_time(elapsed_millis: i64) -> String {
    let total_seconds = elapsed_millis.max(0) / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{}h {}m {}s", hours, minutes, seconds)
}

/// Formats a feed time in the agency time zone. Times from today show only the clock,
/// older ones are prefixed with the date.
pub fn format_monitor_timestamp(millis: i64, now_millis: i64, time_zone: Tz) -> String {
    let (Some(time), Some(now)) = (
        time_zone.timestamp_millis_opt(millis).single(),
        time_zone.timestamp_millis_opt(now_millis).single(),
    ) else {
        return millis.to_string();
    };

    if time.date_naive() < now.date_naive() {
        time.format("%Y-%m-%d %I:%M:%S %p").to_string()
    } else {
        time.format("%I:%M:%S %p").to_string()
    }
}

/// Parses an agency time zone id, falling back to UTC for unknown or missing ids
pub fn parse_time_zone(time_zone: Option<&str>) -> Tz {
    time_zone.and_then(|tz| tz.parse::<Tz>().ok()).unwrap_or(Tz::UTC)
}

/// File name a downloaded GTFS zip is stored under: the URL, form-encoded
pub fn gtfs_file_name(url: &str) -> String {
    url::form_urlencoded::byte_serialize(url.as_bytes()).collect()
}

/// Ensures that the directory for the given file path exists
///
/// This function extracts the directory part of a given file path
/// and creates it if it doesn't exist.
///
/// # Arguments
/// * `file_path` - The path to the file including the filename
///
/// # Returns
/// * `Result<()>` - Ok if the directory exists or was created successfully
pub fn ensure_directory_exists<P: AsRef<Path>>(file_path: P) -> Result<()> {
    if let Some(parent) = file_path.as_ref().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).with_context(||
                format!("Failed to create directory: {}", parent.display())
            )?;
        }
    }
    Ok(())
}
