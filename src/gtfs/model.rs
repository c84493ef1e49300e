use serde::{Deserialize, Deserializer};

/// A row of agency.txt
#[derive(Debug, Clone, Deserialize)]
pub struct Agency {
    #[serde(default)]
    pub agency_id: Option<String>,
    #[serde(default)]
    pub agency_name: Option<String>,
    pub agency_timezone: String,
}

/// A row of routes.txt
#[derive(Debug, Clone, Deserialize)]
pub struct Route {
    pub route_id: String,
    #[serde(default)]
    pub agency_id: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub route_type: Option<i32>,
}

/// A row of trips.txt
#[derive(Debug, Clone, Deserialize)]
pub struct Trip {
    pub trip_id: String,
    pub route_id: String,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub direction_id: Option<u32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub block_id: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub shape_id: Option<String>,
}

/// A row of stops.txt
#[derive(Debug, Clone, Deserialize)]
pub struct Stop {
    pub stop_id: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub stop_lat: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub stop_lon: Option<f64>,
    /// Missing or empty means 0 (a stop or platform)
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub location_type: Option<u32>,
}

impl Stop {
    pub fn location_type(&self) -> u32 {
        self.location_type.unwrap_or(0)
    }
}

/// A row of stop_times.txt. Times are seconds after midnight and can exceed 24h.
#[derive(Debug, Clone, Deserialize)]
pub struct StopTime {
    pub trip_id: String,
    #[serde(default, deserialize_with = "gtfs_time")]
    pub arrival_time: Option<u32>,
    #[serde(default, deserialize_with = "gtfs_time")]
    pub departure_time: Option<u32>,
    pub stop_id: String,
    pub stop_sequence: u32,
}

/// A row of frequencies.txt
#[derive(Debug, Clone, Deserialize)]
pub struct Frequency {
    pub trip_id: String,
    #[serde(deserialize_with = "required_gtfs_time")]
    pub start_time: u32,
    #[serde(deserialize_with = "required_gtfs_time")]
    pub end_time: u32,
    pub headway_secs: u32,
    /// Missing or empty means 0 (not exactly scheduled)
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub exact_times: Option<u32>,
}

impl Frequency {
    pub fn exact_times(&self) -> u32 {
        self.exact_times.unwrap_or(0)
    }
}

/// A row of shapes.txt
#[derive(Debug, Clone, Deserialize)]
pub struct ShapePoint {
    pub shape_id: String,
    pub shape_pt_lat: f64,
    pub shape_pt_lon: f64,
    pub shape_pt_sequence: u32,
}

/// Parses a GTFS `H:MM:SS` time into seconds after midnight.
pub fn parse_gtfs_time(value: &str) -> Option<u32> {
    let mut parts = value.trim().split(':');
    let hours: u32 = parts.next()?.parse().ok()?;
    let minutes: u32 = parts.next()?.parse().ok()?;
    let seconds: u32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes > 59 || seconds > 59 {
        return None;
    }
    hours.checked_mul(3600)?.checked_add(minutes * 60 + seconds)
}

fn gtfs_time<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => parse_gtfs_time(text)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid GTFS time '{}'", text))),
    }
}

fn required_gtfs_time<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    gtfs_time(deserializer)?.ok_or_else(|| serde::de::Error::custom("missing GTFS time"))
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gtfs_time() {
        assert_eq!(parse_gtfs_time("08:00:00"), Some(28_800));
        assert_eq!(parse_gtfs_time("8:00:00"), Some(28_800));
        assert_eq!(parse_gtfs_time("25:30:15"), Some(91_815));
        assert_eq!(parse_gtfs_time("08:60:00"), None);
        assert_eq!(parse_gtfs_time("0800"), None);
        assert_eq!(parse_gtfs_time("1193046:28:15"), Some(u32::MAX));
        assert_eq!(parse_gtfs_time("1193047:00:00"), None);
        assert_eq!(parse_gtfs_time("99999999:00:00"), None);
    }
}
