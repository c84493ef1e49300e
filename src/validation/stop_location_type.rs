use std::collections::{HashMap, HashSet};

use super::rules::E010;
use super::Findings;
use crate::gtfs::GtfsData;
use crate::models::ErrorListHelperModel;

/// E010, run once against the static GTFS data when a feed is registered
pub struct StopLocationTypeValidator;

impl StopLocationTypeValidator {
    pub fn name(&self) -> &'static str {
        "StopLocationTypeValidator"
    }

    pub fn validate(&self, gtfs_data: &GtfsData) -> Vec<ErrorListHelperModel> {
        let location_types: HashMap<&str, u32> =
            gtfs_data.stops.iter().map(|s| (s.stop_id.as_str(), s.location_type())).collect();

        let mut findings = Findings::new();
        let mut checked = HashSet::new();
        for stop_time in &gtfs_data.stop_times {
            if !checked.insert(stop_time.stop_id.as_str()) {
                continue;
            }
            if location_types.get(stop_time.stop_id.as_str()).is_some_and(|t| *t != 0) {
                findings.add(E010, format!("stop_id {}", stop_time.stop_id));
            }
        }
        findings.into_results()
    }

    /// Total number of occurrences, stored as the feed's error count
    pub fn error_count(&self, gtfs_data: &GtfsData) -> usize {
        self.validate(gtfs_data).iter().map(|l| l.occurrence_list.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs::metadata::tests::{sample_gtfs, stop_time};

    #[test]
    fn test_platform_stops_are_valid() {
        assert!(StopLocationTypeValidator.validate(&sample_gtfs()).is_empty());
    }

    #[test]
    fn test_station_in_stop_times() {
        let mut gtfs = sample_gtfs();
        gtfs.stop_times.push(stop_time("T2", "ST", 3, None));
        gtfs.stop_times.push(stop_time("T1", "ST", 5, None));

        let results = StopLocationTypeValidator.validate(&gtfs);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].error_id(), "E010");
        assert_eq!(results[0].occurrence_list[0].prefix, "stop_id ST");
        assert_eq!(StopLocationTypeValidator.error_count(&gtfs), 1);
    }
}
