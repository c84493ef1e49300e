//! Timestamp rules for the header and every entity type.

use log::warn;

use super::feed_utils::{is_v2_or_higher, stop_time_update_id_text, trip_id_text};
use super::rules::{E001, E012, E017, E018, E022, E025, E048, E050, W001, W007, W008};
use super::time::{age_millis, is_in_future, is_posix, posix_to_clock, IN_FUTURE_TOLERANCE_SECONDS};
use super::{FeedEntityValidator, Findings};
use crate::gtfs::GtfsMetadata;
use crate::models::ErrorListHelperModel;
use crate::realtime::{FeedEntity, FeedMessage, TripUpdate, VehiclePosition};

/// Feeds refreshing less often than this trigger W007
pub const MINIMUM_REFRESH_INTERVAL_SECONDS: i64 = 35;
/// Header timestamps older than this trigger W008
pub const MAX_AGE_SECONDS: i64 = 65;

pub struct TimestampValidator;

impl FeedEntityValidator for TimestampValidator {
    fn name(&self) -> &'static str {
        "TimestampValidator"
    }

    fn validate(
        &self,
        current_time_millis: i64,
        gtfs_metadata: &GtfsMetadata,
        feed_message: &FeedMessage,
        previous_feed_message: Option<&FeedMessage>,
        _combined_feed_message: Option<&FeedMessage>,
    ) -> Vec<ErrorListHelperModel> {
        let mut check = TimestampCheck {
            findings: Findings::new(),
            now_millis: current_time_millis,
            now_text: posix_to_clock(current_time_millis / 1000, gtfs_metadata.time_zone),
            metadata: gtfs_metadata,
        };

        let header_timestamp = check.header(feed_message, previous_feed_message);

        for entity in &feed_message.entity {
            if let Some(trip_update) = &entity.trip_update {
                check.trip_update(entity, trip_update, header_timestamp);
            }
            if let Some(vehicle) = &entity.vehicle {
                check.vehicle(vehicle, header_timestamp);
            }
            if entity.alert.is_some() {
                check.alert(entity);
            }
        }

        check.findings.into_results()
    }
}

struct TimestampCheck<'a> {
    findings: Findings,
    now_millis: i64,
    now_text: String,
    metadata: &'a GtfsMetadata,
}

impl TimestampCheck<'_> {
    fn clock(&self, timestamp: i64) -> String {
        posix_to_clock(timestamp, self.metadata.time_zone)
    }

    /// `... is M min S sec greater than HH:MM:SS (now)` for E050
    fn in_future_text(&self, label: &str, timestamp: i64) -> String {
        let age = age_millis(self.now_millis, timestamp).abs();
        format!(
            "{} {} ({}) is {} min {} sec greater than {} ({})",
            label,
            self.clock(timestamp),
            timestamp,
            age / 60_000,
            (age / 1000) % 60,
            self.now_text,
            self.now_millis
        )
    }

    /// Returns the header timestamp, 0 when missing
    fn header(&mut self, feed_message: &FeedMessage, previous: Option<&FeedMessage>) -> i64 {
        let header_timestamp = feed_message.header.timestamp.unwrap_or(0) as i64;

        if header_timestamp == 0 {
            let v2 = is_v2_or_higher(&feed_message.header).unwrap_or_else(|| {
                warn!("Couldn't read header version when checking E048/W001, logging as E048");
                true
            });
            if v2 {
                self.findings.add(E048, "");
            } else {
                self.findings.add(W001, "header");
            }
            return header_timestamp;
        }

        if !is_posix(header_timestamp) {
            self.findings.add(E001, "header.timestamp");
        } else {
            let age = age_millis(self.now_millis, header_timestamp);
            if age > MAX_AGE_SECONDS * 1000 {
                self.findings.add(
                    W008,
                    format!("header.timestamp is {} min {} sec", age / 60_000, (age / 1000) % 60),
                );
            }
            if is_in_future(self.now_millis, header_timestamp, IN_FUTURE_TOLERANCE_SECONDS) {
                let text = self.in_future_text("header.timestamp", header_timestamp);
                self.findings.add(E050, text);
            }
        }

        let previous_timestamp = previous.and_then(|p| p.header.timestamp).unwrap_or(0) as i64;
        if previous_timestamp != 0 {
            let interval = header_timestamp - previous_timestamp;
            if interval == 0 {
                self.findings.add(E017, format!("header.timestamp of {}", header_timestamp));
            } else if interval < 0 {
                self.findings.add(
                    E018,
                    format!(
                        "header.timestamp of {} is less than the header.timestamp of {}",
                        header_timestamp, previous_timestamp
                    ),
                );
            } else if interval > MINIMUM_REFRESH_INTERVAL_SECONDS {
                self.findings.add(
                    W007,
                    format!("{} second interval between consecutive header.timestamps", interval),
                );
            }
        }

        header_timestamp
    }

    /// W001, E012, E001 and E050 for an entity-level timestamp
    fn entity_timestamp(&mut self, id: &str, timestamp: i64, header_timestamp: i64) {
        if timestamp == 0 {
            self.findings.add(W001, id);
            return;
        }
        if header_timestamp != 0 && timestamp > header_timestamp {
            self.findings.add(E012, format!("{} timestamp {}", id, timestamp));
        }
        if !is_posix(timestamp) {
            self.findings.add(E001, format!("{} timestamp {}", id, timestamp));
        } else if is_in_future(self.now_millis, timestamp, IN_FUTURE_TOLERANCE_SECONDS) {
            let text = self.in_future_text(&format!("{} timestamp", id), timestamp);
            self.findings.add(E050, text);
        }
    }

    fn trip_update(&mut self, entity: &FeedEntity, trip_update: &TripUpdate, header_timestamp: i64) {
        let id = trip_id_text(entity, &trip_update.trip);
        self.entity_timestamp(&id, trip_update.timestamp.unwrap_or(0) as i64, header_timestamp);

        let mut previous_arrival: Option<i64> = None;
        let mut previous_departure: Option<i64> = None;

        for update in &trip_update.stop_time_update {
            let stop = format!("{} {}", id, stop_time_update_id_text(update));
            let arrival = update.arrival.as_ref().and_then(|e| e.time);
            let departure = update.departure.as_ref().and_then(|e| e.time);

            if let Some(time) = arrival {
                if !is_posix(time) {
                    self.findings.add(E001, format!("{} arrival_time {}", stop, time));
                }
                self.sequential(&stop, "arrival_time", time, "arrival_time", previous_arrival);
                self.sequential(&stop, "arrival_time", time, "departure_time", previous_departure);
            }

            if let Some(time) = departure {
                if !is_posix(time) {
                    self.findings.add(E001, format!("{} departure_time {}", stop, time));
                }
                self.sequential(&stop, "departure_time", time, "departure_time", previous_departure);
                self.sequential(&stop, "departure_time", time, "arrival_time", previous_arrival);

                if let Some(arrival_time) = arrival.filter(|a| time < *a) {
                    let prefix = format!(
                        "{} departure_time {} ({}) is less than the same stop arrival_time {} ({})",
                        stop,
                        self.clock(time),
                        time,
                        self.clock(arrival_time),
                        arrival_time
                    );
                    self.findings.add(E025, prefix);
                }
            }

            if arrival.is_some() {
                previous_arrival = arrival;
            }
            if departure.is_some() {
                previous_departure = departure;
            }
        }
    }

    /// E022 when a stop's time is not after the previous stop's time
    fn sequential(&mut self, stop: &str, field: &str, time: i64, previous_field: &str, previous: Option<i64>) {
        let Some(previous) = previous else {
            return;
        };
        let relation = if time < previous {
            "less than"
        } else if time == previous {
            "equal to"
        } else {
            return;
        };
        let prefix = format!(
            "{} {} {} ({}) is {} previous stop {} {} ({})",
            stop,
            field,
            self.clock(time),
            time,
            relation,
            previous_field,
            self.clock(previous),
            previous
        );
        self.findings.add(E022, prefix);
    }

    fn vehicle(&mut self, vehicle: &VehiclePosition, header_timestamp: i64) {
        let vehicle_id = vehicle.vehicle.as_ref().and_then(|v| v.id.as_deref()).unwrap_or("");
        let id = format!("vehicle_id {}", vehicle_id);
        self.entity_timestamp(&id, vehicle.timestamp.unwrap_or(0) as i64, header_timestamp);
    }

    fn alert(&mut self, entity: &FeedEntity) {
        let Some(alert) = &entity.alert else {
            return;
        };
        for range in &alert.active_period {
            for (label, value) in [("start", range.start), ("end", range.end)] {
                if let Some(value) = value.filter(|v| !is_posix(*v as i64)) {
                    self.findings.add(
                        E001,
                        format!("alert in entity {} active_period.{} {}", entity.id, label, value),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs::metadata::tests::sample_metadata;
    use crate::realtime::trip_update::{StopTimeEvent, StopTimeUpdate};
    use crate::realtime::{Alert, TimeRange, TripDescriptor, VehicleDescriptor};
    use crate::validation::tests::{count, message, prefixes, NOW_MILLIS, NOW_SECS};

    fn run(feed: &FeedMessage, previous: Option<&FeedMessage>) -> Vec<ErrorListHelperModel> {
        TimestampValidator.validate(NOW_MILLIS, &sample_metadata(), feed, previous, None)
    }

    fn trip_update_entity(timestamp: Option<u64>, updates: Vec<StopTimeUpdate>) -> FeedEntity {
        FeedEntity {
            id: "1".to_string(),
            trip_update: Some(TripUpdate {
                trip: TripDescriptor { trip_id: Some("T1".to_string()), ..Default::default() },
                stop_time_update: updates,
                timestamp,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn update(sequence: u32, arrival: Option<i64>, departure: Option<i64>) -> StopTimeUpdate {
        let event = |time: Option<i64>| time.map(|t| StopTimeEvent { time: Some(t), ..Default::default() });
        StopTimeUpdate {
            stop_sequence: Some(sequence),
            arrival: event(arrival),
            departure: event(departure),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_feed_has_no_errors() {
        let now = NOW_SECS as i64;
        let feed = message(vec![trip_update_entity(
            Some(NOW_SECS),
            vec![update(1, Some(now), Some(now + 30)), update(2, Some(now + 60), Some(now + 90))],
        )]);
        assert!(run(&feed, None).is_empty());
    }

    #[test]
    fn test_missing_header_timestamp() {
        let mut feed = message(vec![]);
        feed.header.timestamp = None;
        assert_eq!(count(&run(&feed, None), &E048), 1);

        feed.header.gtfs_realtime_version = "1.0".to_string();
        assert_eq!(prefixes(&run(&feed, None), &W001), vec!["header"]);
    }

    #[test]
    fn test_header_not_posix_and_old() {
        let mut feed = message(vec![]);
        feed.header.timestamp = Some(NOW_MILLIS as u64);
        assert_eq!(prefixes(&run(&feed, None), &E001), vec!["header.timestamp"]);

        feed.header.timestamp = Some(NOW_SECS - 125);
        assert_eq!(prefixes(&run(&feed, None), &W008), vec!["header.timestamp is 2 min 5 sec"]);
    }

    #[test]
    fn test_header_in_future() {
        let mut feed = message(vec![]);
        feed.header.timestamp = Some(NOW_SECS + 61);
        assert_eq!(count(&run(&feed, None), &E050), 1);

        feed.header.timestamp = Some(NOW_SECS + 60);
        assert_eq!(count(&run(&feed, None), &E050), 0);
    }

    #[test]
    fn test_against_previous_header() {
        let feed = message(vec![]);
        let mut previous = message(vec![]);
        assert_eq!(count(&run(&feed, Some(&previous)), &E017), 1);

        previous.header.timestamp = Some(NOW_SECS + 10);
        assert_eq!(count(&run(&feed, Some(&previous)), &E018), 1);

        previous.header.timestamp = Some(NOW_SECS - 36);
        assert_eq!(
            prefixes(&run(&feed, Some(&previous)), &W007),
            vec!["36 second interval between consecutive header.timestamps"]
        );

        previous.header.timestamp = Some(NOW_SECS - 30);
        assert!(run(&feed, Some(&previous)).is_empty());
    }

    #[test]
    fn test_trip_update_timestamps() {
        let feed = message(vec![trip_update_entity(None, vec![])]);
        assert_eq!(prefixes(&run(&feed, None), &W001), vec!["trip_id T1"]);

        let feed = message(vec![trip_update_entity(Some(NOW_SECS + 5), vec![])]);
        assert_eq!(prefixes(&run(&feed, None), &E012), vec![format!("trip_id T1 timestamp {}", NOW_SECS + 5)]);
    }

    #[test]
    fn test_stop_time_sequence() {
        let now = NOW_SECS as i64;
        let feed = message(vec![trip_update_entity(
            Some(NOW_SECS),
            vec![update(1, Some(now + 60), Some(now + 60)), update(2, Some(now + 30), None)],
        )]);
        let results = run(&feed, None);
        // arrival equals departure at stop 1 is fine; stop 2 arrives before stop 1's arrival and departure
        assert_eq!(count(&results, &E022), 2);
        assert_eq!(count(&results, &E025), 0);
    }

    #[test]
    fn test_departure_before_arrival() {
        let now = NOW_SECS as i64;
        let feed = message(vec![trip_update_entity(Some(NOW_SECS), vec![update(1, Some(now + 60), Some(now + 30))])]);
        let results = run(&feed, None);
        assert_eq!(count(&results, &E025), 1);
        assert!(prefixes(&results, &E025)[0].starts_with("trip_id T1 stop_sequence 1 departure_time"));
    }

    #[test]
    fn test_vehicle_and_alert_timestamps() {
        let vehicle = FeedEntity {
            id: "v".to_string(),
            vehicle: Some(VehiclePosition {
                vehicle: Some(VehicleDescriptor { id: Some("bus1".to_string()), ..Default::default() }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let alert = FeedEntity {
            id: "a".to_string(),
            alert: Some(Alert {
                active_period: vec![TimeRange { start: Some(5), end: Some(NOW_SECS) }],
                ..Default::default()
            }),
            ..Default::default()
        };
        let results = run(&message(vec![vehicle, alert]), None);
        assert_eq!(prefixes(&results, &W001), vec!["vehicle_id bus1"]);
        assert_eq!(prefixes(&results, &E001), vec!["alert in entity a active_period.start 5"]);
    }
}
