//! Rules comparing the TripUpdates and VehiclePositions published for the same GTFS feed.

use std::collections::{BTreeMap, BTreeSet};

use super::rules::{E047, W003};
use super::{FeedEntityValidator, Findings};
use crate::gtfs::GtfsMetadata;
use crate::models::ErrorListHelperModel;
use crate::realtime::FeedMessage;

pub struct CrossFeedDescriptorValidator;

/// trip_id <-> vehicle.id pairings seen in one of the two feed types
#[derive(Debug, Default)]
struct Pairings<'a> {
    trip_to_vehicle: BTreeMap<&'a str, &'a str>,
    vehicle_to_trip: BTreeMap<&'a str, &'a str>,
    count: usize,
}

impl<'a> Pairings<'a> {
    fn insert(&mut self, trip_id: &'a str, vehicle_id: &'a str) {
        self.trip_to_vehicle.insert(trip_id, vehicle_id);
        self.vehicle_to_trip.insert(vehicle_id, trip_id);
    }
}

impl FeedEntityValidator for CrossFeedDescriptorValidator {
    fn name(&self) -> &'static str {
        "CrossFeedDescriptorValidator"
    }

    fn validate(
        &self,
        _current_time_millis: i64,
        gtfs_metadata: &GtfsMetadata,
        _feed_message: &FeedMessage,
        _previous_feed_message: Option<&FeedMessage>,
        combined_feed_message: Option<&FeedMessage>,
    ) -> Vec<ErrorListHelperModel> {
        // Only a combined view of the feeds can be cross-checked
        let Some(combined) = combined_feed_message else {
            return Vec::new();
        };

        let mut trip_updates = Pairings::default();
        let mut trips_without_vehicles = BTreeSet::new();
        let mut vehicle_positions = Pairings::default();
        let mut vehicles_without_trips = BTreeSet::new();

        for entity in &combined.entity {
            if let Some(trip_update) = &entity.trip_update {
                if let Some(trip_id) = trip_update.trip.trip_id.as_deref() {
                    trip_updates.count += 1;
                    match trip_update.vehicle.as_ref().and_then(|v| v.id.as_deref()).filter(|id| !id.is_empty()) {
                        Some(vehicle_id) => trip_updates.insert(trip_id, vehicle_id),
                        None => {
                            trips_without_vehicles.insert(trip_id);
                        }
                    }
                }
            }

            if let Some(vehicle) = &entity.vehicle {
                if let Some(vehicle_id) = vehicle.vehicle.as_ref().and_then(|v| v.id.as_deref()) {
                    vehicle_positions.count += 1;
                    match vehicle.trip.as_ref().and_then(|t| t.trip_id.as_deref()).filter(|id| !id.is_empty()) {
                        Some(trip_id) => vehicle_positions.insert(trip_id, vehicle_id),
                        None => {
                            vehicles_without_trips.insert(vehicle_id);
                        }
                    }
                }
            }
        }

        if trip_updates.count == 0 || vehicle_positions.count == 0 {
            return Vec::new();
        }

        let mut findings = Findings::new();

        for (trip_id, vehicle_id) in &trip_updates.trip_to_vehicle {
            if !vehicle_positions.trip_to_vehicle.contains_key(trip_id) {
                findings.add(W003, format!("trip_id {} is in TripUpdates but not in VehiclePositions feed", trip_id));
            }
            if !vehicle_positions.vehicle_to_trip.contains_key(vehicle_id) && !vehicles_without_trips.contains(vehicle_id) {
                findings.add(W003, format!("vehicle_id {} is in TripUpdates but not in VehiclePositions feed", vehicle_id));
            }
            if let Some(other_vehicle_id) = vehicle_positions.trip_to_vehicle.get(trip_id) {
                if other_vehicle_id != vehicle_id {
                    findings.add(
                        E047,
                        format!(
                            "vehicle_id {} and trip_id {} pairing in TripUpdates does not match vehicle_id {} and trip_id {} pairing in VehiclePositions feed",
                            vehicle_id, trip_id, other_vehicle_id, trip_id
                        ),
                    );
                }
            }
        }

        for (vehicle_id, trip_id) in &vehicle_positions.vehicle_to_trip {
            if !trip_updates.vehicle_to_trip.contains_key(vehicle_id) {
                findings.add(W003, format!("vehicle_id {} is in VehiclePositions but not in TripUpdates feed", vehicle_id));
            }
            if !trip_updates.trip_to_vehicle.contains_key(trip_id) && !trips_without_vehicles.contains(trip_id) {
                findings.add(W003, format!("trip_id {} is in VehiclePositions but not in TripUpdates feed", trip_id));
            }
            if let Some(other_trip_id) = trip_updates.vehicle_to_trip.get(vehicle_id) {
                if other_trip_id != trip_id && !same_block(gtfs_metadata, trip_id, other_trip_id) {
                    findings.add(
                        E047,
                        format!(
                            "trip_id {} and vehicle_id {} pairing in VehiclePositions does not match trip_id {} and vehicle_id {} pairing in TripUpdates feed and trip block_ids aren't the same",
                            trip_id, vehicle_id, other_trip_id, vehicle_id
                        ),
                    );
                }
            }
        }

        for trip_id in &trips_without_vehicles {
            if !vehicle_positions.trip_to_vehicle.contains_key(trip_id) {
                findings.add(W003, format!("trip_id {} is in TripUpdates but not in VehiclePositions feed", trip_id));
            }
        }

        for vehicle_id in &vehicles_without_trips {
            if !trip_updates.vehicle_to_trip.contains_key(vehicle_id) {
                findings.add(W003, format!("vehicle_id {} is in VehiclePositions but not in TripUpdates feed", vehicle_id));
            }
        }

        findings.into_results()
    }
}

/// A vehicle may report the next trip of its block before the trip updates switch over
fn same_block(metadata: &GtfsMetadata, trip_a: &str, trip_b: &str) -> bool {
    let block = |trip_id: &str| {
        metadata
            .trips
            .get(trip_id)
            .and_then(|t| t.block_id.as_deref())
            .filter(|b| !b.is_empty())
    };
    match (block(trip_a), block(trip_b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs::metadata::tests::sample_metadata;
    use crate::realtime::trip_descriptor::ScheduleRelationship;
    use crate::realtime::{FeedEntity, TripDescriptor, TripUpdate, VehicleDescriptor, VehiclePosition};
    use crate::validation::tests::{count, message, prefixes, NOW_MILLIS};

    fn descriptor(trip_id: Option<&str>) -> TripDescriptor {
        TripDescriptor { trip_id: trip_id.map(str::to_string), ..Default::default() }
    }

    fn vehicle_descriptor(vehicle_id: Option<&str>) -> Option<VehicleDescriptor> {
        vehicle_id.map(|id| VehicleDescriptor { id: Some(id.to_string()), ..Default::default() })
    }

    fn trip_update(trip_id: &str, vehicle_id: Option<&str>) -> FeedEntity {
        FeedEntity {
            id: format!("tu-{}", trip_id),
            trip_update: Some(TripUpdate {
                trip: descriptor(Some(trip_id)),
                vehicle: vehicle_descriptor(vehicle_id),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn vehicle(vehicle_id: &str, trip_id: Option<&str>) -> FeedEntity {
        FeedEntity {
            id: format!("vp-{}", vehicle_id),
            vehicle: Some(VehiclePosition {
                trip: trip_id.map(|t| descriptor(Some(t))),
                vehicle: vehicle_descriptor(Some(vehicle_id)),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn run(entities: Vec<FeedEntity>) -> Vec<ErrorListHelperModel> {
        let combined = message(entities);
        CrossFeedDescriptorValidator.validate(NOW_MILLIS, &sample_metadata(), &combined, None, Some(&combined))
    }

    #[test]
    fn test_not_combined_is_skipped() {
        let feed = message(vec![trip_update("T1", Some("bus1"))]);
        assert!(CrossFeedDescriptorValidator.validate(NOW_MILLIS, &sample_metadata(), &feed, None, None).is_empty());
    }

    #[test]
    fn test_matching_pairs_are_valid() {
        assert!(run(vec![trip_update("T1", Some("bus1")), vehicle("bus1", Some("T1"))]).is_empty());
    }

    #[test]
    fn test_one_sided_feed_is_skipped() {
        assert!(run(vec![trip_update("T1", Some("bus1")), trip_update("T2", None)]).is_empty());
    }

    #[test]
    fn test_ids_missing_from_other_feed() {
        let results = run(vec![
            trip_update("T1", Some("bus1")),
            trip_update("T3", None),
            vehicle("bus1", Some("T1")),
            vehicle("bus2", None),
        ]);
        assert_eq!(
            prefixes(&results, &W003),
            vec![
                "trip_id T3 is in TripUpdates but not in VehiclePositions feed",
                "vehicle_id bus2 is in VehiclePositions but not in TripUpdates feed",
            ]
        );
    }

    #[test]
    fn test_pairing_mismatch() {
        // bus1 runs T1 in trip updates but T9 in vehicle positions; T9 has no block
        let results = run(vec![trip_update("T1", Some("bus1")), vehicle("bus1", Some("T9"))]);
        assert_eq!(count(&results, &E047), 1);
        assert!(prefixes(&results, &E047)[0].starts_with("trip_id T9 and vehicle_id bus1 pairing in VehiclePositions"));

        // T1 and T2 share block B1, so the vehicle side is tolerated
        let results = run(vec![trip_update("T1", Some("bus1")), vehicle("bus1", Some("T2"))]);
        assert_eq!(count(&results, &E047), 0);
    }

    #[test]
    fn test_trip_served_by_two_vehicles() {
        let results = run(vec![trip_update("T1", Some("bus1")), vehicle("bus2", Some("T1"))]);
        assert_eq!(
            prefixes(&results, &E047),
            vec!["vehicle_id bus1 and trip_id T1 pairing in TripUpdates does not match vehicle_id bus2 and trip_id T1 pairing in VehiclePositions feed"]
        );
    }

    fn canceled(mut entity: FeedEntity) -> FeedEntity {
        let canceled = Some(ScheduleRelationship::Canceled as i32);
        if let Some(trip_update) = entity.trip_update.as_mut() {
            trip_update.trip.schedule_relationship = canceled;
        }
        if let Some(trip) = entity.vehicle.as_mut().and_then(|v| v.trip.as_mut()) {
            trip.schedule_relationship = canceled;
        }
        entity
    }

    #[test]
    fn test_canceled_trip_paired_in_both_feeds() {
        let results = run(vec![canceled(trip_update("T1", Some("bus1"))), canceled(vehicle("bus1", Some("T1")))]);
        assert!(results.is_empty());
    }

    #[test]
    fn test_canceled_trip_missing_from_vehicle_positions() {
        let results = run(vec![canceled(trip_update("T1", Some("bus1"))), vehicle("bus9", Some("T9"))]);
        assert_eq!(
            prefixes(&results, &W003),
            vec![
                "trip_id T1 is in TripUpdates but not in VehiclePositions feed",
                "vehicle_id bus1 is in TripUpdates but not in VehiclePositions feed",
                "vehicle_id bus9 is in VehiclePositions but not in TripUpdates feed",
                "trip_id T9 is in VehiclePositions but not in TripUpdates feed",
            ]
        );
        assert_eq!(count(&results, &E047), 0);
    }
}
