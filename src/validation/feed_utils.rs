//! Helpers for reading GTFS-realtime messages the way the rules need them.

use crate::realtime::{
    feed_header::Incrementality, trip_descriptor::ScheduleRelationship, trip_update::StopTimeUpdate,
    FeedEntity, FeedHeader, FeedMessage, Position, TripDescriptor, VehicleDescriptor, VehiclePosition,
};

pub const GTFS_RT_V1: &str = "1.0";
pub const GTFS_RT_V2: &str = "2.0";

/// An absent version is treated as valid, as is any published version
pub fn is_valid_version(header: &FeedHeader) -> bool {
    header.gtfs_realtime_version.is_empty()
        || header.gtfs_realtime_version == GTFS_RT_V1
        || header.gtfs_realtime_version == GTFS_RT_V2
}

/// None when the version string isn't a number
pub fn is_v2_or_higher(header: &FeedHeader) -> Option<bool> {
    header
        .gtfs_realtime_version
        .trim()
        .parse::<f32>()
        .ok()
        .map(|version| version >= 2.0)
}

pub fn is_full_dataset(header: &FeedHeader) -> bool {
    header.incrementality.unwrap_or(Incrementality::FullDataset as i32) == Incrementality::FullDataset as i32
}

pub fn schedule_relationship(trip: &TripDescriptor) -> Option<ScheduleRelationship> {
    trip.schedule_relationship.and_then(|v| ScheduleRelationship::try_from(v).ok())
}

pub fn is_added_trip(trip: &TripDescriptor) -> bool {
    schedule_relationship(trip) == Some(ScheduleRelationship::Added)
}

pub fn to_miles_per_hour(meters_per_second: f32) -> f32 {
    meters_per_second * 2.23694
}

pub fn to_miles(meters: f64) -> f64 {
    meters * 0.000621371
}

pub fn is_position_valid(position: &Position) -> bool {
    (-90.0..=90.0).contains(&position.latitude) && (-180.0..=180.0).contains(&position.longitude)
}

pub fn is_bearing_valid(position: &Position) -> bool {
    position.bearing.map_or(true, |bearing| (0.0..=360.0).contains(&bearing))
}

/// `trip_id X`, or `entity ID Y` when the trip has no id
pub fn trip_id_text(entity: &FeedEntity, trip: &TripDescriptor) -> String {
    match &trip.trip_id {
        Some(trip_id) => format!("trip_id {}", trip_id),
        None => format!("entity ID {}", entity.id),
    }
}

/// Same as [`trip_id_text`] for a vehicle that may not carry a trip
pub fn vehicle_trip_id_text(entity: &FeedEntity, vehicle: &VehiclePosition) -> String {
    match &vehicle.trip {
        Some(trip) => trip_id_text(entity, trip),
        None => format!("entity ID {}", entity.id),
    }
}

/// `vehicle.id X`, or `entity ID Y` when the vehicle has no id
pub fn vehicle_id_text(entity: &FeedEntity, vehicle: Option<&VehicleDescriptor>) -> String {
    match vehicle.and_then(|v| v.id.as_ref()) {
        Some(id) => format!("vehicle.id {}", id),
        None => format!("entity ID {}", entity.id),
    }
}

/// `stop_sequence N`, or `stop_id S` when the update has no sequence
pub fn stop_time_update_id_text(update: &StopTimeUpdate) -> String {
    match update.stop_sequence {
        Some(sequence) => format!("stop_sequence {}", sequence),
        None => format!("stop_id {}", update.stop_id.as_deref().unwrap_or("")),
    }
}

/// `trip_id T` for a trip update, `vehicle_id V trip_id T` for a vehicle position
pub fn vehicle_and_trip_id_text(vehicle_id: Option<&str>, trip: &TripDescriptor) -> String {
    let trip_id = trip.trip_id.as_deref().unwrap_or("");
    match vehicle_id {
        Some(vehicle_id) => format!("vehicle_id {} trip_id {}", vehicle_id, trip_id),
        None => format!("trip_id {}", trip_id),
    }
}

/// `route_id R` for a trip update, `vehicle_id V route_id R` for a vehicle position
pub fn vehicle_and_route_id_text(vehicle_id: Option<&str>, trip: &TripDescriptor) -> String {
    let route_id = trip.route_id.as_deref().unwrap_or("");
    match vehicle_id {
        Some(vehicle_id) => format!("vehicle_id {} route_id {}", vehicle_id, route_id),
        None => format!("route_id {}", route_id),
    }
}

/// True when the message carries more than one kind of entity
pub fn is_combined_feed(message: &FeedMessage) -> bool {
    let has_trip_updates = message.entity.iter().any(|e| e.trip_update.is_some());
    let has_vehicles = message.entity.iter().any(|e| e.vehicle.is_some());
    let has_alerts = message.entity.iter().any(|e| e.alert.is_some());
    [has_trip_updates, has_vehicles, has_alerts].iter().filter(|found| **found).count() > 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::{Alert, TripUpdate};

    fn header(version: &str) -> FeedHeader {
        FeedHeader { gtfs_realtime_version: version.to_string(), ..Default::default() }
    }

    #[test]
    fn test_versions() {
        assert!(is_valid_version(&header("1.0")));
        assert!(is_valid_version(&header("2.0")));
        assert!(is_valid_version(&header("")));
        assert!(!is_valid_version(&header("3.0")));
        assert_eq!(is_v2_or_higher(&header("2.0")), Some(true));
        assert_eq!(is_v2_or_higher(&header("1.0")), Some(false));
        assert_eq!(is_v2_or_higher(&header("abc")), None);
    }

    #[test]
    fn test_combined_feed_detection() {
        let trip_update = FeedEntity { id: "1".into(), trip_update: Some(TripUpdate::default()), ..Default::default() };
        let alert = FeedEntity { id: "2".into(), alert: Some(Alert::default()), ..Default::default() };

        let single = FeedMessage { header: header("2.0"), entity: vec![trip_update.clone(), trip_update.clone()] };
        assert!(!is_combined_feed(&single));

        let mixed = FeedMessage { header: header("2.0"), entity: vec![trip_update, alert] };
        assert!(is_combined_feed(&mixed));
    }

    #[test]
    fn test_id_text() {
        let entity = FeedEntity { id: "e1".into(), ..Default::default() };
        let trip = TripDescriptor { trip_id: Some("T1".into()), ..Default::default() };
        assert_eq!(trip_id_text(&entity, &trip), "trip_id T1");
        assert_eq!(trip_id_text(&entity, &TripDescriptor::default()), "entity ID e1");
        assert_eq!(vehicle_id_text(&entity, None), "entity ID e1");
        assert_eq!(vehicle_and_trip_id_text(Some("bus"), &trip), "vehicle_id bus trip_id T1");
        assert_eq!(vehicle_and_trip_id_text(None, &trip), "trip_id T1");

        let update = StopTimeUpdate { stop_id: Some("A".into()), ..Default::default() };
        assert_eq!(stop_time_update_id_text(&update), "stop_id A");
    }

    #[test]
    fn test_position_checks() {
        let mut position = Position { latitude: 28.0, longitude: -82.0, ..Default::default() };
        assert!(is_position_valid(&position));
        assert!(is_bearing_valid(&position));
        position.bearing = Some(361.0);
        assert!(!is_bearing_valid(&position));
        position.latitude = 91.0;
        assert!(!is_position_valid(&position));
    }
}
