use std::collections::HashSet;

use super::feed_utils::{is_bearing_valid, is_position_valid, to_miles, to_miles_per_hour, trip_id_text, vehicle_id_text};
use super::rules::{E026, E027, E028, E029, E052, W002, W004};
use super::{FeedEntityValidator, Findings};
use crate::gtfs::metadata::{REGION_BUFFER_METERS, TRIP_BUFFER_METERS};
use crate::gtfs::GtfsMetadata;
use crate::models::ErrorListHelperModel;
use crate::realtime::alert::Effect;
use crate::realtime::{FeedEntity, FeedMessage, Position, VehiclePosition};

/// Roughly 60 miles per hour
pub const MAX_REALISTIC_SPEED_METERS_PER_SECOND: f32 = 26.0;

/// Vehicle ids, speeds and positions
pub struct VehicleValidator;

impl FeedEntityValidator for VehicleValidator {
    fn name(&self) -> &'static str {
        "VehicleValidator"
    }

    fn validate(
        &self,
        _current_time_millis: i64,
        gtfs_metadata: &GtfsMetadata,
        feed_message: &FeedMessage,
        _previous_feed_message: Option<&FeedMessage>,
        _combined_feed_message: Option<&FeedMessage>,
    ) -> Vec<ErrorListHelperModel> {
        let mut findings = Findings::new();
        let mut vehicle_ids = HashSet::new();

        for entity in &feed_message.entity {
            if let Some(trip_update) = &entity.trip_update {
                if trip_update.vehicle.as_ref().and_then(|v| v.id.as_deref()).map_or(true, str::is_empty) {
                    findings.add(W002, trip_id_text(entity, &trip_update.trip));
                }
            }

            let Some(vehicle) = &entity.vehicle else {
                continue;
            };

            match vehicle.vehicle.as_ref().and_then(|v| v.id.as_deref()).filter(|id| !id.is_empty()) {
                None => findings.add(W002, format!("entity ID {}", entity.id)),
                Some(vehicle_id) => {
                    if !vehicle_ids.insert(vehicle_id) {
                        findings.add(E052, format!("entity ID {} has vehicle.id {}", entity.id, vehicle_id));
                    }
                }
            }

            let Some(position) = &vehicle.position else {
                continue;
            };
            let id = vehicle_id_text(entity, vehicle.vehicle.as_ref());

            if let Some(speed) = position.speed {
                // a NaN speed is not reported
                if speed < 0.0 || speed > MAX_REALISTIC_SPEED_METERS_PER_SECOND {
                    findings.add(
                        W004,
                        format!("{} speed of {} m/s ({:.2} mph)", id, speed, to_miles_per_hour(speed)),
                    );
                }
            }

            if !is_position_valid(position) {
                findings.add(
                    E026,
                    format!("{} has latitude/longitude of ({},{})", id, position.latitude, position.longitude),
                );
            } else if within_coverage_area(&mut findings, gtfs_metadata, &id, position) {
                check_trip_shape(&mut findings, gtfs_metadata, feed_message, &id, vehicle, position);
            }

            if !is_bearing_valid(position) {
                findings.add(E027, format!("{} has bearing of {}", id, position.bearing.unwrap_or_default()));
            }
        }

        findings.into_results()
    }
}

/// E028, using the shapes.txt area when present and stops.txt otherwise
fn within_coverage_area(findings: &mut Findings, metadata: &GtfsMetadata, id: &str, position: &Position) -> bool {
    let (bounds, source) = match metadata.shape_bounding_box_with_buffer {
        Some(bounds) => (Some(bounds), "shapes.txt"),
        None => (metadata.stop_bounding_box_with_buffer, "stops.txt"),
    };
    let Some(bounds) = bounds else {
        return true;
    };

    let inside = bounds.contains(position.latitude as f64, position.longitude as f64);
    if !inside {
        findings.add(
            E028,
            format!(
                "{} at ({},{}) is more than {} meters ({:.2} mile(s)) outside entire GTFS {} coverage area",
                id,
                position.latitude,
                position.longitude,
                REGION_BUFFER_METERS,
                to_miles(REGION_BUFFER_METERS),
                source
            ),
        );
    }
    inside
}

/// E029, skipped for trips without a shape or on a detour
fn check_trip_shape(
    findings: &mut Findings,
    metadata: &GtfsMetadata,
    feed_message: &FeedMessage,
    id: &str,
    vehicle: &VehiclePosition,
    position: &Position,
) {
    let Some(trip_id) = vehicle.trip.as_ref().and_then(|t| t.trip_id.as_deref()) else {
        return;
    };
    let near = metadata.is_near_trip_shape(trip_id, position.latitude as f64, position.longitude as f64);
    if near != Some(false) {
        return;
    }

    let route_id = vehicle
        .trip
        .as_ref()
        .and_then(|t| t.route_id.as_deref())
        .or_else(|| metadata.trip_route_id(trip_id));
    if has_detour_alert(&feed_message.entity, trip_id, route_id) {
        return;
    }

    findings.add(
        E029,
        format!(
            "{} trip_id {} at ({},{}) is more than {} meters ({:.2} mile(s)) from the GTFS trip shape",
            id,
            trip_id,
            position.latitude,
            position.longitude,
            TRIP_BUFFER_METERS,
            to_miles(TRIP_BUFFER_METERS)
        ),
    );
}

fn has_detour_alert(entities: &[FeedEntity], trip_id: &str, route_id: Option<&str>) -> bool {
    entities
        .iter()
        .filter_map(|e| e.alert.as_ref())
        .filter(|alert| alert.effect == Some(Effect::Detour as i32))
        .flat_map(|alert| alert.informed_entity.iter())
        .any(|selector| {
            let trip = selector.trip.as_ref();
            let names_trip = trip.and_then(|t| t.trip_id.as_deref()) == Some(trip_id);
            let selector_route = trip.and_then(|t| t.route_id.as_deref()).or(selector.route_id.as_deref());
            names_trip || (route_id.is_some() && selector_route == route_id)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs::metadata::tests::sample_metadata;
    use crate::realtime::{Alert, EntitySelector, TripDescriptor, TripUpdate, VehicleDescriptor};
    use crate::validation::tests::{count, message, prefixes, NOW_MILLIS};

    fn run(entities: Vec<FeedEntity>) -> Vec<ErrorListHelperModel> {
        VehicleValidator.validate(NOW_MILLIS, &sample_metadata(), &message(entities), None, None)
    }

    fn vehicle(entity_id: &str, vehicle_id: Option<&str>, lat: f32, lon: f32) -> FeedEntity {
        FeedEntity {
            id: entity_id.to_string(),
            vehicle: Some(VehiclePosition {
                trip: Some(TripDescriptor { trip_id: Some("T1".to_string()), ..Default::default() }),
                vehicle: vehicle_id.map(|id| VehicleDescriptor { id: Some(id.to_string()), ..Default::default() }),
                position: Some(Position { latitude: lat, longitude: lon, ..Default::default() }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_vehicle_on_shape_is_valid() {
        assert!(run(vec![vehicle("1", Some("bus1"), 28.015, -82.0)]).is_empty());
    }

    #[test]
    fn test_missing_and_duplicate_vehicle_ids() {
        let trip_update = FeedEntity {
            id: "tu".to_string(),
            trip_update: Some(TripUpdate {
                trip: TripDescriptor { trip_id: Some("T1".to_string()), ..Default::default() },
                ..Default::default()
            }),
            ..Default::default()
        };
        let results = run(vec![
            trip_update,
            vehicle("1", None, 28.015, -82.0),
            vehicle("2", Some("bus1"), 28.015, -82.0),
            vehicle("3", Some("bus1"), 28.015, -82.0),
        ]);
        assert_eq!(prefixes(&results, &W002), vec!["trip_id T1", "entity ID 1"]);
        assert_eq!(prefixes(&results, &E052), vec!["entity ID 3 has vehicle.id bus1"]);
    }

    #[test]
    fn test_unrealistic_speed_and_bearing() {
        let mut entity = vehicle("1", Some("bus1"), 28.015, -82.0);
        if let Some(position) = entity.vehicle.as_mut().and_then(|v| v.position.as_mut()) {
            position.speed = Some(30.0);
            position.bearing = Some(400.0);
        }
        let results = run(vec![entity]);
        assert_eq!(prefixes(&results, &W004), vec!["vehicle.id bus1 speed of 30 m/s (67.11 mph)"]);
        assert_eq!(prefixes(&results, &E027), vec!["vehicle.id bus1 has bearing of 400"]);
    }

    #[test]
    fn test_speed_bounds() {
        let with_speed = |speed: f32| {
            let mut entity = vehicle("1", Some("bus1"), 28.015, -82.0);
            if let Some(position) = entity.vehicle.as_mut().and_then(|v| v.position.as_mut()) {
                position.speed = Some(speed);
            }
            count(&run(vec![entity]), &W004)
        };
        assert_eq!(with_speed(-1.0), 1);
        assert_eq!(with_speed(0.0), 0);
        assert_eq!(with_speed(26.0), 0);
        // NaN compares false both ways
        assert_eq!(with_speed(f32::NAN), 0);
    }

    #[test]
    fn test_invalid_and_distant_positions() {
        let results = run(vec![vehicle("1", Some("bus1"), 95.0, -82.0)]);
        assert_eq!(count(&results, &E026), 1);
        assert_eq!(count(&results, &E028), 0);

        let results = run(vec![vehicle("1", Some("bus1"), 40.0, -74.0)]);
        assert_eq!(count(&results, &E028), 1);
        assert!(prefixes(&results, &E028)[0].ends_with("outside entire GTFS shapes.txt coverage area"));
        // E029 is only checked inside the coverage area
        assert_eq!(count(&results, &E029), 0);
    }

    #[test]
    fn test_off_shape_unless_detour() {
        // ~500 m east of the shape but inside the buffered coverage area
        let off_shape = vehicle("1", Some("bus1"), 28.015, -81.995);
        let results = run(vec![off_shape.clone()]);
        assert_eq!(count(&results, &E029), 1);

        let detour = FeedEntity {
            id: "a".to_string(),
            alert: Some(Alert {
                effect: Some(Effect::Detour as i32),
                informed_entity: vec![EntitySelector { route_id: Some("R1".to_string()), ..Default::default() }],
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(count(&run(vec![off_shape, detour]), &E029), 0);
    }
}
