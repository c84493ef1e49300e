//! Trip descriptor rules for trip updates, vehicle positions and alert selectors.

use super::feed_utils::{
    is_added_trip, stop_time_update_id_text, trip_id_text, vehicle_and_route_id_text, vehicle_and_trip_id_text,
};
use super::rules::{
    E003, E004, E016, E020, E021, E023, E024, E030, E031, E032, E033, E034, E035, W006, W009,
};
use super::time::{is_valid_date_format, is_valid_time_format, seconds_after_midnight_to_clock};
use super::{FeedEntityValidator, Findings};
use crate::gtfs::GtfsMetadata;
use crate::models::ErrorListHelperModel;
use crate::realtime::{EntitySelector, FeedEntity, FeedMessage, TripDescriptor};

pub struct TripDescriptorValidator;

impl FeedEntityValidator for TripDescriptorValidator {
    fn name(&self) -> &'static str {
        "TripDescriptorValidator"
    }

    fn validate(
        &self,
        _current_time_millis: i64,
        gtfs_metadata: &GtfsMetadata,
        feed_message: &FeedMessage,
        _previous_feed_message: Option<&FeedMessage>,
        _combined_feed_message: Option<&FeedMessage>,
    ) -> Vec<ErrorListHelperModel> {
        let mut check = TripCheck { findings: Findings::new(), metadata: gtfs_metadata };

        for entity in &feed_message.entity {
            if let Some(trip_update) = &entity.trip_update {
                check.descriptor(entity, &trip_update.trip, None);

                // One W009 per trip is enough to point at the problem
                if let Some(update) = trip_update.stop_time_update.iter().find(|u| u.schedule_relationship.is_none()) {
                    check.findings.add(
                        W009,
                        format!(
                            "{} {} (and potentially more for this trip)",
                            trip_id_text(entity, &trip_update.trip),
                            stop_time_update_id_text(update)
                        ),
                    );
                }
                check.w009(entity, &trip_update.trip);
            }

            if let Some(vehicle) = &entity.vehicle {
                if let Some(trip) = &vehicle.trip {
                    let vehicle_id = vehicle.vehicle.as_ref().and_then(|v| v.id.as_deref()).unwrap_or("");
                    check.descriptor(entity, trip, Some(vehicle_id));
                    check.w009(entity, trip);
                }
            }

            if let Some(alert) = &entity.alert {
                if alert.informed_entity.is_empty() {
                    check.findings.add(E032, format!("alert ID {} does not have an informed_entity", entity.id));
                }
                for selector in &alert.informed_entity {
                    check.selector(entity, selector);
                }
            }
        }

        check.findings.into_results()
    }
}

struct TripCheck<'a> {
    findings: Findings,
    metadata: &'a GtfsMetadata,
}

impl TripCheck<'_> {
    /// Rules shared by trip updates and vehicle positions. `vehicle_id` is set for vehicles.
    fn descriptor(&mut self, entity: &FeedEntity, trip: &TripDescriptor, vehicle_id: Option<&str>) {
        match trip.trip_id.as_deref() {
            None => self.findings.add(W006, format!("entity ID {}", entity.id)),
            Some("") => {}
            Some(trip_id) => {
                let label = match vehicle_id {
                    Some(vehicle_id) => format!("vehicle_id {} trip_id {}", vehicle_id, trip_id),
                    None => trip_id_text(entity, trip),
                };
                if !self.metadata.trips.contains_key(trip_id) {
                    if !is_added_trip(trip) {
                        self.findings.add(E003, label);
                    }
                } else {
                    if is_added_trip(trip) {
                        self.findings.add(E016, label);
                    }
                    if let Some(start_time) = &trip.start_time {
                        self.e023(trip_id, start_time, vehicle_id, trip);
                    }
                }
            }
        }

        if let Some(start_time) = &trip.start_time {
            if !is_valid_time_format(start_time) {
                self.findings.add(
                    E020,
                    format!("{} start_time is {}", vehicle_and_trip_id_text(vehicle_id, trip), start_time),
                );
            }
        }
        if let Some(start_date) = &trip.start_date {
            if !is_valid_date_format(start_date) {
                self.findings.add(
                    E021,
                    format!("{} start_date is {}", vehicle_and_trip_id_text(vehicle_id, trip), start_date),
                );
            }
        }
        if let Some(route_id) = trip.route_id.as_deref().filter(|r| !r.is_empty()) {
            if !self.metadata.route_ids.contains(route_id) {
                self.findings.add(E004, vehicle_and_route_id_text(vehicle_id, trip));
            }
        }
        self.e024(trip, vehicle_id);
        self.e035(entity, trip);
    }

    /// start_time of a non-frequency trip must match the first GTFS arrival
    fn e023(&mut self, trip_id: &str, start_time: &str, vehicle_id: Option<&str>, trip: &TripDescriptor) {
        if self.metadata.exact_times_zero_trip_ids.contains(trip_id)
            || self.metadata.exact_times_one_trips.contains_key(trip_id)
        {
            return;
        }
        let first_arrival = self
            .metadata
            .trip_stop_times
            .get(trip_id)
            .and_then(|stop_times| stop_times.first())
            .and_then(|first| first.arrival_time);
        let Some(first_arrival) = first_arrival else {
            return;
        };
        let formatted = seconds_after_midnight_to_clock(first_arrival);
        if start_time != formatted {
            self.findings.add(
                E023,
                format!(
                    "GTFS-rt {} start_time is {} and GTFS initial arrival_time is {}",
                    vehicle_and_trip_id_text(vehicle_id, trip),
                    start_time,
                    formatted
                ),
            );
        }
    }

    fn e024(&mut self, trip: &TripDescriptor, vehicle_id: Option<&str>) {
        let Some(direction_id) = trip.direction_id else {
            return;
        };
        let Some(gtfs_trip) = trip.trip_id.as_deref().and_then(|t| self.metadata.trips.get(t)) else {
            return;
        };
        if gtfs_trip.direction_id != Some(direction_id) {
            let gtfs_direction = gtfs_trip.direction_id.map_or_else(|| "empty".to_string(), |d| d.to_string());
            self.findings.add(
                E024,
                format!(
                    "GTFS-rt {} trip.direction_id is {} but GTFS trip.direction_id is {}",
                    vehicle_and_trip_id_text(vehicle_id, trip),
                    direction_id,
                    gtfs_direction
                ),
            );
        }
    }

    /// trip_id and route_id both known to GTFS but not to each other
    fn e035(&mut self, entity: &FeedEntity, trip: &TripDescriptor) {
        let (Some(trip_id), Some(route_id)) = (trip.trip_id.as_deref(), trip.route_id.as_deref()) else {
            return;
        };
        if !self.metadata.route_ids.contains(route_id) {
            return;
        }
        let Some(gtfs_route_id) = self.metadata.trip_route_id(trip_id) else {
            return;
        };
        if gtfs_route_id != route_id {
            self.findings.add(
                E035,
                format!(
                    "GTFS-rt entity ID {} trip_id {} has route_id {} but belongs to GTFS route_id {}",
                    entity.id, trip_id, route_id, gtfs_route_id
                ),
            );
        }
    }

    fn w009(&mut self, entity: &FeedEntity, trip: &TripDescriptor) {
        if trip.schedule_relationship.is_none() {
            self.findings.add(W009, trip_id_text(entity, trip));
        }
    }

    fn selector(&mut self, entity: &FeedEntity, selector: &EntitySelector) {
        let references_nothing = selector.agency_id.is_none()
            && selector.route_id.is_none()
            && selector.route_type.is_none()
            && selector.stop_id.is_none()
            && selector.trip.as_ref().map_or(true, |t| t.trip_id.is_none() && t.route_id.is_none());
        if references_nothing {
            self.findings.add(
                E033,
                format!(
                    "alert ID {} informed_entity and informed_entity.trip do not not reference any agency, route, trip, or stop",
                    entity.id
                ),
            );
        }

        if let Some(agency_id) = &selector.agency_id {
            if !self.metadata.agency_ids.contains(agency_id) {
                self.findings.add(E034, format!("alert ID {} agency_id {}", entity.id, agency_id));
            }
        }

        if let Some(route_id) = selector.route_id.as_deref().filter(|r| !r.is_empty()) {
            if !self.metadata.route_ids.contains(route_id) {
                self.findings.add(E004, format!("alert ID {} route_id {}", entity.id, route_id));
            }
        }

        let Some(trip) = &selector.trip else {
            return;
        };
        self.e035(entity, trip);

        if let Some(route_id) = &selector.route_id {
            if let Some(trip_id) = &trip.trip_id {
                if let Some(gtfs_route_id) = self.metadata.trip_route_id(trip_id).filter(|r| *r != route_id.as_str()) {
                    self.findings.add(
                        E030,
                        format!(
                            "alert ID {} informed_entity.trip.trip_id {} does not belong to informed_entity.route_id {} (GTFS says it belongs to route_id {})",
                            entity.id, trip_id, route_id, gtfs_route_id
                        ),
                    );
                }
            }
            if let Some(trip_route_id) = trip.route_id.as_ref().filter(|r| *r != route_id) {
                self.findings.add(
                    E031,
                    format!(
                        "alert ID {} informed_entity.route_id {} does not equal informed_entity.trip.route_id {}",
                        entity.id, route_id, trip_route_id
                    ),
                );
            }
        }

        match trip.trip_id.as_deref() {
            None => self.findings.add(W006, format!("entity ID {}", entity.id)),
            Some(trip_id) if !trip_id.is_empty() => {
                let known = self.metadata.trips.contains_key(trip_id);
                if !known && !is_added_trip(trip) {
                    self.findings.add(E003, format!("alert ID {} trip_id {}", entity.id, trip_id));
                } else if known && is_added_trip(trip) {
                    self.findings.add(E016, format!("alert ID {} trip_id {}", entity.id, trip_id));
                }
            }
            Some(_) => {}
        }
        self.w009(entity, trip);
    }
}
