use super::feed_utils::schedule_relationship;
use super::rules::{E006, E013, W005};
use super::{FeedEntityValidator, Findings};
use crate::gtfs::GtfsMetadata;
use crate::models::ErrorListHelperModel;
use crate::realtime::trip_descriptor::ScheduleRelationship;
use crate::realtime::{FeedMessage, TripDescriptor};

/// Rules for frequency-based trips that don't run on exact times (`exact_times = 0`)
pub struct FrequencyTypeZeroValidator;

impl FeedEntityValidator for FrequencyTypeZeroValidator {
    fn name(&self) -> &'static str {
        "FrequencyTypeZeroValidator"
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
        let is_frequency_trip = |trip: &TripDescriptor| {
            trip.trip_id.as_ref().is_some_and(|id| gtfs_metadata.exact_times_zero_trip_ids.contains(id))
        };

        for entity in &feed_message.entity {
            if let Some(trip_update) = entity.trip_update.as_ref().filter(|tu| is_frequency_trip(&tu.trip)) {
                let label = format!("trip_id {}", trip_update.trip.trip_id.as_deref().unwrap_or(""));
                check_descriptor(&mut findings, &label, &trip_update.trip);
                if trip_update.vehicle.as_ref().and_then(|v| v.id.as_ref()).is_none() {
                    findings.add(W005, label);
                }
            }

            if let Some(vehicle) = &entity.vehicle {
                let Some(trip) = vehicle.trip.as_ref().filter(|t| is_frequency_trip(t)) else {
                    continue;
                };
                let trip_id = trip.trip_id.as_deref().unwrap_or("");
                let vehicle_id = vehicle.vehicle.as_ref().and_then(|v| v.id.as_deref());
                let label = format!("vehicle_id {} trip_id {}", vehicle_id.unwrap_or(""), trip_id);
                check_descriptor(&mut findings, &label, trip);
                if vehicle_id.is_none() {
                    findings.add(W005, format!("entity ID {} with trip_id {}", entity.id, trip_id));
                }
            }
        }

        findings.into_results()
    }
}

fn check_descriptor(findings: &mut Findings, label: &str, trip: &TripDescriptor) {
    if trip.start_date.is_none() {
        findings.add(E006, format!("{} is missing start_date", label));
    }
    if trip.start_time.is_none() {
        findings.add(E006, format!("{} is missing start_time", label));
    }
    if let Some(relationship) = trip.schedule_relationship {
        if schedule_relationship(trip) != Some(ScheduleRelationship::Unscheduled) {
            let name = ScheduleRelationship::try_from(relationship)
                .map(|r| r.as_str_name().to_string())
                .unwrap_or_else(|_| relationship.to_string());
            findings.add(E013, format!("{} schedule_relationship {}", label, name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs::metadata::tests::sample_metadata;
    use crate::realtime::{FeedEntity, TripUpdate, VehicleDescriptor, VehiclePosition};
    use crate::validation::tests::{count, message, prefixes, NOW_MILLIS};

    fn metadata() -> GtfsMetadata {
        let mut metadata = sample_metadata();
        metadata.exact_times_zero_trip_ids.insert("T1".to_string());
        metadata
    }

    fn trip(schedule_relationship: Option<ScheduleRelationship>) -> TripDescriptor {
        TripDescriptor {
            trip_id: Some("T1".to_string()),
            start_date: Some("20170101".to_string()),
            start_time: Some("08:00:00".to_string()),
            schedule_relationship: schedule_relationship.map(|r| r as i32),
            ..Default::default()
        }
    }

    fn trip_update(trip: TripDescriptor, vehicle_id: Option<&str>) -> FeedEntity {
        FeedEntity {
            id: "1".to_string(),
            trip_update: Some(TripUpdate {
                trip,
                vehicle: vehicle_id.map(|id| VehicleDescriptor { id: Some(id.to_string()), ..Default::default() }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn run(entities: Vec<FeedEntity>) -> Vec<ErrorListHelperModel> {
        FrequencyTypeZeroValidator.validate(NOW_MILLIS, &metadata(), &message(entities), None, None)
    }

    #[test]
    fn test_complete_unscheduled_trip_is_valid() {
        assert!(run(vec![trip_update(trip(Some(ScheduleRelationship::Unscheduled)), Some("bus1"))]).is_empty());
        assert!(run(vec![trip_update(trip(None), Some("bus1"))]).is_empty());
    }

    #[test]
    fn test_missing_fields() {
        let mut incomplete = trip(Some(ScheduleRelationship::Scheduled));
        incomplete.start_date = None;
        incomplete.start_time = None;
        let results = run(vec![trip_update(incomplete, None)]);
        assert_eq!(
            prefixes(&results, &E006),
            vec!["trip_id T1 is missing start_date", "trip_id T1 is missing start_time"]
        );
        assert_eq!(prefixes(&results, &E013), vec!["trip_id T1 schedule_relationship SCHEDULED"]);
        assert_eq!(prefixes(&results, &W005), vec!["trip_id T1"]);
    }

    #[test]
    fn test_vehicle_without_id() {
        let entity = FeedEntity {
            id: "v1".to_string(),
            vehicle: Some(VehiclePosition { trip: Some(trip(None)), ..Default::default() }),
            ..Default::default()
        };
        let results = run(vec![entity]);
        assert_eq!(prefixes(&results, &W005), vec!["entity ID v1 with trip_id T1"]);
    }

    #[test]
    fn test_other_trips_are_ignored() {
        let mut other = trip(Some(ScheduleRelationship::Scheduled));
        other.trip_id = Some("T2".to_string());
        assert_eq!(count(&run(vec![trip_update(other, None)]), &E013), 0);
    }
}
