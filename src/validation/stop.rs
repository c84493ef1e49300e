use super::rules::{E011, E015};
use super::{FeedEntityValidator, Findings};
use crate::gtfs::GtfsMetadata;
use crate::models::ErrorListHelperModel;
use crate::realtime::FeedMessage;

/// stop_id references: E011 (unknown stop) and E015 (not a stop platform)
pub struct StopValidator;

impl FeedEntityValidator for StopValidator {
    fn name(&self) -> &'static str {
        "StopValidator"
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

        let check_stop =|findings: &mut Findings, stop_id: &str, prefix: String, check_location_type: bool| {
            if !gtfs_metadata.stop_ids.contains(stop_id) {
                findings.add(E011, prefix.clone());
            }
            if check_location_type {
                if let Some(location_type) = gtfs_metadata.stop_location_types.get(stop_id).filter(|t| **t != 0) {
                    findings.add(E015, format!("{} location_type {}", prefix, location_type));
                }
            }
        };

        for entity in &feed_message.entity {
            if let Some(trip_update) = &entity.trip_update {
                let trip_id = trip_update.trip.trip_id.as_deref().unwrap_or("");
                for update in &trip_update.stop_time_update {
                    if let Some(stop_id) = &update.stop_id {
                        check_stop(&mut findings, stop_id, format!("trip_id {} stop_id {}", trip_id, stop_id), true);
                    }
                }
            }

            if let Some(vehicle) = &entity.vehicle {
                if let Some(stop_id) = &vehicle.stop_id {
                    let prefix = match vehicle.vehicle.as_ref().and_then(|v| v.id.as_ref()) {
                        Some(vehicle_id) => format!("vehicle_id {} stop_id {}", vehicle_id, stop_id),
                        None => format!("stop_id {}", stop_id),
                    };
                    check_stop(&mut findings, stop_id, prefix, true);
                }
            }

            if let Some(alert) = &entity.alert {
                for selector in &alert.informed_entity {
                    if let Some(stop_id) = &selector.stop_id {
                        let prefix = format!("alert entity ID {} stop_id {}", entity.id, stop_id);
                        check_stop(&mut findings, stop_id, prefix, false);
                    }
                }
            }
        }

        findings.into_results()
    }
}
