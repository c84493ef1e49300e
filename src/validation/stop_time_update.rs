use super::feed_utils::{schedule_relationship, stop_time_update_id_text, trip_id_text};
use super::rules::{E002, E009, E036, E037, E040, E041, E042, E043, E044, E045, E046, E051};
use super::{FeedEntityValidator, Findings};
use crate::gtfs::{GtfsMetadata, StopTime};
use crate::models::ErrorListHelperModel;
use crate::realtime::trip_descriptor::ScheduleRelationship as TripScheduleRelationship;
use crate::realtime::trip_update::stop_time_update::ScheduleRelationship;
use crate::realtime::trip_update::{StopTimeEvent, StopTimeUpdate};
use crate::realtime::{FeedEntity, FeedMessage, TripUpdate};

/// Checks stop_time_updates against each other and against GTFS stop_times.txt
pub struct StopTimeUpdateValidator;

impl FeedEntityValidator for StopTimeUpdateValidator {
    fn name(&self) -> &'static str {
        "StopTimeUpdateValidator"
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
        for entity in &feed_message.entity {
            if let Some(trip_update) = &entity.trip_update {
                check_trip_update(&mut findings, gtfs_metadata, entity, trip_update);
            }
        }
        findings.into_results()
    }
}

/// Formats a list the way occurrence prefixes show them, e.g. `[1, 2, 3]`
pub(crate) fn list_text<T: ToString>(items: &[T]) -> String {
    let items: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("[{}]", items.join(", "))
}

fn stop_relationship(update: &StopTimeUpdate) -> Option<ScheduleRelationship> {
    update.schedule_relationship.and_then(|v| ScheduleRelationship::try_from(v).ok())
}

fn check_trip_update(findings: &mut Findings, metadata: &GtfsMetadata, entity: &FeedEntity, trip_update: &TripUpdate) {
    let id = trip_id_text(entity, &trip_update.trip);

    if trip_update.stop_time_update.is_empty()
        && schedule_relationship(&trip_update.trip) != Some(TripScheduleRelationship::Canceled)
    {
        findings.add(E041, id.clone());
    }

    let trip_id = trip_update.trip.trip_id.as_deref();
    let gtfs_stop_times: Option<&Vec<StopTime>> = trip_id.and_then(|t| metadata.trip_stop_times.get(t));
    let multi_stops = trip_id.and_then(|t| metadata.trips_with_multi_stops.get(t));
    let mut gtfs_index = 0;

    let mut rt_stop_sequences: Vec<u32> = Vec::new();
    let mut rt_stop_ids: Vec<String> = Vec::new();
    let mut previous_sequence: Option<u32> = None;
    let mut previous_stop_id: Option<&str> = None;
    let mut found_e009 = false;
    let mut added_sequence_from_stop_id = false;

    for update in &trip_update.stop_time_update {
        if let (false, Some(stop_ids), None) = (found_e009, multi_stops, update.stop_sequence) {
            findings.add(
                E009,
                format!("trip_id {} visits stop_id {}", trip_id.unwrap_or_default(), list_text(stop_ids)),
            );
            found_e009 = true;
        }

        if let (Some(previous), Some(current)) = (previous_sequence, update.stop_sequence) {
            if previous == current {
                findings.add(E036, format!("{} has repeating stop_sequence {}", id, previous));
            }
        }
        if let (Some(previous), Some(current)) = (previous_stop_id, update.stop_id.as_deref()) {
            if !previous.is_empty() && previous == current {
                let mut prefix = format!("{} has repeating stop_id {}", id, previous);
                if let Some(sequence) = update.stop_sequence {
                    prefix.push_str(&format!(" at stop_sequence {}", sequence));
                }
                findings.add(E037, prefix);
            }
        }
        previous_sequence = update.stop_sequence;
        previous_stop_id = update.stop_id.as_deref();

        if let Some(sequence) = update.stop_sequence {
            rt_stop_sequences.push(sequence);
        }
        if let Some(stop_id) = &update.stop_id {
            rt_stop_ids.push(stop_id.clone());
        }

        let mut unknown_stop_sequence = false;
        if let Some(stop_times) = gtfs_stop_times {
            // Resume the walk through stop_times.txt where the last update matched
            while gtfs_index < stop_times.len() {
                let gtfs_stop_time = &stop_times[gtfs_index];
                let found_sequence = update.stop_sequence == Some(gtfs_stop_time.stop_sequence);
                let found_stop_id = update.stop_id.as_deref() == Some(gtfs_stop_time.stop_id.as_str());

                if found_sequence {
                    check_e045(findings, &id, update, gtfs_stop_time);
                    check_e046(findings, &id, update, gtfs_stop_time);
                }
                gtfs_index += 1;

                if found_sequence {
                    break;
                }
                if update.stop_sequence.is_some() && gtfs_index == stop_times.len() {
                    unknown_stop_sequence = true;
                }
                if update.stop_sequence.is_none() && found_stop_id {
                    // Trips may loop, so a stop_id match is only the first candidate
                    rt_stop_sequences.push(gtfs_stop_time.stop_sequence);
                    added_sequence_from_stop_id = true;
                    check_e046(findings, &id, update, gtfs_stop_time);
                    break;
                }
            }
        }

        let update_id = format!("{} {}", id, stop_time_update_id_text(update));
        let relationship = stop_relationship(update);

        if update.stop_sequence.is_none() && update.stop_id.is_none() {
            findings.add(E040, id.clone());
        }

        if relationship == Some(ScheduleRelationship::NoData) {
            if update.arrival.is_some() {
                findings.add(E042, format!("{} has arrival", update_id));
            }
            if update.departure.is_some() {
                findings.add(E042, format!("{} has departure", update_id));
            }
        }

        if update.arrival.is_none()
            && update.departure.is_none()
            && !matches!(relationship, Some(ScheduleRelationship::Skipped | ScheduleRelationship::NoData))
        {
            findings.add(E043, update_id.clone());
        }

        if relationship != Some(ScheduleRelationship::Skipped) {
            check_e044(findings, update.arrival.as_ref(), format!("{} arrival", update_id));
            check_e044(findings, update.departure.as_ref(), format!("{} departure", update_id));
        }

        if unknown_stop_sequence {
            findings.add(
                E051,
                format!("GTFS-rt {} contains stop_sequence {}", id, update.stop_sequence.unwrap_or_default()),
            );
            // Without a match the walk can't resume, so the rest of the trip is skipped
            break;
        }
    }

    let strictly_increasing = rt_stop_sequences.windows(2).all(|pair| pair[0] < pair[1]);
    if !strictly_increasing {
        findings.add(E002, format!("{} stop_sequence {}", id, list_text(&rt_stop_sequences)));
    } else if added_sequence_from_stop_id && rt_stop_sequences.len() < trip_update.stop_time_update.len() {
        // Some stop_ids couldn't be found in order, so the updates are out of sequence
        findings.add(E002, format!("{} stop_sequence for stop_ids {}", id, list_text(&rt_stop_ids)));
    }
}

fn check_e044(findings: &mut Findings, event: Option<&StopTimeEvent>, prefix: String) {
    if let Some(event) = event {
        if event.delay.is_none() && event.time.is_none() {
            findings.add(E044, prefix);
        }
    }
}

fn check_e045(findings: &mut Findings, id: &str, update: &StopTimeUpdate, gtfs_stop_time: &StopTime) {
    if let Some(stop_id) = update.stop_id.as_deref().filter(|s| *s != gtfs_stop_time.stop_id) {
        findings.add(
            E045,
            format!(
                "GTFS-rt {} stop_sequence {} has stop_id {} but GTFS stop_sequence {} has stop_id {}",
                id,
                update.stop_sequence.unwrap_or_default(),
                stop_id,
                gtfs_stop_time.stop_sequence,
                gtfs_stop_time.stop_id
            ),
        );
    }
}

fn check_e046(findings: &mut Findings, id: &str, update: &StopTimeUpdate, gtfs_stop_time: &StopTime) {
    let prefix = format!("GTFS-rt {} {} ", id, stop_time_update_id_text(update));
    if update.arrival.as_ref().is_some_and(|e| e.time.is_none()) && gtfs_stop_time.arrival_time.is_none() {
        findings.add(E046, format!("{}arrival.time", prefix));
    }
    if update.departure.as_ref().is_some_and(|e| e.time.is_none()) && gtfs_stop_time.departure_time.is_none() {
        findings.add(E046, format!("{}departure.time", prefix));
    }
}
