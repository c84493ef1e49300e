use super::rules::E019;
use super::time::seconds_after_midnight_to_clock;
use super::{FeedEntityValidator, Findings};
use crate::gtfs::{Frequency, GtfsMetadata};
use crate::models::ErrorListHelperModel;
use crate::realtime::{FeedMessage, TripDescriptor};

/// E019: trips with `exact_times = 1` must start on one of the scheduled headways
pub struct FrequencyTypeOneValidator;

impl FeedEntityValidator for FrequencyTypeOneValidator {
    fn name(&self) -> &'static str {
        "FrequencyTypeOneValidator"
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

        let trips = feed_message.entity.iter().flat_map(|entity| {
            let from_update = entity.trip_update.as_ref().map(|tu| &tu.trip);
            let from_vehicle = entity.vehicle.as_ref().and_then(|v| v.trip.as_ref());
            from_update.into_iter().chain(from_vehicle)
        });

        for trip in trips {
            let Some(frequencies) = trip.trip_id.as_ref().and_then(|id| gtfs_metadata.exact_times_one_trips.get(id))
            else {
                continue;
            };
            if let Some(last_checked) = unmatched_start_time(trip, frequencies) {
                findings.add(
                    E019,
                    format!(
                        "GTFS-rt trip_id {} has start_time of {} and GTFS frequencies.txt start_time is {} with a headway of {} seconds",
                        trip.trip_id.as_deref().unwrap_or(""),
                        trip.start_time.as_deref().unwrap_or(""),
                        last_checked.0,
                        last_checked.1
                    ),
                );
            }
        }

        findings.into_results()
    }
}

/// None when the trip's start_time lands on a headway of one of the frequencies,
/// otherwise the last scheduled start time tried and its headway.
fn unmatched_start_time(trip: &TripDescriptor, frequencies: &[Frequency]) -> Option<(String, u32)> {
    let start_time = trip.start_time.as_deref().unwrap_or("");
    let mut last_checked = (String::new(), 0);

    for frequency in frequencies {
        if frequency.headway_secs == 0 {
            continue;
        }
        let mut scheduled = frequency.start_time;
        while scheduled < frequency.end_time {
            let clock = seconds_after_midnight_to_clock(scheduled);
            if clock == start_time {
                return None;
            }
            last_checked = (clock, frequency.headway_secs);
            scheduled += frequency.headway_secs;
        }
    }
    Some(last_checked)
}
