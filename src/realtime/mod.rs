//! GTFS-realtime message types.
//!
//! These mirror `gtfs-realtime.proto` (proto2) field for field so that feeds
//! can be decoded with prost without a protoc build step. Only the stable
//! parts of the schema are carried; experimental extensions are skipped by
//! the decoder like any other unknown field.

use anyhow::{Context, Result};
use prost::Message;
use serde::Serialize;

#[derive(Clone, PartialEq, Serialize, Message)]
pub struct FeedMessage {
    #[prost(message, required, tag = "1")]
    pub header: FeedHeader,
    #[prost(message, repeated, tag = "2")]
    pub entity: Vec<FeedEntity>,
}

#[derive(Clone, PartialEq, Serialize, Message)]
pub struct FeedHeader {
    #[prost(string, required, tag = "1")]
    pub gtfs_realtime_version: String,
    #[prost(enumeration = "feed_header::Incrementality", optional, tag = "2", default = "FullDataset")]
    pub incrementality: Option<i32>,
    #[prost(uint64, optional, tag = "3")]
    pub timestamp: Option<u64>,
}

pub mod feed_header {
    use serde::Serialize;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Incrementality {
        FullDataset = 0,
        Differential = 1,
    }
}

#[derive(Clone, PartialEq, Serialize, Message)]
pub struct FeedEntity {
    #[prost(string, required, tag = "1")]
    pub id: String,
    #[prost(bool, optional, tag = "2", default = "false")]
    pub is_deleted: Option<bool>,
    #[prost(message, optional, tag = "3")]
    pub trip_update: Option<TripUpdate>,
    #[prost(message, optional, tag = "4")]
    pub vehicle: Option<VehiclePosition>,
    #[prost(message, optional, tag = "5")]
    pub alert: Option<Alert>,
}

#[derive(Clone, PartialEq, Serialize, Message)]
pub struct TripUpdate {
    #[prost(message, required, tag = "1")]
    pub trip: TripDescriptor,
    #[prost(message, optional, tag = "3")]
    pub vehicle: Option<VehicleDescriptor>,
    #[prost(message, repeated, tag = "2")]
    pub stop_time_update: Vec<trip_update::StopTimeUpdate>,
    #[prost(uint64, optional, tag = "4")]
    pub timestamp: Option<u64>,
    #[prost(int32, optional, tag = "5")]
    pub delay: Option<i32>,
}

pub mod trip_update {
    use prost::Message;
    use serde::Serialize;

    #[derive(Clone, PartialEq, Serialize, Message)]
    pub struct StopTimeEvent {
        #[prost(int32, optional, tag = "1")]
        pub delay: Option<i32>,
        #[prost(int64, optional, tag = "2")]
        pub time: Option<i64>,
        #[prost(int32, optional, tag = "3")]
        pub uncertainty: Option<i32>,
    }

    #[derive(Clone, PartialEq, Serialize, Message)]
    pub struct StopTimeUpdate {
        #[prost(uint32, optional, tag = "1")]
        pub stop_sequence: Option<u32>,
        #[prost(string, optional, tag = "4")]
        pub stop_id: Option<String>,
        #[prost(message, optional, tag = "2")]
        pub arrival: Option<StopTimeEvent>,
        #[prost(message, optional, tag = "3")]
        pub departure: Option<StopTimeEvent>,
        #[prost(enumeration = "stop_time_update::ScheduleRelationship", optional, tag = "5", default = "Scheduled")]
        pub schedule_relationship: Option<i32>,
    }

    pub mod stop_time_update {
        use serde::Serialize;

        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ::prost::Enumeration)]
        #[repr(i32)]
        pub enum ScheduleRelationship {
            Scheduled = 0,
            Skipped = 1,
            NoData = 2,
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Message)]
pub struct VehiclePosition {
    #[prost(message, optional, tag = "1")]
    pub trip: Option<TripDescriptor>,
    #[prost(message, optional, tag = "8")]
    pub vehicle: Option<VehicleDescriptor>,
    #[prost(message, optional, tag = "2")]
    pub position: Option<Position>,
    #[prost(uint32, optional, tag = "3")]
    pub current_stop_sequence: Option<u32>,
    #[prost(string, optional, tag = "7")]
    pub stop_id: Option<String>,
    #[prost(enumeration = "vehicle_position::VehicleStopStatus", optional, tag = "4", default = "InTransitTo")]
    pub current_status: Option<i32>,
    #[prost(uint64, optional, tag = "5")]
    pub timestamp: Option<u64>,
    #[prost(enumeration = "vehicle_position::CongestionLevel", optional, tag = "6")]
    pub congestion_level: Option<i32>,
    #[prost(enumeration = "vehicle_position::OccupancyStatus", optional, tag = "9")]
    pub occupancy_status: Option<i32>,
}

pub mod vehicle_position {
    use serde::Serialize;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum VehicleStopStatus {
        IncomingAt = 0,
        StoppedAt = 1,
        InTransitTo = 2,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum CongestionLevel {
        UnknownCongestionLevel = 0,
        RunningSmoothly = 1,
        StopAndGo = 2,
        Congestion = 3,
        SevereCongestion = 4,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum OccupancyStatus {
        Empty = 0,
        ManySeatsAvailable = 1,
        FewSeatsAvailable = 2,
        StandingRoomOnly = 3,
        CrushedStandingRoomOnly = 4,
        Full = 5,
        NotAcceptingPassengers = 6,
    }
}

#[derive(Clone, PartialEq, Serialize, Message)]
pub struct Alert {
    #[prost(message, repeated, tag = "1")]
    pub active_period: Vec<TimeRange>,
    #[prost(message, repeated, tag = "5")]
    pub informed_entity: Vec<EntitySelector>,
    #[prost(enumeration = "alert::Cause", optional, tag = "6", default = "UnknownCause")]
    pub cause: Option<i32>,
    #[prost(enumeration = "alert::Effect", optional, tag = "7", default = "UnknownEffect")]
    pub effect: Option<i32>,
    #[prost(message, optional, tag = "8")]
    pub url: Option<TranslatedString>,
    #[prost(message, optional, tag = "10")]
    pub header_text: Option<TranslatedString>,
    #[prost(message, optional, tag = "11")]
    pub description_text: Option<TranslatedString>,
}

pub mod alert {
    use serde::Serialize;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Cause {
        UnknownCause = 1,
        OtherCause = 2,
        TechnicalProblem = 3,
        Strike = 4,
        Demonstration = 5,
        Accident = 6,
        Holiday = 7,
        Weather = 8,
        Maintenance = 9,
        Construction = 10,
        PoliceActivity = 11,
        MedicalEmergency = 12,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Effect {
        NoService = 1,
        ReducedService = 2,
        SignificantDelays = 3,
        Detour = 4,
        AdditionalService = 5,
        ModifiedService = 6,
        OtherEffect = 7,
        UnknownEffect = 8,
        StopMoved = 9,
    }
}

#[derive(Clone, PartialEq, Serialize, Message)]
pub struct TimeRange {
    #[prost(uint64, optional, tag = "1")]
    pub start: Option<u64>,
    #[prost(uint64, optional, tag = "2")]
    pub end: Option<u64>,
}

#[derive(Clone, PartialEq, Serialize, Message)]
pub struct Position {
    #[prost(float, required, tag = "1")]
    pub latitude: f32,
    #[prost(float, required, tag = "2")]
    pub longitude: f32,
    #[prost(float, optional, tag = "3")]
    pub bearing: Option<f32>,
    #[prost(double, optional, tag = "4")]
    pub odometer: Option<f64>,
    #[prost(float, optional, tag = "5")]
    pub speed: Option<f32>,
}

#[derive(Clone, PartialEq, Serialize, Message)]
pub struct TripDescriptor {
    #[prost(string, optional, tag = "1")]
    pub trip_id: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub route_id: Option<String>,
    #[prost(uint32, optional, tag = "6")]
    pub direction_id: Option<u32>,
    #[prost(string, optional, tag = "2")]
    pub start_time: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub start_date: Option<String>,
    #[prost(enumeration = "trip_descriptor::ScheduleRelationship", optional, tag = "4", default = "Scheduled")]
    pub schedule_relationship: Option<i32>,
}

pub mod trip_descriptor {
    use serde::Serialize;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum ScheduleRelationship {
        Scheduled = 0,
        Added = 1,
        Unscheduled = 2,
        Canceled = 3,
    }

    impl ScheduleRelationship {
        /// Name as written in the proto definition
        pub fn as_str_name(&self) -> &'static str {
            match self {
                ScheduleRelationship::Scheduled => "SCHEDULED",
                ScheduleRelationship::Added => "ADDED",
                ScheduleRelationship::Unscheduled => "UNSCHEDULED",
                ScheduleRelationship::Canceled => "CANCELED",
            }
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Message)]
pub struct VehicleDescriptor {
    #[prost(string, optional, tag = "1")]
    pub id: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub label: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub license_plate: Option<String>,
}

#[derive(Clone, PartialEq, Serialize, Message)]
pub struct EntitySelector {
    #[prost(string, optional, tag = "1")]
    pub agency_id: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub route_id: Option<String>,
    #[prost(int32, optional, tag = "3")]
    pub route_type: Option<i32>,
    #[prost(message, optional, tag = "4")]
    pub trip: Option<TripDescriptor>,
    #[prost(string, optional, tag = "5")]
    pub stop_id: Option<String>,
}

#[derive(Clone, PartialEq, Serialize, Message)]
pub struct TranslatedString {
    #[prost(message, repeated, tag = "1")]
    pub translation: Vec<translated_string::Translation>,
}

pub mod translated_string {
    use prost::Message;
    use serde::Serialize;

    #[derive(Clone, PartialEq, Serialize, Message)]
    pub struct Translation {
        #[prost(string, required, tag = "1")]
        pub text: String,
        #[prost(string, optional, tag = "2")]
        pub language: Option<String>,
    }
}

/// Decodes a raw GTFS-realtime protobuf payload.
pub fn decode_feed(bytes: &[u8]) -> Result<FeedMessage> {
    FeedMessage::decode(bytes).context("Failed to decode GTFS-realtime FeedMessage")
}

/// Merges several feeds that share the same GTFS data into one message.
///
/// Entities are concatenated in input order and the header with the largest
/// timestamp wins.
pub fn combine_feeds<'a, I>(messages: I) -> Option<FeedMessage>
where
    I: IntoIterator<Item = &'a FeedMessage>,
{
    let mut header: Option<FeedHeader> = None;
    let mut entity = Vec::new();

    for message in messages {
        let newer = match &header {
            None => true,
            Some(current) => message.header.timestamp.unwrap_or(0) > current.timestamp.unwrap_or(0),
        };
        if newer {
            header = Some(message.header.clone());
        }
        entity.extend(message.entity.iter().cloned());
    }

    header.map(|header| FeedMessage { header, entity })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn header(timestamp: u64) -> FeedHeader {
        FeedHeader {
            gtfs_realtime_version: "2.0".to_string(),
            incrementality: Some(feed_header::Incrementality::FullDataset as i32),
            timestamp: Some(timestamp),
        }
    }

    #[test]
    fn test_decode_round_trip_preserves_entities() -> Result<()> {
        let message = FeedMessage {
            header: header(1_500_000_000),
            entity: vec![FeedEntity {
                id: "1".to_string(),
                vehicle: Some(VehiclePosition {
                    vehicle: Some(VehicleDescriptor {
                        id: Some("bus-1".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }],
        };

        let decoded = decode_feed(&message.encode_to_vec())?;
        assert_eq!(decoded, message);
        Ok(())
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_feed(b"<html>not a feed</html>").is_err());
    }

    #[test]
    fn test_combine_feeds_keeps_newest_header() {
        let mut first = FeedMessage { header: header(100), entity: vec![] };
        first.entity.push(FeedEntity { id: "a".to_string(), ..Default::default() });
        let mut second = FeedMessage { header: header(200), entity: vec![] };
        second.entity.push(FeedEntity { id: "b".to_string(), ..Default::default() });

        let combined = combine_feeds([&first, &second]).expect("two feeds combine");
        assert_eq!(combined.header.timestamp, Some(200));
        let ids: Vec<_> = combined.entity.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_combine_feeds_empty_is_none() {
        assert!(combine_feeds(std::iter::empty::<&FeedMessage>()).is_none());
    }
}
