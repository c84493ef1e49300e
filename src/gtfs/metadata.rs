use std::collections::{HashMap, HashSet};
use std::time::Instant;

use chrono_tz::Tz;
use log::{debug, info, warn};

use super::geo::{distance_to_polyline_meters, BoundingBox};
use super::model::{Frequency, StopTime, Trip};
use super::GtfsData;

/// Buffer around the agency area, roughly one mile
pub const REGION_BUFFER_METERS: f64 = 1609.0;
/// Allowed distance between a vehicle and its trip shape, roughly 1/8 of a mile
pub const TRIP_BUFFER_METERS: f64 = 200.0;

/// Lookup tables built once per GTFS feed and shared by every validation rule.
#[derive(Debug, Clone)]
pub struct GtfsMetadata {
    pub feed_url: String,
    pub time_zone: Tz,
    pub agency_ids: HashSet<String>,
    pub route_ids: HashSet<String>,
    /// trip_id -> GTFS trip
    pub trips: HashMap<String, Trip>,
    /// trip_id -> stop_times sorted by stop_sequence
    pub trip_stop_times: HashMap<String, Vec<StopTime>>,
    pub stop_ids: HashSet<String>,
    /// stop_id -> location_type
    pub stop_location_types: HashMap<String, u32>,
    pub exact_times_zero_trip_ids: HashSet<String>,
    /// trip_id -> frequencies with exact_times = 1
    pub exact_times_one_trips: HashMap<String, Vec<Frequency>>,
    /// trip_id -> stop_ids visited more than once by that trip
    pub trips_with_multi_stops: HashMap<String, Vec<String>>,
    /// trip_id -> (lat, lon) polyline from shapes.txt
    pub trip_shapes: HashMap<String, Vec<(f64, f64)>>,
    pub stop_bounding_box: Option<BoundingBox>,
    pub stop_bounding_box_with_buffer: Option<BoundingBox>,
    pub shape_bounding_box: Option<BoundingBox>,
    pub shape_bounding_box_with_buffer: Option<BoundingBox>,
}

impl GtfsMetadata {
    /// Indexes the GTFS data. With `ignore_shapes` set, shapes.txt is not used for any check.
    pub fn new(feed_url: &str, time_zone: Option<&str>, gtfs: &GtfsData, ignore_shapes: bool) -> Self {
        let started = Instant::now();
        info!("Building GtfsMetadata for {}...", feed_url);

        let time_zone = match time_zone.map(str::parse::<Tz>) {
            Some(Ok(tz)) => tz,
            Some(Err(_)) => {
                warn!("Unknown agency timezone for {}, falling back to UTC", feed_url);
                Tz::UTC
            }
            None => Tz::UTC,
        };

        let agency_ids = gtfs.agencies.iter().filter_map(|a| a.agency_id.clone()).collect();
        let route_ids = gtfs.routes.iter().map(|r| r.route_id.clone()).collect();

        // Shapes only count when there are enough points to describe a line
        let mut shape_points: HashMap<String, Vec<(u32, f64, f64)>> = HashMap::new();
        let mut shape_bounding_box = None;
        if !ignore_shapes && gtfs.shape_points.len() > 3 {
            for p in &gtfs.shape_points {
                shape_points
                    .entry(p.shape_id.clone())
                    .or_default()
                    .push((p.shape_pt_sequence, p.shape_pt_lat, p.shape_pt_lon));
            }
            for points in shape_points.values_mut() {
                points.sort_by_key(|(sequence, _, _)| *sequence);
            }
            shape_bounding_box = BoundingBox::from_points(
                gtfs.shape_points.iter().map(|p| (p.shape_pt_lat, p.shape_pt_lon)),
            );
            debug!("Loaded {} shapes for {}", shape_points.len(), feed_url);
        }

        let mut trip_stop_times: HashMap<String, Vec<StopTime>> = HashMap::new();
        for stop_time in &gtfs.stop_times {
            trip_stop_times
                .entry(stop_time.trip_id.clone())
                .or_default()
                .push(stop_time.clone());
        }
        for stop_times in trip_stop_times.values_mut() {
            stop_times.sort_by_key(|st| st.stop_sequence);
        }

        let mut trips = HashMap::new();
        let mut trip_shapes = HashMap::new();
        for trip in &gtfs.trips {
            if let Some(points) = trip.shape_id.as_ref().and_then(|id| shape_points.get(id)) {
                let line = points.iter().map(|(_, lat, lon)| (*lat, *lon)).collect();
                trip_shapes.insert(trip.trip_id.clone(), line);
            }
            trips.insert(trip.trip_id.clone(), trip.clone());
        }

        let mut trips_with_multi_stops = HashMap::new();
        for (trip_id, stop_times) in &trip_stop_times {
            let mut seen = HashSet::new();
            let duplicates: Vec<String> = stop_times
                .iter()
                .filter(|st| !seen.insert(st.stop_id.as_str()))
                .map(|st| st.stop_id.clone())
                .collect();
            if !duplicates.is_empty() {
                trips_with_multi_stops.insert(trip_id.clone(), duplicates);
            }
        }

        let stop_ids = gtfs.stops.iter().map(|s| s.stop_id.clone()).collect();
        let stop_location_types = gtfs
            .stops
            .iter()
            .map(|s| (s.stop_id.clone(), s.location_type()))
            .collect();
        let stop_bounding_box = BoundingBox::from_points(
            gtfs.stops.iter().filter_map(|s| Some((s.stop_lat?, s.stop_lon?))),
        );

        let mut exact_times_zero_trip_ids = HashSet::new();
        let mut exact_times_one_trips: HashMap<String, Vec<Frequency>> = HashMap::new();
        for frequency in &gtfs.frequencies {
            match frequency.exact_times() {
                0 => {
                    exact_times_zero_trip_ids.insert(frequency.trip_id.clone());
                }
                1 => exact_times_one_trips
                    .entry(frequency.trip_id.clone())
                    .or_default()
                    .push(frequency.clone()),
                other => debug!("Ignoring frequency with exact_times = {} for trip {}", other, frequency.trip_id),
            }
        }

        info!(
            "Built GtfsMetadata for {} in {:.3} seconds",
            feed_url,
            started.elapsed().as_secs_f64()
        );

        Self {
            feed_url: feed_url.to_string(),
            time_zone,
            agency_ids,
            route_ids,
            trips,
            trip_stop_times,
            stop_ids,
            stop_location_types,
            exact_times_zero_trip_ids,
            exact_times_one_trips,
            trips_with_multi_stops,
            trip_shapes,
            stop_bounding_box_with_buffer: stop_bounding_box.map(|b| b.buffered(REGION_BUFFER_METERS)),
            stop_bounding_box,
            shape_bounding_box_with_buffer: shape_bounding_box.map(|b| b.buffered(REGION_BUFFER_METERS)),
            shape_bounding_box,
        }
    }

    /// True when the position lies within the trip buffer of the trip's shape.
    /// None when the trip has no shape.
    pub fn is_near_trip_shape(&self, trip_id: &str, lat: f64, lon: f64) -> Option<bool> {
        let line = self.trip_shapes.get(trip_id)?;
        distance_to_polyline_meters(lat, lon, line).map(|d| d <= TRIP_BUFFER_METERS)
    }

    /// GTFS route of the trip, if the trip exists
    pub fn trip_route_id(&self, trip_id: &str) -> Option<&str> {
        self.trips.get(trip_id).map(|t| t.route_id.as_str())
    }
}
