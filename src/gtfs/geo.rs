//! Small spherical-geometry helpers for vehicle coverage checks.

/// Mean earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0087714;

/// Degrees of latitude spanned by one kilometer
pub fn km_to_degrees(km: f64) -> f64 {
    (km / EARTH_RADIUS_KM).to_degrees()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Smallest box containing every (lat, lon) point, or None for no points
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut bbox: Option<BoundingBox> = None;
        for (lat, lon) in points {
            bbox = Some(match bbox {
                None => BoundingBox { min_lat: lat, max_lat: lat, min_lon: lon, max_lon: lon },
                Some(b) => BoundingBox {
                    min_lat: b.min_lat.min(lat),
                    max_lat: b.max_lat.max(lat),
                    min_lon: b.min_lon.min(lon),
                    max_lon: b.max_lon.max(lon),
                },
            });
        }
        bbox
    }

    /// Grows the box by `meters` on every side.
    ///
    /// Longitude degrees shrink towards the poles, so the longitude buffer is
    /// widened using the latitude furthest from the equator.
    pub fn buffered(&self, meters: f64) -> Self {
        let lat_buffer = km_to_degrees(meters / 1000.0);
        let min_lat = (self.min_lat - lat_buffer).max(-90.0);
        let max_lat = (self.max_lat + lat_buffer).min(90.0);
        let widest = min_lat.abs().max(max_lat.abs()).to_radians().cos();
        let lon_buffer = if widest > f64::EPSILON { lat_buffer / widest } else { 180.0 };

        BoundingBox {
            min_lat,
            max_lat,
            min_lon: (self.min_lon - lon_buffer).max(-180.0),
            max_lon: (self.max_lon + lon_buffer).min(180.0),
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

/// Great-circle distance between two points in meters
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * 1000.0 * a.sqrt().asin()
}

/// Shortest distance in meters from a point to a polyline of (lat, lon) vertices.
///
/// Segments are projected onto a local equirectangular plane centered on the
/// point, which is accurate at the few-hundred-meter scale this is used for.
pub fn distance_to_polyline_meters(lat: f64, lon: f64, line: &[(f64, f64)]) -> Option<f64> {
    match line {
        [] => None,
        [(p_lat, p_lon)] => Some(haversine_meters(lat, lon, *p_lat, *p_lon)),
        _ => {
            let meters_per_deg = EARTH_RADIUS_KM * 1000.0 * std::f64::consts::PI / 180.0;
            let cos_lat = lat.to_radians().cos();
            let project = |(p_lat, p_lon): (f64, f64)| {
                ((p_lon - lon) * meters_per_deg * cos_lat, (p_lat - lat) * meters_per_deg)
            };

            line.windows(2)
                .map(|segment| {
                    let (ax, ay) = project(segment[0]);
                    let (bx, by) = project(segment[1]);
                    point_to_segment(ax, ay, bx, by)
                })
                .reduce(f64::min)
        }
    }
}

// Distance from the origin to segment AB
fn point_to_segment(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    let dx = bx - ax;
    let dy = by - ay;
    let length_sq = dx * dx + dy * dy;
    let t = if length_sq == 0.0 {
        0.0
    } else {
        (-(ax * dx + ay * dy) / length_sq).clamp(0.0, 1.0)
    };
    let cx = ax + t * dx;
    let cy = ay + t * dy;
    (cx * cx + cy * cy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_buffer_contains_nearby_point() {
        let bbox = BoundingBox::from_points(vec![(28.0, -82.0), (28.1, -82.1)]).unwrap();
        assert!(bbox.contains(28.05, -82.05));
        assert!(!bbox.contains(28.11, -82.05));

        let buffered = bbox.buffered(1609.0);
        assert!(buffered.contains(28.11, -82.05));
        assert!(!buffered.contains(28.2, -82.05));
    }

    #[test]
    fn test_distance_to_polyline() {
        // A north-south line; a point ~0.001 degrees of longitude east at the equator is ~111 m away
        let line = vec![(0.0, 0.0), (0.01, 0.0)];
        let d = distance_to_polyline_meters(0.005, 0.001, &line).unwrap();
        assert!((d - 111.2).abs() < 1.0, "distance was {}", d);

        // Beyond the end of the segment the closest point is the endpoint
        let d = distance_to_polyline_meters(0.02, 0.0, &line).unwrap();
        assert!((d - 1112.0).abs() < 5.0, "distance was {}", d);

        assert!(distance_to_polyline_meters(0.0, 0.0, &[]).is_none());
    }
}
