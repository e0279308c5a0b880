use crate::models::{Coordinate, GeoShape};

/// Mean earth radius used by Elasticsearch/OpenSearch arc distances, in miles.
pub const EARTH_RADIUS_MILES: f64 = 6_371_008.7714 / METRES_PER_MILE;

const METRES_PER_MILE: f64 = 1_609.344;

/// Great-circle (arc) distance between two points in miles.
pub fn arc_distance_miles(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lon - from.lon).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_MILES * c
}

pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Parses an Elasticsearch distance string (`"10mi"`, `"2.5km"`, `"800m"`, `"5"`) into
/// miles. A bare number is read as metres, the engine's default unit.
pub fn parse_distance_miles(raw: &str) -> Option<f64> {
    let raw = raw.trim().to_ascii_lowercase();
    let split = raw
        .find(|ch: char| ch.is_ascii_alphabetic())
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let value: f64 = number.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    let miles = match unit.trim() {
        "mi" | "miles" => value,
        "km" | "kilometers" => value * 1_000.0 / METRES_PER_MILE,
        "" | "m" | "meters" => value / METRES_PER_MILE,
        "yd" | "yards" => value / 1_760.0,
        "ft" | "feet" => value / 5_280.0,
        _ => return None,
    };
    Some(miles)
}

/// Point-in-shape test matching a `geo_shape` query with relation `intersects` and a
/// point as the query shape.
pub fn shape_contains(shape: &GeoShape, point: Coordinate) -> bool {
    match shape {
        GeoShape::Point { coordinates } => {
            let [lon, lat] = *coordinates;
            (lon - point.lon).abs() < f64::EPSILON && (lat - point.lat).abs() < f64::EPSILON
        }
        GeoShape::Circle {
            coordinates,
            radius,
        } => {
            let Some(radius_miles) = parse_distance_miles(radius) else {
                return false;
            };
            let [lon, lat] = *coordinates;
            arc_distance_miles(Coordinate { lat, lon }, point) <= radius_miles
        }
        GeoShape::Polygon { coordinates } => match coordinates.split_first() {
            Some((outer, holes)) => {
                ring_contains(outer, point) && !holes.iter().any(|hole| ring_contains(hole, point))
            }
            None => false,
        },
    }
}

// Ray casting over [lon, lat] pairs; edges are treated as planar.
fn ring_contains(ring: &[[f64; 2]], point: Coordinate) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let (x, y) = (point.lon, point.lat);
    let mut inside = false;
    let mut previous = ring[ring.len() - 1];

    for &current in ring {
        let [xi, yi] = current;
        let [xj, yj] = previous;
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        previous = current;
    }

    inside
}
