//! Great-circle distance on a spherical Earth.

use serde::Serialize;

/// Sphere radius used for distances, in meters.
pub const EARTH_RADIUS_M: f64 = 6_378_100.0;

/// A position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        GeoPoint {
            longitude,
            latitude,
        }
    }
}

/// Haversine distance between two points, in meters.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Latitude/longitude ranges enclosing every point within a radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Smallest box (in degrees) containing the circle of `radius_m` around `center`.
///
/// Near a pole, or where the circle crosses the antimeridian, the box spans
/// every longitude.
pub fn bounding_box(center: GeoPoint, radius_m: f64) -> BoundingBox {
    let angular = radius_m / EARTH_RADIUS_M;
    let dlat = angular.to_degrees();
    let min_lat = (center.latitude - dlat).max(-90.0);
    let max_lat = (center.latitude + dlat).min(90.0);

    let full = BoundingBox {
        min_lat,
        max_lat,
        min_lon: -180.0,
        max_lon: 180.0,
    };
    if min_lat <= -90.0 || max_lat >= 90.0 {
        return full;
    }

    let ratio = angular.sin() / center.latitude.to_radians().cos();
    if ratio >= 1.0 {
        return full;
    }
    let dlon = ratio.asin().to_degrees();
    let min_lon = center.longitude - dlon;
    let max_lon = center.longitude + dlon;
    if min_lon < -180.0 || max_lon > 180.0 {
        return full;
    }
    BoundingBox {
        min_lat,
        max_lat,
        min_lon,
        max_lon,
    }
}

/// The point `distance_m` due north of `from`.
pub fn offset_north(from: GeoPoint, distance_m: f64) -> GeoPoint {
    GeoPoint::new(
        from.longitude,
        from.latitude + (distance_m / EARTH_RADIUS_M).to_degrees(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let p = GeoPoint::new(90.944851, 1.236204);
        assert_eq!(haversine_m(p, p), 0.0);
    }

    #[test]
    fn one_degree_of_latitude() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 1.0);
        let expected = EARTH_RADIUS_M * 1f64.to_radians();
        assert!((haversine_m(a, b) - expected).abs() < 1e-6);
    }

    #[test]
    fn offset_north_round_trips_distance() {
        let origin = GeoPoint::new(90.944851, 1.236204);
        for d in [2_000.0, 9_000.0, 12_000.0] {
            let p = offset_north(origin, d);
            assert!((haversine_m(origin, p) - d).abs() < 1e-3);
        }
    }

    #[test]
    fn bounding_box_contains_circle_edge() {
        let center = GeoPoint::new(90.944851, 1.236204);
        let bbox = bounding_box(center, 10_000.0);
        let north = offset_north(center, 10_000.0);
        assert!(north.latitude <= bbox.max_lat + 1e-12);
        assert!(bbox.min_lon < center.longitude && center.longitude < bbox.max_lon);
        assert!(bbox.max_lon - bbox.min_lon < 1.0);
    }

    #[test]
    fn bounding_box_near_pole_spans_all_longitudes() {
        let bbox = bounding_box(GeoPoint::new(10.0, 89.95), 10_000.0);
        assert_eq!((bbox.min_lon, bbox.max_lon), (-180.0, 180.0));
    }

    #[test]
    fn bounding_box_across_antimeridian_spans_all_longitudes() {
        let bbox = bounding_box(GeoPoint::new(179.99, 0.0), 10_000.0);
        assert_eq!((bbox.min_lon, bbox.max_lon), (-180.0, 180.0));
    }
}
