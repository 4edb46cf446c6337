//! Forward geodesics: where do you end up after walking `distance`
//! meters from `origin` along `bearing`?
//!
//! The spherical form follows the great-circle destination formula in
//! [Movable Type Scripts](http://www.movable-type.co.uk/scripts/latlong.html),
//! but takes the sphere's radius as a parameter so the same routine
//! serves any earth model.

use crate::constants::MEAN_EARTH_RADIUS;
use geo::geometry::Coord;

/// Returns the point `distance_m` meters from `origin` along the great
/// circle with initial `bearing_deg` (clockwise from north) on a sphere
/// of `radius_m`.
pub fn spherical_destination(
    origin: Coord<f64>,
    bearing_deg: f64,
    distance_m: f64,
    radius_m: f64,
) -> Coord<f64> {
    let lat1 = origin.y.to_radians();
    let lon1 = origin.x.to_radians();
    let bearing = bearing_deg.to_radians();
    let delta = distance_m / radius_m;

    let (lat1_sin, lat1_cos) = lat1.sin_cos();
    let (delta_sin, delta_cos) = delta.sin_cos();

    let lat2_sin = lat1_sin * delta_cos + lat1_cos * delta_sin * bearing.cos();
    let lat2 = lat2_sin.asin();
    let lon2 =
        lon1 + (bearing.sin() * delta_sin * lat1_cos).atan2(delta_cos - lat1_sin * lat2_sin);

    Coord {
        x: normalize_lon(lon2.to_degrees()),
        y: lat2.to_degrees(),
    }
}

/// Returns the point `distance_m` meters from `origin` along
/// `bearing_deg` on an equirectangular plane.
///
/// Degrees of latitude are a fixed length everywhere on the plane, the
/// same as along a meridian of a mean-radius globe. Degrees of
/// longitude shrink with the cosine of the mean latitude of the move.
pub fn planar_destination(origin: Coord<f64>, bearing_deg: f64, distance_m: f64) -> Coord<f64> {
    let meters_per_degree = MEAN_EARTH_RADIUS.to_radians();
    let (bearing_sin, bearing_cos) = bearing_deg.to_radians().sin_cos();

    let d_lat = distance_m * bearing_cos / meters_per_degree;
    let mean_lat = origin.y + d_lat / 2.0;
    let d_lon = distance_m * bearing_sin / (meters_per_degree * mean_lat.to_radians().cos());

    Coord {
        x: normalize_lon(origin.x + d_lon),
        y: origin.y + d_lat,
    }
}

/// Wraps longitude into [-180, 180).
fn normalize_lon(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}
