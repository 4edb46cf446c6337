/// Mean radius of the earth in meters, as used by the `geo` crate.
pub const MEAN_EARTH_RADIUS: f64 = 6_371_008.8;

/// Typical fraction of curvature drop hidden by atmospheric refraction.
pub const DEFAULT_REFRACTION: f64 = 0.25;

/// Meters per statute mile.
pub const METERS_PER_MILE: f64 = 1_609.34;
