//! Earth shape and refraction model.
//!
//! Everything here is measured relative to a flat plane tangent to the
//! surface under the observer. On a finite sphere a distant target
//! sits below that plane by the curvature drop, and atmospheric
//! refraction bends light back down around the curve, hiding a
//! fraction `k` of that drop.

use crate::{
    constants::DEFAULT_REFRACTION,
    math::{planar_destination, spherical_destination},
    TerrainError,
};
use geo::geometry::{Coord, Rect};
use serde::Serialize;
use std::f64::consts::FRAC_PI_2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Radius {
    /// A plane, i.e. a sphere of infinite radius.
    Flat,
    /// Sphere radius in meters.
    Finite(f64),
}

impl Radius {
    /// Returns a radius from meters, where either infinity means flat.
    ///
    /// Zero, negative (a hollow earth) and NaN radii are rejected.
    pub fn from_meters(meters: f64) -> Result<Self, TerrainError> {
        if meters.is_infinite() {
            Ok(Self::Flat)
        } else if meters > 0.0 {
            Ok(Self::Finite(meters))
        } else {
            Err(TerrainError::Config(format!(
                "earth radius must be positive or infinite, got {meters}"
            )))
        }
    }

    pub fn meters(&self) -> f64 {
        match *self {
            Self::Flat => f64::INFINITY,
            Self::Finite(meters) => meters,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EarthModel {
    radius: Radius,

    /// Fraction of curvature drop cancelled by refraction.
    ///
    /// Not range checked: values above 1 make the surface appear
    /// concave.
    refraction: f64,
}

impl Default for EarthModel {
    /// A flat earth with typical refraction.
    fn default() -> Self {
        Self {
            radius: Radius::Flat,
            refraction: DEFAULT_REFRACTION,
        }
    }
}

impl EarthModel {
    pub fn new(radius: Radius, refraction: f64) -> Result<Self, TerrainError> {
        let radius = match radius {
            Radius::Flat => Radius::Flat,
            Radius::Finite(meters) => Radius::from_meters(meters)?,
        };
        if !refraction.is_finite() {
            return Err(TerrainError::Config(format!(
                "refraction coefficient must be finite, got {refraction}"
            )));
        }
        Ok(Self { radius, refraction })
    }

    pub fn flat(refraction: f64) -> Result<Self, TerrainError> {
        Self::new(Radius::Flat, refraction)
    }

    pub fn spherical(radius_m: f64, refraction: f64) -> Result<Self, TerrainError> {
        Self::new(Radius::from_meters(radius_m)?, refraction)
    }

    pub fn radius(&self) -> Radius {
        self.radius
    }

    pub fn refraction(&self) -> f64 {
        self.refraction
    }

    pub fn is_flat(&self) -> bool {
        self.radius == Radius::Flat
    }

    /// Drop below the tangent plane at `distance_m`, ignoring
    /// refraction.
    pub fn geometric_drop(&self, distance_m: f64) -> f64 {
        match self.radius {
            Radius::Flat => 0.0,
            Radius::Finite(radius) => distance_m * distance_m / (2.0 * radius),
        }
    }

    /// Apparent drop below the tangent plane at `distance_m`.
    pub fn drop(&self, distance_m: f64) -> f64 {
        self.geometric_drop(distance_m) * (1.0 - self.refraction)
    }

    /// Returns the angle (radians) above the observer's horizontal at
    /// which a target at `target_elev_m` and ground distance
    /// `distance_m` appears, for an eye at `observer_elev_m`.
    ///
    /// A target at zero distance is straight overhead.
    pub fn apparent_angle(&self, distance_m: f64, target_elev_m: f64, observer_elev_m: f64) -> f64 {
        if distance_m == 0.0 {
            return FRAC_PI_2;
        }
        let effective_elev_m = target_elev_m - self.drop(distance_m);
        (effective_elev_m - observer_elev_m).atan2(distance_m)
    }

    /// Returns the (angle, distance) of the sea horizon for an eye
    /// `observer_elev_m` above sea level, looking no further than
    /// `max_distance_m`.
    ///
    /// With no apparent curvature the horizon is level and as far away
    /// as we look.
    pub fn horizon(&self, observer_elev_m: f64, max_distance_m: f64) -> (f64, f64) {
        let curvature = self.drop(1.0);
        if curvature > 0.0 && observer_elev_m > 0.0 {
            let tangent_m = (observer_elev_m / curvature).sqrt().min(max_distance_m);
            (
                self.apparent_angle(tangent_m, 0.0, observer_elev_m),
                tangent_m,
            )
        } else if curvature < 0.0 {
            (
                self.apparent_angle(max_distance_m, 0.0, observer_elev_m),
                max_distance_m,
            )
        } else {
            (0.0, max_distance_m)
        }
    }

    /// Radius of the sphere light appears to follow once refraction is
    /// accounted for.
    pub fn effective_radius(&self) -> f64 {
        match self.radius {
            Radius::Flat => f64::INFINITY,
            Radius::Finite(radius) => radius / (1.0 - self.refraction),
        }
    }

    /// Drop measured along the arc of the effective sphere,
    /// `R(1 - cos(d/R))`.
    pub fn arc_drop(&self, distance_m: f64) -> f64 {
        let radius = self.effective_radius();
        if radius.is_infinite() {
            return 0.0;
        }
        radius * (1.0 - (distance_m / radius).cos())
    }

    /// Line-of-sight distance to the horizon from `height_m` above the
    /// surface.
    pub fn horizon_distance(&self, height_m: f64) -> f64 {
        let radius = self.effective_radius().abs();
        if radius.is_infinite() {
            return f64::INFINITY;
        }
        (height_m * height_m + 2.0 * radius * height_m).sqrt()
    }

    /// Height of a target at line-of-sight `distance_m` hidden behind
    /// the horizon from an eye `height_m` above the surface.
    pub fn hidden_height(&self, distance_m: f64, height_m: f64) -> f64 {
        let radius = self.effective_radius();
        if radius.is_infinite() {
            return 0.0;
        }
        let beyond_m = distance_m - self.horizon_distance(height_m);
        if beyond_m <= 0.0 {
            return 0.0;
        }
        let hidden = (beyond_m * beyond_m + radius * radius).sqrt() - radius.abs();
        hidden.copysign(radius)
    }

    /// Returns the point `distance_m` from `origin` along `bearing_deg`
    /// on this model's surface.
    pub fn destination(&self, origin: Coord<f64>, bearing_deg: f64, distance_m: f64) -> Coord<f64> {
        match self.radius {
            Radius::Flat => planar_destination(origin, bearing_deg, distance_m),
            Radius::Finite(radius) => {
                spherical_destination(origin, bearing_deg, distance_m, radius)
            }
        }
    }

    /// Returns a box around everything within `distance_m` of
    /// `center`.
    ///
    /// Longitudes are unwrapped around `center`, so a box crossing the
    /// antimeridian runs past ±180° rather than spanning the globe.
    pub fn bounding_rect(&self, center: Coord<f64>, distance_m: f64) -> Rect<f64> {
        let corners = [0.0, 90.0, 180.0, 270.0]
            .map(|bearing| self.destination(center, bearing, distance_m));
        let (mut min, mut max) = (center, center);
        for Coord { x, y } in corners {
            let x = center.x + (x - center.x + 180.0).rem_euclid(360.0) - 180.0;
            min.x = min.x.min(x);
            min.y = min.y.min(y);
            max.x = max.x.max(x);
            max.y = max.y.max(y);
        }
        Rect::new(min, max)
    }
}
