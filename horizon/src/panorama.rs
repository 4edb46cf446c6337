use crate::look::VisibilitySample;
use geo::geometry::Coord;
use serde::Serialize;
use std::fmt;

/// The skyline along one bearing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Silhouette {
    /// Degrees clockwise from north.
    pub bearing: f64,

    /// Apparent elevation angle in radians.
    pub angle: f64,

    /// Ground distance to the silhouette in meters.
    pub distance: f64,
}

impl Silhouette {
    /// Takes `sample` as the new silhouette if it appears strictly
    /// higher. Samples must be observed nearest first, so nearer
    /// terrain wins ties.
    pub fn observe(&mut self, sample: &VisibilitySample) -> bool {
        if sample.angle > self.angle {
            self.angle = sample.angle;
            self.distance = sample.distance;
            true
        } else {
            false
        }
    }
}

/// One [Silhouette] per bearing of a sweep, in increasing bearing
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct Panorama {
    observer: Coord<f64>,

    /// Observer's eye above sea level in meters.
    eye_elevation: f64,

    silhouettes: Vec<Silhouette>,
}

impl Panorama {
    pub(crate) fn with_capacity(observer: Coord<f64>, eye_elevation: f64, capacity: usize) -> Self {
        Self {
            observer,
            eye_elevation,
            silhouettes: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, silhouette: Silhouette) {
        debug_assert!(self
            .silhouettes
            .last()
            .map_or(true, |last| last.bearing < silhouette.bearing));
        self.silhouettes.push(silhouette);
    }

    pub fn observer(&self) -> Coord<f64> {
        self.observer
    }

    pub fn eye_elevation(&self) -> f64 {
        self.eye_elevation
    }

    /// Returns the number of bearings.
    pub fn len(&self) -> usize {
        self.silhouettes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.silhouettes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Silhouette> {
        self.silhouettes.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Silhouette> + '_ {
        self.silhouettes.iter()
    }

    pub fn as_slice(&self) -> &[Silhouette] {
        &self.silhouettes
    }

    /// Returns the highest point of the skyline.
    pub fn peak(&self) -> Option<&Silhouette> {
        self.silhouettes
            .iter()
            .reduce(|peak, s| if s.angle > peak.angle { s } else { peak })
    }
}

impl<'a> IntoIterator for &'a Panorama {
    type Item = &'a Silhouette;
    type IntoIter = std::slice::Iter<'a, Silhouette>;

    fn into_iter(self) -> Self::IntoIter {
        self.silhouettes.iter()
    }
}

/// One `<bearing> <apparent_angle> <distance>` line per bearing.
impl fmt::Display for Panorama {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for Silhouette {
            bearing,
            angle,
            distance,
        } in &self.silhouettes
        {
            writeln!(f, "{bearing} {angle} {distance}")?;
        }
        Ok(())
    }
}
