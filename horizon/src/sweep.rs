use crate::{
    earth::EarthModel,
    look::{eye_elevation, Ray},
    panorama::{Panorama, Silhouette},
    tiles::{TileProvider, Tiles},
    TerrainError,
};
use geo::geometry::Coord;
use log::debug;
use std::time::Instant;

/// Guards against `span / step` landing a hair off an integer.
const STEP_EPSILON: f64 = 1e-9;

/// Parameters of a panorama sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepConfig {
    /// Observer location, longitude in `x` and latitude in `y`.
    pub observer: Coord<f64>,

    /// Eye height above the ground (meters).
    pub height_m: f64,

    /// First bearing (degrees clockwise from north).
    pub start_bearing: f64,

    /// Width of the sweep (degrees).
    pub span: f64,

    /// Angle between consecutive bearings (degrees).
    pub bearing_step: f64,

    /// How far to look (meters).
    pub max_distance_m: f64,

    /// Distance between consecutive samples along a bearing (meters).
    pub distance_step_m: f64,

    pub earth: EarthModel,

    /// Load every tile within `max_distance_m` before sweeping.
    pub prefetch: bool,
}

impl SweepConfig {
    pub const DEFAULT_HEIGHT_M: f64 = 1.8;
    pub const DEFAULT_SPAN: f64 = 60.0;
    pub const DEFAULT_BEARING_STEP: f64 = 0.1;
    pub const DEFAULT_MAX_DISTANCE_M: f64 = 500_000.0;
    pub const DEFAULT_DISTANCE_STEP_M: f64 = 90.0;

    /// Most bearings a single sweep may cover, a thousandth of a degree
    /// around the full circle.
    pub const MAX_BEARINGS: usize = 360_000;

    /// Most samples a single bearing may take.
    pub const MAX_DISTANCE_STEPS: usize = 10_000_000;

    pub fn builder() -> SweepConfigBuilder {
        SweepConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), TerrainError> {
        let Coord { x: lon, y: lat } = self.observer;
        if !(-90.0..=90.0).contains(&lat) {
            return Err(invalid(format!("observer latitude {lat} out of range")));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(invalid(format!("observer longitude {lon} out of range")));
        }
        if !(self.height_m.is_finite() && self.height_m >= 0.0) {
            return Err(invalid(format!(
                "height must be finite and non-negative, got {}",
                self.height_m
            )));
        }
        if !self.start_bearing.is_finite() {
            return Err(invalid(format!(
                "start bearing must be finite, got {}",
                self.start_bearing
            )));
        }
        positive("span", self.span)?;
        positive("bearing step", self.bearing_step)?;
        positive("distance step", self.distance_step_m)?;
        if !(self.max_distance_m.is_finite() && self.max_distance_m >= self.distance_step_m) {
            return Err(invalid(format!(
                "max distance {} must be finite and at least one distance step",
                self.max_distance_m
            )));
        }
        #[allow(clippy::cast_precision_loss)]
        let (max_bearings, max_steps) = (
            Self::MAX_BEARINGS as f64,
            Self::MAX_DISTANCE_STEPS as f64,
        );
        if self.span / self.bearing_step > max_bearings {
            return Err(invalid(format!(
                "span {} / bearing step {} exceeds {} bearings",
                self.span,
                self.bearing_step,
                Self::MAX_BEARINGS
            )));
        }
        if self.max_distance_m / self.distance_step_m > max_steps {
            return Err(invalid(format!(
                "max distance {} / distance step {} exceeds {} steps",
                self.max_distance_m,
                self.distance_step_m,
                Self::MAX_DISTANCE_STEPS
            )));
        }
        Ok(())
    }

    /// Returns the number of bearings swept, `ceil(span / bearing_step)`.
    ///
    /// Never less than one, since `start_bearing` is always swept.
    pub fn bearing_count(&self) -> usize {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = (self.span / self.bearing_step - STEP_EPSILON).ceil() as usize;
        count.clamp(1, Self::MAX_BEARINGS)
    }

    /// Returns swept bearings in increasing order.
    ///
    /// Bearings are not wrapped, so a sweep starting at 350° runs
    /// through 360° and beyond.
    pub fn bearings(&self) -> impl Iterator<Item = f64> {
        let Self {
            start_bearing,
            bearing_step,
            ..
        } = *self;
        (0..self.bearing_count()).map(move |i| {
            #[allow(clippy::cast_precision_loss)]
            let i = i as f64;
            start_bearing + i * bearing_step
        })
    }

    /// Returns the number of samples along each bearing,
    /// `floor(max_distance / distance_step)`.
    pub fn distance_count(&self) -> usize {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = (self.max_distance_m / self.distance_step_m + STEP_EPSILON).floor() as usize;
        count.min(Self::MAX_DISTANCE_STEPS)
    }
}

fn invalid(msg: String) -> TerrainError {
    TerrainError::Config(msg)
}

fn positive(name: &str, value: f64) -> Result<(), TerrainError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be positive, got {value}")))
    }
}

#[derive(Debug, Default)]
pub struct SweepConfigBuilder {
    observer: Option<Coord<f64>>,

    /// Eye height above ground (meters).
    height_m: Option<f64>,

    start_bearing: Option<f64>,

    span: Option<f64>,

    bearing_step: Option<f64>,

    max_distance_m: Option<f64>,

    distance_step_m: Option<f64>,

    earth: Option<EarthModel>,

    prefetch: bool,
}

impl SweepConfigBuilder {
    pub fn observer(mut self, coord: Coord<f64>) -> Self {
        self.observer = Some(coord);
        self
    }

    pub fn height(mut self, meters: f64) -> Self {
        self.height_m = Some(meters);
        self
    }

    pub fn start_bearing(mut self, degrees: f64) -> Self {
        self.start_bearing = Some(degrees);
        self
    }

    pub fn span(mut self, degrees: f64) -> Self {
        self.span = Some(degrees);
        self
    }

    pub fn bearing_step(mut self, degrees: f64) -> Self {
        self.bearing_step = Some(degrees);
        self
    }

    pub fn max_distance(mut self, meters: f64) -> Self {
        self.max_distance_m = Some(meters);
        self
    }

    pub fn distance_step(mut self, meters: f64) -> Self {
        self.distance_step_m = Some(meters);
        self
    }

    pub fn earth(mut self, earth: EarthModel) -> Self {
        self.earth = Some(earth);
        self
    }

    pub fn prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = prefetch;
        self
    }

    pub fn build(&self) -> Result<SweepConfig, TerrainError> {
        let observer = self.observer.ok_or(TerrainError::Builder("observer"))?;
        let config = SweepConfig {
            observer,
            height_m: self.height_m.unwrap_or(SweepConfig::DEFAULT_HEIGHT_M),
            start_bearing: self.start_bearing.unwrap_or(0.0),
            span: self.span.unwrap_or(SweepConfig::DEFAULT_SPAN),
            bearing_step: self
                .bearing_step
                .unwrap_or(SweepConfig::DEFAULT_BEARING_STEP),
            max_distance_m: self
                .max_distance_m
                .unwrap_or(SweepConfig::DEFAULT_MAX_DISTANCE_M),
            distance_step_m: self
                .distance_step_m
                .unwrap_or(SweepConfig::DEFAULT_DISTANCE_STEP_M),
            earth: self.earth.unwrap_or_default(),
            prefetch: self.prefetch,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Sweeps the configured bearings and returns the skyline seen from
/// the observer.
pub fn sweep<P: TileProvider>(
    tiles: &Tiles<P>,
    config: &SweepConfig,
) -> Result<Panorama, TerrainError> {
    config.validate()?;

    let now = Instant::now();
    if config.prefetch {
        let rect = config
            .earth
            .bounding_rect(config.observer, config.max_distance_m);
        let count = tiles.prefetch(rect)?;
        debug!("prefetch; tiles: {}, exec: {:?}", count, now.elapsed());
    }

    let eye_elevation = eye_elevation(tiles, config)?;
    let (horizon_angle, horizon_distance) = config
        .earth
        .horizon(eye_elevation, config.max_distance_m);

    let mut panorama =
        Panorama::with_capacity(config.observer, eye_elevation, config.bearing_count());
    for bearing in config.bearings() {
        let mut silhouette = Silhouette {
            bearing,
            angle: horizon_angle,
            distance: horizon_distance,
        };
        for sample in Ray::new(tiles, config, eye_elevation, bearing) {
            silhouette.observe(&sample?);
        }
        panorama.push(silhouette);
    }

    debug!(
        "sweep; bearings: {}, steps: {}, tiles: {}, exec: {:?}",
        panorama.len(),
        config.distance_count(),
        tiles.len(),
        now.elapsed()
    );

    Ok(panorama)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::excessive_precision)]

    use super::{sweep, SweepConfig};
    use crate::{
        constants::MEAN_EARTH_RADIUS,
        earth::EarthModel,
        tiles::{MemProvider, Tiles},
        TerrainError,
    };
    use approx::assert_relative_eq;
    use geo::geometry::Coord;
    use srtm::Tile;

    const OBSERVER: Coord<f64> = Coord {
        x: -119.765_994_1,
        y: 37.010_265_6,
    };
    const N37W120: Coord<i16> = Coord { x: -120, y: 37 };

    /// A band of constant elevation around [OBSERVER].
    #[derive(Clone, Copy)]
    struct Ridge {
        near_m: f64,
        far_m: f64,
        min_bearing: f64,
        max_bearing: f64,
        elevation: i16,
    }

    /// Returns (distance, bearing) from [OBSERVER] on the
    /// equirectangular plane.
    fn from_observer(lat: f64, lon: f64) -> (f64, f64) {
        let meters_per_degree = MEAN_EARTH_RADIUS.to_radians();
        let mean_lat = (lat + OBSERVER.y) / 2.0;
        let dy = (lat - OBSERVER.y) * meters_per_degree;
        let dx = (lon - OBSERVER.x) * meters_per_degree * mean_lat.to_radians().cos();
        (dx.hypot(dy), dx.atan2(dy).to_degrees().rem_euclid(360.0))
    }

    fn ridge_tile(ridges: &[Ridge]) -> Tile {
        Tile::from_fn(N37W120, |row, col| {
            let lat = 38.0 - row as f64 / 1200.0;
            let lon = -120.0 + col as f64 / 1200.0;
            let (distance, bearing) = from_observer(lat, lon);
            ridges
                .iter()
                .find(|r| {
                    (r.near_m..=r.far_m).contains(&distance)
                        && (r.min_bearing..=r.max_bearing).contains(&bearing)
                })
                .map_or(0, |r| r.elevation)
        })
    }

    fn scenario_tiles() -> Tiles<MemProvider> {
        let ridge = Ridge {
            near_m: 9_900.0,
            far_m: 10_100.0,
            min_bearing: 20.0,
            max_bearing: 40.0,
            elevation: 1000,
        };
        Tiles::new(MemProvider::new().with_tile(&ridge_tile(&[ridge])))
    }

    fn scenario_config(earth: EarthModel) -> SweepConfig {
        SweepConfig::builder()
            .observer(OBSERVER)
            .height(1.538)
            .span(60.0)
            .bearing_step(1.0)
            .max_distance(20_000.0)
            .distance_step(100.0)
            .earth(earth)
            .build()
            .unwrap()
    }

    #[test]
    fn test_ridge_on_flat_earth() {
        let tiles = scenario_tiles();
        let panorama = sweep(&tiles, &scenario_config(EarthModel::default())).unwrap();
        assert_eq!(panorama.len(), 60);
        assert_relative_eq!(panorama.eye_elevation(), 1.538);

        let lowest = (998.462_f64 / 10_100.0).atan();
        let highest = (998.462_f64 / 9_900.0).atan();
        for s in &panorama {
            if (25.0..=35.0).contains(&s.bearing) {
                assert!(
                    lowest <= s.angle && s.angle <= highest,
                    "bearing {}: {}",
                    s.bearing,
                    s.angle
                );
                assert!((9_900.0..=10_100.0).contains(&s.distance));
            }
            if s.bearing <= 10.0 || s.bearing >= 50.0 {
                assert_eq!(s.angle, 0.0, "bearing {}", s.bearing);
                assert_eq!(s.distance, 20_000.0);
            }
        }
    }

    #[test]
    fn test_ridge_on_round_earth() {
        let earth = EarthModel::spherical(6_371_000.0, 0.25).unwrap();
        let tiles = scenario_tiles();
        let panorama = sweep(&tiles, &scenario_config(earth)).unwrap();
        let (horizon_angle, horizon_distance) = earth.horizon(1.538, 20_000.0);
        assert!(horizon_angle < 0.0);

        let highest = (998.462_f64 / 9_900.0).atan();
        for round in &panorama {
            if (25.0..=35.0).contains(&round.bearing) {
                // The ridge sinks a little but still stands out.
                assert!(round.angle < highest);
                assert!(round.angle > 0.09);
            }
            if round.bearing <= 10.0 || round.bearing >= 50.0 {
                assert_eq!(round.angle, horizon_angle);
                assert_eq!(round.distance, horizon_distance);
            }
        }
    }

    #[test]
    fn test_no_data_is_never_above_horizon() {
        let tiles = Tiles::new(MemProvider::new());
        for earth in [
            EarthModel::default(),
            EarthModel::spherical(6_371_000.0, 0.25).unwrap(),
            EarthModel::spherical(6_371_000.0, 0.0).unwrap(),
        ] {
            let config = scenario_config(earth);
            let panorama = sweep(&tiles, &config).unwrap();
            let (angle, distance) = earth.horizon(1.538, config.max_distance_m);
            assert_eq!(panorama.len(), 60);
            assert!(panorama
                .iter()
                .all(|s| s.angle == angle && s.distance == distance));
        }
    }

    #[test]
    fn test_near_ridge_hides_lower_far_ridge() {
        let near = Ridge {
            near_m: 1_900.0,
            far_m: 2_100.0,
            min_bearing: 0.0,
            max_bearing: 360.0,
            elevation: 300,
        };
        let far = |elevation| Ridge {
            near_m: 7_900.0,
            far_m: 8_100.0,
            min_bearing: 0.0,
            max_bearing: 360.0,
            elevation,
        };
        let config = scenario_config(EarthModel::default());

        let hidden = Tiles::new(MemProvider::new().with_tile(&ridge_tile(&[near, far(600)])));
        let panorama = sweep(&hidden, &config).unwrap();
        assert!(panorama
            .iter()
            .all(|s| (1_900.0..=2_100.0).contains(&s.distance)));

        let towering = Tiles::new(MemProvider::new().with_tile(&ridge_tile(&[near, far(1500)])));
        let panorama = sweep(&towering, &config).unwrap();
        assert!(panorama
            .iter()
            .all(|s| (7_900.0..=8_100.0).contains(&s.distance)));
    }

    #[test]
    fn test_sweep_is_deterministic() {
        let config = scenario_config(EarthModel::spherical(6_371_000.0, 0.25).unwrap());
        let tiles = scenario_tiles();
        let first = sweep(&tiles, &config).unwrap();
        let second = sweep(&tiles, &config).unwrap();
        let fresh = sweep(&scenario_tiles(), &config).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_string(), fresh.to_string());
    }

    #[test]
    fn test_prefetch() {
        let config = scenario_config(EarthModel::default());
        let tiles = scenario_tiles();
        sweep(&tiles, &config).unwrap();
        assert_eq!(tiles.len(), 1);

        let tiles = scenario_tiles();
        let config = SweepConfig {
            prefetch: true,
            ..config
        };
        sweep(&tiles, &config).unwrap();
        // The sight circle reaches south into N36W120.
        assert_eq!(tiles.len(), 2);
    }

    #[test]
    fn test_bearings() {
        let config = SweepConfig::builder()
            .observer(OBSERVER)
            .span(1.0)
            .bearing_step(0.1)
            .build()
            .unwrap();
        assert_eq!(config.bearing_count(), 10);

        let config = SweepConfig {
            start_bearing: 350.0,
            span: 20.0,
            bearing_step: 5.0,
            ..config
        };
        assert_eq!(
            config.bearings().collect::<Vec<_>>(),
            vec![350.0, 355.0, 360.0, 365.0]
        );

        // A partial step still gets a bearing.
        let config = SweepConfig { span: 21.0, ..config };
        assert_eq!(config.bearing_count(), 5);
    }

    #[test]
    fn test_sliver_span_sweeps_start_bearing() {
        let config = SweepConfig {
            start_bearing: 30.0,
            span: 1e-10,
            bearing_step: 1.0,
            ..scenario_config(EarthModel::default())
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.bearing_count(), 1);

        let panorama = sweep(&scenario_tiles(), &config).unwrap();
        assert_eq!(panorama.len(), 1);
        assert_eq!(panorama.get(0).map(|s| s.bearing), Some(30.0));
        // Bearing 30 looks straight at the ridge.
        assert!(panorama.get(0).map_or(false, |s| s.angle > 0.09));
    }

    #[test]
    fn test_distance_count() {
        let config = scenario_config(EarthModel::default());
        assert_eq!(config.distance_count(), 200);
        let config = SweepConfig {
            max_distance_m: 20_050.0,
            ..config
        };
        assert_eq!(config.distance_count(), 200);
    }

    #[test]
    fn test_builder_defaults() {
        assert!(matches!(
            SweepConfig::builder().build(),
            Err(TerrainError::Builder("observer"))
        ));
        let config = SweepConfig::builder().observer(OBSERVER).build().unwrap();
        assert_eq!(config.height_m, 1.8);
        assert_eq!(config.start_bearing, 0.0);
        assert_eq!(config.span, 60.0);
        assert_eq!(config.bearing_step, 0.1);
        assert_eq!(config.max_distance_m, 500_000.0);
        assert_eq!(config.distance_step_m, 90.0);
        assert_eq!(config.earth, EarthModel::default());
        assert!(!config.prefetch);
        assert_eq!(config.bearing_count(), 600);
    }

    #[test]
    fn test_invalid_config() {
        let valid = scenario_config(EarthModel::default());
        let invalid = [
            SweepConfig {
                observer: Coord { x: 0.0, y: 91.0 },
                ..valid
            },
            SweepConfig {
                observer: Coord { x: 181.0, y: 0.0 },
                ..valid
            },
            SweepConfig {
                height_m: -1.0,
                ..valid
            },
            SweepConfig {
                height_m: f64::NAN,
                ..valid
            },
            SweepConfig {
                span: 0.0,
                ..valid
            },
            SweepConfig {
                bearing_step: -1.0,
                ..valid
            },
            SweepConfig {
                distance_step_m: 0.0,
                ..valid
            },
            SweepConfig {
                max_distance_m: 50.0,
                ..valid
            },
            SweepConfig {
                max_distance_m: f64::INFINITY,
                ..valid
            },
            // Far too many bearings to allocate.
            SweepConfig {
                bearing_step: 1e-300,
                ..valid
            },
            SweepConfig {
                span: 360.0,
                bearing_step: 1e-4,
                ..valid
            },
            // Far too many steps along each bearing.
            SweepConfig {
                distance_step_m: 1e-9,
                ..valid
            },
        ];
        let tiles = Tiles::new(MemProvider::new());
        for config in invalid {
            assert!(
                matches!(sweep(&tiles, &config), Err(TerrainError::Config(_))),
                "{config:?}"
            );
        }
        // Validation happens before any tile is touched.
        assert!(tiles.is_empty());
    }
}
