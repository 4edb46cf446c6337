//! Looking out along a single bearing.

use crate::{
    earth::EarthModel,
    sweep::SweepConfig,
    tiles::{sample_elevation, sw_corner, TileProvider, Tiles},
    TerrainError,
};
use geo::geometry::Coord;
use serde::Serialize;
use srtm::Tile;
use std::sync::Arc;

/// Elevation assumed wherever there is no data.
const SEA_LEVEL: f64 = 0.0;

/// What the observer sees at one step along a bearing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisibilitySample {
    /// Ground distance from the observer in meters.
    pub distance: f64,

    /// Terrain elevation in meters, 0 where there is no data.
    pub elevation: f64,

    /// Apparent elevation angle in radians.
    pub angle: f64,
}

/// Marches away from the observer along one bearing, nearest sample
/// first.
pub struct Ray<'a, P> {
    tiles: &'a Tiles<P>,
    earth: EarthModel,
    origin: Coord<f64>,
    bearing: f64,

    /// Observer's eye above sea level.
    eye_elevation: f64,

    step_m: f64,
    steps: usize,
    current: usize,

    /// Most recently used tile, so consecutive steps usually skip the
    /// tile cache.
    tile: Option<Arc<Tile>>,
}

impl<'a, P: TileProvider> Ray<'a, P> {
    pub fn new(tiles: &'a Tiles<P>, config: &SweepConfig, eye_elevation: f64, bearing: f64) -> Self {
        Self {
            tiles,
            earth: config.earth,
            origin: config.observer,
            bearing,
            eye_elevation,
            step_m: config.distance_step_m,
            steps: config.distance_count(),
            current: 0,
            tile: None,
        }
    }

    /// Reads elevation from the tile `coord` floors into, which is not
    /// always the tile whose edge samples it rounds to.
    fn elevation(&mut self, coord: Coord<f64>) -> Result<f64, TerrainError> {
        let owner = sw_corner(coord);
        if !self
            .tile
            .as_ref()
            .map_or(false, |tile| tile.sw_corner() == owner)
        {
            self.tile = Some(self.tiles.get(coord)?);
        }
        Ok(self
            .tile
            .as_ref()
            .and_then(|tile| sample_elevation(tile, coord))
            .unwrap_or(SEA_LEVEL))
    }
}

impl<'a, P: TileProvider> Iterator for Ray<'a, P> {
    type Item = Result<VisibilitySample, TerrainError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.steps {
            return None;
        }
        self.current += 1;

        #[allow(clippy::cast_precision_loss)]
        let distance = self.current as f64 * self.step_m;
        let coord = self.earth.destination(self.origin, self.bearing, distance);
        let elevation = match self.elevation(coord) {
            Ok(elevation) => elevation,
            Err(e) => {
                self.current = self.steps;
                return Some(Err(e));
            }
        };
        let angle = self
            .earth
            .apparent_angle(distance, elevation, self.eye_elevation);

        Some(Ok(VisibilitySample {
            distance,
            elevation,
            angle,
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.steps - self.current;
        (remaining, Some(remaining))
    }
}

/// Returns the observer's eye elevation above sea level.
pub(crate) fn eye_elevation<P: TileProvider>(
    tiles: &Tiles<P>,
    config: &SweepConfig,
) -> Result<f64, TerrainError> {
    let ground = tiles.elevation(config.observer)?.unwrap_or(SEA_LEVEL);
    Ok(ground + config.height_m)
}

/// Returns every sample along `bearing` out to the configured sight
/// distance.
pub fn look<P: TileProvider>(
    tiles: &Tiles<P>,
    config: &SweepConfig,
    bearing: f64,
) -> Result<Vec<VisibilitySample>, TerrainError> {
    config.validate()?;
    let eye_elevation = eye_elevation(tiles, config)?;
    Ray::new(tiles, config, eye_elevation, bearing).collect()
}

#[cfg(test)]
mod tests {
    use super::look;
    use crate::{
        earth::EarthModel,
        sweep::SweepConfig,
        tiles::{MemProvider, Tiles},
        TerrainError,
    };
    use approx::assert_relative_eq;
    use geo::geometry::Coord;
    use srtm::{Tile, VOID};

    const N37W120: Coord<i16> = Coord { x: -120, y: 37 };

    fn config(observer: Coord<f64>) -> SweepConfig {
        SweepConfig::builder()
            .observer(observer)
            .height(2.0)
            .max_distance(1_000.0)
            .distance_step(100.0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_look_over_plateau() {
        let tiles = Tiles::new(MemProvider::new().with_tile(&Tile::from_fn(N37W120, |_, _| 50)));
        let samples = look(&tiles, &config(Coord { x: -119.5, y: 37.5 }), 45.0).unwrap();
        assert_eq!(samples.len(), 10);
        for (i, sample) in samples.iter().enumerate() {
            assert_relative_eq!(sample.distance, 100.0 * (i + 1) as f64);
            assert_eq!(sample.elevation, 50.0);
            // Eye is 2m above the plateau.
            assert_relative_eq!(sample.angle, (-2.0_f64).atan2(sample.distance));
        }
    }

    #[test]
    fn test_look_treats_missing_data_as_sea_level() {
        let tile = Tile::from_fn(N37W120, |_, _| VOID);
        let tiles = Tiles::new(MemProvider::new().with_tile(&tile));
        let mut config = config(Coord { x: -119.5, y: 37.5 });
        config.earth = EarthModel::spherical(6_371_000.0, 0.0).unwrap();
        let samples = look(&tiles, &config, 270.0).unwrap();
        assert!(samples.iter().all(|s| s.elevation == 0.0));
        let last = samples.last().unwrap();
        assert_relative_eq!(
            last.angle,
            (-2.0 - config.earth.drop(1_000.0)).atan2(1_000.0)
        );

        // Off the edge of the known world entirely.
        let empty = Tiles::new(MemProvider::new());
        let samples = look(&empty, &config, 0.0).unwrap();
        assert_eq!(samples.len(), 10);
        assert!(samples.iter().all(|s| s.elevation == 0.0));
    }

    #[test]
    fn test_look_reads_owning_tile_across_edge() {
        // Plateau to the west, nothing east of -119.
        let tiles = Tiles::new(MemProvider::new().with_tile(&Tile::from_fn(N37W120, |_, _| 500)));
        let observer = Coord { x: -119.01, y: 37.5 };
        let config = SweepConfig::builder()
            .observer(observer)
            .height(2.0)
            .max_distance(2_000.0)
            .distance_step(10.0)
            .build()
            .unwrap();
        let samples = look(&tiles, &config, 90.0).unwrap();
        let mut crossed = 0;
        for sample in &samples {
            let coord = config.earth.destination(observer, 90.0, sample.distance);
            if coord.x >= -119.0 {
                crossed += 1;
                assert_eq!(sample.elevation, 0.0, "{coord:?}");
            } else {
                assert_eq!(sample.elevation, 500.0, "{coord:?}");
            }
        }
        assert!(crossed > 0);
    }

    #[test]
    fn test_look_propagates_bad_tiles() {
        let mut provider = MemProvider::new();
        provider.insert(N37W120, vec![1, 2, 3]);
        let tiles = Tiles::new(provider);
        let res = look(&tiles, &config(Coord { x: -119.5, y: 37.5 }), 0.0);
        assert!(matches!(res, Err(TerrainError::Srtm(_))));
    }
}
