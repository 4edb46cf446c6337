//! Elevation field backed by lazily loaded SRTM tiles.

use crate::TerrainError;
use dashmap::DashMap;
use geo::geometry::{Coord, Rect};
use log::{debug, warn};
use srtm::{file_name, Tile, TileData, VOID};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Floating point type used for tile lookup.
pub type C = f64;

/// Somewhere to get raw tile bytes from.
pub trait TileProvider {
    /// Returns the raw contents of the tile with southwest corner
    /// `sw_corner`, or `None` if the tile is not available.
    fn fetch(&self, sw_corner: Coord<i16>) -> Result<Option<TileData>, TerrainError>;
}

#[derive(Clone)]
pub struct Tiles<P = DirProvider> {
    provider: P,

    /// Tiles which have been loaded on demand.
    ///
    /// Tiles the provider doesn't have are stored as tombstones so
    /// they are only requested once.
    tiles: DashMap<Coord<i16>, Arc<Tile>>,
}

impl<P: TileProvider> Tiles<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            tiles: DashMap::new(),
        }
    }

    /// Returns the tile containing `coord`.
    ///
    /// `Tiles` will attempt to fetch the tile from its provider if it
    /// doesn't already have it in memory.
    pub fn get(&self, coord: Coord<C>) -> Result<Arc<Tile>, TerrainError> {
        let sw_corner = sw_corner(coord);
        self.tiles
            .entry(sw_corner)
            .or_try_insert_with(|| self.load_tile(sw_corner).map(Arc::new))
            .map(|r| r.clone())
    }

    /// Returns the elevation nearest to `coord` in meters, or `None`
    /// where there is no data.
    pub fn elevation(&self, coord: Coord<C>) -> Result<Option<C>, TerrainError> {
        let tile = self.get(coord)?;
        Ok(sample_elevation(&tile, coord))
    }

    /// Loads every tile intersecting `rect`, returning how many tiles
    /// that covers.
    ///
    /// `rect` may run past ±180° longitude, in which case it wraps
    /// around the antimeridian.
    pub fn prefetch(&self, rect: Rect<C>) -> Result<usize, TerrainError> {
        let Coord { x: west, y: south } = sw_corner(rect.min());
        let Coord { x: east, y: north } = sw_corner(rect.max());
        let columns = (i32::from(east) - i32::from(west) + 1).clamp(0, 360);
        let mut count = 0;
        for lat in south.max(-90)..=north.min(89) {
            for column in 0..columns {
                let lon = (i32::from(west) + column + 180).rem_euclid(360) - 180;
                self.get(Coord {
                    x: C::from(lon) + 0.5,
                    y: C::from(lat) + 0.5,
                })?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Returns the number of tiles loaded so far, tombstones included.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Private API.
impl<P: TileProvider> Tiles<P> {
    fn load_tile(&self, sw_corner: Coord<i16>) -> Result<Tile, TerrainError> {
        match self.provider.fetch(sw_corner)? {
            Some(data) => Ok(Tile::from_data(sw_corner, data)?),
            None => Ok(Self::load_tombstone(sw_corner)),
        }
    }

    fn load_tombstone(sw_corner: Coord<i16>) -> Tile {
        debug!("loading tombstone in lieu of missing tile for {sw_corner:?}");
        Tile::tombstone(sw_corner)
    }
}

/// Returns the elevation of the sample nearest `coord`, treating voids
/// as no data.
pub(crate) fn sample_elevation(tile: &Tile, coord: Coord<C>) -> Option<C> {
    tile.get(coord)
        .filter(|&elevation| elevation != VOID)
        .map(C::from)
}

/// How to handle tile.
///
/// The trade off between loading tile data into memory versus memory
/// mapping is not obvious, and you should measure both before
/// deciding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileMode {
    /// Parse tile and load into memory.
    ///
    /// Note that this can consume gigabytes of RAM when loading many
    /// tiles.
    InMem,

    /// Memory map file contents.
    MemMap,
}

/// Reads `.hgt` files from a directory tree.
///
/// Tiles are looked up by name, upper or lower case, in the tile
/// directory and up to two levels of subdirectories below it.
#[derive(Debug, Clone)]
pub struct DirProvider {
    /// How to load tiles (in-memory or mapped).
    tile_mode: TileMode,

    /// Directories searched for tiles, shallowest first.
    search_dirs: Vec<PathBuf>,
}

impl DirProvider {
    const MAX_DEPTH: usize = 2;

    pub fn new(tile_dir: PathBuf, tile_mode: TileMode) -> Result<Self, TerrainError> {
        let mut search_dirs = vec![tile_dir.clone()];
        let mut has_height_files = false;

        // Let's try to fail early be checking that tile_dir has at
        // least one `hgt` file.
        let mut frontier = vec![tile_dir.clone()];
        for depth in 0..=Self::MAX_DEPTH {
            let mut next = Vec::new();
            for dir in &frontier {
                for entry in std::fs::read_dir(dir)? {
                    let path = entry?.path();
                    if path.is_dir() {
                        if depth < Self::MAX_DEPTH {
                            next.push(path);
                        }
                    } else if is_hgt(&path) {
                        has_height_files = true;
                    }
                }
            }
            next.sort();
            search_dirs.extend(next.iter().cloned());
            frontier = next;
        }

        if has_height_files {
            Ok(Self {
                tile_mode,
                search_dirs,
            })
        } else {
            Err(TerrainError::Path(tile_dir))
        }
    }

    /// Returns the path of the tile with southwest corner `sw_corner`,
    /// if there is one.
    pub fn find(&self, sw_corner: Coord<i16>) -> Option<PathBuf> {
        let file_name = file_name(sw_corner);
        let names = [file_name.clone(), file_name.to_lowercase()];
        self.search_dirs
            .iter()
            .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
            .find(|path| path.is_file())
    }
}

impl TileProvider for DirProvider {
    fn fetch(&self, sw_corner: Coord<i16>) -> Result<Option<TileData>, TerrainError> {
        let Some(tile_path) = self.find(sw_corner) else {
            return Ok(None);
        };
        debug!("loading {tile_path:?}");
        let data = match self.tile_mode {
            TileMode::InMem => TileData::read(&tile_path),
            TileMode::MemMap => TileData::map(&tile_path),
        };
        match data {
            Ok(data) => Ok(Some(data)),
            Err(e) => {
                warn!("unable to read {tile_path:?}, treating as missing: {e}");
                Ok(None)
            }
        }
    }
}

/// Serves tiles held in memory.
///
/// Tile bytes are shared, so clones of a `MemProvider` are cheap.
#[derive(Debug, Clone, Default)]
pub struct MemProvider {
    tiles: HashMap<Coord<i16>, Arc<[u8]>>,
}

impl MemProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds raw `.hgt` bytes for the tile with southwest corner
    /// `sw_corner`.
    ///
    /// Bytes are not validated until the tile is loaded.
    pub fn insert(&mut self, sw_corner: Coord<i16>, bytes: Vec<u8>) {
        self.tiles.insert(sw_corner, bytes.into());
    }

    pub fn with_tile(mut self, tile: &Tile) -> Self {
        self.insert(tile.sw_corner(), tile.to_be_bytes());
        self
    }
}

impl TileProvider for MemProvider {
    fn fetch(&self, sw_corner: Coord<i16>) -> Result<Option<TileData>, TerrainError> {
        Ok(self
            .tiles
            .get(&sw_corner)
            .map(|bytes| TileData::Owned(bytes.to_vec())))
    }
}

/// Returns the southwest corner as integers for coord.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn sw_corner(Coord { x, y }: Coord<C>) -> Coord<i16> {
    Coord {
        x: (x.floor() as i16),
        y: (y.floor() as i16),
    }
}

fn is_hgt(path: &Path) -> bool {
    path.extension()
        .and_then(std::ffi::OsStr::to_str)
        .map_or(false, |ext| ext.eq_ignore_ascii_case("hgt"))
}
