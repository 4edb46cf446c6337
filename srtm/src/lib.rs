//! SRTM elevation (`.hgt`) file format.
//!
//! A tile covers one degree of latitude by one degree of longitude and
//! is named after its southwest corner, e.g. `N44W072.hgt`. Samples
//! are big-endian `i16`, row-major from north to south, each row from
//! west to east. The edge rows and columns of a tile duplicate those
//! of its neighbors.
//!
//! # References
//!
//! 1. [30-Meter SRTM Tile Downloader](https://dwtkns.com/srtm30m)
//! 1. [Archive Team](http://fileformats.archiveteam.org/index.php?title=HGT&oldid=17250)
//! 1. [SRTM Collection User Guide](https://lpdaac.usgs.gov/documents/179/SRTM_User_Guide_V3.pdf)

mod error;
mod sample;

pub use crate::{error::SrtmError, sample::Sample};
use byteorder::{BigEndian as BE, ByteOrder, ReadBytesExt};
use geo::geometry::Coord;
use memmap2::Mmap;
use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    mem::size_of,
    path::Path,
    sync::OnceLock,
};

/// Base floating point type used for all coordinates.
pub type C = f64;

/// Bit representation of elevation samples.
pub type Elev = i16;

/// Sentinel marking a void (no data) sample.
pub const VOID: Elev = i16::MIN;

/// Samples per side of a 3 arc-second (SRTM3) tile.
pub const SRTM3_DIMENSION: usize = 1201;

/// Samples per side of a 1 arc-second (SRTM1) tile.
pub const SRTM1_DIMENSION: usize = 3601;

const ARCSEC_PER_DEG: C = 3600.0;

pub struct Tile {
    /// Southwest corner of the tile.
    ///
    /// Specifically, the _center_ of the SW most sample of the tile.
    sw_corner: Coord<i16>,

    /// Arcseconds per sample.
    resolution: u8,

    /// Number of rows, which is also the number of columns.
    dimension: usize,

    /// Lowest and highest non-void samples, computed on first use.
    extremes: OnceLock<Option<(Elev, Elev)>>,

    /// Elevation samples.
    samples: SampleStore,
}

/// Raw tile contents, laid out exactly as an `.hgt` file.
pub enum TileData {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl TileData {
    /// Reads the whole file at `path` into memory.
    pub fn read<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        std::fs::read(path).map(Self::Owned)
    }

    /// Memory maps the file at `path`.
    pub fn map<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self::Mapped(mmap))
    }
}

enum SampleStore {
    Tombstone,
    InMem(Box<[Elev]>),
    MemMap(Mmap),
}

impl SampleStore {
    fn get_linear_unchecked(&self, index: usize) -> Elev {
        match self {
            Self::Tombstone => VOID,
            Self::InMem(samples) => samples[index],
            Self::MemMap(raw) => {
                let start = index * size_of::<Elev>();
                let end = start + size_of::<Elev>();
                BE::read_i16(&raw[start..end])
            }
        }
    }
}

impl Tile {
    /// Returns an in-memory tile parsed from raw `.hgt` bytes.
    ///
    /// Fails unless `bytes` holds exactly one SRTM1 or SRTM3 grid.
    pub fn parse(sw_corner: Coord<i16>, bytes: &[u8]) -> Result<Self, SrtmError> {
        let (resolution, dimension) = extract_resolution(bytes.len() as u64, sw_corner)?;
        let mut samples = vec![0; dimension * dimension];
        BE::read_i16_into(bytes, &mut samples);
        Ok(Self::new(
            sw_corner,
            resolution,
            dimension,
            SampleStore::InMem(samples.into_boxed_slice()),
        ))
    }

    /// Returns a tile reading its samples straight out of `mmap`.
    pub fn from_mmap(sw_corner: Coord<i16>, mmap: Mmap) -> Result<Self, SrtmError> {
        let (resolution, dimension) = extract_resolution(mmap.len() as u64, sw_corner)?;
        Ok(Self::new(
            sw_corner,
            resolution,
            dimension,
            SampleStore::MemMap(mmap),
        ))
    }

    pub fn from_data(sw_corner: Coord<i16>, data: TileData) -> Result<Self, SrtmError> {
        match data {
            TileData::Owned(bytes) => Self::parse(sw_corner, &bytes),
            TileData::Mapped(mmap) => Self::from_mmap(sw_corner, mmap),
        }
    }

    /// Returns a Tile read into memory from the file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SrtmError> {
        let sw_corner = parse_sw_corner(&path)?;
        let len = path.as_ref().metadata()?.len();
        let (resolution, dimension) = extract_resolution(len, sw_corner)?;

        let mut file = BufReader::new(File::open(path)?);
        let mut samples = vec![0; dimension * dimension];
        file.read_i16_into::<BE>(&mut samples)?;

        Ok(Self::new(
            sw_corner,
            resolution,
            dimension,
            SampleStore::InMem(samples.into_boxed_slice()),
        ))
    }

    /// Returns a Tile using the memory-mapped file as storage.
    pub fn memmap<P: AsRef<Path>>(path: P) -> Result<Self, SrtmError> {
        let sw_corner = parse_sw_corner(&path)?;
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_mmap(sw_corner, mmap)
    }

    /// Returns an SRTM3-shaped tile where every sample is [VOID].
    pub fn tombstone(sw_corner: Coord<i16>) -> Self {
        Self::new(sw_corner, 3, SRTM3_DIMENSION, SampleStore::Tombstone)
    }

    /// Returns an in-memory SRTM3 tile with samples produced by
    /// `f(row, col)`.
    pub fn from_fn<F>(sw_corner: Coord<i16>, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> Elev,
    {
        let dimension = SRTM3_DIMENSION;
        let samples: Vec<Elev> = (0..dimension * dimension)
            .map(|idx| f(idx / dimension, idx % dimension))
            .collect();
        Self::new(
            sw_corner,
            3,
            dimension,
            SampleStore::InMem(samples.into_boxed_slice()),
        )
    }

    pub fn sw_corner(&self) -> Coord<i16> {
        self.sw_corner
    }

    /// Returns this tile's resolution in arcseconds per sample.
    pub fn resolution(&self) -> u8 {
        self.resolution
    }

    /// Returns the number of samples along one side of this tile.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns the number of samples in this tile.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.dimension * self.dimension
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self.samples, SampleStore::Tombstone)
    }

    /// Returns the raw sample at (`row`, `col`), where (0, 0) is the
    /// NW corner.
    ///
    /// Returns `None` for out of range indices. Voids are returned as
    /// [VOID].
    pub fn sample_at(&self, row: usize, col: usize) -> Option<Elev> {
        if row < self.dimension && col < self.dimension {
            Some(self.samples.get_linear_unchecked(row * self.dimension + col))
        } else {
            None
        }
    }

    /// Returns the sample nearest to the given geo coordinates, or
    /// `None` if `coord` is not covered by this tile.
    pub fn get(&self, coord: Coord<C>) -> Option<Elev> {
        let (row, col) = self.coord_to_rc(coord)?;
        self.sample_at(row, col)
    }

    pub fn contains(&self, coord: Coord<C>) -> bool {
        self.coord_to_rc(coord).is_some()
    }

    /// Returns the lowest non-void sample in this tile.
    pub fn min_elevation(&self) -> Option<Elev> {
        self.extremes().map(|(min, _)| min)
    }

    /// Returns the highest non-void sample in this tile.
    pub fn max_elevation(&self) -> Option<Elev> {
        self.extremes().map(|(_, max)| max)
    }

    /// Returns the number of occurrences of every sample value,
    /// voids included.
    pub fn histogram(&self) -> BTreeMap<Elev, usize> {
        let mut counts = BTreeMap::new();
        for sample in self.iter() {
            *counts.entry(sample.elevation()).or_insert(0) += 1;
        }
        counts
    }

    /// Returns and iterator over `self`'s samples in file order.
    pub fn iter(&self) -> impl Iterator<Item = Sample<'_>> + '_ {
        (0..self.len()).map(|index| Sample { tile: self, index })
    }

    /// Encodes this tile in the on-disk `.hgt` layout.
    pub fn to_be_bytes(&self) -> Vec<u8> {
        let mut out = vec![0; self.len() * size_of::<Elev>()];
        for (chunk, sample) in out.chunks_exact_mut(size_of::<Elev>()).zip(self.iter()) {
            BE::write_i16(chunk, sample.elevation());
        }
        out
    }
}

/// Private API
impl Tile {
    fn new(sw_corner: Coord<i16>, resolution: u8, dimension: usize, samples: SampleStore) -> Self {
        Self {
            sw_corner,
            resolution,
            dimension,
            extremes: OnceLock::new(),
            samples,
        }
    }

    fn samples_per_degree(&self) -> C {
        ARCSEC_PER_DEG / C::from(self.resolution)
    }

    fn extremes(&self) -> Option<(Elev, Elev)> {
        *self.extremes.get_or_init(|| {
            self.iter()
                .filter(|sample| !sample.is_void())
                .map(|sample| sample.elevation())
                .fold(None, |acc, elev| match acc {
                    None => Some((elev, elev)),
                    Some((min, max)) => Some((min.min(elev), max.max(elev))),
                })
        })
    }

    /// Nearest (row, col) for `coord`, rows counted from the north.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn coord_to_rc(&self, Coord { x, y }: Coord<C>) -> Option<(usize, usize)> {
        let c = self.samples_per_degree();
        let col = ((x - C::from(self.sw_corner.x)) * c).round();
        let row_from_south = ((y - C::from(self.sw_corner.y)) * c).round();
        let last = (self.dimension - 1) as C;
        if (0.0..=last).contains(&col) && (0.0..=last).contains(&row_from_south) {
            Some(((last - row_from_south) as usize, col as usize))
        } else {
            None
        }
    }

    fn linear_to_rc(&self, index: usize) -> (usize, usize) {
        (index / self.dimension, index % self.dimension)
    }

    #[allow(clippy::cast_precision_loss)]
    fn rc_to_geo(&self, (row, col): (usize, usize)) -> Coord<C> {
        let c = self.samples_per_degree();
        Coord {
            x: C::from(self.sw_corner.x) + col as C / c,
            y: C::from(self.sw_corner.y) + (self.dimension - 1 - row) as C / c,
        }
    }
}

/// Returns the expected file name for the tile with southwest corner
/// `sw_corner`.
pub fn file_name(Coord { x, y }: Coord<i16>) -> String {
    let (n_s, lat) = {
        let lat = y.abs();
        let n_s = if y.is_negative() { 'S' } else { 'N' };
        (n_s, lat)
    };
    let (e_w, lon) = {
        let lon = x.abs();
        let e_w = if x.is_negative() { 'W' } else { 'E' };
        (e_w, lon)
    };
    format!("{n_s}{lat:02}{e_w}{lon:03}.hgt")
}

fn extract_resolution(len: u64, sw_corner: Coord<i16>) -> Result<(u8, usize), SrtmError> {
    const RES_1_ARCSECONDS_FILE_LEN: u64 =
        (SRTM1_DIMENSION * SRTM1_DIMENSION * size_of::<Elev>()) as u64;
    const RES_3_ARCSECONDS_FILE_LEN: u64 =
        (SRTM3_DIMENSION * SRTM3_DIMENSION * size_of::<Elev>()) as u64;
    match len {
        RES_1_ARCSECONDS_FILE_LEN => Ok((1, SRTM1_DIMENSION)),
        RES_3_ARCSECONDS_FILE_LEN => Ok((3, SRTM3_DIMENSION)),
        invalid_len => Err(SrtmError::HgtLen {
            len: invalid_len,
            name: file_name(sw_corner),
        }),
    }
}

fn parse_sw_corner<P: AsRef<Path>>(path: P) -> Result<Coord<i16>, SrtmError> {
    let mk_err = || SrtmError::HgtName(path.as_ref().to_owned());
    let name = path
        .as_ref()
        .file_stem()
        .and_then(std::ffi::OsStr::to_str)
        .map(str::to_ascii_uppercase)
        .ok_or_else(mk_err)?;
    if name.len() != 7 || !name.is_ascii() {
        return Err(mk_err());
    }
    let lat_sign = match &name[0..1] {
        "N" => 1,
        "S" => -1,
        _ => return Err(mk_err()),
    };
    let lat = lat_sign * name[1..3].parse::<i16>().map_err(|_| mk_err())?;
    let lon_sign = match &name[3..4] {
        "E" => 1,
        "W" => -1,
        _ => return Err(mk_err()),
    };
    let lon = lon_sign * name[4..7].parse::<i16>().map_err(|_| mk_err())?;
    Ok(Coord { x: lon, y: lat })
}
