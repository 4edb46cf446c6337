use crate::{Elev, Tile, C, VOID};
use geo::geometry::Coord;

/// An SRTM elevation sample.
pub struct Sample<'a> {
    /// The parent [Tile] this sample belongs to.
    pub(crate) tile: &'a Tile,
    /// Index into parent's elevation data corresponding to this
    /// sample.
    pub(crate) index: usize,
}

impl<'a> Sample<'a> {
    /// Sample elevation in meters, or [VOID].
    pub fn elevation(&self) -> Elev {
        self.tile.samples.get_linear_unchecked(self.index)
    }

    pub fn is_void(&self) -> bool {
        self.elevation() == VOID
    }

    /// This sample's (row, col) in the source tile.
    ///
    /// Note that (0, 0) is the NW corner.
    pub fn rc(&self) -> (usize, usize) {
        self.tile.linear_to_rc(self.index)
    }

    /// Geographic center of this sample.
    pub fn geo(&self) -> Coord<C> {
        self.tile.rc_to_geo(self.rc())
    }
}
