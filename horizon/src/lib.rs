//! Terrain skyline panoramas.
//!
//! Given an observer somewhere on an SRTM elevation field, [sweep]
//! marches outward along a fan of bearings and records, for each one,
//! the highest apparent elevation angle any terrain reaches along with
//! its distance. The earth is either flat or a refracting sphere.

pub mod constants;
mod earth;
mod error;
mod look;
pub mod math;
mod panorama;
mod sweep;
mod tiles;

pub use crate::{
    earth::{EarthModel, Radius},
    error::TerrainError,
    look::{look, Ray, VisibilitySample},
    panorama::{Panorama, Silhouette},
    sweep::{sweep, SweepConfig, SweepConfigBuilder},
    tiles::{DirProvider, MemProvider, TileMode, TileProvider, Tiles},
};
