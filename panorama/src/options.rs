use clap::{Args, Parser, Subcommand, ValueEnum};
use horizon::TileMode;
use std::path::PathBuf;

/// Compute the terrain skyline seen from a point.
#[derive(Parser, Debug, Clone)]
pub struct Cli {
    /// Directory of SRTM hgt tiles, searched two levels deep.
    #[arg(short, long, env = "DEM_DATA")]
    pub tile_dir: Option<PathBuf>,

    /// How to hold tiles once loaded.
    #[arg(long, value_enum, default_value_t = Mode::MemMap)]
    pub tile_mode: Mode,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the skyline over a fan of bearings.
    Panorama {
        #[command(flatten)]
        observer: ObserverArgs,

        #[command(flatten)]
        sight: SightArgs,

        #[command(flatten)]
        earth: EarthArgs,

        /// Center of the fan, degrees clockwise from north.
        #[arg(short, long, default_value_t = 0.0, allow_negative_numbers = true)]
        bearing: f64,

        /// Width of the fan in degrees.
        #[arg(long, env = "SPAN", default_value_t = 60.0)]
        span: f64,

        /// Degrees between bearings.
        #[arg(long, default_value_t = 0.1)]
        step: f64,

        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Print every sample along one bearing.
    Look {
        #[command(flatten)]
        observer: ObserverArgs,

        #[command(flatten)]
        sight: SightArgs,

        #[command(flatten)]
        earth: EarthArgs,

        /// Degrees clockwise from north.
        #[arg(short, long, allow_negative_numbers = true)]
        bearing: f64,

        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Count the elevations in the tile covering a point.
    Histogram {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Print curvature figures for a line of sight.
    Curvature {
        /// Distance to the target in kilometers.
        #[arg(short, long)]
        distance: f64,

        /// Eye height above the surface in meters.
        #[arg(long, default_value_t = 1.8)]
        height: f64,

        #[command(flatten)]
        earth: EarthArgs,

        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Args, Debug, Clone, Copy)]
pub struct ObserverArgs {
    /// Observer latitude in degrees.
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    /// Observer longitude in degrees.
    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,

    /// Eye height above the ground in meters.
    #[arg(long, default_value_t = 1.8)]
    pub height: f64,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct SightArgs {
    /// How far to look, in kilometers.
    #[arg(short, long, default_value_t = 500.0)]
    pub distance: f64,

    /// Meters between samples along a bearing.
    #[arg(long, default_value_t = 90.0)]
    pub distance_step: f64,

    /// Load every tile in range before looking.
    #[arg(long, default_value_t = false)]
    pub prefetch: bool,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct EarthArgs {
    /// Earth radius in miles, `inf` for a flat earth.
    #[arg(long, env = "EARTH_RADIUS_MILES", default_value_t = f64::INFINITY)]
    pub radius_miles: f64,

    /// Fraction of curvature drop hidden by atmospheric refraction.
    #[arg(long, env = "COEFFICIENT_OF_REFRACTION", default_value_t = 0.25)]
    pub refraction: f64,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    InMem,
    MemMap,
}

impl From<Mode> for TileMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::InMem => TileMode::InMem,
            Mode::MemMap => TileMode::MemMap,
        }
    }
}
