mod options;

use anyhow::{anyhow, bail, Error as AnyError};
use clap::Parser;
use geo::geometry::Coord;
use horizon::{
    constants::METERS_PER_MILE, look, sweep, DirProvider, EarthModel, Panorama, Silhouette,
    SweepConfig, SweepConfigBuilder, Tiles, VisibilitySample,
};
use log::debug;
use options::{Cli, Command as CliCmd, EarthArgs, Format, ObserverArgs, SightArgs};
use serde::Serialize;
use std::{io::Write, path::PathBuf};

fn main() -> Result<(), AnyError> {
    env_logger::init();

    let Cli {
        tile_dir,
        tile_mode,
        cmd,
    } = Cli::parse();

    let tiles = || -> Result<Tiles, AnyError> {
        let tile_dir: PathBuf = tile_dir
            .clone()
            .ok_or_else(|| anyhow!("no tile directory, pass --tile-dir or set DEM_DATA"))?;
        Ok(Tiles::new(DirProvider::new(tile_dir, tile_mode.into())?))
    };

    match cmd {
        CliCmd::Panorama {
            observer,
            sight,
            earth,
            bearing,
            span,
            step,
            format,
        } => {
            let config = sweep_config(observer, sight, earth)?
                .start_bearing(bearing - span / 2.0)
                .span(span)
                .bearing_step(step)
                .build()?;
            debug!("{config:?}");
            let panorama = sweep(&tiles()?, &config)?;
            match format {
                Format::Text => print_text(&panorama)?,
                Format::Json => print_panorama_json(&panorama, &config.earth)?,
            }
        }
        CliCmd::Look {
            observer,
            sight,
            earth,
            bearing,
            format,
        } => {
            let config = sweep_config(observer, sight, earth)?.build()?;
            let samples = look(&tiles()?, &config, bearing)?;
            match format {
                Format::Text => print_samples(&samples)?,
                Format::Json => println!("{}", serde_json::to_string(&samples)?),
            }
        }
        CliCmd::Histogram { lat, lon, format } => {
            let tile = tiles()?.get(Coord { x: lon, y: lat })?;
            if tile.is_tombstone() {
                bail!("no tile covers {lat},{lon}");
            }
            print_histogram(&tile.histogram(), format)?;
        }
        CliCmd::Curvature {
            distance,
            height,
            earth,
            format,
        } => print_curvature(&earth_model(earth)?, distance * 1000.0, height, format)?,
    }

    Ok(())
}

/// Builds the earth model, where an infinite radius means flat.
fn earth_model(
    EarthArgs {
        radius_miles,
        refraction,
    }: EarthArgs,
) -> Result<EarthModel, AnyError> {
    Ok(EarthModel::spherical(
        radius_miles * METERS_PER_MILE,
        refraction,
    )?)
}

fn sweep_config(
    ObserverArgs { lat, lon, height }: ObserverArgs,
    SightArgs {
        distance,
        distance_step,
        prefetch,
    }: SightArgs,
    earth: EarthArgs,
) -> Result<SweepConfigBuilder, AnyError> {
    Ok(SweepConfig::builder()
        .observer(Coord { x: lon, y: lat })
        .height(height)
        .max_distance(distance * 1000.0)
        .distance_step(distance_step)
        .earth(earth_model(earth)?)
        .prefetch(prefetch))
}

fn print_text(panorama: &Panorama) -> Result<(), AnyError> {
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "{panorama}")?;
    Ok(())
}

fn print_panorama_json(panorama: &Panorama, earth: &EarthModel) -> Result<(), AnyError> {
    #[derive(Serialize)]
    struct JsonPanorama<'a> {
        observer: [f64; 2],
        eye_elevation: f64,
        earth: &'a EarthModel,
        silhouettes: &'a [Silhouette],
    }

    let Coord { x, y } = panorama.observer();
    let json = serde_json::to_string(&JsonPanorama {
        observer: [x, y],
        eye_elevation: panorama.eye_elevation(),
        earth,
        silhouettes: panorama.as_slice(),
    })?;
    println!("{json}");
    Ok(())
}

fn print_samples(samples: &[VisibilitySample]) -> Result<(), AnyError> {
    let mut stdout = std::io::stdout().lock();
    for VisibilitySample {
        distance,
        elevation,
        angle,
    } in samples
    {
        writeln!(stdout, "{distance} {elevation} {angle}")?;
    }
    Ok(())
}

fn print_histogram(
    histogram: &std::collections::BTreeMap<srtm::Elev, usize>,
    format: Format,
) -> Result<(), AnyError> {
    #[derive(Serialize)]
    struct JsonEntry {
        elevation: srtm::Elev,
        count: usize,
    }

    match format {
        Format::Text => {
            let mut stdout = std::io::stdout().lock();
            for (elevation, count) in histogram {
                writeln!(stdout, "{elevation} {count}")?;
            }
        }
        Format::Json => {
            let reshaped: Vec<JsonEntry> = histogram
                .iter()
                .map(|(&elevation, &count)| JsonEntry { elevation, count })
                .collect();
            println!("{}", serde_json::to_string(&reshaped)?);
        }
    }
    Ok(())
}

fn print_curvature(
    earth: &EarthModel,
    distance_m: f64,
    height_m: f64,
    format: Format,
) -> Result<(), AnyError> {
    #[derive(Serialize)]
    struct Curvature {
        radius_m: f64,
        refraction: f64,
        distance_m: f64,
        height_m: f64,
        drop_m: f64,
        arc_drop_m: f64,
        horizon_distance_m: f64,
        hidden_height_m: f64,
    }

    let curvature = Curvature {
        radius_m: earth.radius().meters(),
        refraction: earth.refraction(),
        distance_m,
        height_m,
        drop_m: earth.drop(distance_m),
        arc_drop_m: earth.arc_drop(distance_m),
        horizon_distance_m: earth.horizon_distance(height_m),
        hidden_height_m: earth.hidden_height(distance_m, height_m),
    };

    match format {
        Format::Text => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "radius: {} m", curvature.radius_m)?;
            writeln!(stdout, "refraction: {}", curvature.refraction)?;
            writeln!(stdout, "drop: {} m", curvature.drop_m)?;
            writeln!(stdout, "arc drop: {} m", curvature.arc_drop_m)?;
            writeln!(stdout, "horizon distance: {} m", curvature.horizon_distance_m)?;
            writeln!(stdout, "hidden height: {} m", curvature.hidden_height_m)?;
        }
        Format::Json => println!("{}", serde_json::to_string(&curvature)?),
    }
    Ok(())
}
