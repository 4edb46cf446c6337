use criterion::{criterion_group, criterion_main, Criterion};
use geo::geometry::Coord;
use horizon::{sweep, EarthModel, MemProvider, SweepConfig, Tiles};
use srtm::Tile;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

/// Rolling hills with roughly 3km wavelength.
fn hills() -> Tile {
    Tile::from_fn(Coord { x: -120, y: 37 }, |row, col| {
        let (y, x) = (row as f64 / 30.0, col as f64 / 30.0);
        (500.0 + 400.0 * y.sin() * x.cos()) as i16
    })
}

fn panorama_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("Panorama Sweep");

    let provider = MemProvider::new().with_tile(&hills());
    let tiles = Tiles::new(provider);

    let config = SweepConfig::builder()
        .observer(Coord {
            x: -119.765_994_1,
            y: 37.010_265_6,
        })
        .span(60.0)
        .bearing_step(1.0)
        .max_distance(50_000.0)
        .build()
        .unwrap();

    group.bench_with_input("flat", &(&tiles, config), |b, (t, c)| {
        b.iter(|| sweep(*t, c).unwrap())
    });

    let config = SweepConfig {
        earth: EarthModel::spherical(6_371_000.0, 0.25).unwrap(),
        ..config
    };
    group.bench_with_input("spherical", &(&tiles, config), |b, (t, c)| {
        b.iter(|| sweep(*t, c).unwrap())
    });
}

criterion_group!(benches, panorama_sweep);
criterion_main!(benches);
