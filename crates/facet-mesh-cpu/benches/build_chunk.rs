use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::time::Duration;

use facet_field::{ChunkCoord, SampleGrid, Sdf, SdfConfig};
use facet_geom::Vec2;
use facet_mesh_cpu::{BuildCtx, Profile, QualityParams, build_chunk};

fn rasterize(sdf: &Sdf, coord: ChunkCoord, q: &QualityParams) -> SampleGrid {
    SampleGrid::rasterize(
        sdf,
        coord.origin(q.chunk_size),
        q.cell_size(),
        q.resolution,
        q.max_distance,
    )
    .unwrap()
}

fn circles() -> Sdf {
    let circle = |x: f32, y: f32, r: f32| Sdf::Circle {
        center: Vec2::new(x, y),
        radius: r,
    };
    let ring = Sdf::Subtract(Box::new(circle(8.0, 8.0, 6.0)), Box::new(circle(8.0, 8.0, 3.0)));
    Sdf::Union(Box::new(ring), Box::new(circle(14.0, 3.0, 2.5)))
}

fn noise() -> Sdf {
    SdfConfig::Noise {
        seed: 1337,
        frequency: 0.15,
        threshold: 0.1,
        amplitude: 2.0,
        min: Vec2::new(-8.0, -8.0),
        max: Vec2::new(24.0, 24.0),
    }
    .build()
    .unwrap()
}

fn bench_build_chunk_circles(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_chunk_circles");
    let q = QualityParams::default();
    let coord = ChunkCoord::new(0, 0);
    let grid = rasterize(&circles(), coord, &q);
    let mut ctx = BuildCtx::default();
    for (name, profile) in [
        ("sharp", Profile::sharp(1.0)),
        ("chamfer", Profile::chamfer(1.0, 0.5)),
        ("rounded", Profile::rounded(1.0, 0.75, 4)),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| black_box(build_chunk(&mut ctx, &grid, coord, &q, &profile)))
        });
    }
    group.finish();
}

fn bench_build_chunk_noise(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_chunk_noise");
    group.measurement_time(Duration::from_secs(8));
    let q = QualityParams::default();
    let coord = ChunkCoord::new(0, 0);
    let grid = rasterize(&noise(), coord, &q);
    let profile = Profile::chamfer(0.5, 0.25);
    let mut ctx = BuildCtx::default();
    group.bench_function("chamfer_32", |b| {
        b.iter(|| black_box(build_chunk(&mut ctx, &grid, coord, &q, &profile)))
    });
    group.bench_function("rasterize_32", |b| {
        let sdf = noise();
        b.iter(|| black_box(rasterize(&sdf, coord, &q)))
    });
    group.finish();
}

criterion_group!(benches, bench_build_chunk_circles, bench_build_chunk_noise);
criterion_main!(benches);
