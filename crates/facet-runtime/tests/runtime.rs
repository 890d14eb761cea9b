use std::sync::Arc;

use facet_field::{ChunkCoord, SampleGrid, Sdf};
use facet_geom::Vec2;
use facet_mesh_cpu::{MeshBuild, Profile, QualityParams};
use facet_runtime::{BuildJob, JobKind, JobSource, Runtime};

fn area(m: &MeshBuild) -> f32 {
    m.idx
        .chunks_exact(3)
        .map(|t| {
            let (a, b, c) = (m.position(t[0]), m.position(t[1]), m.position(t[2]));
            0.5 * (b.xy() - a.xy()).cross(c.xy() - a.xy())
        })
        .sum()
}

fn quality() -> Arc<QualityParams> {
    Arc::new(QualityParams {
        resolution: 16,
        chunk_size: 16.0,
        ..QualityParams::default()
    })
}

#[test]
fn grid_jobs_come_back_with_meshes() {
    let rt = Runtime::new(2).unwrap();
    let block = SampleGrid::from_fn(16, |x, y| {
        if (4..=10).contains(&x) && (5..=9).contains(&y) { 0 } else { 255 }
    });
    rt.submit_build_job_priority(BuildJob {
        coord: ChunkCoord::new(0, 0),
        job_id: 7,
        source: JobSource::Grid(Arc::new(block)),
        quality: quality(),
        profile: Arc::new(Profile::chamfer(0.5, 0.25)),
    });
    rt.submit_build_job_bg(BuildJob {
        coord: ChunkCoord::new(1, 0),
        job_id: 8,
        source: JobSource::Grid(Arc::new(SampleGrid::new(16))),
        quality: quality(),
        profile: Arc::new(Profile::sharp(1.0)),
    });

    let results = rt.collect_results(2);
    assert_eq!(results.len(), 2);

    let built = &results[&ChunkCoord::new(0, 0)];
    assert_eq!(built.job_id, 7);
    assert_eq!(built.kind, JobKind::Priority);
    let mesh = built.mesh.as_ref().unwrap();
    assert_eq!(mesh.stats.shapes, 1);
    assert_eq!(mesh.stats.skipped_shapes, 0);
    assert!(!mesh.front.is_empty() && !mesh.cut.is_empty());

    let empty = &results[&ChunkCoord::new(1, 0)];
    assert_eq!(empty.kind, JobKind::Bg);
    assert!(empty.mesh.is_none());

    assert!(rt.contexts_allocated() <= 2 * rt.workers);
}

#[test]
fn shapes_are_split_over_the_chunks_they_touch() {
    let rt = Runtime::new(3).unwrap();
    let sdf = Arc::new(Sdf::Circle {
        center: Vec2::new(16.0, 16.0),
        radius: 5.0,
    });
    let jobs = rt.submit_shape(sdf, quality(), Arc::new(Profile::sharp(0.0)), 100);
    assert_eq!(jobs, 4);

    let results = rt.collect_results(jobs);
    assert_eq!(results.len(), 4);
    let mut total = 0.0;
    for (coord, out) in &results {
        let mesh = out.mesh.as_ref().unwrap();
        assert_eq!(mesh.coord, *coord);
        let rect = coord.rect(16.0).expanded(1e-4);
        for i in 0..mesh.front.vertex_count() as u32 {
            assert!(rect.contains(mesh.front.position(i).xy()));
        }
        total += area(&mesh.front);
    }
    let disc = std::f32::consts::PI * 25.0;
    assert!((total - disc).abs() < 2.0, "total {total}");
    assert!(rt.drain_worker_results().is_empty());
}
