use facet_field::{ChunkCoord, SampleGrid, Sdf};
use facet_geom::Vec2;
use facet_mesh_cpu::{
    BuildCtx, ChunkMesh, LoopAssembler, LoopSet, MeshBuild, Profile, QualityParams, build_chunk,
    extract,
};

fn quality(resolution: usize, chunk_size: f32) -> QualityParams {
    QualityParams {
        resolution,
        chunk_size,
        ..QualityParams::default()
    }
}

fn block_grid() -> SampleGrid {
    SampleGrid::from_fn(8, |x, y| {
        if (3..=5).contains(&x) && (3..=5).contains(&y) {
            0
        } else {
            255
        }
    })
}

fn ring_grid() -> SampleGrid {
    SampleGrid::from_fn(12, |x, y| {
        let ring = (2..=10).contains(&x) && (2..=10).contains(&y);
        let hole = (5..=7).contains(&x) && (5..=7).contains(&y);
        if ring && !hole { 0 } else { 255 }
    })
}

fn signed_area(m: &MeshBuild) -> f32 {
    m.idx
        .chunks_exact(3)
        .map(|t| {
            let (a, b, c) = (m.position(t[0]), m.position(t[1]), m.position(t[2]));
            0.5 * (b.xy() - a.xy()).cross(c.xy() - a.xy())
        })
        .sum()
}

fn loop_area(grid: &SampleGrid) -> f32 {
    let mut edges = Vec::new();
    extract(grid, &mut edges);
    let mut set = LoopSet::default();
    LoopAssembler::default().assemble(grid, &edges, &mut set);
    set.loops.iter().map(|l| l.area).sum()
}

fn build(grid: &SampleGrid, q: &QualityParams, profile: &Profile) -> ChunkMesh {
    let mut ctx = BuildCtx::default();
    build_chunk(&mut ctx, grid, ChunkCoord::new(0, 0), q, profile)
}

#[test]
fn sharp_block_fills_every_stream() {
    let grid = block_grid();
    let mesh = build(&grid, &quality(8, 8.0), &Profile::sharp(1.0));
    assert_eq!(mesh.stats.loops, 1);
    assert_eq!(mesh.stats.shapes, 1);
    assert_eq!(mesh.stats.skipped_shapes, 0);
    // Octagon: six cap triangles on each face, a vertical quad per edge.
    assert_eq!(mesh.front.triangle_count(), 6);
    assert_eq!(mesh.back.triangle_count(), 6);
    assert_eq!(mesh.cut.triangle_count(), 16);
    assert_eq!(mesh.collision.triangle_count(), 6 * 2 + 8 * 2);

    let area = loop_area(&grid);
    assert!((signed_area(&mesh.front) - area).abs() < 1e-3);
    assert!((signed_area(&mesh.back) + area).abs() < 1e-3);
    for i in 0..mesh.front.vertex_count() as u32 {
        assert_eq!(mesh.front.position(i).z, 1.0);
        assert_eq!(mesh.front.normal(i).z, 1.0);
    }
    for i in 0..mesh.back.vertex_count() as u32 {
        assert_eq!(mesh.back.position(i).z, 0.0);
        assert_eq!(mesh.back.normal(i).z, -1.0);
    }
    for i in 0..mesh.cut.vertex_count() as u32 {
        assert!(mesh.cut.normal(i).z.abs() < 1e-5);
    }
}

#[test]
fn world_positions_follow_cell_size_and_chunk_origin() {
    let grid = block_grid();
    let q = quality(8, 4.0);
    let mut ctx = BuildCtx::default();
    let mesh = build_chunk(&mut ctx, &grid, ChunkCoord::new(2, -1), &q, &Profile::sharp(0.0));
    let rect = ChunkCoord::new(2, -1).rect(4.0);
    assert_eq!(mesh.coord, ChunkCoord::new(2, -1));
    assert!(!mesh.front.is_empty());
    for i in 0..mesh.front.vertex_count() as u32 {
        let p = mesh.front.position(i).xy();
        assert!(rect.contains(p), "{p:?} outside {rect:?}");
    }
    // Cell size 0.5 scales areas by a quarter.
    let area = loop_area(&grid) * 0.25;
    assert!((signed_area(&mesh.front) - area).abs() < 1e-3);
    assert!(mesh.cut.is_empty());
}

#[test]
fn chamfer_slopes_the_walls() {
    let grid = block_grid();
    let mesh = build(&grid, &quality(8, 8.0), &Profile::chamfer(0.5, 0.25));
    assert_eq!(mesh.stats.skipped_shapes, 0);
    assert!(!mesh.cut.is_empty());
    for i in 0..mesh.front.vertex_count() as u32 {
        assert!((mesh.front.position(i).z - 0.75).abs() < 1e-5);
    }
    for i in 0..mesh.cut.vertex_count() as u32 {
        let n = mesh.cut.normal(i);
        assert!((n.length() - 1.0).abs() < 1e-4);
        assert!(n.z >= -1e-5);
    }
    let area = loop_area(&grid);
    let front = signed_area(&mesh.front);
    assert!(front > 0.0 && front < area);
}

#[test]
fn ring_keeps_its_hole() {
    let grid = ring_grid();
    let mesh = build(&grid, &quality(12, 12.0), &Profile::sharp(0.0));
    assert_eq!(mesh.stats.loops, 2);
    assert_eq!(mesh.stats.shapes, 1);
    assert_eq!(mesh.stats.skipped_shapes, 0);
    let area = loop_area(&grid);
    assert!((signed_area(&mesh.front) - area).abs() < 1e-3);
    for t in mesh.front.idx.chunks_exact(3) {
        let c = (mesh.front.position(t[0]) + mesh.front.position(t[1]) + mesh.front.position(t[2]))
            / 3.0;
        assert!(
            !(c.x > 5.0 && c.x < 7.0 && c.y > 5.0 && c.y < 7.0),
            "centroid {c:?} inside the hole"
        );
    }
}

#[test]
fn streams_are_clipped_to_the_chunk() {
    let sdf = Sdf::Circle {
        center: Vec2::new(16.0, 8.0),
        radius: 5.0,
    };
    let q = quality(16, 16.0);
    let grid = SampleGrid::rasterize(&sdf, Vec2::ZERO, q.cell_size(), 16, q.max_distance).unwrap();
    let mesh = build(&grid, &q, &Profile::chamfer(0.5, 0.25));
    assert_eq!(mesh.stats.skipped_shapes, 0);
    assert!(!mesh.front.is_empty());
    let eps = 1e-4;
    let inside = |x: f32, y: f32| x >= -eps && x <= 16.0 + eps && y >= -eps && y <= 16.0 + eps;
    for m in [&mesh.front, &mesh.back, &mesh.cut] {
        for i in 0..m.vertex_count() as u32 {
            let p = m.position(i);
            assert!(inside(p.x, p.y), "{p:?}");
        }
    }
    for i in 0..mesh.collision.vertex_count() as u32 {
        let p = mesh.collision.position(i);
        assert!(inside(p.x, p.y), "{p:?}");
    }
    // Roughly half the disc lies in this chunk.
    let half_disc = 0.5 * std::f32::consts::PI * 25.0;
    assert!((signed_area(&mesh.back).abs() - half_disc).abs() < 2.0);
}

#[test]
fn empty_window_builds_nothing() {
    let grid = SampleGrid::new(8);
    let mesh = build(&grid, &quality(8, 8.0), &Profile::sharp(1.0));
    assert!(mesh.is_empty());
    assert_eq!(mesh.stats.loops, 0);
    assert_eq!(mesh.stats.shapes, 0);
}

#[test]
fn reused_context_matches_a_fresh_one() {
    let q = quality(12, 12.0);
    let profile = Profile::rounded(0.5, 0.5, 3);
    let mut ctx = BuildCtx::default();
    let _ = build_chunk(&mut ctx, &ring_grid(), ChunkCoord::new(0, 0), &q, &profile);
    let block = SampleGrid::from_fn(12, |x, y| {
        if (4..=8).contains(&x) && (3..=6).contains(&y) { 10 } else { 240 }
    });
    let reused = build_chunk(&mut ctx, &block, ChunkCoord::new(0, 0), &q, &profile);
    let fresh = build(&block, &q, &profile);
    assert_eq!(reused.front.idx, fresh.front.idx);
    assert_eq!(reused.front.pos, fresh.front.pos);
    assert_eq!(reused.cut.idx, fresh.cut.idx);
    assert_eq!(reused.cut.norm, fresh.cut.norm);
    assert_eq!(reused.collision.pos, fresh.collision.pos);
    assert_eq!(reused.stats.loops, fresh.stats.loops);
}
