//! Per-chunk pipeline: samples → half-edges → loops → bevel → clipped streams.

use std::ops::Range;
use std::time::Instant;

use facet_field::{ChunkCoord, SampleSource};
use facet_geom::{Vec2, Vec3};

use crate::bevel::BevelEngine;
use crate::clip::Clipper;
use crate::config::{Profile, QualityParams};
use crate::contour::{self, SourceEdge};
use crate::error::BevelError;
use crate::loops::{LoopAssembler, LoopSet};
use crate::mesh_build::{CollisionBuild, MeshBuild};
use crate::monotone::TriangleSink;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub loops: u32,
    pub shapes: u32,
    pub skipped_shapes: u32,
    pub front_triangles: u32,
    pub back_triangles: u32,
    pub cut_triangles: u32,
    pub collision_triangles: u32,
    pub t_build_ms: u32,
}

/// All geometry of one chunk, clipped to the chunk square, in world units.
#[derive(Clone, Debug, Default)]
pub struct ChunkMesh {
    pub coord: ChunkCoord,
    pub front: MeshBuild,
    pub back: MeshBuild,
    pub cut: MeshBuild,
    pub collision: CollisionBuild,
    pub stats: BuildStats,
}

impl ChunkMesh {
    pub fn is_empty(&self) -> bool {
        self.front.is_empty() && self.back.is_empty() && self.cut.is_empty()
    }
}

/// Scratch state for one build. Not shareable between concurrent builds.
#[derive(Default, Debug)]
pub struct BuildCtx {
    half_edges: Vec<SourceEdge>,
    assembler: LoopAssembler,
    loops: LoopSet,
    world: Vec<Vec2>,
    ranges: Vec<Range<usize>>,
    spans: Vec<Range<usize>>,
    engine: BevelEngine,
    clipper: Clipper,
    front: MeshBuild,
    back: MeshBuild,
    cut: MeshBuild,
    collision: CollisionBuild,
}

impl BuildCtx {
    /// Clears every per-build structure, keeping capacity.
    pub fn reset(&mut self) {
        self.half_edges.clear();
        self.assembler.clear();
        self.loops.clear();
        self.world.clear();
        self.ranges.clear();
        self.spans.clear();
        self.engine
            .reset(QualityParams::default().min_smooth_normal_dot());
        self.front.clear_keep_capacity();
        self.back.clear_keep_capacity();
        self.cut.clear_keep_capacity();
        self.collision.clear_keep_capacity();
    }
}

/// Writes the back face (z = 0, facing −z) and the matching collision floor and roof.
struct PrismSink<'a> {
    back: &'a mut MeshBuild,
    collision: &'a mut CollisionBuild,
    back_base: u32,
    collision_base: u32,
    top: f32,
}

impl PrismSink<'_> {
    #[inline]
    fn floor(&self, i: u32) -> u32 {
        self.collision_base + 2 * (i - self.back_base)
    }
}

impl TriangleSink for PrismSink<'_> {
    fn vertex(&mut self, p: Vec2) -> u32 {
        self.collision.push_vertex(p.extend(0.0));
        self.collision.push_vertex(p.extend(self.top));
        self.back.push_vertex(p.extend(0.0), -Vec3::FRONT)
    }

    fn triangle(&mut self, a: u32, b: u32, c: u32) {
        self.back.push_triangle(a, c, b);
        let (fa, fb, fc) = (self.floor(a), self.floor(b), self.floor(c));
        self.collision.push_triangle(fa, fc, fb);
        self.collision.push_triangle(fa + 1, fb + 1, fc + 1);
    }
}

fn collision_walls(collision: &mut CollisionBuild, pts: &[Vec2], top: f32) {
    let n = pts.len();
    if n < 3 {
        return;
    }
    let base = collision.vertex_count() as u32;
    for p in pts {
        collision.push_vertex(p.extend(0.0));
        collision.push_vertex(p.extend(top));
    }
    for i in 0..n as u32 {
        let j = (i + 1) % n as u32;
        let (p0, p1) = (base + 2 * i, base + 2 * i + 1);
        let (q0, q1) = (base + 2 * j, base + 2 * j + 1);
        collision.push_triangle(p0, q0, q1);
        collision.push_triangle(p0, q1, p1);
    }
}

impl BuildCtx {
    /// Meshes the loops in `self.ranges` as one shape.
    fn mesh_shape(&mut self, profile: &Profile, top: f32, dot: f32) -> Result<(), BevelError> {
        self.engine.reset(dot);
        for r in &self.ranges {
            if self.engine.add_loop(&self.world[r.clone()]).is_none() {
                log::trace!("skipping a {}-point loop", r.len());
            }
        }
        let mut prism = PrismSink {
            back_base: self.back.vertex_count() as u32,
            collision_base: self.collision.vertex_count() as u32,
            back: &mut self.back,
            collision: &mut self.collision,
            top,
        };
        self.engine.fill(&mut prism)?;
        for r in &self.ranges {
            collision_walls(&mut self.collision, &self.world[r.clone()], top);
        }

        for step in &profile.steps {
            self.engine.bevel(
                step.width,
                step.height,
                step.smooth,
                &mut self.front,
                &mut self.cut,
            )?;
            if self.engine.is_closed() {
                break;
            }
        }
        if !self.engine.is_closed() {
            self.engine.close(false, &mut self.front, &mut self.cut)?;
        }
        Ok(())
    }
}

/// Builds every stream of one chunk from its sample window. Shapes whose topology breaks are
/// logged with their operation history and left out.
pub fn build_chunk<S: SampleSource + ?Sized>(
    ctx: &mut BuildCtx,
    src: &S,
    coord: ChunkCoord,
    quality: &QualityParams,
    profile: &Profile,
) -> ChunkMesh {
    let start = Instant::now();
    ctx.reset();
    let mut stats = BuildStats::default();

    contour::extract(src, &mut ctx.half_edges);
    ctx.assembler.assemble(src, &ctx.half_edges, &mut ctx.loops);
    stats.loops = ctx.loops.loops.len() as u32;

    let origin = coord.origin(quality.chunk_size);
    let cell = quality.cell_size();
    let top = profile.total_height();
    let dot = quality.min_smooth_normal_dot();
    if profile.total_width() > quality.max_profile_width() {
        log::warn!(
            "chunk ({}, {}): profile width {} exceeds the sample margin ({}); border walls may show",
            coord.cx,
            coord.cy,
            profile.total_width(),
            quality.max_profile_width()
        );
    }

    ctx.spans.extend(ctx.loops.region_spans());
    for si in 0..ctx.spans.len() {
        let region = ctx.spans[si].clone();
        stats.shapes += 1;

        ctx.world.clear();
        ctx.ranges.clear();
        for l in &ctx.loops.loops[region] {
            let begin = ctx.world.len();
            ctx.world.extend(
                ctx.loops
                    .points_of(l)
                    .iter()
                    .map(|&p| origin + p * cell),
            );
            ctx.ranges.push(begin..ctx.world.len());
        }

        let marks = (
            ctx.front.mark(),
            ctx.back.mark(),
            ctx.cut.mark(),
            ctx.collision.mark(),
        );
        if let Err(err) = ctx.mesh_shape(profile, top, dot) {
            ctx.engine.dump_ops(&err);
            log::error!(
                "chunk ({}, {}): dropping shape {} after {err}",
                coord.cx,
                coord.cy,
                stats.shapes - 1
            );
            ctx.front.truncate(marks.0);
            ctx.back.truncate(marks.1);
            ctx.cut.truncate(marks.2);
            ctx.collision.truncate(marks.3);
            stats.skipped_shapes += 1;
        }
    }

    let rect = coord.rect(quality.chunk_size);
    ctx.clipper.clip_to_rect(&mut ctx.front, rect);
    ctx.clipper.clip_to_rect(&mut ctx.back, rect);
    ctx.clipper.clip_to_rect(&mut ctx.cut, rect);
    ctx.clipper.clip_to_rect(&mut ctx.collision, rect);

    stats.front_triangles = ctx.front.triangle_count() as u32;
    stats.back_triangles = ctx.back.triangle_count() as u32;
    stats.cut_triangles = ctx.cut.triangle_count() as u32;
    stats.collision_triangles = ctx.collision.triangle_count() as u32;
    stats.t_build_ms = start.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;
    log::debug!(
        target: "perf",
        "ms={} facet_build cx={} cy={} loops={} shapes={} skipped={} tris front={} back={} cut={} collision={}",
        stats.t_build_ms,
        coord.cx,
        coord.cy,
        stats.loops,
        stats.shapes,
        stats.skipped_shapes,
        stats.front_triangles,
        stats.back_triangles,
        stats.cut_triangles,
        stats.collision_triangles
    );

    ChunkMesh {
        coord,
        front: std::mem::take(&mut ctx.front),
        back: std::mem::take(&mut ctx.back),
        cut: std::mem::take(&mut ctx.cut),
        collision: std::mem::take(&mut ctx.collision),
        stats,
    }
}
