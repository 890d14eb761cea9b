//! Headless driver: rasterizes a scene chunk by chunk and meshes it on the build workers.
#![forbid(unsafe_code)]

mod scene;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use facet_field::ChunkCoord;
use facet_mesh_cpu::BuildStats;
use facet_runtime::{BuildJob, JobSource, Runtime};

use crate::scene::{DEMO_SCENE, SceneConfig};

#[derive(Parser, Debug)]
#[command(name = "facet")]
#[command(about = "Mesh 2D signed-distance shapes into bevelled 3D chunks", long_about = None)]
struct Cli {
    /// Scene file (TOML); the bundled demo scene when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Build at most this many chunks, nearest to the scene's lower-left corner first
    #[arg(long)]
    chunks: Option<usize>,

    /// Build worker threads (0 = available parallelism)
    #[arg(short, long, default_value = "0")]
    workers: usize,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let scene = match &cli.config {
        Some(path) => SceneConfig::from_path(path)?,
        None => SceneConfig::from_toml_str(DEMO_SCENE)?,
    };
    let sdf = Arc::new(scene.build_sdf()?);
    let quality = Arc::new(scene.mesh.quality.clone());
    let profile = Arc::new(scene.mesh.profile.to_profile());

    let bounds = sdf.bounds().expanded(quality.cell_size());
    let mut coords = ChunkCoord::covering(bounds, quality.chunk_size);
    if let Some(limit) = cli.chunks {
        let first = coords.first().copied().unwrap_or_default();
        coords.sort_by_key(|c| c.distance_sq(first));
        coords.truncate(limit);
    }
    log::info!(
        "meshing {} chunks of {} units at resolution {}",
        coords.len(),
        quality.chunk_size,
        quality.resolution
    );

    let runtime = Runtime::new(cli.workers)?;
    let start = Instant::now();
    for (job_id, &coord) in coords.iter().enumerate() {
        runtime.submit_build_job_bg(BuildJob {
            coord,
            job_id: job_id as u64,
            source: JobSource::Shape(sdf.clone()),
            quality: quality.clone(),
            profile: profile.clone(),
        });
    }

    let results = runtime.collect_results(coords.len());
    let mut ordered: Vec<_> = results.values().collect();
    ordered.sort_by_key(|out| (out.coord.cy, out.coord.cx));

    let mut total = BuildStats::default();
    let mut empty = 0usize;
    for out in ordered {
        let Some(mesh) = &out.mesh else {
            empty += 1;
            continue;
        };
        let s = mesh.stats;
        log::info!(
            "chunk ({}, {}): loops={} shapes={} tris front={} back={} cut={} collision={} raster={}ms mesh={}ms",
            out.coord.cx,
            out.coord.cy,
            s.loops,
            s.shapes,
            s.front_triangles,
            s.back_triangles,
            s.cut_triangles,
            s.collision_triangles,
            out.t_raster_ms,
            out.t_mesh_ms
        );
        if s.skipped_shapes > 0 {
            log::warn!(
                "chunk ({}, {}): {} shapes dropped on topology errors",
                out.coord.cx,
                out.coord.cy,
                s.skipped_shapes
            );
        }
        total.loops += s.loops;
        total.shapes += s.shapes;
        total.skipped_shapes += s.skipped_shapes;
        total.front_triangles += s.front_triangles;
        total.back_triangles += s.back_triangles;
        total.cut_triangles += s.cut_triangles;
        total.collision_triangles += s.collision_triangles;
    }

    log::info!(
        "done in {}ms on {} workers: {} chunks ({} empty), {} shapes ({} dropped), tris front={} back={} cut={} collision={}",
        start.elapsed().as_millis(),
        runtime.workers,
        results.len(),
        empty,
        total.shapes,
        total.skipped_shapes,
        total.front_triangles,
        total.back_triangles,
        total.cut_triangles,
        total.collision_triangles
    );
    Ok(())
}
