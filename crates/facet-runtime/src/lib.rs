//! Runtime job queues and worker orchestration for chunk builds.
#![forbid(unsafe_code)]

mod ctx_pool;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TryRecvError, select, unbounded};
use facet_field::{ChunkCoord, SampleGrid, Sdf};
use facet_mesh_cpu::{ChunkMesh, Profile, QualityParams, build_chunk};
use hashbrown::HashMap;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

pub use crate::ctx_pool::{BuildCtxPool, PooledBuildCtx};

/// Where a job's samples come from.
#[derive(Clone)]
pub enum JobSource {
    /// A window sampled elsewhere.
    Grid(Arc<SampleGrid>),
    /// A shape rasterized on the worker.
    Shape(Arc<Sdf>),
}

#[derive(Clone)]
pub struct BuildJob {
    pub coord: ChunkCoord,
    pub job_id: u64,
    pub source: JobSource,
    pub quality: Arc<QualityParams>,
    pub profile: Arc<Profile>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobKind {
    Priority,
    Bg,
}

pub struct JobOut {
    /// `None` when the window had no surface or could not be rasterized.
    pub mesh: Option<ChunkMesh>,
    pub coord: ChunkCoord,
    pub job_id: u64,
    pub kind: JobKind,
    pub t_total_ms: u32,
    pub t_raster_ms: u32,
    pub t_mesh_ms: u32,
}

fn elapsed_ms(t0: Instant) -> u32 {
    t0.elapsed().as_millis().min(u128::from(u32::MAX)) as u32
}

fn process_build_job(job: BuildJob, kind: JobKind, ctx_pool: &BuildCtxPool, tx: &Sender<JobOut>) {
    let BuildJob {
        coord,
        job_id,
        source,
        quality,
        profile,
    } = job;

    let t_job_start = Instant::now();
    let mut t_raster_ms: u32 = 0;
    let mut t_mesh_ms: u32 = 0;

    let rasterized;
    let grid: Option<&SampleGrid> = match &source {
        JobSource::Grid(grid) => Some(grid.as_ref()),
        JobSource::Shape(sdf) => {
            let t0 = Instant::now();
            let res = SampleGrid::rasterize(
                sdf,
                coord.origin(quality.chunk_size),
                quality.cell_size(),
                quality.resolution,
                quality.max_distance,
            );
            t_raster_ms = elapsed_ms(t0);
            match res {
                Ok(grid) => {
                    rasterized = grid;
                    Some(&rasterized)
                }
                Err(err) => {
                    log::error!(
                        "job {job_id}: rasterizing chunk ({}, {}) failed: {err}",
                        coord.cx,
                        coord.cy
                    );
                    None
                }
            }
        }
    };

    let mesh = match grid {
        Some(grid) if grid.has_surface() => {
            let t0 = Instant::now();
            let mut ctx = ctx_pool.acquire();
            let mesh = build_chunk(&mut ctx, grid, coord, &quality, &profile);
            t_mesh_ms = elapsed_ms(t0);
            Some(mesh)
        }
        _ => None,
    };

    let _ = tx.send(JobOut {
        mesh,
        coord,
        job_id,
        kind,
        t_total_ms: elapsed_ms(t_job_start),
        t_raster_ms,
        t_mesh_ms,
    });
}

/// Counters shared between the submit side and one lane's workers.
#[derive(Default)]
struct LaneCounters {
    queued: AtomicUsize,
    inflight: AtomicUsize,
}

impl LaneCounters {
    fn run(
        &self,
        job: BuildJob,
        kind: JobKind,
        ctx_pool: &BuildCtxPool,
        tx: &Sender<JobOut>,
    ) {
        self.queued.fetch_sub(1, Ordering::Relaxed);
        self.inflight.fetch_add(1, Ordering::Relaxed);
        process_build_job(job, kind, ctx_pool, tx);
        self.inflight.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Worker loop: priority jobs first, background jobs when the priority lane is empty.
fn worker_loop(
    prio_rx: Receiver<BuildJob>,
    bg_rx: Receiver<BuildJob>,
    prio: &LaneCounters,
    bg: &LaneCounters,
    ctx_pool: &BuildCtxPool,
    tx: &Sender<JobOut>,
) {
    loop {
        match prio_rx.try_recv() {
            Ok(job) => {
                prio.run(job, JobKind::Priority, ctx_pool, tx);
                continue;
            }
            Err(TryRecvError::Disconnected) => {
                while let Ok(job) = bg_rx.recv() {
                    bg.run(job, JobKind::Bg, ctx_pool, tx);
                }
                break;
            }
            Err(TryRecvError::Empty) => {}
        }

        match bg_rx.try_recv() {
            Ok(job) => {
                bg.run(job, JobKind::Bg, ctx_pool, tx);
                continue;
            }
            Err(TryRecvError::Disconnected) => {
                while let Ok(job) = prio_rx.recv() {
                    prio.run(job, JobKind::Priority, ctx_pool, tx);
                }
                break;
            }
            Err(TryRecvError::Empty) => {}
        }

        select! {
            recv(prio_rx) -> res => match res {
                Ok(job) => prio.run(job, JobKind::Priority, ctx_pool, tx),
                Err(_) => {
                    while let Ok(job) = bg_rx.recv() {
                        bg.run(job, JobKind::Bg, ctx_pool, tx);
                    }
                    break;
                }
            },
            recv(bg_rx) -> res => match res {
                Ok(job) => bg.run(job, JobKind::Bg, ctx_pool, tx),
                Err(_) => {
                    while let Ok(job) = prio_rx.recv() {
                        prio.run(job, JobKind::Priority, ctx_pool, tx);
                    }
                    break;
                }
            },
        }
    }
}

pub struct Runtime {
    job_tx_prio: Sender<BuildJob>,
    job_tx_bg: Sender<BuildJob>,
    res_rx: Receiver<JobOut>,
    _pool: Arc<ThreadPool>,
    prio: Arc<LaneCounters>,
    bg: Arc<LaneCounters>,
    pub workers: usize,
    ctx_pool: Arc<BuildCtxPool>,
}

impl Runtime {
    /// Starts `workers` build threads (`0` picks the available parallelism).
    pub fn new(workers: usize) -> Result<Self, ThreadPoolBuildError> {
        let (job_tx_prio, job_rx_prio) = unbounded::<BuildJob>();
        let (job_tx_bg, job_rx_bg) = unbounded::<BuildJob>();
        let (res_tx, res_rx) = unbounded::<JobOut>();

        let workers = if workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(8)
        } else {
            workers
        };
        let ctx_pool = BuildCtxPool::with_capacity_from_workers(workers);
        let prio = Arc::new(LaneCounters::default());
        let bg = Arc::new(LaneCounters::default());

        let pool = Arc::new(
            ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("facet-build-{i}"))
                .build()?,
        );
        for _ in 0..workers {
            let prio_rx = job_rx_prio.clone();
            let bg_rx = job_rx_bg.clone();
            let tx = res_tx.clone();
            let prio = prio.clone();
            let bg = bg.clone();
            let ctx_pool = ctx_pool.clone();
            pool.spawn(move || {
                worker_loop(prio_rx, bg_rx, &prio, &bg, ctx_pool.as_ref(), &tx);
            });
        }
        log::info!("runtime started with {workers} build workers");

        Ok(Self {
            job_tx_prio,
            job_tx_bg,
            res_rx,
            _pool: pool,
            prio,
            bg,
            workers,
            ctx_pool,
        })
    }

    /// Queues a job ahead of every background job.
    pub fn submit_build_job_priority(&self, job: BuildJob) {
        self.prio.queued.fetch_add(1, Ordering::Relaxed);
        if self.job_tx_prio.send(job).is_err() {
            self.prio.queued.fetch_sub(1, Ordering::Relaxed);
        }
    }

    pub fn submit_build_job_bg(&self, job: BuildJob) {
        self.bg.queued.fetch_add(1, Ordering::Relaxed);
        if self.job_tx_bg.send(job).is_err() {
            self.bg.queued.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Queues one background job per chunk the shape can touch. Returns the number of jobs.
    pub fn submit_shape(
        &self,
        sdf: Arc<Sdf>,
        quality: Arc<QualityParams>,
        profile: Arc<Profile>,
        first_job_id: u64,
    ) -> usize {
        let bounds = sdf.bounds().expanded(quality.cell_size());
        let coords = ChunkCoord::covering(bounds, quality.chunk_size);
        for (i, &coord) in coords.iter().enumerate() {
            self.submit_build_job_bg(BuildJob {
                coord,
                job_id: first_job_id + i as u64,
                source: JobSource::Shape(sdf.clone()),
                quality: quality.clone(),
                profile: profile.clone(),
            });
        }
        coords.len()
    }

    pub fn drain_worker_results(&self) -> Vec<JobOut> {
        self.res_rx.try_iter().collect()
    }

    /// Blocks until `count` results arrived, keyed by chunk; a later result for the same chunk
    /// replaces an earlier one.
    pub fn collect_results(&self, count: usize) -> HashMap<ChunkCoord, JobOut> {
        let mut out = HashMap::with_capacity(count);
        for _ in 0..count {
            match self.res_rx.recv() {
                Ok(res) => {
                    out.insert(res.coord, res);
                }
                Err(_) => break,
            }
        }
        out
    }

    pub fn queue_debug_counts(&self) -> (usize, usize, usize, usize) {
        (
            self.prio.queued.load(Ordering::Relaxed),
            self.prio.inflight.load(Ordering::Relaxed),
            self.bg.queued.load(Ordering::Relaxed),
            self.bg.inflight.load(Ordering::Relaxed),
        )
    }

    /// Build contexts created so far; bounded by twice the worker count.
    pub fn contexts_allocated(&self) -> usize {
        self.ctx_pool.allocated()
    }
}
