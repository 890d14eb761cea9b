use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender, bounded};
use facet_mesh_cpu::BuildCtx;

/// Lock-free pool of `BuildCtx` scratch sets; each build holds one exclusively.
pub struct BuildCtxPool {
    available_tx: Sender<BuildCtx>,
    available_rx: Receiver<BuildCtx>,
    allocated: AtomicUsize,
    max_contexts: usize,
}

impl BuildCtxPool {
    pub fn new(max_contexts: usize) -> Self {
        let max_contexts = max_contexts.max(1);
        let (tx, rx) = bounded(max_contexts);
        Self {
            available_tx: tx,
            available_rx: rx,
            allocated: AtomicUsize::new(0),
            max_contexts,
        }
    }

    pub fn with_capacity_from_workers(worker_count: usize) -> Arc<Self> {
        let count = worker_count.max(1) * 2;
        Arc::new(Self::new(count))
    }

    /// Takes an idle context, creating one while under capacity, otherwise waits for a release.
    pub fn acquire(&self) -> PooledBuildCtx<'_> {
        if let Ok(ctx) = self.available_rx.try_recv() {
            return PooledBuildCtx { ctx, pool: self };
        }

        loop {
            let current = self.allocated.load(Ordering::Acquire);
            if current < self.max_contexts {
                let prev = self.allocated.fetch_add(1, Ordering::AcqRel);
                if prev < self.max_contexts {
                    return PooledBuildCtx {
                        ctx: BuildCtx::default(),
                        pool: self,
                    };
                }
                self.allocated.fetch_sub(1, Ordering::AcqRel);
            }

            // The pool owns a sender, so the channel never disconnects while `self` is alive.
            if let Ok(ctx) = self.available_rx.recv() {
                return PooledBuildCtx { ctx, pool: self };
            }
        }
    }

    /// Contexts created so far.
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }

    /// Contexts currently parked in the pool.
    pub fn idle(&self) -> usize {
        self.available_rx.len()
    }

    fn release(&self, mut ctx: BuildCtx) {
        ctx.reset();
        let _ = self.available_tx.send(ctx);
    }
}

pub struct PooledBuildCtx<'pool> {
    ctx: BuildCtx,
    pool: &'pool BuildCtxPool,
}

impl Deref for PooledBuildCtx<'_> {
    type Target = BuildCtx;

    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

impl DerefMut for PooledBuildCtx<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ctx
    }
}

impl Drop for PooledBuildCtx<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.ctx));
    }
}
