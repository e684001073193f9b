use super::{run_blocking, BatchReport, ExecutionStrategy};
use crate::core::config::{ExecutionMode, WorkerCount};
use crate::core::context::RunContext;
use crate::core::errors::StrategyError;
use crate::core::models::{TestItem, WorkerId};
use rayon::ThreadPoolBuilder;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Runs items on a bounded pool of OS threads sharing process memory.
///
/// Items may finish in any order, so the host never gets a "next item" hint.
/// 测试项可能以任意顺序完成，因此主机永远不会得到“下一个测试项”提示。
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPool;

impl ThreadPool {
    /// Pool size when no worker count is configured.
    pub fn default_workers() -> usize {
        num_cpus::get()
    }
}

impl ExecutionStrategy for ThreadPool {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::ThreadPool
    }

    fn run(
        &self,
        items: &[&TestItem],
        workers: WorkerCount,
        ctx: &RunContext,
    ) -> Result<BatchReport, StrategyError> {
        if items.is_empty() {
            return Ok(BatchReport::default());
        }

        let threads = workers
            .resolve(items.len())
            .unwrap_or_else(Self::default_workers)
            .clamp(1, items.len());
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("concurrent-runner-worker-{idx}"))
            .build()?;
        debug!(threads, items = items.len(), "thread pool started");

        let dispatched = AtomicUsize::new(0);
        let not_dispatched = AtomicUsize::new(0);

        // The scope joins every spawned unit before returning, so in-flight
        // items are drained even after a stop request. FIFO keeps dispatch
        // in item order; a plain scope pops its local jobs newest first.
        pool.scope_fifo(|scope| {
            for &item in items {
                if ctx.stop().is_requested() {
                    not_dispatched.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                let dispatched = &dispatched;
                let not_dispatched = &not_dispatched;
                scope.spawn_fifo(move |_| {
                    if ctx.stop().is_requested() {
                        not_dispatched.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                    dispatched.fetch_add(1, Ordering::Relaxed);
                    let worker = rayon::current_thread_index()
                        .map(WorkerId::Thread)
                        .unwrap_or(WorkerId::Main);
                    run_blocking(ctx, item, None, worker);
                });
            }
        });

        Ok(BatchReport {
            dispatched: dispatched.into_inner(),
            not_dispatched: not_dispatched.into_inner(),
        })
    }
}
