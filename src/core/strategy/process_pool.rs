use super::{BatchReport, ExecutionStrategy};
use crate::core::config::{ExecutionMode, WorkerCount};
use crate::core::context::RunContext;
use crate::core::errors::StrategyError;
use crate::core::models::TestItem;
use crate::infra::worker::{self, WorkerLauncher};
use futures::{stream, StreamExt};
use tracing::debug;

/// Runs every item in its own child process.
///
/// Children share no memory with the parent; their records come back over
/// the worker protocol and are recorded here. A crashing child only costs
/// its own item. The parent waits for every started child before returning.
///
/// 每个测试项在自己的子进程中运行。
/// 子进程与父进程不共享内存；它们的记录通过工作进程协议传回并在此记录。
/// 崩溃的子进程只影响它自己的测试项。父进程在返回前会等待所有已启动的子进程。
#[derive(Debug, Clone)]
pub struct ProcessPool {
    launcher: WorkerLauncher,
}

impl ProcessPool {
    pub fn new(launcher: WorkerLauncher) -> Self {
        Self { launcher }
    }
}

impl ExecutionStrategy for ProcessPool {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::ProcessPool
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

        // One process per item unless the number of live children is capped.
        let limit = workers.resolve(items.len()).unwrap_or(items.len()).max(1);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(StrategyError::Runtime)?;
        debug!(limit, items = items.len(), "process pool started");

        let launcher = &self.launcher;
        let started: Vec<bool> = runtime.block_on(
            stream::iter(items.iter().copied())
                .map(|item| async move {
                    if ctx.stop().is_requested() {
                        return false;
                    }
                    worker::supervise(launcher, ctx, item).await;
                    true
                })
                .buffer_unordered(limit)
                .collect(),
        );

        let dispatched = started.iter().filter(|s| **s).count();
        Ok(BatchReport {
            dispatched,
            not_dispatched: started.len() - dispatched,
        })
    }
}
