use super::{settle, BatchReport, ExecutionStrategy};
use crate::core::config::{ExecutionMode, WorkerCount};
use crate::core::context::RunContext;
use crate::core::errors::StrategyError;
use crate::core::host::Cooperative;
use crate::core::models::{TestItem, WorkerId};
use futures::{stream, FutureExt, StreamExt};
use std::panic::AssertUnwindSafe;
use tracing::debug;

/// Runs every item on the caller's thread as cooperative tasks.
///
/// A current-thread runtime drives up to `workers` items at once; an item
/// only makes room for its siblings at the yield points the host reaches
/// through its [`Cooperative`] handle.
///
/// 在调用者线程上以协作任务的形式运行所有测试项。
/// 单线程运行时最多同时驱动 `workers` 个测试项；
/// 只有当主机通过 [`Cooperative`] 句柄到达让出点时，其他测试项才能继续运行。
#[derive(Debug, Default, Clone, Copy)]
pub struct CooperativePool;

impl ExecutionStrategy for CooperativePool {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::CooperativePool
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

        // Unbounded unless a limit is configured.
        let limit = workers.resolve(items.len()).unwrap_or(items.len()).max(1);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(StrategyError::Runtime)?;
        debug!(limit, items = items.len(), "cooperative pool started");

        let started: Vec<bool> = runtime.block_on(
            stream::iter(items.iter().copied().enumerate())
                .map(|(task, item)| async move {
                    if ctx.stop().is_requested() {
                        return false;
                    }
                    // Building the future may panic too, so it happens inside.
                    let outcome = AssertUnwindSafe(async {
                        ctx.host().execute_cooperative(item, Cooperative::new()).await
                    })
                    .catch_unwind()
                    .await;
                    settle(ctx, item, WorkerId::Task(task), outcome);
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
