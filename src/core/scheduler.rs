//! # Group Scheduler / 分组调度器
//!
//! Drives one execution strategy over every batch of a plan. A batch is
//! started only after the previous one has returned, and the strategy
//! returns only after all of its workers are joined, so every record of a
//! group is final before the next group is dispatched.
//!
//! 在计划的每个批次上驱动执行策略。只有上一个批次返回后才会开始下一个批次，
//! 而执行策略只有在所有工作者回收后才会返回，因此一个分组的所有记录
//! 在下一个分组派发之前都已最终确定。

use crate::core::config::WorkerCount;
use crate::core::context::RunContext;
use crate::core::errors::StrategyError;
use crate::core::planner::ExecutionPlan;
use crate::core::strategy::{BatchReport, ExecutionStrategy};
use tracing::{debug, info};

/// Accounting of one scheduled run.
/// 一次调度运行的统计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleSummary {
    /// Batches handed to the strategy. / 交给执行策略的批次数。
    pub batches_run: usize,
    pub dispatched: usize,
    /// Items skipped because a stop was requested. / 因请求停止而跳过的测试项。
    pub not_dispatched: usize,
}

pub struct GroupScheduler<'s> {
    strategy: &'s dyn ExecutionStrategy,
    workers: WorkerCount,
}

impl<'s> GroupScheduler<'s> {
    pub fn new(strategy: &'s dyn ExecutionStrategy, workers: WorkerCount) -> Self {
        Self { strategy, workers }
    }

    /// Runs every batch of `plan` in order.
    ///
    /// Once a stop has been requested no further batch is started; the items
    /// of the remaining batches are counted as not dispatched.
    pub fn run(
        &self,
        plan: &ExecutionPlan<'_>,
        ctx: &RunContext,
    ) -> Result<ScheduleSummary, StrategyError> {
        let mut summary = ScheduleSummary::default();

        for (kind, batch) in plan.batches() {
            if batch.is_empty() {
                continue;
            }
            if ctx.stop().is_requested() {
                debug!(batch = %kind, items = batch.len(), "skipping batch after stop request");
                summary.not_dispatched += batch.len();
                continue;
            }

            debug!(batch = %kind, items = batch.len(), mode = %self.strategy.mode(), "running batch");
            let BatchReport {
                dispatched,
                not_dispatched,
            } = self.strategy.run(batch, self.workers, ctx)?;
            summary.batches_run += 1;
            summary.dispatched += dispatched;
            summary.not_dispatched += not_dispatched;
        }

        if summary.not_dispatched > 0 {
            info!(not_dispatched = summary.not_dispatched, "items were not run");
        }
        Ok(summary)
    }
}
