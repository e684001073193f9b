use super::{run_blocking, BatchReport, ExecutionStrategy};
use crate::core::config::{ExecutionMode, WorkerCount};
use crate::core::context::RunContext;
use crate::core::errors::StrategyError;
use crate::core::models::{TestItem, WorkerId};
use tracing::debug;

/// Runs every item on the caller's thread, in order.
///
/// The only strategy that passes a real "next item" hint, since it is the
/// only one that knows which item runs next.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sequential;

impl ExecutionStrategy for Sequential {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Sequential
    }

    fn run(
        &self,
        items: &[&TestItem],
        _workers: WorkerCount,
        ctx: &RunContext,
    ) -> Result<BatchReport, StrategyError> {
        let mut report = BatchReport::default();

        for (idx, item) in items.iter().enumerate() {
            if ctx.stop().is_requested() {
                report.not_dispatched = items.len() - idx;
                debug!(remaining = report.not_dispatched, "stop requested, halting batch");
                break;
            }
            let next = items.get(idx + 1).copied();
            run_blocking(ctx, item, next, WorkerId::Main);
            report.dispatched += 1;
        }

        Ok(report)
    }
}
