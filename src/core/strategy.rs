//! # Execution Strategies / 执行策略
//!
//! A strategy runs one batch of items and returns only once every dispatched
//! item has produced its outcome records and every worker has been joined.
//! All four variants share the per-item contract implemented by [`settle`]:
//! whatever the host does (returns records, fails, asks to stop or panics),
//! the item ends up with at least one record and its siblings keep running.
//!
//! 执行策略运行一个批次的测试项，只有当每个已派发的测试项都产生了结果记录、
//! 并且所有工作者都已回收之后才会返回。四种变体共享由 [`settle`] 实现的单项契约：
//! 无论主机如何表现（返回记录、失败、请求停止或 panic），
//! 该测试项至少会有一条记录，且其兄弟测试项继续运行。

pub mod cooperative;
pub mod process_pool;
pub mod sequential;
pub mod thread_pool;

pub use cooperative::CooperativePool;
pub use process_pool::ProcessPool;
pub use sequential::Sequential;
pub use thread_pool::ThreadPool;

use crate::core::aggregator::RecordSink;
use crate::core::config::{ExecutionMode, WorkerCount};
use crate::core::context::RunContext;
use crate::core::errors::{ItemError, StrategyError};
use crate::core::models::{OutcomeRecord, TestItem, WorkerId};
use crate::infra::worker::WorkerLauncher;
use std::any::Any;
use std::ops::AddAssign;
use std::panic::{self, AssertUnwindSafe};
use tracing::warn;

/// What happened to the items of one batch.
/// 一个批次中测试项的处理情况。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Items handed to the host. / 已交给主机的测试项。
    pub dispatched: usize,
    /// Items never started because a stop was requested. / 因请求停止而从未开始的测试项。
    pub not_dispatched: usize,
}

impl AddAssign for BatchReport {
    fn add_assign(&mut self, rhs: Self) {
        self.dispatched += rhs.dispatched;
        self.not_dispatched += rhs.not_dispatched;
    }
}

/// A concurrency policy for running a batch of items.
/// 运行一批测试项的并发策略。
pub trait ExecutionStrategy: Send + Sync {
    fn mode(&self) -> ExecutionMode;

    /// Runs `items` to completion. Fully synchronous.
    fn run(
        &self,
        items: &[&TestItem],
        workers: WorkerCount,
        ctx: &RunContext,
    ) -> Result<BatchReport, StrategyError>;
}

/// Creates the strategy for `mode`. The process pool needs a launcher for
/// its child processes.
pub fn strategy_for(
    mode: ExecutionMode,
    launcher: Option<WorkerLauncher>,
) -> Result<Box<dyn ExecutionStrategy>, StrategyError> {
    Ok(match mode {
        ExecutionMode::Sequential => Box::new(Sequential),
        ExecutionMode::ThreadPool => Box::new(ThreadPool),
        ExecutionMode::CooperativePool => Box::new(CooperativePool),
        ExecutionMode::ProcessPool => {
            Box::new(ProcessPool::new(launcher.ok_or(StrategyError::MissingLauncher)?))
        }
    })
}

pub(crate) type HostOutcome = Result<Result<Vec<OutcomeRecord>, ItemError>, Box<dyn Any + Send>>;

/// Runs one item on the current thread, catching panics.
pub(crate) fn run_blocking(
    ctx: &RunContext,
    item: &TestItem,
    next: Option<&TestItem>,
    worker: WorkerId,
) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| ctx.host().execute(item, next)));
    settle(ctx, item, worker, outcome);
}

/// Turns whatever the host produced for `item` into recorded outcomes.
/// 把主机为 `item` 产生的任何结果转换为已记录的结果。
pub fn settle(sink: &dyn RecordSink, item: &TestItem, worker: WorkerId, outcome: HostOutcome) {
    let stamp = |mut record: OutcomeRecord| {
        record.worker = worker;
        record
    };

    match outcome {
        Ok(Ok(records)) if records.is_empty() => {
            warn!(nodeid = %item.nodeid, "host executor produced no outcome");
            sink.record(stamp(OutcomeRecord::internal_error(
                item,
                "host executor produced no outcome",
            )));
        }
        Ok(Ok(records)) => {
            for record in records {
                sink.record(stamp(record));
            }
        }
        Ok(Err(ItemError::Failed(message))) => {
            sink.record(stamp(OutcomeRecord::internal_error(item, message)));
        }
        Ok(Err(ItemError::Interrupted { reason, records })) => {
            if records.is_empty() {
                sink.record(stamp(OutcomeRecord::internal_error(
                    item,
                    format!("interrupted: {reason}"),
                )));
            }
            for record in records {
                sink.record(stamp(record));
            }
            sink.request_stop(&reason);
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(nodeid = %item.nodeid, %message, "host executor panicked");
            sink.record(stamp(OutcomeRecord::internal_error(
                item,
                format!("host executor panicked: {message}"),
            )));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
