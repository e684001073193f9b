//! # Test Session / 测试会话
//!
//! Wires one run together: plans the items, drives the group scheduler,
//! feeds reporters from the aggregator's subscription on a dedicated thread
//! and derives the exit status from the final statistics.
//!
//! 把一次运行串联起来：为测试项生成计划、驱动分组调度器、
//! 在专用线程上用聚合器的订阅喂给报告器，并根据最终统计得出退出状态。

use crate::core::aggregator::{AggregatedStats, ResultAggregator};
use crate::core::config::{ExecutionMode, WorkerCount};
use crate::core::context::{RunContext, StopKind, StopReason, StopSignal};
use crate::core::errors::{ReportError, SessionError};
use crate::core::host::HostExecutor;
use crate::core::models::{ExitStatus, TestItem};
use crate::core::planner::plan_execution;
use crate::core::scheduler::GroupScheduler;
use crate::core::strategy::ExecutionStrategy;
use crate::reporting::Reporter;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Run-level facts reporters need besides the statistics.
/// 除统计数据外报告器所需的运行级信息。
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub mode: ExecutionMode,
    pub duration: Duration,
    pub items_collected: usize,
    pub dispatched: usize,
    pub not_dispatched: usize,
    pub stop: Option<StopReason>,
}

/// Everything a finished session produced.
#[derive(Debug)]
pub struct SessionOutcome {
    pub stats: AggregatedStats,
    pub summary: RunSummary,
    pub exit_status: ExitStatus,
    /// Reporters that failed at session end. These do not change the exit status.
    pub report_errors: Vec<ReportError>,
}

pub struct Session {
    strategy: Box<dyn ExecutionStrategy>,
    workers: WorkerCount,
    ctx: RunContext,
    reporters: Vec<Box<dyn Reporter>>,
}

impl Session {
    pub fn new(
        strategy: Box<dyn ExecutionStrategy>,
        workers: WorkerCount,
        host: Arc<dyn HostExecutor>,
    ) -> Self {
        Self {
            strategy,
            workers,
            ctx: RunContext::new(host, Arc::new(ResultAggregator::new())),
            reporters: Vec::new(),
        }
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.ctx = self.ctx.with_stop_signal(stop);
        self
    }

    pub fn with_maxfail(mut self, maxfail: Option<usize>) -> Self {
        self.ctx = self.ctx.with_maxfail(maxfail);
        self
    }

    pub fn with_reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    pub fn aggregator(&self) -> &Arc<ResultAggregator> {
        self.ctx.aggregator()
    }

    pub fn stop_signal(&self) -> &StopSignal {
        self.ctx.stop()
    }

    /// Runs `items` to completion.
    ///
    /// Fails only on configuration errors (before anything runs), when a
    /// strategy cannot start its workers, or when the aggregated statistics
    /// are found inconsistent.
    ///
    /// 运行 `items` 直至完成。
    /// 只有在配置错误（任何测试项运行之前）、执行策略无法启动工作者
    /// 或聚合统计不一致时才会失败。
    pub fn run(mut self, items: &[TestItem]) -> Result<SessionOutcome, SessionError> {
        let plan = plan_execution(items)?;
        let started = Instant::now();
        let mode = self.strategy.mode();

        if plan.is_empty() {
            info!("no items collected");
            let stats = self.ctx.aggregator().snapshot();
            let summary = RunSummary {
                mode,
                duration: started.elapsed(),
                items_collected: 0,
                dispatched: 0,
                not_dispatched: 0,
                stop: None,
            };
            let report_errors = finish_reporters(&mut self.reporters, &stats, &summary);
            return Ok(SessionOutcome {
                stats,
                summary,
                exit_status: ExitStatus::NoTestsCollected,
                report_errors,
            });
        }

        info!(
            items = plan.total_items(),
            groups = plan.groups.len(),
            %mode,
            workers = %self.workers,
            "session started"
        );

        let mut subscription = self.ctx.aggregator().subscribe();
        let scheduler = GroupScheduler::new(self.strategy.as_ref(), self.workers);
        let ctx = &self.ctx;
        let reporters = &mut self.reporters;

        let scheduled = thread::scope(|scope| {
            scope.spawn(move || {
                while let Some(record) = subscription.blocking_recv() {
                    for reporter in reporters.iter_mut() {
                        reporter.on_outcome(&record);
                    }
                }
            });

            let scheduled = scheduler.run(&plan, ctx);
            ctx.host().finish();
            // Ends the subscription so the reporter thread drains and exits
            // before the scope joins it.
            ctx.aggregator().close_subscriptions();
            scheduled
        });
        let schedule = scheduled?;

        let stats = self.ctx.aggregator().snapshot();
        stats.check_invariant()?;

        let stop = self.ctx.stop().reason().cloned();
        let summary = RunSummary {
            mode,
            duration: started.elapsed(),
            items_collected: plan.total_items(),
            dispatched: schedule.dispatched,
            not_dispatched: schedule.not_dispatched,
            stop: stop.clone(),
        };

        let exit_status = match (&stop, stats.failure_count()) {
            (Some(StopReason { kind: StopKind::Interrupted, .. }), _) => ExitStatus::Interrupted,
            (_, 0) => ExitStatus::Ok,
            _ => ExitStatus::TestsFailed,
        };

        let report_errors = finish_reporters(&mut self.reporters, &stats, &summary);
        info!(?exit_status, elapsed = ?summary.duration, "session finished");

        Ok(SessionOutcome {
            stats,
            summary,
            exit_status,
            report_errors,
        })
    }
}

fn finish_reporters(
    reporters: &mut [Box<dyn Reporter>],
    stats: &AggregatedStats,
    summary: &RunSummary,
) -> Vec<ReportError> {
    reporters
        .iter_mut()
        .filter_map(|reporter| reporter.on_session_end(stats, summary).err())
        .inspect(|err| error!(error = %err, "reporter failed"))
        .collect()
}
