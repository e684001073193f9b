//! # Run Context / 运行上下文
//!
//! Everything a strategy needs while running a batch: the host executor,
//! the shared aggregator, the process-wide stop signal and the fail-fast
//! policy.
//!
//! 执行策略运行批次时所需的一切：主机执行器、共享聚合器、进程级停止信号以及快速失败策略。

use crate::core::aggregator::{RecordSink, ResultAggregator};
use crate::core::host::HostExecutor;
use crate::core::models::OutcomeRecord;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::info;

/// Why the session was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopKind {
    /// The fail-fast policy tripped. / 快速失败策略被触发。
    MaxFail,
    /// The host or the user (Ctrl-C) interrupted the session. / 主机或用户（Ctrl-C）中断了会话。
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReason {
    pub kind: StopKind,
    pub message: String,
}

/// Process-wide "stop requested" flag. The first request wins the reason.
/// 进程级的“请求停止”标志。第一个请求的原因会被保留。
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    token: CancellationToken,
    reason: Arc<OnceCell<StopReason>>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, kind: StopKind, message: impl Into<String>) {
        let message = message.into();
        if self.reason.set(StopReason { kind, message }).is_ok() {
            info!(reason = ?self.reason.get(), "stop requested");
        }
        self.token.cancel();
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<&StopReason> {
        self.reason.get()
    }

    /// Completes once a stop has been requested.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

/// Shared state of one run, borrowed by every strategy.
/// 一次运行的共享状态，被每个执行策略借用。
pub struct RunContext {
    host: Arc<dyn HostExecutor>,
    aggregator: Arc<ResultAggregator>,
    stop: StopSignal,
    maxfail: Option<usize>,
}

impl RunContext {
    pub fn new(host: Arc<dyn HostExecutor>, aggregator: Arc<ResultAggregator>) -> Self {
        Self {
            host,
            aggregator,
            stop: StopSignal::new(),
            maxfail: None,
        }
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Stops the session once `maxfail` records have failed or errored.
    pub fn with_maxfail(mut self, maxfail: Option<usize>) -> Self {
        self.maxfail = maxfail.filter(|n| *n > 0);
        self
    }

    pub fn host(&self) -> &dyn HostExecutor {
        self.host.as_ref()
    }

    pub fn aggregator(&self) -> &Arc<ResultAggregator> {
        &self.aggregator
    }

    pub fn stop(&self) -> &StopSignal {
        &self.stop
    }

    /// Records one outcome and applies the fail-fast policy.
    pub fn record(&self, record: OutcomeRecord) {
        let failed = record.is_failure();
        self.aggregator.record(record);

        if let (true, Some(maxfail)) = (failed, self.maxfail) {
            let failures = self.aggregator.failure_count();
            if failures >= maxfail {
                self.stop
                    .request(StopKind::MaxFail, format!("stopping after {failures} failures"));
            }
        }
    }
}

impl RecordSink for RunContext {
    fn record(&self, record: OutcomeRecord) {
        RunContext::record(self, record);
    }

    fn request_stop(&self, reason: &str) {
        self.stop.request(StopKind::Interrupted, reason);
    }
}
