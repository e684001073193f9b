//! # Reporting Module / 报告模块
//!
//! Reporters consume outcome records. They are fed one record at a time as
//! records are aggregated, and once more with the final statistics when the
//! session ends. Two variants exist: the live terminal reporter and the
//! JUnit-XML report builder.
//!
//! 报告器消费结果记录。记录被聚合时逐条传给报告器，会话结束时再传入最终统计。
//! 现有两种实现：实时终端报告器和 JUnit-XML 报告构建器。

pub mod console;
pub mod junit;

pub use console::TerminalReporter;
pub use junit::JunitReporter;

use crate::core::aggregator::AggregatedStats;
use crate::core::errors::ReportError;
use crate::core::models::OutcomeRecord;
use crate::core::session::RunSummary;

/// Consumer of outcome records.
/// 结果记录的消费者。
pub trait Reporter: Send {
    /// Called once per record, in recording order, off the worker threads.
    fn on_outcome(&mut self, record: &OutcomeRecord);

    /// Called once after every worker has been joined.
    fn on_session_end(
        &mut self,
        stats: &AggregatedStats,
        summary: &RunSummary,
    ) -> Result<(), ReportError>;
}
