//! # Concurrent Runner Library / Concurrent Runner 库
//!
//! A concurrent test-execution engine. Given a flat list of independently
//! runnable test items, it runs them sequentially, on a thread pool, on a
//! process pool or on a cooperative pool, optionally partitioned into ordered
//! groups, while aggregating every outcome into shared state that the live
//! terminal output and the final JUnit-XML report consume.
//!
//! 一个并发测试执行引擎。给定一组可独立运行的测试项，它可以顺序运行、
//! 在线程池、进程池或协作池上运行，并可按有序分组划分，
//! 同时把每个结果聚合到共享状态中，供实时终端输出和最终的 JUnit-XML 报告使用。
//!
//! ## Modules / 模块
//!
//! - `core` - Data models, aggregator, execution strategies and scheduling
//! - `infra` - Command host executor, worker processes, file system and logging
//! - `reporting` - Terminal and JUnit-XML reporters
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 数据模型、聚合器、执行策略和调度
//! - `infra` - 命令主机执行器、工作进程、文件系统和日志
//! - `reporting` - 终端和 JUnit-XML 报告器
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use core::config;
pub use core::models;

/// Picks the output language from the system locale.
///
/// `zh-CN` is used as is when a translation exists, `en-US` falls back to
/// `en`, and anything unknown ends up on the `en` fallback.
///
/// 根据系统区域设置选择输出语言。
pub fn init() {
    let system = sys_locale::get_locale().unwrap_or_default();
    rust_i18n::set_locale(&match_locale(&system));
}

fn match_locale(system: &str) -> String {
    let available = rust_i18n::available_locales!();
    let language = system.split(['-', '_']).next().unwrap_or_default();
    [system, language]
        .into_iter()
        .find(|candidate| available.contains(candidate))
        .unwrap_or("en")
        .to_string()
}

rust_i18n::i18n!("locales", fallback = "en");
