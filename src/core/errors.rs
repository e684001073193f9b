//! # Error Taxonomy / 错误分类
//!
//! Configuration errors are fatal before any item runs. Item errors never
//! leave the strategy boundary. Strategy errors mean the concurrency
//! substrate itself could not be brought up.
//!
//! 配置错误在任何测试项运行之前即为致命错误。测试项错误永远不会越过执行策略的边界。
//! 策略错误表示并发底层本身无法启动。

use crate::core::models::{Category, OutcomeRecord};
use std::path::PathBuf;
use thiserror::Error;

/// A configuration problem detected before scheduling starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid concurrent mode `{value}` (expected one of: {expected})")]
    InvalidMode { value: String, expected: &'static str },

    #[error("invalid worker count `{value}` (expected a positive integer or `max`)")]
    InvalidWorkerCount { value: String },

    #[error("invalid group annotation {annotation} on `{nodeid}`: group ids must be integers")]
    InvalidGroup { nodeid: String, annotation: String },

    #[error("duplicate node id `{nodeid}`")]
    DuplicateNodeId { nodeid: String },

    #[error("item `{nodeid}` refers to unknown fixture `{fixture}`")]
    UnknownFixture { nodeid: String, fixture: String },

    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Failure of the host while executing a single item.
#[derive(Debug, Error)]
pub enum ItemError {
    /// The item could not be executed; recorded as an `error` outcome.
    #[error("{0}")]
    Failed(String),

    /// The host asks the whole session to stop. The records produced before
    /// the request are still recorded.
    #[error("stop requested: {reason}")]
    Interrupted {
        reason: String,
        records: Vec<OutcomeRecord>,
    },
}

/// The execution substrate of a strategy could not be set up.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("failed to build worker thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to build async runtime")]
    Runtime(#[source] std::io::Error),

    #[error("process pool requires a worker launcher")]
    MissingLauncher,
}

/// Writing the structured report failed.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report to {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write report output")]
    Write(#[from] std::io::Error),

    #[error("failed to serialize report")]
    Xml(#[from] quick_xml::Error),
}

/// Failure of a whole session, as opposed to failures of its items.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error("internal error: {0}")]
    Invariant(#[from] InvariantViolation),
}

/// Counters and record sequences of the aggregated statistics diverged.
/// This can only be caused by a bug and is never recovered from.
#[derive(Debug, Error)]
#[error("aggregated stats diverged for `{category:?}`: counter = {counter}, records = {records}")]
pub struct InvariantViolation {
    pub category: Category,
    pub counter: usize,
    pub records: usize,
}
