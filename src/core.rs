//! # Core Module / 核心模块
//!
//! This module contains the execution engine: data models, configuration,
//! the result aggregator, the execution strategies and the group scheduler
//! that drives them.
//!
//! 此模块包含执行引擎：数据模型、配置、结果聚合器、执行策略以及驱动它们的分组调度器。

pub mod aggregator;
pub mod config;
pub mod context;
pub mod errors;
pub mod host;
pub mod models;
pub mod planner;
pub mod scheduler;
pub mod session;
pub mod strategy;

// Re-exports
pub use aggregator::{AggregatedStats, ResultAggregator};
pub use config::{ExecutionMode, WorkerCount};
pub use host::{Cooperative, HostExecutor};
pub use models::{OutcomeRecord, TestItem};
pub use session::Session;
