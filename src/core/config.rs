//! # Configuration Module / 配置模块
//!
//! Parses the `Concurrent.toml` file and validates the two selectors of the
//! command surface: the execution mode and the worker count.
//!
//! 解析 `Concurrent.toml` 文件，并校验命令接口的两个选择器：执行模式和工作者数量。

use crate::core::errors::ConfigError;
use crate::core::models::{GroupAnnotation, Location, TestItem};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Concurrency strategy selected for a run.
/// 为一次运行选择的并发策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Sequential,
    ThreadPool,
    ProcessPool,
    CooperativePool,
}

impl ExecutionMode {
    const EXPECTED: &'static str = "sequential, thread-pool, process-pool, cooperative-pool";

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::Sequential => "sequential",
            ExecutionMode::ThreadPool => "thread-pool",
            ExecutionMode::ProcessPool => "process-pool",
            ExecutionMode::CooperativePool => "cooperative-pool",
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" | "serial" | "none" => Ok(ExecutionMode::Sequential),
            "thread-pool" | "threadpool" | "mthread" | "multithread" => Ok(ExecutionMode::ThreadPool),
            "process-pool" | "processpool" | "mproc" | "multiprocess" => Ok(ExecutionMode::ProcessPool),
            "cooperative-pool" | "cooperative" | "asyncnet" | "asyncnetwork" | "gevent" => {
                Ok(ExecutionMode::CooperativePool)
            }
            _ => Err(ConfigError::InvalidMode {
                value: s.to_string(),
                expected: Self::EXPECTED,
            }),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Worker-count selector.
/// 工作者数量选择器。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerCount {
    /// Use the strategy-specific default. / 使用策略自己的默认值。
    #[default]
    Unset,
    /// A fixed positive number of workers. / 固定的正整数工作者数量。
    Fixed(NonZeroUsize),
    /// One worker per item in the batch. / 每个批次中的测试项一个工作者。
    MatchItems,
}

impl WorkerCount {
    /// Resolves the selector against a batch size.
    /// `None` means the strategy should apply its own default.
    pub fn resolve(self, batch_len: usize) -> Option<usize> {
        match self {
            WorkerCount::Unset => None,
            WorkerCount::Fixed(n) => Some(n.get()),
            WorkerCount::MatchItems => Some(batch_len.max(1)),
        }
    }
}

impl FromStr for WorkerCount {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("max") || trimmed.eq_ignore_ascii_case("match") {
            return Ok(WorkerCount::MatchItems);
        }
        trimmed
            .parse::<NonZeroUsize>()
            .map(WorkerCount::Fixed)
            .map_err(|_| ConfigError::InvalidWorkerCount {
                value: s.to_string(),
            })
    }
}

impl fmt::Display for WorkerCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerCount::Unset => f.write_str("default"),
            WorkerCount::Fixed(n) => write!(f, "{n}"),
            WorkerCount::MatchItems => f.write_str("max"),
        }
    }
}

/// The `workers` value as written in TOML: an integer or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawWorkers {
    Count(i64),
    Text(String),
}

impl RawWorkers {
    pub fn parse(&self) -> Result<WorkerCount, ConfigError> {
        match self {
            RawWorkers::Count(n) => n.to_string().parse(),
            RawWorkers::Text(text) => text.parse(),
        }
    }
}

/// The `[session]` table.
/// `[session]` 配置表。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Execution mode name, validated with [`ExecutionMode::from_str`].
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub workers: Option<RawWorkers>,
    /// Stop the session after this many failures. / 失败达到此数量后停止会话。
    #[serde(default)]
    pub maxfail: Option<usize>,
    #[serde(default)]
    pub verbose: bool,
    /// Where to write the JUnit XML report. / JUnit XML 报告的写入位置。
    #[serde(default)]
    pub junit_xml: Option<PathBuf>,
    #[serde(default = "default_suite_name")]
    pub suite_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: None,
            workers: None,
            maxfail: None,
            verbose: false,
            junit_xml: None,
            suite_name: default_suite_name(),
        }
    }
}

/// A shared fixture whose teardown may be skipped between consecutive items.
/// 一个共享夹具，其清理可以在连续测试项之间被跳过。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FixtureConfig {
    pub name: String,
    #[serde(default)]
    pub setup: Option<String>,
    #[serde(default)]
    pub teardown: Option<String>,
}

/// One `[[items]]` entry.
/// 一个 `[[items]]` 条目。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ItemConfig {
    pub nodeid: String,
    /// Defaults to the part of the node id before the first `::`.
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub group: Option<GroupAnnotation>,
    #[serde(default)]
    pub fixture: Option<String>,
    #[serde(default)]
    pub setup: Option<String>,
    #[serde(default)]
    pub call: Option<String>,
    #[serde(default)]
    pub teardown: Option<String>,
    /// Skip reason; the item is skipped in its setup phase.
    #[serde(default)]
    pub skip: Option<String>,
}

impl ItemConfig {
    pub fn to_test_item(&self) -> TestItem {
        let file = self.file.clone().unwrap_or_else(|| {
            self.nodeid
                .split("::")
                .next()
                .unwrap_or(&self.nodeid)
                .to_string()
        });
        TestItem {
            nodeid: self.nodeid.clone(),
            location: Location::new(file, self.line),
            group: self.group.clone(),
        }
    }
}

/// The whole configuration file.
/// 整个配置文件。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// The language for the runner's output messages (e.g., "en", "zh-CN").
    /// 运行器输出消息的语言（例如 "en", "zh-CN"）。
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub fixtures: Vec<FixtureConfig>,
    #[serde(default)]
    pub items: Vec<ItemConfig>,
}

impl RunnerConfig {
    /// Builds the ordered item sequence, rejecting duplicate node ids and
    /// references to undeclared fixtures.
    pub fn test_items(&self) -> Result<Vec<TestItem>, ConfigError> {
        let fixtures: HashSet<&str> = self.fixtures.iter().map(|f| f.name.as_str()).collect();
        let mut seen = HashSet::new();
        let mut items = Vec::with_capacity(self.items.len());

        for item in &self.items {
            if !seen.insert(item.nodeid.as_str()) {
                return Err(ConfigError::DuplicateNodeId {
                    nodeid: item.nodeid.clone(),
                });
            }
            if let Some(fixture) = &item.fixture {
                if !fixtures.contains(fixture.as_str()) {
                    return Err(ConfigError::UnknownFixture {
                        nodeid: item.nodeid.clone(),
                        fixture: fixture.clone(),
                    });
                }
            }
            items.push(item.to_test_item());
        }
        Ok(items)
    }

    pub fn find_item(&self, nodeid: &str) -> Option<&ItemConfig> {
        self.items.iter().find(|item| item.nodeid == nodeid)
    }
}

/// Loads and parses a configuration file.
/// 加载并解析配置文件。
pub fn load_config(path: &Path) -> Result<RunnerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn default_language() -> String {
    "en".to_string()
}

fn default_suite_name() -> String {
    "concurrent-runner".to_string()
}
