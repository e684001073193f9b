//! # Data Models Module / 数据模型模块
//!
//! This module defines the core data structures shared by every execution
//! strategy: test items, outcome records and the values they are built from.
//! Outcome records are plain values so they can cross thread and process
//! boundaries unchanged.
//!
//! 此模块定义了所有执行策略共享的核心数据结构：测试项、结果记录及其组成值。
//! 结果记录只包含普通值，因此可以原样跨越线程和进程边界。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Where a test item lives, used only for display.
/// 测试项所在的位置，仅用于显示。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// The raw group annotation attached to an item during collection.
///
/// Collection hands over whatever the user wrote; the planner decides whether
/// it is a valid group id.
///
/// 收集阶段附加在测试项上的原始分组注解。
/// 收集阶段原样传递用户所写内容；由计划器判断它是否为合法的分组 ID。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupAnnotation {
    Id(i64),
    Text(String),
}

impl GroupAnnotation {
    /// Resolves the annotation to an integer group id.
    /// Strings are accepted when they parse as an integer.
    pub fn group_id(&self) -> Option<i64> {
        match self {
            GroupAnnotation::Id(id) => Some(*id),
            GroupAnnotation::Text(text) => text.trim().parse().ok(),
        }
    }
}

impl fmt::Display for GroupAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupAnnotation::Id(id) => write!(f, "{id}"),
            GroupAnnotation::Text(text) => write!(f, "{text:?}"),
        }
    }
}

/// A single independently runnable test item.
///
/// Items are created once during collection and only ever borrowed by the
/// scheduler and the strategies.
///
/// 一个可独立运行的测试项。
/// 测试项在收集阶段创建一次，之后调度器和执行策略只借用它们。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestItem {
    /// Globally unique identifier, e.g. `tests/test_db.py::test_insert`.
    /// 全局唯一标识符。
    pub nodeid: String,
    /// Source location for display. / 用于显示的源码位置。
    pub location: Location,
    /// Group annotation, `None` means ungrouped. / 分组注解，`None` 表示未分组。
    pub group: Option<GroupAnnotation>,
}

impl TestItem {
    pub fn new(nodeid: impl Into<String>, location: Location) -> Self {
        Self {
            nodeid: nodeid.into(),
            location,
            group: None,
        }
    }

    /// Builder-style helper attaching an integer group id.
    pub fn with_group(mut self, group: i64) -> Self {
        self.group = Some(GroupAnnotation::Id(group));
        self
    }

    /// Builder-style helper attaching an arbitrary annotation.
    pub fn with_group_annotation(mut self, annotation: GroupAnnotation) -> Self {
        self.group = Some(annotation);
        self
    }
}

/// Lifecycle phase of a test item.
/// 测试项的生命周期阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Setup,
    Call,
    Teardown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Setup => "setup",
            Phase::Call => "call",
            Phase::Teardown => "teardown",
        })
    }
}

/// Raw status of one phase as reported by the host.
/// 主机报告的单个阶段的原始状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
    Skipped,
    Error,
}

/// Status category used by the aggregated statistics.
///
/// A failure outside the call phase is an `Error` (a fixture broke, not the
/// test body); a pass outside the call phase has no category at all.
///
/// 聚合统计使用的状态类别。
/// 调用阶段之外的失败属于 `Error`（夹具出错而不是测试体出错）；
/// 调用阶段之外的通过没有类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Passed,
    Failed,
    Error,
    Skipped,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Failed,
        Category::Passed,
        Category::Skipped,
        Category::Error,
    ];

    /// The single-character progress glyph.
    pub fn glyph(self) -> char {
        match self {
            Category::Passed => '.',
            Category::Failed => 'F',
            Category::Error => 'E',
            Category::Skipped => 's',
        }
    }

    /// The upper-case status word used in verbose output.
    pub fn word(self) -> &'static str {
        match self {
            Category::Passed => "PASSED",
            Category::Failed => "FAILED",
            Category::Error => "ERROR",
            Category::Skipped => "SKIPPED",
        }
    }

    /// The label used in the summary line (`3 passed, 1 error`).
    pub fn label(self) -> &'static str {
        match self {
            Category::Passed => "passed",
            Category::Failed => "failed",
            Category::Error => "error",
            Category::Skipped => "skipped",
        }
    }
}

/// Identifies where an outcome record was produced.
/// 标识结果记录产生的位置。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum WorkerId {
    /// The caller's own control flow. / 调用者自身的控制流。
    Main,
    /// A pool thread, by pool index. / 线程池中的线程（按池索引）。
    Thread(usize),
    /// A child process, by pid. / 子进程（按 pid）。
    Process(u32),
    /// A cooperative task on the caller's thread. / 调用者线程上的协作任务。
    Task(usize),
}

impl WorkerId {
    /// Whether the record was produced on the calling thread.
    pub fn is_local(&self) -> bool {
        matches!(self, WorkerId::Main | WorkerId::Task(_))
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerId::Main => f.write_str("main"),
            WorkerId::Thread(idx) => write!(f, "thread-{idx}"),
            WorkerId::Process(pid) => write!(f, "pid-{pid}"),
            WorkerId::Task(idx) => write!(f, "task-{idx}"),
        }
    }
}

/// Kind of a structured report fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    Failure,
    Error,
    Skipped,
}

/// Structured sub-document attached to a record, rendered by the JUnit builder.
/// 附加在记录上的结构化子文档，由 JUnit 构建器渲染。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFragment {
    pub kind: FragmentKind,
    pub message: String,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ReportFragment {
    pub fn failure(message: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            kind: FragmentKind::Failure,
            message: message.into(),
            detail,
        }
    }

    pub fn error(message: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            kind: FragmentKind::Error,
            message: message.into(),
            detail,
        }
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Skipped,
            message: message.into(),
            detail: None,
        }
    }
}

/// One immutable result of executing one phase of one test item.
///
/// Produced exactly once per (item, phase). Every field is a plain value so
/// the record can be serialized by a child process and replayed by the parent.
///
/// 执行一个测试项的一个阶段所得的不可变结果。
/// 每个（测试项，阶段）恰好产生一次。所有字段都是普通值，
/// 因此子进程可以序列化记录，父进程可以重放它。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub nodeid: String,
    pub location: Location,
    pub phase: Phase,
    pub status: Status,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub fragment: Option<ReportFragment>,
    /// Stamped by the execution strategy when the record is recorded.
    pub worker: WorkerId,
}

impl OutcomeRecord {
    pub fn new(item: &TestItem, phase: Phase, status: Status, duration: Duration) -> Self {
        Self {
            nodeid: item.nodeid.clone(),
            location: item.location.clone(),
            phase,
            status,
            duration,
            output: None,
            fragment: None,
            worker: WorkerId::Main,
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_fragment(mut self, fragment: ReportFragment) -> Self {
        self.fragment = Some(fragment);
        self
    }

    /// A synthetic `error` record for the call phase, used when the host
    /// could not produce a regular outcome for the item.
    pub fn internal_error(item: &TestItem, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(item, Phase::Call, Status::Error, Duration::ZERO)
            .with_output(message.clone())
            .with_fragment(ReportFragment::error(message, None))
    }

    /// Maps (phase, status) to the statistics category, if any.
    pub fn category(&self) -> Option<Category> {
        match (self.phase, self.status) {
            (Phase::Call, Status::Passed) => Some(Category::Passed),
            (_, Status::Passed) => None,
            (Phase::Call, Status::Failed) => Some(Category::Failed),
            (_, Status::Failed) | (_, Status::Error) => Some(Category::Error),
            (_, Status::Skipped) => Some(Category::Skipped),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.category(), Some(Category::Failed | Category::Error))
    }
}

/// Process exit status of a session.
/// 会话的进程退出状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Ok = 0,
    TestsFailed = 1,
    Interrupted = 2,
    InternalError = 3,
    UsageError = 4,
    NoTestsCollected = 5,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
