//! # Result Aggregator / 结果聚合器
//!
//! The aggregator is the only state written by more than one worker. Every
//! mutation goes through [`ResultAggregator::record`], which appends the record
//! to its category sequence, bumps the matching counter and notifies
//! subscribers inside a single critical section.
//!
//! 聚合器是唯一会被多个工作者写入的状态。所有修改都经由
//! [`ResultAggregator::record`]，它在同一个临界区内追加记录到类别序列、
//! 递增对应计数器并通知订阅者。

use crate::core::errors::InvariantViolation;
use crate::core::models::{Category, OutcomeRecord, Phase};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Anything that outcome records can be written into.
///
/// Implemented by the in-process [`ResultAggregator`] and by the child-side
/// proxy of the process pool, which serializes every call to its parent.
///
/// 任何可以写入结果记录的对象。
/// 由进程内的 [`ResultAggregator`] 以及进程池的子进程代理实现，
/// 后者会把每次调用序列化发送给父进程。
pub trait RecordSink: Send + Sync {
    fn record(&self, record: OutcomeRecord);

    /// Asks the session to stop. Sinks that cannot stop anything ignore it.
    fn request_stop(&self, reason: &str) {
        let _ = reason;
    }
}

/// The four summary counters.
/// 四个汇总计数器。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub error: usize,
    pub passed: usize,
    pub failure: usize,
    pub skipped: usize,
}

impl Counters {
    pub fn get(&self, category: Category) -> usize {
        match category {
            Category::Passed => self.passed,
            Category::Failed => self.failure,
            Category::Error => self.error,
            Category::Skipped => self.skipped,
        }
    }

    fn bump(&mut self, category: Category) {
        match category {
            Category::Passed => self.passed += 1,
            Category::Failed => self.failure += 1,
            Category::Error => self.error += 1,
            Category::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.error + self.passed + self.failure + self.skipped
    }
}

/// Point-in-time view of everything recorded so far.
/// 到目前为止所有已记录内容的时间点视图。
#[derive(Debug, Clone, Default)]
pub struct AggregatedStats {
    /// Every record, in recording order. / 所有记录，按记录顺序排列。
    records: Vec<OutcomeRecord>,
    categories: BTreeMap<Category, Vec<OutcomeRecord>>,
    counters: Counters,
}

impl AggregatedStats {
    pub fn records(&self) -> &[OutcomeRecord] {
        &self.records
    }

    pub fn category(&self, category: Category) -> &[OutcomeRecord] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Records of the given phase, in recording order.
    pub fn phase_records(&self, phase: Phase) -> impl Iterator<Item = &OutcomeRecord> {
        self.records.iter().filter(move |r| r.phase == phase)
    }

    /// Number of records failing the session (`failed` + `error`).
    pub fn failure_count(&self) -> usize {
        self.counters.failure + self.counters.error
    }

    /// Checks that every counter equals its category sequence length.
    pub fn check_invariant(&self) -> Result<(), InvariantViolation> {
        for category in Category::ALL {
            let counter = self.counters.get(category);
            let records = self.category(category).len();
            if counter != records {
                return Err(InvariantViolation {
                    category,
                    counter,
                    records,
                });
            }
        }
        Ok(())
    }

    fn push(&mut self, record: OutcomeRecord) {
        if let Some(category) = record.category() {
            self.categories
                .entry(category)
                .or_default()
                .push(record.clone());
            self.counters.bump(category);
        }
        self.records.push(record);
    }
}

struct Shared {
    stats: AggregatedStats,
    subscribers: Vec<mpsc::UnboundedSender<OutcomeRecord>>,
}

/// Concurrency-safe store of outcome records, created once per run.
/// 线程安全的结果记录存储，每次运行创建一次。
pub struct ResultAggregator {
    shared: Mutex<Shared>,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self {
            shared: Mutex::new(Shared {
                stats: AggregatedStats::default(),
                subscribers: Vec::new(),
            }),
        }
    }

    // The guarded data is updated without any code that can panic in between,
    // so a poisoned lock still holds consistent stats.
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a record and updates its counter atomically.
    /// 原子地追加记录并更新其计数器。
    pub fn record(&self, record: OutcomeRecord) {
        let mut shared = self.lock();
        // Subscribers see records in exactly the order they are appended.
        shared
            .subscribers
            .retain(|subscriber| subscriber.send(record.clone()).is_ok());
        shared.stats.push(record);
    }

    /// Returns a copy of the current statistics; rendering it never holds the lock.
    /// 返回当前统计的副本；渲染它时不会持有锁。
    pub fn snapshot(&self) -> AggregatedStats {
        self.lock().stats.clone()
    }

    /// Current `failed + error` count, without copying the records.
    pub fn failure_count(&self) -> usize {
        self.lock().stats.failure_count()
    }

    /// Subscribes to every record recorded from now on.
    ///
    /// Sending never blocks, so a slow subscriber cannot stall recording.
    /// The subscription ends once the aggregator is dropped.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<OutcomeRecord> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }

    /// Closes every subscription so that receivers drain and finish.
    pub fn close_subscriptions(&self) {
        self.lock().subscribers.clear();
    }
}

impl RecordSink for ResultAggregator {
    fn record(&self, record: OutcomeRecord) {
        ResultAggregator::record(self, record);
    }
}
