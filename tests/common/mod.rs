// Shared test helpers for integration tests
#![allow(dead_code)]

use concurrent_runner::core::aggregator::AggregatedStats;
use concurrent_runner::core::errors::{ItemError, ReportError};
use concurrent_runner::core::host::{Cooperative, HostExecutor};
use concurrent_runner::core::models::{
    Location, OutcomeRecord, Phase, ReportFragment, Status, TestItem,
};
use concurrent_runner::core::session::RunSummary;
use concurrent_runner::reporting::Reporter;
use futures::future::LocalBoxFuture;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// What the scripted host does for one item.
#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    Pass,
    Fail,
    SetupError,
    /// Call fails, then teardown errors.
    DoubleFail,
    Skip,
    Panic,
    /// Returns no records at all.
    Empty,
    /// Fails the call and asks the session to stop.
    Interrupt,
}

/// A host executor driven by a per-item script. Records the order items
/// were started in and the peak number of items running at once.
#[derive(Default)]
pub struct ScriptedHost {
    behaviors: HashMap<String, Behavior>,
    delay: Duration,
    started: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    finished: AtomicUsize,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, nodeid: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(nodeid.to_string(), behavior);
        self
    }

    /// Every item takes at least `delay` in its call phase.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn finish_calls(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    fn enter(&self, item: &TestItem) {
        self.started.lock().unwrap().push(item.nodeid.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn outcome(&self, item: &TestItem) -> Result<Vec<OutcomeRecord>, ItemError> {
        let behavior = self.behaviors.get(&item.nodeid).cloned().unwrap_or(Behavior::Pass);
        let setup = |status| OutcomeRecord::new(item, Phase::Setup, status, Duration::ZERO);
        let call = |status| OutcomeRecord::new(item, Phase::Call, status, self.delay);
        let teardown = |status| OutcomeRecord::new(item, Phase::Teardown, status, Duration::ZERO);

        match behavior {
            Behavior::Pass => Ok(vec![
                setup(Status::Passed),
                call(Status::Passed).with_output("ok"),
                teardown(Status::Passed),
            ]),
            Behavior::Fail => Ok(vec![
                setup(Status::Passed),
                call(Status::Failed)
                    .with_fragment(ReportFragment::failure("assert 1 == 2", None)),
                teardown(Status::Passed),
            ]),
            Behavior::SetupError => Ok(vec![
                setup(Status::Failed)
                    .with_fragment(ReportFragment::error("setup failed: db down", None)),
                teardown(Status::Passed),
            ]),
            Behavior::DoubleFail => Ok(vec![
                setup(Status::Passed),
                call(Status::Failed)
                    .with_fragment(ReportFragment::failure("assert False", None)),
                teardown(Status::Failed)
                    .with_fragment(ReportFragment::error("teardown failed: leak", None)),
            ]),
            Behavior::Skip => Ok(vec![
                setup(Status::Skipped).with_fragment(ReportFragment::skipped("not on CI")),
            ]),
            Behavior::Panic => panic!("scripted panic in {}", item.nodeid),
            Behavior::Empty => Ok(Vec::new()),
            Behavior::Interrupt => Err(ItemError::Interrupted {
                reason: "KeyboardInterrupt".to_string(),
                records: vec![setup(Status::Passed), call(Status::Failed)],
            }),
        }
    }
}

impl HostExecutor for ScriptedHost {
    fn execute(
        &self,
        item: &TestItem,
        _next: Option<&TestItem>,
    ) -> Result<Vec<OutcomeRecord>, ItemError> {
        self.enter(item);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.leave();
        self.outcome(item)
    }

    fn execute_cooperative<'a>(
        &'a self,
        item: &'a TestItem,
        coop: Cooperative,
    ) -> LocalBoxFuture<'a, Result<Vec<OutcomeRecord>, ItemError>> {
        Box::pin(async move {
            self.enter(item);
            if !self.delay.is_zero() {
                coop.sleep(self.delay).await;
            }
            self.leave();
            self.outcome(item)
        })
    }

    fn finish(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn item(nodeid: &str) -> TestItem {
    let file = nodeid.split("::").next().unwrap_or(nodeid);
    TestItem::new(nodeid, Location::new(file, 1))
}

pub fn grouped(nodeid: &str, group: i64) -> TestItem {
    item(nodeid).with_group(group)
}

/// `n` ungrouped items named `tests/test_mod.py::test_{i}`.
pub fn items(n: usize) -> Vec<TestItem> {
    (0..n)
        .map(|i| item(&format!("tests/test_mod.py::test_{i}")))
        .collect()
}

pub fn call_records(stats: &AggregatedStats) -> usize {
    stats.phase_records(Phase::Call).count()
}

/// A reporter that keeps everything it is given, shared with the test.
#[derive(Clone, Default)]
pub struct CollectingReporter {
    pub seen: Arc<Mutex<Vec<OutcomeRecord>>>,
    pub ended: Arc<Mutex<Option<RunSummary>>>,
}

impl Reporter for CollectingReporter {
    fn on_outcome(&mut self, record: &OutcomeRecord) {
        self.seen.lock().unwrap().push(record.clone());
    }

    fn on_session_end(
        &mut self,
        _stats: &AggregatedStats,
        summary: &RunSummary,
    ) -> Result<(), ReportError> {
        *self.ended.lock().unwrap() = Some(summary.clone());
        Ok(())
    }
}

/// Writes `content` as `Concurrent.toml` into a fresh temporary directory.
pub fn write_config(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temporary directory");
    let path = temp_dir.path().join("Concurrent.toml");
    fs::write(&path, content).expect("Failed to write config");
    (temp_dir, path)
}

/// A configuration with two passing items, one failing item and a grouped
/// item, all plain shell commands.
pub const MIXED_CONFIG: &str = r#"
language = "en"

[session]
mode = "sequential"

[[items]]
nodeid = "tests/smoke.sh::first"
call = "true"
group = 1

[[items]]
nodeid = "tests/smoke.sh::second"
call = "echo hello"

[[items]]
nodeid = "tests/smoke.sh::broken"
call = "sh -c 'echo boom >&2; exit 3'"
"#;

/// Same as [`MIXED_CONFIG`] without the failing item.
pub const PASSING_CONFIG: &str = r#"
language = "en"

[session]
mode = "thread-pool"
workers = 2

[[items]]
nodeid = "tests/smoke.sh::first"
call = "true"

[[items]]
nodeid = "tests/smoke.sh::second"
call = "echo hello"
"#;
