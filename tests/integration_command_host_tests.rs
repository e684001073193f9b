//! # Command Host Integration Tests / 命令主机集成测试
//!
//! Runs shell-command items through the setup/call/teardown protocol:
//! shared fixtures, skips, broken setups, interrupts and cooperative
//! overlap of long-running commands.
//!
//! 通过 setup/call/teardown 协议运行 shell 命令测试项：共享夹具、跳过、
//! 失败的 setup、中断以及长时间运行命令的协作式重叠。

mod common;

use common::write_config;
use concurrent_runner::core::config::{ExecutionMode, WorkerCount, load_config};
use concurrent_runner::core::host::HostExecutor;
use concurrent_runner::core::models::{Category, ExitStatus, Phase, Status};
use concurrent_runner::core::session::{Session, SessionOutcome};
use concurrent_runner::core::strategy::strategy_for;
use concurrent_runner::infra::command::CommandHost;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const FIXTURE_CONFIG: &str = r#"
[[fixtures]]
name = "db"
setup = "sh -c 'echo up >> fixture.log'"
teardown = "sh -c 'echo down >> fixture.log'"

[[items]]
nodeid = "tests/db.sh::insert"
fixture = "db"
call = "true"

[[items]]
nodeid = "tests/db.sh::select"
fixture = "db"
call = "true"
"#;

fn load(content: &str) -> (TempDir, PathBuf, CommandHost) {
    let (dir, path) = write_config(content);
    let config = load_config(&path).unwrap();
    let host = CommandHost::from_config(&config, dir.path());
    (dir, path, host)
}

fn run(path: &Path, mode: ExecutionMode, workers: WorkerCount) -> SessionOutcome {
    let config = load_config(path).unwrap();
    let items = config.test_items().unwrap();
    let host = Arc::new(CommandHost::from_config(&config, path.parent().unwrap()));
    Session::new(strategy_for(mode, None).unwrap(), workers, host)
        .run(&items)
        .unwrap()
}

fn fixture_log(dir: &TempDir) -> String {
    fs::read_to_string(dir.path().join("fixture.log")).unwrap_or_default()
}

#[test]
fn test_sequential_run_keeps_shared_fixture_alive() {
    let (dir, path, _) = load(FIXTURE_CONFIG);
    let outcome = run(&path, ExecutionMode::Sequential, WorkerCount::Unset);

    assert_eq!(outcome.exit_status, ExitStatus::Ok);
    assert_eq!(fixture_log(&dir), "up\ndown\n");
}

#[test]
fn test_thread_pool_tears_fixture_down_per_item() {
    let (dir, path, _) = load(FIXTURE_CONFIG);
    let outcome = run(&path, ExecutionMode::ThreadPool, WorkerCount::Unset);

    assert_eq!(outcome.stats.counters().passed, 2);
    let log = fixture_log(&dir);
    assert_eq!(log.matches("up").count(), 2, "{log}");
    assert_eq!(log.matches("down").count(), 2, "{log}");
}

#[test]
fn test_finish_tears_down_a_kept_fixture() {
    let (dir, path, host) = load(FIXTURE_CONFIG);
    let items = load_config(&path).unwrap().test_items().unwrap();

    let records = host.execute(&items[0], Some(&items[1])).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(fixture_log(&dir), "up\n");

    host.finish();
    assert_eq!(fixture_log(&dir), "up\ndown\n");
}

#[test]
fn test_skip_and_broken_setup() {
    let (_dir, path, _) = load(
        r#"
[[items]]
nodeid = "tests/a.sh::skipped"
call = "true"
skip = "not on this platform"

[[items]]
nodeid = "tests/a.sh::no_db"
setup = "false"
call = "true"

[[items]]
nodeid = "tests/a.sh::bad_quote"
call = "echo 'unterminated"
"#,
    );
    let outcome = run(&path, ExecutionMode::Sequential, WorkerCount::Unset);
    let stats = &outcome.stats;

    let skipped = stats.category(Category::Skipped);
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].phase, Phase::Setup);
    assert_eq!(
        skipped[0].fragment.as_ref().map(|f| f.message.as_str()),
        Some("not on this platform")
    );

    let errors = stats.category(Category::Error);
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].nodeid, "tests/a.sh::no_db");
    assert_eq!((errors[0].phase, errors[0].status), (Phase::Setup, Status::Failed));
    assert_eq!(errors[1].nodeid, "tests/a.sh::bad_quote");
    assert_eq!((errors[1].phase, errors[1].status), (Phase::Call, Status::Error));

    // no call ran for the item whose setup failed
    assert!(!stats
        .phase_records(Phase::Call)
        .any(|r| r.nodeid == "tests/a.sh::no_db"));
    assert_eq!(outcome.exit_status, ExitStatus::TestsFailed);
}

#[test]
fn test_interrupted_command_stops_the_session() {
    let (_dir, path, _) = load(
        r#"
[[items]]
nodeid = "tests/a.sh::ctrl_c"
call = "sh -c 'exit 130'"

[[items]]
nodeid = "tests/a.sh::after"
call = "true"
"#,
    );
    let outcome = run(&path, ExecutionMode::Sequential, WorkerCount::Unset);

    assert_eq!(outcome.exit_status, ExitStatus::Interrupted);
    assert_eq!(outcome.summary.not_dispatched, 1);
    assert!(outcome.stats.records().iter().all(|r| r.nodeid == "tests/a.sh::ctrl_c"));
}

#[test]
fn test_cooperative_pool_overlaps_commands() {
    let (_dir, path, _) = load(
        r#"
[[items]]
nodeid = "tests/slow.sh::one"
call = "sleep 0.4"

[[items]]
nodeid = "tests/slow.sh::two"
call = "sleep 0.4"

[[items]]
nodeid = "tests/slow.sh::three"
call = "sleep 0.4"
"#,
    );
    let started = Instant::now();
    let outcome = run(&path, ExecutionMode::CooperativePool, WorkerCount::MatchItems);
    let elapsed = started.elapsed();

    assert_eq!(outcome.stats.counters().passed, 3);
    assert!(elapsed < Duration::from_millis(1100), "commands did not overlap: {elapsed:?}");
}
