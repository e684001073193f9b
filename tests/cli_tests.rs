mod common;

use assert_cmd::prelude::*;
use common::{MIXED_CONFIG, PASSING_CONFIG, write_config};
use predicates::prelude::*;
use std::fs;
use std::process::Command;

fn runner() -> Command {
    Command::cargo_bin("concurrent-runner").unwrap()
}

/// Runs a configuration whose items all pass on the thread pool.
/// It asserts that the process exits with 0 and that the summary
/// line reports both items.
///
/// 在线程池上运行所有测试项都通过的配置。
/// 断言进程以 0 退出，并且摘要行报告了两个测试项。
#[test]
fn test_successful_run() {
    let (_dir, path) = write_config(PASSING_CONFIG);

    runner()
        .arg("run")
        .arg("--config")
        .arg(&path)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Running 2 items (mode: thread-pool, workers: 2)"))
        .stdout(predicate::str::contains("2 passed in"));
}

/// A failing item makes the run exit with 1 and shows up in the
/// failures section together with its captured output.
///
/// 失败的测试项使运行以 1 退出，并连同其捕获的输出一起出现在失败部分中。
#[test]
fn test_failing_item() {
    let (_dir, path) = write_config(MIXED_CONFIG);

    runner()
        .args(["run", "-c"])
        .arg(&path)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FAILURES"))
        .stdout(predicate::str::contains("tests/smoke.sh::broken (call)"))
        .stdout(predicate::str::contains("boom"))
        .stdout(predicate::str::contains("1 failed, 2 passed"));
}

/// The same configuration gives the same summary on every mode.
/// 相同的配置在每种模式下给出相同的摘要。
#[test]
fn test_every_mode_gives_the_same_summary() {
    let (_dir, path) = write_config(MIXED_CONFIG);

    for mode in ["sequential", "thread-pool", "process-pool", "cooperative-pool"] {
        runner()
            .args(["run", "--concurrent-mode", mode, "--concurrent-workers", "max", "-c"])
            .arg(&path)
            .assert()
            .code(1)
            .stdout(predicate::str::contains("1 failed, 2 passed"));
    }
}

#[test]
fn test_verbose_output_lists_items() {
    let (_dir, path) = write_config(PASSING_CONFIG);

    runner()
        .args(["run", "-v", "--concurrent-mode", "sequential", "-c"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("tests/smoke.sh::first PASSED"))
        .stdout(predicate::str::contains("tests/smoke.sh::second PASSED"));
}

#[test]
fn test_invalid_mode_is_a_usage_error() {
    let (_dir, path) = write_config(PASSING_CONFIG);

    runner()
        .args(["run", "--concurrent-mode", "fork", "-c"])
        .arg(&path)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("invalid concurrent mode `fork`"));
}

#[test]
fn test_singular_worker_flag_is_accepted() {
    let (_dir, path) = write_config(PASSING_CONFIG);

    runner()
        .args(["run", "--concurrent-worker", "1", "-c"])
        .arg(&path)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("(mode: thread-pool, workers: 1)"));
}

#[test]
fn test_invalid_worker_count_is_a_usage_error() {
    let (_dir, path) = write_config(PASSING_CONFIG);

    runner()
        .args(["run", "--concurrent-workers", "0", "-c"])
        .arg(&path)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("invalid worker count"));
}

#[test]
fn test_invalid_group_is_a_usage_error() {
    let (_dir, path) = write_config(
        r#"
[[items]]
nodeid = "tests/a.sh::one"
call = "true"
group = "soon"
"#,
    );

    runner()
        .args(["run", "-c"])
        .arg(&path)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("invalid group annotation"));
}

#[test]
fn test_missing_config_is_a_usage_error() {
    runner()
        .args(["run", "-c", "definitely/missing/Concurrent.toml"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("failed to read config file"));
}

#[test]
fn test_no_items_collected() {
    let (_dir, path) = write_config("language = \"en\"\n");

    runner()
        .args(["run", "-c"])
        .arg(&path)
        .assert()
        .code(5)
        .stdout(predicate::str::contains("No items collected."));
}

/// `-x` stops after the first failure; the remaining items are reported
/// as not run.
///
/// `-x` 在第一次失败后停止；剩余的测试项被报告为未运行。
#[test]
fn test_exitfirst_stops_the_session() {
    let (_dir, path) = write_config(
        r#"
[[items]]
nodeid = "tests/a.sh::fails"
call = "false"

[[items]]
nodeid = "tests/a.sh::never_one"
call = "true"

[[items]]
nodeid = "tests/a.sh::never_two"
call = "true"
"#,
    );

    runner()
        .args(["run", "-x", "-c"])
        .arg(&path)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("2 items were not run"))
        .stdout(predicate::str::contains("1 failed in"));
}

#[test]
fn test_junit_report_is_written() {
    let (dir, path) = write_config(MIXED_CONFIG);
    let report = dir.path().join("reports/junit.xml");

    runner()
        .args(["run", "--junit-xml"])
        .arg(&report)
        .arg("-c")
        .arg(&path)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Generated JUnit-XML report"));

    let xml = fs::read_to_string(&report).unwrap();
    assert!(xml.contains(r#"failures="1""#), "{xml}");
    assert!(xml.contains(r#"tests="3""#), "{xml}");
    assert!(xml.contains(r#"classname="tests.smoke" name="broken""#), "{xml}");
}

#[test]
fn test_language_flag_switches_output() {
    let (_dir, path) = write_config("");

    runner()
        .args(["--lang", "zh-CN", "run", "-c"])
        .arg(&path)
        .assert()
        .code(5)
        .stdout(predicate::str::contains("没有收集到任何测试项"));
}

#[test]
fn test_unknown_subcommand_is_a_usage_error() {
    runner().arg("explode").assert().code(4);
}

#[test]
fn test_help_exits_cleanly() {
    runner()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"));
}

/// `init --non-interactive` writes a template that runs successfully.
/// `init --non-interactive` 写出的模板可以成功运行。
#[test]
fn test_init_template_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Concurrent.toml");

    runner()
        .args(["init", "--non-interactive", "-o"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    runner()
        .args(["run", "-c"])
        .arg(&path)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("3 passed"));
}
