//! # Reporting Integration Tests / 报告集成测试
//!
//! Feeds hand-built outcome records through the terminal reporter and the
//! JUnit-XML builder and checks what ends up on screen and on disk.
//!
//! 将手工构造的结果记录送入终端报告器和 JUnit-XML 构建器，检查屏幕与磁盘上的输出。

use concurrent_runner::core::aggregator::{AggregatedStats, ResultAggregator};
use concurrent_runner::core::config::ExecutionMode;
use concurrent_runner::core::context::{StopKind, StopReason};
use concurrent_runner::core::models::{
    Location, OutcomeRecord, Phase, ReportFragment, Status, TestItem, WorkerId,
};
use concurrent_runner::core::session::RunSummary;
use concurrent_runner::reporting::junit::{CaseChild, build_document, serialize};
use concurrent_runner::reporting::{JunitReporter, Reporter, TerminalReporter};
use std::fs;
use std::time::Duration;

fn item(nodeid: &str) -> TestItem {
    let file = nodeid.split("::").next().unwrap();
    TestItem::new(nodeid, Location::new(file, 3))
}

fn rec(nodeid: &str, phase: Phase, status: Status) -> OutcomeRecord {
    OutcomeRecord::new(&item(nodeid), phase, status, Duration::from_millis(100))
}

fn summary() -> RunSummary {
    RunSummary {
        mode: ExecutionMode::ThreadPool,
        duration: Duration::from_millis(1250),
        items_collected: 4,
        dispatched: 4,
        not_dispatched: 0,
        stop: None,
    }
}

/// One passing item, one call failure followed by a teardown error, one
/// skip and one setup error.
fn sample_records() -> Vec<OutcomeRecord> {
    vec![
        rec("tests/test_a.py::test_ok", Phase::Setup, Status::Passed),
        rec("tests/test_a.py::test_ok", Phase::Call, Status::Passed).with_output("hello"),
        rec("tests/test_a.py::test_ok", Phase::Teardown, Status::Passed),
        rec("tests/test_a.py::TestX::test_both", Phase::Call, Status::Failed)
            .with_fragment(ReportFragment::failure("assert 1 == 2", Some("E   assert 1 == 2".into()))),
        rec("tests/test_a.py::TestX::test_both", Phase::Teardown, Status::Failed)
            .with_fragment(ReportFragment::error("teardown failed: leak", None)),
        rec("tests/test_b.py::test_skip", Phase::Setup, Status::Skipped)
            .with_fragment(ReportFragment::skipped("needs gpu")),
        rec("tests/test_b.py::test_db", Phase::Setup, Status::Error).with_output("db down"),
    ]
}

fn stats_of(records: Vec<OutcomeRecord>) -> AggregatedStats {
    let aggregator = ResultAggregator::new();
    for record in records {
        aggregator.record(record);
    }
    aggregator.snapshot()
}

fn render(verbose: bool, records: Vec<OutcomeRecord>, summary: &RunSummary) -> String {
    colored::control::set_override(false);
    let stats = stats_of(records.clone());
    let mut reporter = TerminalReporter::new(Vec::new(), verbose);
    for record in &records {
        reporter.on_outcome(record);
    }
    reporter.on_session_end(&stats, summary).unwrap();
    String::from_utf8(reporter.into_inner()).unwrap()
}

#[cfg(test)]
mod terminal_tests {
    use super::*;

    #[test]
    fn test_glyph_progress_groups_by_file() {
        let out = render(false, sample_records(), &summary());
        let first_line = out.lines().next().unwrap();
        assert_eq!(first_line, "tests/test_a.py .FE");
        assert!(out.contains("tests/test_b.py sE"), "{out}");
    }

    #[test]
    fn test_verbose_lines_carry_phase_and_worker() {
        let mut records = sample_records();
        records[1].worker = WorkerId::Thread(1);
        let out = render(true, records, &summary());

        assert!(out.contains("tests/test_a.py::test_ok PASSED [thread-1] tests/test_a.py:3"), "{out}");
        assert!(out.contains("tests/test_a.py::TestX::test_both ERROR (teardown)"), "{out}");
        assert!(out.contains("tests/test_b.py::test_skip SKIPPED (setup) tests/test_b.py:3"), "{out}");
        // uncategorized setup/teardown passes print nothing
        assert_eq!(out.matches("test_ok").count(), 1, "{out}");
    }

    #[test]
    fn test_failures_section_and_summary_line() {
        let out = render(false, sample_records(), &summary());

        assert!(out.contains("FAILURES"));
        assert!(out.contains(" tests/test_a.py::TestX::test_both (call) "));
        assert!(out.contains("E   assert 1 == 2"));
        assert!(out.contains("--- captured output ---\ndb down"), "{out}");

        let last = out.lines().last().unwrap();
        assert!(last.contains("1 failed, 1 passed, 1 skipped, 2 error in 1.25s"), "{last}");
        assert_eq!(last.chars().count(), 80);
        assert!(last.starts_with('='));
    }

    #[test]
    fn test_stop_is_reported() {
        let summary = RunSummary {
            not_dispatched: 3,
            stop: Some(StopReason {
                kind: StopKind::MaxFail,
                message: "stopping after 1 failures".into(),
            }),
            ..summary()
        };
        let out = render(false, sample_records(), &summary);
        assert!(out.contains("stopped: stopping after 1 failures"), "{out}");
        assert!(out.contains("3 items were not run"), "{out}");
    }

    #[test]
    fn test_empty_session_summary() {
        let out = render(false, Vec::new(), &summary());
        assert!(out.contains("no tests ran in 1.25s"), "{out}");
        assert!(!out.contains("FAILURES"));
    }
}

#[cfg(test)]
mod junit_tests {
    use super::*;

    #[test]
    fn test_double_failure_counts_as_one_test() {
        let stats = stats_of(sample_records());
        let doc = build_document(&stats, "suite", Duration::from_secs(2));

        assert_eq!(doc.failures, 1);
        assert_eq!(doc.errors, 2);
        assert_eq!(doc.skipped, 1);
        assert_eq!(doc.passed, 1);
        // five categorized records, one item failed twice
        assert_eq!(doc.tests, 4);
        assert_eq!(doc.cases.len(), 4);
    }

    #[test]
    fn test_cases_merge_records_per_item() {
        let stats = stats_of(sample_records());
        let doc = build_document(&stats, "suite", Duration::from_secs(2));

        let ok = &doc.cases[0];
        assert_eq!((ok.classname.as_str(), ok.name.as_str()), ("tests.test_a", "test_ok"));
        assert_eq!(ok.time, Duration::from_millis(300));
        assert!(ok.children.is_empty());
        assert_eq!(ok.system_out.as_deref(), Some("hello"));

        let both = &doc.cases[1];
        assert_eq!(both.classname, "tests.test_a.TestX");
        assert_eq!(
            both.children,
            vec![
                CaseChild::Failure {
                    message: "assert 1 == 2".into(),
                    text: Some("E   assert 1 == 2".into()),
                },
                CaseChild::Error {
                    message: "teardown failed: leak".into(),
                    text: None,
                },
            ]
        );

        // no fragment: the message falls back to the first output line
        let db = &doc.cases[3];
        assert_eq!(
            db.children,
            vec![CaseChild::Error {
                message: "db down".into(),
                text: None,
            }]
        );
    }

    #[test]
    fn test_serialized_document() {
        let stats = stats_of(sample_records());
        let xml = serialize(&build_document(&stats, "nightly", Duration::from_millis(2500))).unwrap();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#), "{xml}");
        assert!(xml.contains(r#"<testsuite name="nightly" errors="2" failures="1" skipped="1" passed="1" tests="4" time="2.500""#), "{xml}");
        assert!(xml.contains(r#"<testcase classname="tests.test_a" name="test_ok" file="tests/test_a.py" line="3" time="0.300">"#), "{xml}");
        assert!(xml.contains(r#"<skipped message="needs gpu"/>"#), "{xml}");
        assert!(xml.contains("<system-out>hello</system-out>"), "{xml}");
        assert!(xml.trim_end().ends_with("</testsuite>"));
    }

    #[test]
    fn test_special_characters_are_escaped() {
        let records = vec![
            rec("t.py::test_lt", Phase::Call, Status::Failed)
                .with_fragment(ReportFragment::failure("a < b && \"c\"", None)),
        ];
        let xml = serialize(&build_document(&stats_of(records), "s", Duration::ZERO)).unwrap();
        assert!(xml.contains("a &lt; b &amp;&amp; &quot;c&quot;"), "{xml}");
    }

    /// ANSI colour codes and control bytes in captured output must not leak
    /// into the report, since XML 1.0 forbids them.
    ///
    /// 捕获输出中的 ANSI 颜色码和控制字节不能进入报告，XML 1.0 禁止这些字符。
    #[test]
    fn test_control_characters_are_replaced() {
        let records = vec![
            rec("t.py::test_color", Phase::Call, Status::Failed)
                .with_output("\x1b[31mFAILED\x1b[0m nul:\0")
                .with_fragment(ReportFragment::failure("x\x08y", Some("tab\tkept\nline".into()))),
        ];
        let xml = serialize(&build_document(&stats_of(records), "s", Duration::ZERO)).unwrap();

        let illegal: Vec<u32> = xml
            .chars()
            .filter(|c| matches!(c, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}'))
            .map(|c| c as u32)
            .collect();
        assert!(illegal.is_empty(), "illegal chars {illegal:?} in {xml}");
        assert!(xml.contains("#x1B[31mFAILED#x1B[0m nul:#x00"), "{xml}");
        assert!(xml.contains(r#"message="x#x08y""#), "{xml}");
        assert!(xml.contains("tab\tkept\nline"), "{xml}");
    }

    #[test]
    fn test_reporter_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/nested/junit.xml");
        let mut reporter = JunitReporter::new(&path, "concurrent-runner");

        reporter
            .on_session_end(&stats_of(sample_records()), &summary())
            .unwrap();

        let xml = fs::read_to_string(&path).unwrap();
        assert!(xml.contains(r#"name="concurrent-runner""#));
        assert!(xml.contains(r#"tests="4""#));
    }

    #[test]
    fn test_unwritable_report_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();
        let mut reporter = JunitReporter::new(blocker.join("junit.xml"), "s");

        assert!(reporter.on_session_end(&stats_of(Vec::new()), &summary()).is_err());
    }
}
