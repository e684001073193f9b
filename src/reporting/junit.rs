//! # JUnit-XML Report Module / JUnit-XML 报告模块
//!
//! Builds one `<testsuite>` document from the final aggregated statistics
//! and writes it to disk at session end.
//!
//! An item that failed in its call phase and then errored in teardown has
//! two categorized records; it is still counted as a single test in the
//! suite's `tests` attribute.
//!
//! 根据最终聚合统计构建一个 `<testsuite>` 文档，并在会话结束时写入磁盘。
//! 在调用阶段失败且随后在 teardown 中出错的测试项有两条带类别的记录，
//! 但在 `tests` 属性中仍只计为一个测试。

use crate::core::aggregator::AggregatedStats;
use crate::core::errors::ReportError;
use crate::core::models::{Category, FragmentKind, OutcomeRecord, Phase};
use crate::core::session::RunSummary;
use crate::infra::fs::ensure_parent_dir;
use crate::reporting::Reporter;
use chrono::Local;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

static TESTSUITE_TAG: &str = "testsuite";
static TESTCASE_TAG: &str = "testcase";
static FAILURE_TAG: &str = "failure";
static ERROR_TAG: &str = "error";
static SKIPPED_TAG: &str = "skipped";
static SYSTEM_OUT_TAG: &str = "system-out";

/// The whole report, ready to serialize.
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteDocument {
    pub name: String,
    pub timestamp: String,
    pub time: Duration,
    pub errors: usize,
    pub failures: usize,
    pub skipped: usize,
    pub passed: usize,
    /// Number of distinct tests after double-fail collapsing.
    pub tests: usize,
    pub cases: Vec<CaseElement>,
}

/// One `<testcase>`, merged from every record of one item.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseElement {
    pub classname: String,
    pub name: String,
    pub file: String,
    pub line: u32,
    pub time: Duration,
    pub children: Vec<CaseChild>,
    pub system_out: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseChild {
    Failure { message: String, text: Option<String> },
    Error { message: String, text: Option<String> },
    Skipped { message: String },
}

/// Builds the document from the final statistics.
/// 根据最终统计构建文档。
pub fn build_document(stats: &AggregatedStats, suite_name: &str, duration: Duration) -> SuiteDocument {
    let mut cases: Vec<CaseElement> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in stats.records() {
        let slot = *index.entry(record.nodeid.as_str()).or_insert_with(|| {
            let (classname, name) = mangle_nodeid(&record.nodeid);
            cases.push(CaseElement {
                classname,
                name,
                file: record.location.file.clone(),
                line: record.location.line,
                time: Duration::ZERO,
                children: Vec::new(),
                system_out: None,
            });
            cases.len() - 1
        });
        let case = &mut cases[slot];
        case.time += record.duration;

        if let Some(child) = case_child(record) {
            case.children.push(child);
        }
        if let Some(output) = record.output.as_deref().filter(|o| !o.is_empty()) {
            let out = case.system_out.get_or_insert_with(String::new);
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(output);
        }
    }

    let counters = stats.counters();
    let double_fail = count_double_fail(stats);

    SuiteDocument {
        name: suite_name.to_string(),
        timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        time: duration,
        errors: counters.error,
        failures: counters.failure,
        skipped: counters.skipped,
        passed: counters.passed,
        tests: counters.total().saturating_sub(double_fail),
        cases,
    }
}

fn case_child(record: &OutcomeRecord) -> Option<CaseChild> {
    let category = record.category()?;
    let fallback = || {
        record
            .output
            .as_deref()
            .and_then(|o| o.lines().next())
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} {}", record.phase, category.label()))
    };

    let (kind, message, text) = match &record.fragment {
        Some(fragment) => (fragment.kind, fragment.message.clone(), fragment.detail.clone()),
        None => {
            let kind = match category {
                Category::Passed => return None,
                Category::Failed => FragmentKind::Failure,
                Category::Error => FragmentKind::Error,
                Category::Skipped => FragmentKind::Skipped,
            };
            (kind, fallback(), None)
        }
    };

    Some(match kind {
        FragmentKind::Failure => CaseChild::Failure { message, text },
        FragmentKind::Error => CaseChild::Error { message, text },
        FragmentKind::Skipped => CaseChild::Skipped { message },
    })
}

/// Items whose call phase failed and whose teardown errored.
fn count_double_fail(stats: &AggregatedStats) -> usize {
    let failed_calls: HashSet<&str> = stats
        .category(Category::Failed)
        .iter()
        .filter(|r| r.phase == Phase::Call)
        .map(|r| r.nodeid.as_str())
        .collect();

    stats
        .category(Category::Error)
        .iter()
        .filter(|r| r.phase == Phase::Teardown)
        .map(|r| r.nodeid.as_str())
        .collect::<HashSet<_>>()
        .intersection(&failed_calls)
        .count()
}

/// Splits a node id into JUnit `classname` and `name`.
///
/// `tests/unit/test_db.py::TestConn::test_open` becomes
/// (`tests.unit.test_db.TestConn`, `test_open`).
pub fn mangle_nodeid(nodeid: &str) -> (String, String) {
    let mut parts: Vec<&str> = nodeid.split("::").collect();
    let path = parts.remove(0);
    let module = strip_extension(path).replace(['/', '\\'], ".");

    match parts.pop() {
        None => (module, nodeid.to_string()),
        Some(name) => {
            let classname = std::iter::once(module.as_str())
                .chain(parts)
                .collect::<Vec<_>>()
                .join(".");
            (classname, name.to_string())
        }
    }
}

fn strip_extension(path: &str) -> &str {
    match path.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains(['/', '\\']) => stem,
        _ => path,
    }
}

/// Serializes the document to an XML string.
/// 把文档序列化为 XML 字符串。
pub fn serialize(document: &SuiteDocument) -> Result<String, ReportError> {
    let mut buf = Vec::new();
    serialize_into(document, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn serialize_into(document: &SuiteDocument, out: impl Write) -> Result<(), ReportError> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let SuiteDocument {
        name,
        timestamp,
        time,
        errors,
        failures,
        skipped,
        passed,
        tests,
        cases,
    } = document;

    let mut suite = BytesStart::new(TESTSUITE_TAG);
    suite.push_attribute(("name", name.as_str()));
    suite.push_attribute(("errors", errors.to_string().as_str()));
    suite.push_attribute(("failures", failures.to_string().as_str()));
    suite.push_attribute(("skipped", skipped.to_string().as_str()));
    suite.push_attribute(("passed", passed.to_string().as_str()));
    suite.push_attribute(("tests", tests.to_string().as_str()));
    suite.push_attribute(("time", serialize_time(time).as_str()));
    suite.push_attribute(("timestamp", timestamp.as_str()));
    writer.write_event(Event::Start(suite))?;

    for case in cases {
        serialize_case(case, &mut writer)?;
    }

    writer.write_event(Event::End(BytesEnd::new(TESTSUITE_TAG)))?;
    writer.write_indent()?;
    Ok(())
}

fn serialize_case(case: &CaseElement, writer: &mut Writer<impl Write>) -> Result<(), ReportError> {
    let mut tag = BytesStart::new(TESTCASE_TAG);
    tag.push_attribute(("classname", &*xml_safe(&case.classname)));
    tag.push_attribute(("name", &*xml_safe(&case.name)));
    tag.push_attribute(("file", case.file.as_str()));
    tag.push_attribute(("line", case.line.to_string().as_str()));
    tag.push_attribute(("time", serialize_time(&case.time).as_str()));

    if case.children.is_empty() && case.system_out.is_none() {
        writer.write_event(Event::Empty(tag))?;
        return Ok(());
    }
    writer.write_event(Event::Start(tag))?;

    for child in &case.children {
        match child {
            CaseChild::Failure { message, text } => {
                serialize_child(FAILURE_TAG, message, text.as_deref(), writer)?
            }
            CaseChild::Error { message, text } => {
                serialize_child(ERROR_TAG, message, text.as_deref(), writer)?
            }
            CaseChild::Skipped { message } => serialize_child(SKIPPED_TAG, message, None, writer)?,
        }
    }

    if let Some(output) = &case.system_out {
        writer.write_event(Event::Start(BytesStart::new(SYSTEM_OUT_TAG)))?;
        writer.write_event(Event::Text(BytesText::new(&xml_safe(output))))?;
        writer.write_event(Event::End(BytesEnd::new(SYSTEM_OUT_TAG)))?;
    }

    writer.write_event(Event::End(BytesEnd::new(TESTCASE_TAG)))?;
    Ok(())
}

fn serialize_child(
    tag_name: &'static str,
    message: &str,
    text: Option<&str>,
    writer: &mut Writer<impl Write>,
) -> Result<(), ReportError> {
    let mut tag = BytesStart::new(tag_name);
    tag.push_attribute(("message", &*xml_safe(message)));
    match text {
        Some(text) => {
            writer.write_event(Event::Start(tag))?;
            writer.write_event(Event::Text(BytesText::new(&xml_safe(text))))?;
            writer.write_event(Event::End(BytesEnd::new(tag_name)))?;
        }
        None => writer.write_event(Event::Empty(tag))?,
    }
    Ok(())
}

/// Replaces characters XML 1.0 cannot carry with a visible `#xNN` marker.
/// Captured output often holds ANSI escapes or NUL bytes.
///
/// 将 XML 1.0 无法承载的字符替换为可见的 `#xNN` 标记。
pub fn xml_safe(text: &str) -> Cow<'_, str> {
    if !text.chars().any(is_illegal_xml_char) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        if is_illegal_xml_char(ch) {
            let code = ch as u32;
            if code <= 0xFF {
                out.push_str(&format!("#x{code:02X}"));
            } else {
                out.push_str(&format!("#x{code:04X}"));
            }
        } else {
            out.push(ch);
        }
    }
    Cow::Owned(out)
}

fn is_illegal_xml_char(ch: char) -> bool {
    matches!(ch, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}')
}

fn serialize_time(time: &Duration) -> String {
    format!("{:.3}", time.as_secs_f64())
}

/// Writes `document` to `path`, creating missing parent directories.
pub fn write_report(document: &SuiteDocument, path: &Path) -> Result<(), ReportError> {
    let xml = serialize(document)?;
    ensure_parent_dir(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, xml).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes the JUnit-XML report when the session ends.
/// 在会话结束时写入 JUnit-XML 报告。
pub struct JunitReporter {
    path: PathBuf,
    suite_name: String,
}

impl JunitReporter {
    pub fn new(path: impl Into<PathBuf>, suite_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            suite_name: suite_name.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Reporter for JunitReporter {
    fn on_outcome(&mut self, _record: &OutcomeRecord) {}

    fn on_session_end(
        &mut self,
        stats: &AggregatedStats,
        summary: &RunSummary,
    ) -> Result<(), ReportError> {
        let document = build_document(stats, &self.suite_name, summary.duration);
        write_report(&document, &self.path)?;
        info!(path = %self.path.display(), tests = document.tests, "junit report written");
        Ok(())
    }
}
