//! # Console Reporting Module / 控制台报告模块
//!
//! Live progress on the terminal. In the default mode every categorized
//! record prints a single glyph, grouped per file; in verbose mode every
//! record prints a full line, including the worker it came from when it was
//! produced away from the session's own thread. At session end the failure
//! details and a colored summary line are printed.
//!
//! 终端上的实时进度。默认模式下，每条有类别的记录打印一个字符，并按文件分组；
//! 详细模式下，每条记录打印完整的一行，当记录不是在会话自身线程上产生时还会附带工作者标识。
//! 会话结束时打印失败详情和带颜色的摘要行。

use crate::core::aggregator::AggregatedStats;
use crate::core::errors::ReportError;
use crate::core::models::{Category, OutcomeRecord, Phase};
use crate::core::session::RunSummary;
use crate::reporting::Reporter;
use colored::*;
use rust_i18n::t;
use std::io::{self, Write};
use tracing::debug;

const LINE_WIDTH: usize = 80;

/// Terminal reporter writing to any `Write` sink, usually stdout.
/// 写入任意 `Write` 目标（通常是 stdout）的终端报告器。
pub struct TerminalReporter<W: Write + Send> {
    out: W,
    verbose: bool,
    current_file: Option<String>,
}

impl TerminalReporter<io::Stdout> {
    pub fn stdout(verbose: bool) -> Self {
        Self::new(io::stdout(), verbose)
    }
}

impl<W: Write + Send> TerminalReporter<W> {
    pub fn new(out: W, verbose: bool) -> Self {
        Self {
            out,
            verbose,
            current_file: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render_outcome(&mut self, record: &OutcomeRecord, category: Category) -> io::Result<()> {
        if self.verbose {
            let mut line = format!("{} {}", record.nodeid, paint(category, category.word()));
            if record.phase != Phase::Call {
                line.push_str(&format!(" ({})", record.phase));
            }
            if !record.worker.is_local() {
                line.push_str(&format!(" [{}]", record.worker).as_str().dimmed().to_string());
            }
            line.push_str(&format!(" {}", record.location).as_str().dimmed().to_string());
            return writeln!(self.out, "{line}");
        }

        if self.current_file.as_deref() != Some(record.location.file.as_str()) {
            if self.current_file.is_some() {
                writeln!(self.out)?;
            }
            write!(self.out, "{} ", record.location.file)?;
            self.current_file = Some(record.location.file.clone());
        }
        write!(self.out, "{}", paint(category, &category.glyph().to_string()))?;
        self.out.flush()
    }

    fn render_session_end(
        &mut self,
        stats: &AggregatedStats,
        summary: &RunSummary,
    ) -> io::Result<()> {
        if self.current_file.take().is_some() {
            writeln!(self.out)?;
        }

        let failing: Vec<&OutcomeRecord> = stats
            .records()
            .iter()
            .filter(|r| r.is_failure())
            .collect();
        if !failing.is_empty() {
            let banner = format!(" {} ", t!("failures_banner"));
            writeln!(self.out, "\n{}", format!("{banner:=^LINE_WIDTH$}").as_str().bold())?;
            for record in failing {
                let header = format!(" {} ({}) ", record.nodeid, record.phase);
                writeln!(self.out, "{}", format!("{header:_^LINE_WIDTH$}").as_str().red().bold())?;
                let detail = record
                    .fragment
                    .as_ref()
                    .map(|f| f.detail.as_deref().unwrap_or(f.message.as_str()));
                if let Some(detail) = detail {
                    writeln!(self.out, "{}", detail.trim_end())?;
                }
                if let Some(output) = record
                    .output
                    .as_deref()
                    .filter(|o| !o.is_empty() && Some(*o) != detail)
                {
                    writeln!(self.out, "{}", t!("captured_output").dimmed())?;
                    writeln!(self.out, "{}", output.trim_end())?;
                }
            }
        }

        if let Some(stop) = &summary.stop {
            let text = format!(" {} ", t!("session_stopped", reason = stop.message));
            writeln!(self.out, "{}", format!("{text:!^LINE_WIDTH$}").as_str().yellow())?;
            if summary.not_dispatched > 0 {
                writeln!(
                    self.out,
                    "{}",
                    t!("items_not_run", count = summary.not_dispatched).yellow()
                )?;
            }
        }

        writeln!(self.out, "{}", summary_line(stats, summary))?;
        self.out.flush()
    }
}

impl<W: Write + Send> Reporter for TerminalReporter<W> {
    fn on_outcome(&mut self, record: &OutcomeRecord) {
        let Some(category) = record.category() else {
            return;
        };
        if let Err(err) = self.render_outcome(record, category) {
            debug!(error = %err, "failed to write progress");
        }
    }

    fn on_session_end(
        &mut self,
        stats: &AggregatedStats,
        summary: &RunSummary,
    ) -> Result<(), ReportError> {
        self.render_session_end(stats, summary)?;
        Ok(())
    }
}

fn paint(category: Category, text: &str) -> ColoredString {
    match category {
        Category::Passed => text.green(),
        Category::Failed | Category::Error => text.red(),
        Category::Skipped => text.yellow(),
    }
}

/// Builds the final `N failed, N passed, ... in X.XXs` line, centered and
/// colored after the worst outcome.
pub fn summary_line(stats: &AggregatedStats, summary: &RunSummary) -> ColoredString {
    let counters = stats.counters();
    let parts: Vec<String> = Category::ALL
        .into_iter()
        .filter(|c| counters.get(*c) > 0)
        .map(|c| format!("{} {}", counters.get(c), c.label()))
        .collect();

    let secs = summary.duration.as_secs_f64();
    let text = if parts.is_empty() {
        format!(" {} ", t!("no_tests_ran", secs = format!("{secs:.2}")))
    } else {
        format!(" {} in {secs:.2}s ", parts.join(", "))
    };
    let line = format!("{text:=^LINE_WIDTH$}");
    let line = line.as_str();

    if counters.failure + counters.error > 0 {
        line.red().bold()
    } else if counters.skipped > 0 && counters.passed == 0 {
        line.yellow().bold()
    } else if counters.passed > 0 {
        line.green().bold()
    } else {
        line.yellow().bold()
    }
}
