//! # Command Host Executor / 命令主机执行器
//!
//! A [`HostExecutor`] that runs each configured item as shell-style command
//! lines: optional setup commands, the call command and optional teardown
//! commands, producing one outcome record per phase.
//!
//! Items may name a shared fixture. When the next item on the same control
//! flow uses the same fixture, the fixture teardown is deferred and the next
//! item skips the fixture setup. Concurrent strategies pass no next item, so
//! every item there sets up and tears down its own fixture.
//!
//! 一个 [`HostExecutor`]，把每个配置的测试项作为命令行运行：可选的 setup 命令、
//! call 命令和可选的 teardown 命令，每个阶段产生一条结果记录。
//!
//! 测试项可以引用共享夹具。当同一控制流上的下一个测试项使用相同夹具时，
//! 夹具的 teardown 会被推迟，下一个测试项也会跳过夹具的 setup。
//! 并发策略不会传入下一个测试项，因此在那里每个测试项都会自行建立和清理夹具。

use crate::core::config::{FixtureConfig, ItemConfig, RunnerConfig};
use crate::core::errors::ItemError;
use crate::core::host::{Cooperative, HostExecutor};
use crate::core::models::{OutcomeRecord, Phase, ReportFragment, Status, TestItem};
use futures::future::LocalBoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Exit status of a process killed by SIGINT, treated as a user interrupt.
pub const INTERRUPT_EXIT_CODE: i32 = 130;

/// Parses a command line into program and arguments, expanding `~` and
/// environment variables first.
pub fn parse_command(line: &str) -> Result<Vec<String>, String> {
    let expanded = shellexpand::full(line)
        .map_err(|e| format!("failed to expand command `{line}`: {e}"))?
        .to_string();
    let parts =
        shlex::split(&expanded).ok_or_else(|| format!("failed to parse command `{expanded}`"))?;
    if parts.is_empty() {
        return Err(format!("empty command `{line}`"));
    }
    Ok(parts)
}

/// Result of running the command lines of one phase.
#[derive(Debug)]
enum StepOutcome {
    Passed { output: String },
    Failed { line: String, code: Option<i32>, output: String },
    Broken { message: String, output: String },
    Interrupted { line: String, output: String },
}

impl StepOutcome {
    fn passed(&self) -> bool {
        matches!(self, StepOutcome::Passed { .. })
    }

    fn into_record(self, item: &TestItem, phase: Phase, duration: Duration) -> OutcomeRecord {
        let (status, fragment, output) = match self {
            StepOutcome::Passed { output } => (Status::Passed, None, output),
            StepOutcome::Failed { line, code, output } => {
                let message = match code {
                    Some(code) => format!("`{line}` exited with status {code}"),
                    None => format!("`{line}` was terminated by a signal"),
                };
                let fragment = if phase == Phase::Call {
                    ReportFragment::failure(message, None)
                } else {
                    ReportFragment::error(format!("{phase} failed: {message}"), None)
                };
                (Status::Failed, Some(fragment), output)
            }
            StepOutcome::Broken { message, output } => {
                (Status::Error, Some(ReportFragment::error(message, None)), output)
            }
            StepOutcome::Interrupted { line, output } => (
                Status::Error,
                Some(ReportFragment::error(format!("`{line}` was interrupted"), None)),
                output,
            ),
        };

        let mut record = OutcomeRecord::new(item, phase, status, duration);
        if !output.is_empty() {
            record = record.with_output(output);
        }
        if let Some(fragment) = fragment {
            record = record.with_fragment(fragment);
        }
        record
    }
}

/// Runs configured command lines as test items.
/// 把配置的命令行作为测试项运行。
pub struct CommandHost {
    items: HashMap<String, ItemConfig>,
    fixtures: HashMap<String, FixtureConfig>,
    working_dir: PathBuf,
    active_fixture: Mutex<Option<String>>,
}

impl CommandHost {
    pub fn from_config(config: &RunnerConfig, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            items: config
                .items
                .iter()
                .map(|item| (item.nodeid.clone(), item.clone()))
                .collect(),
            fixtures: config
                .fixtures
                .iter()
                .map(|fixture| (fixture.name.clone(), fixture.clone()))
                .collect(),
            working_dir: working_dir.into(),
            active_fixture: Mutex::new(None),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn active_fixture(&self) -> Option<String> {
        self.active_fixture
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_active_fixture(&self, fixture: Option<String>) {
        *self.active_fixture.lock().unwrap_or_else(PoisonError::into_inner) = fixture;
    }

    fn std_command(&self, argv: &[String]) -> std::process::Command {
        let mut command = std::process::Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .current_dir(&self.working_dir)
            .stdin(Stdio::null());
        command
    }

    fn tokio_command(&self, argv: &[String]) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .current_dir(&self.working_dir)
            .stdin(Stdio::null());
        command
    }

    /// Runs `lines` in order, stopping at the first one that does not pass.
    async fn run_step<F, Fut>(&self, lines: &[&str], run: &F) -> StepOutcome
    where
        F: Fn(Vec<String>) -> Fut,
        Fut: Future<Output = io::Result<Output>>,
    {
        let mut combined = String::new();

        for line in lines {
            let argv = match parse_command(line) {
                Ok(argv) => argv,
                Err(message) => {
                    return StepOutcome::Broken {
                        message,
                        output: combined,
                    };
                }
            };
            debug!(command = %line, "running command");

            let output = match run(argv).await {
                Ok(output) => output,
                Err(err) => {
                    return StepOutcome::Broken {
                        message: format!("failed to run `{line}`: {err}"),
                        output: combined,
                    };
                }
            };
            combined.push_str(&String::from_utf8_lossy(&output.stdout));
            combined.push_str(&String::from_utf8_lossy(&output.stderr));

            match output.status.code() {
                Some(0) => {}
                Some(INTERRUPT_EXIT_CODE) => {
                    return StepOutcome::Interrupted {
                        line: line.to_string(),
                        output: combined,
                    };
                }
                code => {
                    return StepOutcome::Failed {
                        line: line.to_string(),
                        code,
                        output: combined,
                    };
                }
            }
        }

        StepOutcome::Passed { output: combined }
    }

    /// Runs one phase and appends its record. Returns whether it passed, or
    /// the interrupted command line.
    async fn run_phase<F, Fut>(
        &self,
        item: &TestItem,
        phase: Phase,
        lines: &[&str],
        run: &F,
        records: &mut Vec<OutcomeRecord>,
    ) -> Result<bool, String>
    where
        F: Fn(Vec<String>) -> Fut,
        Fut: Future<Output = io::Result<Output>>,
    {
        let started = Instant::now();
        let outcome = self.run_step(lines, run).await;
        let passed = outcome.passed();
        let interrupted = match &outcome {
            StepOutcome::Interrupted { line, .. } => Some(line.clone()),
            _ => None,
        };
        records.push(outcome.into_record(item, phase, started.elapsed()));
        match interrupted {
            Some(line) => Err(line),
            None => Ok(passed),
        }
    }

    /// The setup/call/teardown protocol shared by blocking and cooperative
    /// execution; `run` decides how a single command is awaited.
    async fn run_protocol<F, Fut>(
        &self,
        item: &TestItem,
        next: Option<&TestItem>,
        run: F,
    ) -> Result<Vec<OutcomeRecord>, ItemError>
    where
        F: Fn(Vec<String>) -> Fut,
        Fut: Future<Output = io::Result<Output>>,
    {
        let config = self.items.get(&item.nodeid).ok_or_else(|| {
            ItemError::Failed(format!("no configuration for item `{}`", item.nodeid))
        })?;
        let fixture = config
            .fixture
            .as_deref()
            .and_then(|name| self.fixtures.get(name));
        let next_fixture = next
            .and_then(|n| self.items.get(&n.nodeid))
            .and_then(|c| c.fixture.as_deref());
        let mut keep = fixture.is_some_and(|f| next_fixture == Some(f.name.as_str()));
        let reuse = fixture.is_some_and(|f| self.active_fixture().as_deref() == Some(f.name.as_str()));

        let mut records = Vec::with_capacity(3);
        let mut interrupted = None;

        // Setup.
        let mut setup_passed = false;
        if let Some(reason) = &config.skip {
            records.push(
                OutcomeRecord::new(item, Phase::Setup, Status::Skipped, Duration::ZERO)
                    .with_fragment(ReportFragment::skipped(reason.clone())),
            );
        } else {
            let mut lines: Vec<&str> = Vec::new();
            if let (Some(f), false) = (fixture, reuse) {
                lines.extend(f.setup.as_deref());
            }
            lines.extend(config.setup.as_deref());
            match self.run_phase(item, Phase::Setup, &lines, &run, &mut records).await {
                Ok(passed) => setup_passed = passed,
                Err(line) => interrupted = Some(line),
            }
        }

        // Call, only after a passing setup.
        if setup_passed {
            let lines: Vec<&str> = config.call.as_deref().into_iter().collect();
            if let Err(line) = self.run_phase(item, Phase::Call, &lines, &run, &mut records).await {
                interrupted = Some(line);
            }
        }

        // Teardown always runs. The fixture is kept alive only for a
        // successor sharing it, and only if this item got it up cleanly.
        keep &= setup_passed && interrupted.is_none();
        let fixture_up = fixture.is_some() && (reuse || config.skip.is_none());
        let mut lines: Vec<&str> = config.teardown.as_deref().into_iter().collect();
        if let (Some(f), true, false) = (fixture, fixture_up, keep) {
            lines.extend(f.teardown.as_deref());
        }
        if let Err(line) = self.run_phase(item, Phase::Teardown, &lines, &run, &mut records).await {
            interrupted.get_or_insert(line);
        }

        self.set_active_fixture(match (fixture, keep) {
            (Some(f), true) => Some(f.name.clone()),
            _ => None,
        });

        match interrupted {
            Some(line) => Err(ItemError::Interrupted {
                reason: format!("interrupted while running `{line}`"),
                records,
            }),
            None => Ok(records),
        }
    }
}

impl HostExecutor for CommandHost {
    fn execute(
        &self,
        item: &TestItem,
        next: Option<&TestItem>,
    ) -> Result<Vec<OutcomeRecord>, ItemError> {
        futures::executor::block_on(self.run_protocol(item, next, |argv| {
            let result = self.std_command(&argv).output();
            async move { result }
        }))
    }

    fn execute_cooperative<'a>(
        &'a self,
        item: &'a TestItem,
        coop: Cooperative,
    ) -> LocalBoxFuture<'a, Result<Vec<OutcomeRecord>, ItemError>> {
        Box::pin(self.run_protocol(item, None, move |argv| {
            let command = self.tokio_command(&argv);
            async move { coop.run_command(command).await }
        }))
    }

    /// Tears down a fixture still kept alive after the last item.
    fn finish(&self) {
        let Some(name) = self.active_fixture() else {
            return;
        };
        self.set_active_fixture(None);
        let Some(line) = self.fixtures.get(&name).and_then(|f| f.teardown.as_deref()) else {
            return;
        };

        debug!(fixture = %name, "tearing down shared fixture");
        let result = parse_command(line).and_then(|argv| {
            self.std_command(&argv)
                .output()
                .map_err(|e| format!("failed to run `{line}`: {e}"))
        });
        match result {
            Ok(output) if output.status.success() => {}
            Ok(output) => warn!(fixture = %name, status = %output.status, "fixture teardown failed"),
            Err(message) => warn!(fixture = %name, %message, "fixture teardown failed"),
        }
    }
}
