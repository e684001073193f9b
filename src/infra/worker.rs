//! # Worker Process Protocol / 工作进程协议
//!
//! The process pool runs every item in a fresh child process. The child is
//! this same binary started as `worker --config <file> --item <nodeid>`; it
//! runs the item and streams its outcome records back on stdout as JSON
//! lines, one [`WorkerMessage`] per line. The parent re-records them into
//! the shared aggregator, stamped with the child's pid.
//!
//! 进程池在全新的子进程中运行每个测试项。子进程就是以
//! `worker --config <file> --item <nodeid>` 启动的同一个可执行文件；
//! 它运行测试项，并以 JSON 行的形式（每行一个 [`WorkerMessage`]）把结果记录写回 stdout。
//! 父进程把这些记录重新写入共享聚合器，并标记子进程的 pid。

use crate::core::aggregator::RecordSink;
use crate::core::context::RunContext;
use crate::core::host::HostExecutor;
use crate::core::models::{OutcomeRecord, TestItem, WorkerId};
use crate::core::strategy::settle;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::{debug, warn};

/// Number of trailing stderr lines kept when a worker dies silently.
const STDERR_TAIL_LINES: usize = 40;

/// One line of the worker's stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WorkerMessage {
    Record { record: OutcomeRecord },
    Stop { reason: String },
}

/// How to start a worker process for one item.
/// 如何为单个测试项启动工作进程。
#[derive(Debug, Clone)]
pub struct WorkerLauncher {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Re-launches the running executable in worker mode.
    pub fn current_exe(config: &Path) -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?)
            .arg("worker")
            .arg("--config")
            .arg(config))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Builds the command running `nodeid`.
    pub fn command(&self, nodeid: &str) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args).arg("--item").arg(nodeid);
        command
    }
}

/// Runs one item in a child process and replays its records into `ctx`.
///
/// Always produces at least one record for the item: if the child exits
/// without reporting anything, an `error` record carrying its exit status
/// and stderr is synthesized.
///
/// 在子进程中运行一个测试项，并把其记录重放到 `ctx` 中。
/// 始终至少为该测试项产生一条记录：如果子进程未报告任何内容就退出，
/// 则合成一条包含其退出状态和 stderr 的 `error` 记录。
pub async fn supervise(launcher: &WorkerLauncher, ctx: &RunContext, item: &TestItem) {
    let mut command = launcher.command(&item.nodeid);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            warn!(nodeid = %item.nodeid, error = %err, "failed to spawn worker process");
            ctx.record(OutcomeRecord::internal_error(
                item,
                format!(
                    "failed to spawn worker process {}: {err}",
                    launcher.program().display()
                ),
            ));
            return;
        }
    };

    let worker = WorkerId::Process(child.id().unwrap_or_default());
    debug!(nodeid = %item.nodeid, %worker, "worker process started");

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        let _ = child.kill().await;
        let mut record = OutcomeRecord::internal_error(item, "failed to capture worker output");
        record.worker = worker;
        ctx.record(record);
        return;
    };

    let read_messages = async {
        let mut reported = 0usize;
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<WorkerMessage>(line) {
                Ok(WorkerMessage::Record { mut record }) => {
                    record.worker = worker;
                    ctx.record(record);
                    reported += 1;
                }
                Ok(WorkerMessage::Stop { reason }) => {
                    RecordSink::request_stop(ctx, &reason);
                }
                Err(err) => {
                    warn!(nodeid = %item.nodeid, %worker, error = %err, line, "unrecognized worker output");
                }
            }
        }
        reported
    };
    let read_stderr = async {
        let mut buf = String::new();
        let _ = BufReader::new(stderr).read_to_string(&mut buf).await;
        buf
    };

    let (reported, stderr_text) = tokio::join!(read_messages, read_stderr);
    let status = child.wait().await;

    if reported > 0 {
        if let Ok(status) = status {
            if !status.success() {
                debug!(nodeid = %item.nodeid, %worker, %status, "worker exited unsuccessfully");
            }
        }
        return;
    }

    let status = match status {
        Ok(status) => status.to_string(),
        Err(err) => format!("unknown status ({err})"),
    };
    let message = format!("worker process exited ({status}) without reporting an outcome");
    warn!(nodeid = %item.nodeid, %worker, "{message}");

    let tail = stderr_tail(&stderr_text);
    let mut record = OutcomeRecord::internal_error(item, message.clone());
    if !tail.is_empty() {
        record.output = Some(format!("{message}\n{tail}"));
    }
    record.worker = worker;
    ctx.record(record);
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Writes records to a worker's stdout as JSON lines.
/// 以 JSON 行的形式把记录写入工作进程的 stdout。
pub struct WorkerProxy<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> WorkerProxy<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, message: &WorkerMessage) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = write_line(&mut *out, message) {
            warn!(error = %err, "failed to send message to parent process");
        }
    }
}

fn write_line<W: Write>(out: &mut W, message: &WorkerMessage) -> io::Result<()> {
    serde_json::to_writer(&mut *out, message)?;
    out.write_all(b"\n")?;
    out.flush()
}

impl<W: Write + Send> RecordSink for WorkerProxy<W> {
    fn record(&self, record: OutcomeRecord) {
        self.send(&WorkerMessage::Record { record });
    }

    fn request_stop(&self, reason: &str) {
        self.send(&WorkerMessage::Stop {
            reason: reason.to_string(),
        });
    }
}

/// Worker-side half: runs `item` with `host` and reports through `sink`.
pub fn serve_item(host: &dyn HostExecutor, item: &TestItem, sink: &dyn RecordSink) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| host.execute(item, None)));
    settle(sink, item, WorkerId::Main, outcome);
    host.finish();
}
