//! # Worker Command / 工作进程命令
//!
//! Hidden subcommand started by the process pool. Runs exactly one item and
//! reports its records to the parent as JSON lines on stdout.
//!
//! 由进程池启动的隐藏子命令。只运行一个测试项，并以 JSON 行的形式在 stdout 上向父进程报告其记录。

use crate::core::config::load_config;
use crate::core::models::ExitStatus;
use crate::infra::command::CommandHost;
use crate::infra::worker::{WorkerProxy, serve_item};
use anyhow::{Result, bail};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub fn execute(config_path: &Path, nodeid: &str) -> Result<ExitStatus> {
    let config = load_config(config_path)?;
    let Some(item) = config.find_item(nodeid).map(|c| c.to_test_item()) else {
        bail!("unknown item `{nodeid}` in {}", config_path.display());
    };

    let working_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let host = CommandHost::from_config(&config, working_dir);

    debug!(nodeid, pid = std::process::id(), "worker running item");
    let proxy = WorkerProxy::new(io::stdout());
    serve_item(&host, &item, &proxy);

    Ok(ExitStatus::Ok)
}
