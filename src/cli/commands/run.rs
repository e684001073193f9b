//! # Run Command Module / 运行命令模块
//!
//! This module implements the `run` command: it loads the configuration,
//! resolves the execution mode and worker count (command line over config
//! file), and runs a session with the terminal and JUnit reporters.
//!
//! 此模块实现 `run` 命令：加载配置，解析执行模式和工作者数量
//! （命令行优先于配置文件），并使用终端和 JUnit 报告器运行会话。

use crate::core::config::{self, ExecutionMode, RawWorkers, RunnerConfig, WorkerCount};
use crate::core::context::{StopKind, StopSignal};
use crate::core::errors::ConfigError;
use crate::core::models::ExitStatus;
use crate::core::session::Session;
use crate::core::strategy::strategy_for;
use crate::infra::command::CommandHost;
use crate::infra::fs::absolute_path;
use crate::infra::worker::WorkerLauncher;
use crate::reporting::{JunitReporter, TerminalReporter};
use anyhow::{Context, Result};
use colored::*;
use rust_i18n::t;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// Arguments of the `run` command.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub config: PathBuf,
    pub mode: Option<String>,
    pub workers: Option<String>,
    pub maxfail: Option<usize>,
    pub exitfirst: bool,
    pub junit_xml: Option<PathBuf>,
    pub verbose: bool,
    /// `--lang` was given, so the config file's language is ignored.
    pub explicit_language: bool,
}

/// Session settings after merging command line and config file.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSettings {
    pub mode: ExecutionMode,
    pub workers: WorkerCount,
    pub maxfail: Option<usize>,
    pub junit_xml: Option<PathBuf>,
    pub verbose: bool,
}

/// Merges `args` over the `[session]` table. Invalid values are
/// configuration errors.
pub fn resolve_settings(args: &RunArgs, config: &RunnerConfig) -> Result<ResolvedSettings, ConfigError> {
    let session = &config.session;

    let mode = match args.mode.as_deref().or(session.mode.as_deref()) {
        Some(value) => value.parse()?,
        None => ExecutionMode::default(),
    };
    let workers = match (&args.workers, &session.workers) {
        (Some(value), _) => value.parse()?,
        (None, Some(raw)) => RawWorkers::parse(raw)?,
        (None, None) => WorkerCount::default(),
    };
    let maxfail = if args.exitfirst {
        Some(1)
    } else {
        args.maxfail.or(session.maxfail)
    };

    Ok(ResolvedSettings {
        mode,
        workers,
        maxfail,
        junit_xml: args.junit_xml.clone().or_else(|| session.junit_xml.clone()),
        verbose: args.verbose || session.verbose,
    })
}

/// Executes the run command with the provided arguments.
///
/// # Returns
/// The exit status of the session, or an error if the configuration is
/// invalid or the session could not be run.
pub fn execute(args: RunArgs) -> Result<ExitStatus> {
    let config = config::load_config(&args.config)?;
    if !args.explicit_language {
        rust_i18n::set_locale(&config.language);
    }

    let settings = resolve_settings(&args, &config)?;
    let items = config.test_items()?;

    let config_path = absolute_path(&args.config)?;
    let working_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let host = Arc::new(CommandHost::from_config(&config, working_dir));

    let launcher = match settings.mode {
        ExecutionMode::ProcessPool => Some(
            WorkerLauncher::current_exe(&config_path)
                .context(t!("worker_exe_not_found").to_string())?,
        ),
        _ => None,
    };
    let strategy = strategy_for(settings.mode, launcher)?;

    println!(
        "{}",
        t!(
            "session_header",
            mode = settings.mode,
            workers = settings.workers,
            count = items.len()
        )
        .bold()
    );

    let stop = StopSignal::new();
    install_interrupt_handler(stop.clone());

    let mut session = Session::new(strategy, settings.workers, host)
        .with_stop_signal(stop)
        .with_maxfail(settings.maxfail)
        .with_reporter(Box::new(TerminalReporter::stdout(settings.verbose)));
    if let Some(path) = &settings.junit_xml {
        session = session.with_reporter(Box::new(JunitReporter::new(
            path.clone(),
            config.session.suite_name.clone(),
        )));
    }

    let outcome = session.run(&items)?;

    if outcome.exit_status == ExitStatus::NoTestsCollected {
        println!("{}", t!("no_items_collected").yellow());
    }
    for err in &outcome.report_errors {
        let cause = std::error::Error::source(err)
            .map(|source| format!(": {source}"))
            .unwrap_or_default();
        eprintln!("{} {err}{cause}", t!("report_failed").red());
    }
    if let (Some(path), true) = (&settings.junit_xml, outcome.report_errors.is_empty()) {
        println!("{}", t!("junit_written", path = path.display()));
    }

    debug!(exit_status = ?outcome.exit_status, "run finished");
    Ok(outcome.exit_status)
}

/// Turns the first Ctrl-C into an interrupt request for the session.
///
/// The listener gets its own thread and runtime because strategies build
/// and block on their own runtimes on the session thread.
fn install_interrupt_handler(stop: StopSignal) {
    let spawned = thread::Builder::new()
        .name("concurrent-runner-signal".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    warn!(error = %err, "failed to start signal listener");
                    return;
                }
            };
            runtime.block_on(async {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if result.is_ok() {
                            eprintln!("\n{}", t!("shutdown_signal").yellow());
                            stop.request(StopKind::Interrupted, t!("keyboard_interrupt").to_string());
                        }
                    }
                    () = stop.cancelled() => {}
                }
            });
        });
    if let Err(err) = spawned {
        warn!(error = %err, "failed to spawn signal listener");
    }
}
