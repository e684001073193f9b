//! # Command-Line Interface / 命令行接口
//!
//! Builds the `clap` command tree with localized help text and dispatches
//! to the subcommands. The language is pre-parsed from `--lang` so help
//! output can already be translated.
//!
//! 构建带有本地化帮助文本的 `clap` 命令树并分派到各子命令。
//! 语言通过 `--lang` 预先解析，因此帮助输出也能被翻译。

pub mod commands;

use crate::core::errors::{ConfigError, SessionError};
use crate::core::models::ExitStatus;
use crate::infra::logging::{LogLevel, init_logging};
use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use rust_i18n::t;
use std::{env, path::PathBuf};

/// Pre-parses the command line arguments to find the language setting.
/// This allows i18n to be initialized before the full CLI is built.
/// It looks for a `--lang <VALUE>` argument.
fn pre_parse_language() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    args.iter()
        .position(|arg| arg == "--lang")
        .and_then(|pos| args.get(pos + 1))
        .cloned()
}

pub fn build_cli(locale: &str) -> Command {
    Command::new("concurrent-runner")
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli_about", locale = locale).to_string())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli_lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .global(true)
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .help(t!("cli_log_level", locale = locale).to_string())
                .value_name("LEVEL")
                .global(true)
                .value_parser(clap::value_parser!(LogLevel))
                .action(ArgAction::Set),
        )
        .subcommand(
            Command::new("run")
                .about(t!("cmd_run_about", locale = locale).to_string())
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .help(t!("arg_config", locale = locale).to_string())
                        .value_name("CONFIG")
                        .default_value("Concurrent.toml")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("concurrent-mode")
                        .long("concurrent-mode")
                        .visible_alias("concmode")
                        .help(t!("arg_concurrent_mode", locale = locale).to_string())
                        .value_name("MODE")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("concurrent-workers")
                        .long("concurrent-workers")
                        .visible_alias("concurrent-worker")
                        .help(t!("arg_concurrent_workers", locale = locale).to_string())
                        .value_name("WORKERS")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("maxfail")
                        .long("maxfail")
                        .help(t!("arg_maxfail", locale = locale).to_string())
                        .value_name("NUM")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("exitfirst")
                        .short('x')
                        .long("exitfirst")
                        .help(t!("arg_exitfirst", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("junit-xml")
                        .long("junit-xml")
                        .help(t!("arg_junit_xml", locale = locale).to_string())
                        .value_name("PATH")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("verbose")
                        .short('v')
                        .long("verbose")
                        .help(t!("arg_verbose", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("worker")
                .about(t!("cmd_worker_about", locale = locale).to_string())
                .hide(true)
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_name("CONFIG")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("item")
                        .long("item")
                        .value_name("NODEID")
                        .required(true)
                        .action(ArgAction::Set),
                ),
        )
        .subcommand(
            Command::new("init")
                .about(t!("cmd_init_about", locale = locale).to_string())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help(t!("arg_init_output", locale = locale).to_string())
                        .value_name("PATH")
                        .default_value("Concurrent.toml")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help(t!("arg_init_force", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("non-interactive")
                        .long("non-interactive")
                        .help(t!("arg_init_non_interactive", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
}

/// Parses the command line and runs the selected subcommand.
pub fn run() -> Result<ExitStatus> {
    // Pre-parse language and initialize i18n first.
    let explicit_language = pre_parse_language();
    if let Some(language) = &explicit_language {
        rust_i18n::set_locale(language);
    }
    let locale = rust_i18n::locale().to_string();

    let matches = match build_cli(&locale).try_get_matches() {
        Ok(matches) => matches,
        Err(err) => {
            let status = if err.use_stderr() {
                ExitStatus::UsageError
            } else {
                ExitStatus::Ok
            };
            let _ = err.print();
            return Ok(status);
        }
    };

    init_logging(
        matches
            .get_one::<LogLevel>("log-level")
            .copied()
            .unwrap_or_default(),
    );

    match matches.subcommand() {
        Some(("run", run_matches)) => {
            let args = run_args(run_matches, explicit_language.is_some());
            commands::run::execute(args)
        }
        Some(("worker", worker_matches)) => {
            let config = required_path(worker_matches, "config");
            let item = worker_matches
                .get_one::<String>("item")
                .cloned()
                .unwrap_or_default();
            commands::worker::execute(&config, &item)
        }
        Some(("init", init_matches)) => {
            let output = required_path(init_matches, "output");
            let force = init_matches.get_flag("force");
            let non_interactive = init_matches.get_flag("non-interactive");
            commands::init::execute(&output, force, non_interactive)?;
            Ok(ExitStatus::Ok)
        }
        // `subcommand_required` makes clap reject anything else.
        _ => Ok(ExitStatus::UsageError),
    }
}

fn run_args(matches: &ArgMatches, explicit_language: bool) -> commands::run::RunArgs {
    commands::run::RunArgs {
        config: required_path(matches, "config"),
        mode: matches.get_one::<String>("concurrent-mode").cloned(),
        workers: matches.get_one::<String>("concurrent-workers").cloned(),
        maxfail: matches.get_one::<usize>("maxfail").copied(),
        exitfirst: matches.get_flag("exitfirst"),
        junit_xml: matches.get_one::<PathBuf>("junit-xml").cloned(),
        verbose: matches.get_flag("verbose"),
        explicit_language,
    }
}

fn required_path(matches: &ArgMatches, id: &str) -> PathBuf {
    // Required or defaulted in `build_cli`.
    matches.get_one::<PathBuf>(id).cloned().unwrap_or_default()
}

/// Maps an error that escaped a command to the process exit status:
/// configuration problems are usage errors, everything else is internal.
pub fn exit_status_for(err: &anyhow::Error) -> ExitStatus {
    let is_config = err.chain().any(|cause| {
        cause.downcast_ref::<ConfigError>().is_some()
            || matches!(cause.downcast_ref::<SessionError>(), Some(SessionError::Config(_)))
    });
    if is_config {
        ExitStatus::UsageError
    } else {
        ExitStatus::InternalError
    }
}
