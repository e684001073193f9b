//! # Init Command Module / 初始化命令模块
//!
//! Creates a `Concurrent.toml` file, either with a default template or
//! through a short interactive wizard asking for the execution mode, the
//! worker count and a first test command.
//!
//! 创建 `Concurrent.toml` 文件：使用默认模板，或通过一个简短的交互式向导
//! 询问执行模式、工作者数量以及第一条测试命令。

use crate::core::config::{ExecutionMode, ItemConfig, RawWorkers, RunnerConfig, SessionConfig};
use crate::infra::fs::ensure_parent_dir;
use anyhow::{Context, Result};
use colored::*;
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};
use rust_i18n::t;
use std::fs;
use std::path::Path;

const HEADER: &str = "\
# Concurrent runner configuration / 并发运行器配置
#
# [session]  mode: sequential | thread-pool | process-pool | cooperative-pool
#            workers: a positive integer or \"max\"
# [[items]]  nodeid, call, optional setup / teardown / group / fixture / skip

";

/// The template written by `init --non-interactive`.
pub fn default_config() -> RunnerConfig {
    RunnerConfig {
        language: rust_i18n::locale().to_string(),
        session: SessionConfig {
            mode: Some(ExecutionMode::ThreadPool.to_string()),
            workers: Some(RawWorkers::Count(2)),
            ..SessionConfig::default()
        },
        fixtures: Vec::new(),
        items: vec![
            sample_item("tests/smoke.sh::prepare", "true", Some(1)),
            sample_item("tests/smoke.sh::hello", "echo hello", None),
            sample_item("tests/smoke.sh::world", "echo world", None),
        ],
    }
}

fn sample_item(nodeid: &str, call: &str, group: Option<i64>) -> ItemConfig {
    ItemConfig {
        nodeid: nodeid.to_string(),
        file: None,
        line: 0,
        group: group.map(crate::core::models::GroupAnnotation::Id),
        fixture: None,
        setup: None,
        call: Some(call.to_string()),
        teardown: None,
        skip: None,
    }
}

/// Executes the init command.
///
/// # Arguments
/// * `output` - Path for the new configuration file
/// * `force` - Whether to overwrite an existing file without asking
/// * `non_interactive` - Write the default template without prompting
pub fn execute(output: &Path, force: bool, non_interactive: bool) -> Result<()> {
    if output.exists() && !force {
        if non_interactive {
            println!("{}", t!("init_file_exists", path = output.display()).red());
            println!("{}", t!("init_use_force").yellow());
            return Ok(());
        }
        let overwrite = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("init_overwrite_prompt", path = output.display()))
            .default(false)
            .interact()
            .context(t!("init_user_confirmation_failed").to_string())?;
        if !overwrite {
            println!("{}", t!("init_aborted"));
            return Ok(());
        }
    }

    let config = if non_interactive {
        default_config()
    } else {
        run_wizard()?
    };
    write_config(output, &config)
}

fn run_wizard() -> Result<RunnerConfig> {
    let theme = ColorfulTheme::default();
    println!("\n{}", t!("init_wizard_welcome").cyan().bold());

    let modes = [
        ExecutionMode::Sequential,
        ExecutionMode::ThreadPool,
        ExecutionMode::ProcessPool,
        ExecutionMode::CooperativePool,
    ];
    let labels: Vec<&str> = modes.iter().map(|m| m.as_str()).collect();
    let mode = Select::with_theme(&theme)
        .with_prompt(t!("init_mode_prompt"))
        .items(&labels)
        .default(1)
        .interact()
        .context(t!("init_user_confirmation_failed").to_string())?;

    let workers: String = Input::with_theme(&theme)
        .with_prompt(t!("init_workers_prompt"))
        .default("max".to_string())
        .validate_with(|input: &String| -> Result<(), String> {
            input
                .parse::<crate::core::config::WorkerCount>()
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()?;

    let command: String = Input::with_theme(&theme)
        .with_prompt(t!("init_command_prompt"))
        .default("echo hello".to_string())
        .interact_text()?;

    let mut config = default_config();
    config.session.mode = Some(modes[mode].to_string());
    config.session.workers = Some(RawWorkers::Text(workers));
    config.items = vec![sample_item("tests/main.sh::first", &command, None)];
    Ok(config)
}

fn write_config(path: &Path, config: &RunnerConfig) -> Result<()> {
    let body = toml::to_string_pretty(config).context(t!("init_serialize_failed").to_string())?;

    ensure_parent_dir(path)
        .with_context(|| t!("init_write_failed", path = path.display()).to_string())?;
    fs::write(path, format!("{HEADER}{body}"))
        .with_context(|| t!("init_write_failed", path = path.display()).to_string())?;

    println!(
        "\n{} {}",
        "✔".green(),
        t!("init_success_created", path = path.display()).bold()
    );
    println!("{}", t!("init_usage_hint"));
    Ok(())
}
