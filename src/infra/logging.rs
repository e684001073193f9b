//! # Logging / 日志
//!
//! Diagnostics go to stderr through `tracing`, so they never interleave with
//! the progress output on stdout or the JSON lines a worker process writes.
//! The `CONCURRENT_RUNNER_LOG` environment variable takes precedence over
//! the `--log-level` flag.
//!
//! 诊断信息通过 `tracing` 输出到 stderr，因此不会与 stdout 上的进度输出
//! 或工作进程写出的 JSON 行交错。`CONCURRENT_RUNNER_LOG` 环境变量优先于 `--log-level` 参数。

use std::fmt;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "CONCURRENT_RUNNER_LOG";

/// Log level configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level `{other}`")),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_tracing_level())
    }
}

/// Installs the global subscriber. Safe to call more than once; only the
/// first call has an effect.
pub fn init_logging(level: LogLevel) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "concurrent_runner={}",
            level.to_tracing_level()
        ))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}
