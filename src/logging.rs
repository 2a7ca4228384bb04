// src/logging.rs

//! Logging setup for `suiterun` using `tracing` + `tracing-subscriber`.
//!
//! Filter selection:
//! 1. `--log-level` CLI flag applies one level to everything
//! 2. `SUITERUN_LOG` holds `EnvFilter` directives, e.g.
//!    `info,suiterun::exec=trace` to see every worker line
//! 3. default to `info`
//!
//! Logs go to STDERR; stdout carries the console listener's report.

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "SUITERUN_LOG";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env_value = std::env::var(LOG_ENV).ok();
    let (filter, rejected) = build_filter(cli_level, env_value.as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))?;

    if let Some(reason) = rejected {
        tracing::warn!(
            value = env_value.as_deref().unwrap_or_default(),
            reason = %reason,
            "ignoring invalid {LOG_ENV}; logging at info"
        );
    }

    Ok(())
}

/// Pick the filter. The second value explains why `env_value` was not used
/// when it was set but unparsable.
fn build_filter(cli_level: Option<LogLevel>, env_value: Option<&str>) -> (EnvFilter, Option<String>) {
    if let Some(lvl) = cli_level {
        return (level_filter(level_from_log_level(lvl)), None);
    }

    match env_value.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => match EnvFilter::try_new(directives) {
            Ok(filter) => (filter, None),
            Err(e) => (level_filter(LevelFilter::INFO), Some(e.to_string())),
        },
        None => (level_filter(LevelFilter::INFO), None),
    }
}

fn level_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::default().add_directive(level.into())
}

fn level_from_log_level(lvl: LogLevel) -> LevelFilter {
    match lvl {
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    }
}
