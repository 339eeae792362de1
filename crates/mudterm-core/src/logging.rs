//! Tracing subscriber setup.
//!
//! The filter comes from `MUDTERM_LOG` (same syntax as `RUST_LOG`). The TUI
//! logs to a daily file so output never lands on the alternate screen; CLI
//! commands log to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "MUDTERM_LOG";
const LOG_FILE_PREFIX: &str = "mudterm.log";

/// Where log lines go.
#[derive(Debug, Clone)]
pub enum LogTarget {
    /// Stderr, default level `warn`.
    Stderr,
    /// Daily-rotated files in this directory, default level `info`.
    Directory(PathBuf),
}

/// Keeps the file writer flushing. Drop it only at exit.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _worker: Option<WorkerGuard>,
}

fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Installs the global subscriber.
///
/// # Errors
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init(target: LogTarget) -> Result<LogGuard> {
    match target {
        LogTarget::Stderr => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter("warn"))
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|err| anyhow::anyhow!("Failed to install logger: {err}"))?;
            Ok(LogGuard { _worker: None })
        }
        LogTarget::Directory(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter("info"))
                .with_ansi(false)
                .with_writer(writer)
                .try_init()
                .map_err(|err| anyhow::anyhow!("Failed to install logger: {err}"))?;
            Ok(LogGuard {
                _worker: Some(guard),
            })
        }
    }
}
