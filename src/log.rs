//! Structured file logging for the orchestrator.
//!
//! Log levels:
//! - ERROR: a plan aborted or a task exhausted its retries
//! - WARN: a provider attempt failed and will be retried
//! - INFO: plan built, execution started/finished
//! - DEBUG: per-task dispatch, fallback substitution, policy decisions
//! - TRACE: raw provider payloads
//!
//! Nothing is written until [`init_with_debug`] or [`init_at`] is called, so library
//! consumers and tests stay silent by default. Debug mode can be enabled
//! with `--debug` or `INTEL_ORCH_DEBUG=1`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

const DEBUG_ENV: &str = "INTEL_ORCH_DEBUG";

/// Log levels for filtering messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

/// Initialize logging to `~/.intel-orchestrator/orchestrator.log`.
pub fn init_with_debug(debug: bool) {
    if let Ok(dir) = crate::config::Config::home_dir() {
        let _ = std::fs::create_dir_all(&dir);
        init_at(dir.join("orchestrator.log"), debug);
    }
}

/// Initialize logging to an explicit file, truncating it.
pub fn init_at(path: PathBuf, debug: bool) {
    let env_debug = std::env::var(DEBUG_ENV)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let level = if debug || env_debug {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    set_level(level);

    let _ = std::fs::write(&path, "");
    LOG_PATH.set(path).ok();
}

/// Set the minimum log level for output.
pub fn set_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);
}

/// Get the current log level.
pub fn get_level() -> LogLevel {
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Log a message at the specified level.
pub fn log_at(level: LogLevel, msg: &str) {
    if level > get_level() {
        return;
    }

    if let Some(path) = LOG_PATH.get() {
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
            let _ = writeln!(file, "[{}] [{}] {}", timestamp, level.as_str(), msg);
        }
    }
}

#[macro_export]
macro_rules! olog {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! olog_error {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Error, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! olog_warn {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! olog_debug {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Debug, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! olog_trace {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Trace, &format!($($arg)*))
    };
}
