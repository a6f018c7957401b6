//! Console logging for the command line tool.
//!
//! The library itself only talks to the `log` facade. This logger prints
//! records to stderr with a marker per level; records sent to the
//! [`SUCCESS`] target get a check mark.

use log::{Level, LevelFilter, Log, Metadata, Record};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

/// Target for "step completed" messages.
pub const SUCCESS: &str = "success";

/// Log level for console display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub fn of(record: &Record<'_>) -> Self {
        match record.level() {
            Level::Error => LogLevel::Error,
            Level::Warn => LogLevel::Warning,
            _ if record.target() == SUCCESS => LogLevel::Success,
            _ => LogLevel::Info,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
            LogLevel::Error => "   ❌",
        }
    }
}

/// One console line, with optional nesting.
pub fn format_line(level: LogLevel, message: &str, indent: u8) -> String {
    format!("{}{} {}", "   ".repeat(indent as usize), level.prefix(), message)
}

/// Prints records to stderr
pub struct ConsoleLogger {
    level: LevelFilter,
}

impl ConsoleLogger {
    pub fn new(level: LevelFilter) -> Self {
        Self { level }
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Library debug output is nested under the step that produced it.
        let indent = if record.level() >= Level::Debug { 1 } else { 0 };
        eprintln!("{}", format_line(LogLevel::of(record), &record.args().to_string(), indent));
    }

    fn flush(&self) {}
}

static LOGGER: OnceCell<ConsoleLogger> = OnceCell::new();

/// Install the console logger. Only the first call takes effect.
pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let logger = LOGGER.get_or_init(|| ConsoleLogger::new(level));
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Convenient logging functions
pub fn log_success(msg: impl AsRef<str>) {
    log::info!(target: SUCCESS, "{}", msg.as_ref());
}
