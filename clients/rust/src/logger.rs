//! Pluggable structured logging for evaluation decision points.
//!
//! Logging is informational only and never affects evaluation behavior. The
//! default is a no-op; [`StderrLogger`] is gated through environment
//! variables so a deployed client stays silent unless explicitly enabled.

use std::cell::Cell;
use std::fmt;

use serde_json::Value;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        write!(f, "{label}")
    }
}

/// Receiver for evaluation log entries.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, context: &Value);
}

/// Default logger: discards everything.
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: LogLevel, _message: &str, _context: &Value) {}
}

/// Stderr logger with a minimum level and sample-rate throttling, intended
/// for debugging assignment decisions in high-traffic paths.
pub struct StderrLogger {
    min_level: LogLevel,
    sample_rate: f64,
}

thread_local! {
    static SAMPLE_COUNTER: Cell<u64> = const { Cell::new(0) };
}

impl StderrLogger {
    pub fn new(min_level: LogLevel, sample_rate: f64) -> Self {
        Self {
            min_level,
            sample_rate,
        }
    }

    /// Configure from `SWITCHYARD_DEBUG_LOG` (`debug|info|warn|error`, unset
    /// means warn) and `SWITCHYARD_DEBUG_LOG_SAMPLE_RATE` (default 1.0).
    pub fn from_env() -> Self {
        let min_level = match std::env::var("SWITCHYARD_DEBUG_LOG").as_deref() {
            Ok("debug") => LogLevel::Debug,
            Ok("info") => LogLevel::Info,
            Ok("error") => LogLevel::Error,
            _ => LogLevel::Warn,
        };
        let sample_rate = std::env::var("SWITCHYARD_DEBUG_LOG_SAMPLE_RATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        Self::new(min_level, sample_rate)
    }

    fn should_sample(&self) -> bool {
        if self.sample_rate >= 1.0 {
            return true;
        }
        if self.sample_rate <= 0.0 {
            return false;
        }
        let interval = (1.0 / self.sample_rate).round() as u64;
        SAMPLE_COUNTER.with(|c| {
            let n = c.get();
            c.set(n.wrapping_add(1));
            n % interval.max(1) == 0
        })
    }
}

impl Logger for StderrLogger {
    fn log(&self, level: LogLevel, message: &str, context: &Value) {
        if level < self.min_level || !self.should_sample() {
            return;
        }
        eprintln!("[switchyard] {level}: {message} {context}");
    }
}
