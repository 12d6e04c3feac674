//! Logging abstraction injected into every component of the runtime core.
//!
//! The core never writes to the process console or to files directly. Everything goes through
//! a [`Monitor`], which an embedding runtime implements to route messages to its own writers.
//! Two implementations ship with the crate:
//!
//! - [`LogMonitor`] - forwards to the `log` crate facade, for embedders that already have a
//!   `log`-compatible backend installed.
//! - [`BufferMonitor`] - records messages in memory, for tests and diagnostics.

use std::cell::RefCell;
use std::collections::HashSet;

/// The log severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
pub enum LogLevel {
    /// Tracing info intended for developers.
    Trace,
    /// Troubleshooting info that may be relevant to the player.
    Debug,
    /// Info relevant to the player.
    Info,
    /// An issue the player should be aware of.
    Warn,
    /// A message indicating something went wrong.
    Error,
}

impl LogLevel {
    /// The equivalent level in the `log` crate facade.
    #[must_use]
    pub fn to_log(self) -> log::Level {
        match self {
            LogLevel::Trace => log::Level::Trace,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

/// Encapsulates monitoring and logging for a given module.
///
/// All components of the runtime core emit their output through this trait; the embedding
/// runtime decides where messages end up.
pub trait Monitor {
    /// Log a message at the given level.
    fn log(&self, level: LogLevel, message: &str);

    /// Log a message once per unique message text, tracked through the given set.
    ///
    /// Used for per-assembly diagnostic summaries which must be logged exactly once per load
    /// attempt even when the same issue is detected at many call sites.
    fn log_once(&self, logged: &mut HashSet<String>, level: LogLevel, message: &str) {
        if logged.insert(message.to_string()) {
            self.log(level, message);
        }
    }
}

/// A [`Monitor`] which forwards messages to the `log` crate facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMonitor;

impl Monitor for LogMonitor {
    fn log(&self, level: LogLevel, message: &str) {
        log::log!(level.to_log(), "{message}");
    }
}

/// A [`Monitor`] which records messages in memory.
///
/// Intended for tests and for diagnostic commands that need to capture output. Not thread-safe;
/// the pipeline is single-threaded by design.
#[derive(Debug, Default)]
pub struct BufferMonitor {
    entries: RefCell<Vec<(LogLevel, String)>>,
}

impl BufferMonitor {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        BufferMonitor::default()
    }

    /// All messages recorded so far, in order.
    #[must_use]
    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries.borrow().clone()
    }

    /// Whether any recorded message contains the given text.
    #[must_use]
    pub fn contains(&self, text: &str) -> bool {
        self.entries.borrow().iter().any(|(_, m)| m.contains(text))
    }

    /// The number of recorded messages at the given level.
    #[must_use]
    pub fn count_at(&self, level: LogLevel) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .count()
    }

    /// Discard all recorded messages.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl Monitor for BufferMonitor {
    fn log(&self, level: LogLevel, message: &str) {
        self.entries.borrow_mut().push((level, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_once_suppresses_duplicates() {
        let monitor = BufferMonitor::new();
        let mut logged = HashSet::new();

        monitor.log_once(&mut logged, LogLevel::Warn, "broken code in X");
        monitor.log_once(&mut logged, LogLevel::Warn, "broken code in X");
        monitor.log_once(&mut logged, LogLevel::Warn, "broken code in Y");

        assert_eq!(monitor.entries().len(), 2);
    }

    #[test]
    fn buffer_monitor_counts_by_level() {
        let monitor = BufferMonitor::new();
        monitor.log(LogLevel::Trace, "a");
        monitor.log(LogLevel::Error, "b");
        monitor.log(LogLevel::Error, "c");

        assert_eq!(monitor.count_at(LogLevel::Error), 2);
        assert_eq!(monitor.count_at(LogLevel::Trace), 1);
        assert!(monitor.contains("b"));
    }
}
