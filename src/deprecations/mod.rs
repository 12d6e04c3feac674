//! Tracks mods' use of deprecated runtime APIs.
//!
//! Deprecated APIs call into the [`DeprecationManager`] when used. The manager attributes
//! each use to a mod (explicit source, then the mod context stack, then a stack walk),
//! deduplicates by mod, noun phrase, and version, and queues the warning. Queued warnings
//! are flushed once per tick through [`DeprecationManager::print_queued`] so a mod calling
//! a deprecated API in a tight loop produces one log line, not thousands.

pub mod stacktrace;

use std::cell::RefCell;
use std::collections::HashSet;
use std::mem;
use std::rc::Rc;

use crate::monitor::{LogLevel, Monitor};

pub use stacktrace::StackTrace;

/// How urgently a deprecated API's consumers need to update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
pub enum DeprecationLevel {
    /// The API will work indefinitely; updating is merely encouraged.
    Notice,
    /// The API will be removed eventually; mods should update soon.
    Info,
    /// The API will be removed in an upcoming release.
    PendingRemoval,
}

impl DeprecationLevel {
    fn log_level(self) -> LogLevel {
        match self {
            DeprecationLevel::Notice => LogLevel::Trace,
            DeprecationLevel::Info => LogLevel::Debug,
            DeprecationLevel::PendingRemoval => LogLevel::Warn,
        }
    }
}

/// One mod known to the deprecation manager.
#[derive(Debug, Clone)]
pub struct ModEntry {
    /// The mod's unique id.
    pub id: String,
    /// The mod's display name, used in warnings.
    pub name: String,
    /// Substrings identifying this mod's stack frames, typically its crate or
    /// assembly name.
    pub markers: Vec<String>,
}

/// An index of known mods for warning attribution.
#[derive(Debug, Clone, Default)]
pub struct ModIndex {
    entries: Vec<ModEntry>,
}

impl ModIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        ModIndex::default()
    }

    /// Register a mod.
    pub fn add(&mut self, entry: ModEntry) {
        self.entries.push(entry);
    }

    /// Look up a mod by id.
    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<&ModEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// The mod whose marker matches the innermost stack frame, if any.
    ///
    /// When frames from several mods appear, the innermost match wins: that's the code
    /// that actually reached the deprecated API.
    #[must_use]
    pub fn from_stack(&self, stack: &StackTrace) -> Option<&ModEntry> {
        self.entries
            .iter()
            .filter_map(|e| stack.first_match(&e.markers).map(|i| (i, e)))
            .min_by_key(|(i, _)| *i)
            .map(|(_, e)| e)
    }
}

/// Tracks which mod's code is currently running, as a nested stack.
///
/// The runtime enters a mod's context before invoking its handlers; deprecation warnings
/// raised inside attribute to that mod without a stack walk. Contexts nest for the rare
/// case of a mod synchronously invoking another mod's API.
#[derive(Debug, Default)]
pub struct ModContext {
    stack: Rc<RefCell<Vec<String>>>,
}

impl ModContext {
    /// Enter a mod's context; the returned guard exits it on drop.
    #[must_use]
    pub fn enter(&self, mod_id: impl Into<String>) -> ContextGuard {
        self.stack.borrow_mut().push(mod_id.into());
        ContextGuard {
            stack: Rc::clone(&self.stack),
        }
    }

    /// The id of the mod whose context is innermost, if any.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.stack.borrow().last().cloned()
    }
}

/// Exits a mod context on drop.
#[derive(Debug)]
pub struct ContextGuard {
    stack: Rc<RefCell<Vec<String>>>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}

/// A queued deprecation warning.
#[derive(Debug, Clone)]
struct DeprecationWarning {
    mod_name: String,
    phrase: String,
    version: String,
    level: DeprecationLevel,
    stack: StackTrace,
    markers: Vec<String>,
    log_stack_trace: bool,
}

/// Manages deprecation warnings on behalf of the whole runtime.
#[derive(Debug, Default)]
pub struct DeprecationManager {
    mods: ModIndex,
    context: ModContext,
    queue: Vec<DeprecationWarning>,
    logged: HashSet<String>,
}

impl DeprecationManager {
    /// Create a manager attributing warnings against the given mod index.
    #[must_use]
    pub fn new(mods: ModIndex) -> Self {
        DeprecationManager {
            mods,
            ..DeprecationManager::default()
        }
    }

    /// Enter a mod's execution context for the lifetime of the returned guard.
    #[must_use]
    pub fn enter_mod(&self, mod_id: impl Into<String>) -> ContextGuard {
        self.context.enter(mod_id)
    }

    /// Record that a deprecated API was used, capturing the current call stack for
    /// attribution.
    ///
    /// `source` is the responsible mod's id when the caller already knows it.
    /// `unless_stack_includes` suppresses the warning when any frame contains one of
    /// the given substrings, for APIs whose deprecated path is also reached internally.
    /// `log_stack_trace` controls whether the flushed warning includes the captured
    /// stack; callers pass `false` for high-frequency APIs where the stack adds noise.
    pub fn warn(
        &mut self,
        source: Option<&str>,
        phrase: &str,
        version: &str,
        level: DeprecationLevel,
        unless_stack_includes: &[&str],
        log_stack_trace: bool,
    ) {
        self.warn_with_stack(
            source,
            phrase,
            version,
            level,
            unless_stack_includes,
            log_stack_trace,
            StackTrace::capture(),
        );
    }

    /// Like [`warn`](Self::warn), but with an explicit stack trace.
    #[allow(clippy::too_many_arguments)]
    pub fn warn_with_stack(
        &mut self,
        source: Option<&str>,
        phrase: &str,
        version: &str,
        level: DeprecationLevel,
        unless_stack_includes: &[&str],
        log_stack_trace: bool,
        stack: StackTrace,
    ) {
        if unless_stack_includes.iter().any(|n| stack.contains(n)) {
            return;
        }

        // attribution: explicit source, then context stack, then stack walk
        let entry = match source.map(str::to_string).or_else(|| self.context.current()) {
            Some(id) => Some(match self.mods.by_id(&id) {
                Some(e) => (e.id.clone(), e.name.clone(), e.markers.clone()),
                None => (id.clone(), id, Vec::new()),
            }),
            None => self
                .mods
                .from_stack(&stack)
                .map(|e| (e.id.clone(), e.name.clone(), e.markers.clone())),
        };
        let (mod_id, mod_name, markers) = entry
            .unwrap_or_else(|| ("<unknown>".to_string(), "<unknown>".to_string(), Vec::new()));

        let key = format!("{mod_id}::{phrase}::{version}").to_lowercase();
        if !self.logged.insert(key) {
            return;
        }

        self.queue.push(DeprecationWarning {
            mod_name,
            phrase: phrase.to_string(),
            version: version.to_string(),
            level,
            stack,
            markers,
            log_stack_trace,
        });
    }

    /// The number of warnings waiting to be flushed.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Flush all queued warnings to the monitor, sorted by mod name then noun phrase.
    ///
    /// Called once per game tick so warnings batch up instead of interleaving with
    /// gameplay logs.
    pub fn print_queued(&mut self, monitor: &dyn Monitor) {
        let mut queue = mem::take(&mut self.queue);
        queue.sort_by(|a, b| {
            (a.mod_name.to_lowercase(), a.phrase.to_lowercase())
                .cmp(&(b.mod_name.to_lowercase(), b.phrase.to_lowercase()))
        });

        for warning in queue {
            let mut message = format!(
                "{} uses deprecated code ({}, deprecated since {}).",
                warning.mod_name, warning.phrase, warning.version
            );
            if warning.level == DeprecationLevel::PendingRemoval {
                message.push_str(" This will break in an upcoming release.");
            }

            let stack = warning.stack.simplify(&warning.markers);
            let show_stack = warning.log_stack_trace && !stack.is_empty();
            match warning.level {
                // low-severity warnings carry the stack inline at the same level
                DeprecationLevel::Notice | DeprecationLevel::Info => {
                    if show_stack {
                        message.push('\n');
                        message.push_str(&stack.to_string());
                    }
                    monitor.log(warning.level.log_level(), &message);
                }
                // pending removals warn cleanly, with the stack as a follow-up detail
                DeprecationLevel::PendingRemoval => {
                    monitor.log(LogLevel::Warn, &message);
                    if show_stack {
                        monitor.log(LogLevel::Debug, &stack.to_string());
                    }
                }
            }
        }
    }
}
