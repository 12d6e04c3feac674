//! Minimal stack trace capture for deprecation attribution.
//!
//! Deprecation warnings need to know which mod's code reached a deprecated API. The
//! manager prefers explicit sources and the mod context stack; this module is the last
//! resort, capturing the current call stack and matching frames against per-mod markers.

use std::backtrace::Backtrace;
use std::fmt;

/// A captured call stack as a flat list of frame descriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackTrace {
    frames: Vec<String>,
}

impl StackTrace {
    /// Capture the current call stack.
    ///
    /// Frame detail depends on the build; in release builds without debug info the
    /// trace may be empty, in which case attribution falls back to `<unknown>`.
    #[must_use]
    pub fn capture() -> Self {
        let raw = Backtrace::force_capture().to_string();
        let frames = raw
            .lines()
            .filter_map(parse_frame_line)
            .filter(|frame| !is_noise_frame(frame))
            .collect();
        StackTrace { frames }
    }

    /// Build a trace from explicit frame descriptions.
    #[must_use]
    pub fn from_frames(frames: Vec<String>) -> Self {
        StackTrace { frames }
    }

    /// The frames, outermost call last.
    #[must_use]
    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    /// Whether this trace has no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Whether any frame contains the given text.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.frames.iter().any(|f| f.contains(needle))
    }

    /// The index of the first frame matching any of the given markers.
    #[must_use]
    pub fn first_match(&self, markers: &[impl AsRef<str>]) -> Option<usize> {
        self.frames
            .iter()
            .position(|f| markers.iter().any(|m| f.contains(m.as_ref())))
    }

    /// Trim the trace for display: keep the frames matching the given markers plus one
    /// frame of surrounding context after the last match.
    ///
    /// When nothing matches, the trace is returned unchanged so the reader still gets
    /// something to work with.
    #[must_use]
    pub fn simplify(&self, markers: &[impl AsRef<str>]) -> StackTrace {
        let matches: Vec<usize> = self
            .frames
            .iter()
            .enumerate()
            .filter(|(_, f)| markers.iter().any(|m| f.contains(m.as_ref())))
            .map(|(i, _)| i)
            .collect();
        let Some(&last) = matches.last() else {
            return self.clone();
        };

        let mut kept = Vec::new();
        for (i, frame) in self.frames.iter().enumerate() {
            if matches.contains(&i) || i == last + 1 {
                kept.push(frame.clone());
            }
        }
        StackTrace { frames: kept }
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, frame) in self.frames.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "   at {frame}")?;
        }
        Ok(())
    }
}

/// Extract the symbol from one line of `std::backtrace` output, skipping the
/// `at file:line` continuation lines.
fn parse_frame_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    let (index, symbol) = trimmed.split_once(": ")?;
    if index.parse::<usize>().is_err() {
        return None;
    }
    Some(symbol.to_string())
}

/// Frames from the capture machinery, unresolved placeholder frames, and the runtime
/// itself, which only obscure the mod's own frames.
fn is_noise_frame(frame: &str) -> bool {
    frame.starts_with("std::")
        || frame.starts_with("core::")
        || frame.starts_with("alloc::")
        || frame.contains("backtrace::")
        || frame.contains("<unknown>")
}
