//! User-facing output: streamed console lines, final summaries and JSON documents.
//!
//! A single [`ReportBuilder`] is created per invocation with a fixed
//! [`OutputMode`]. Orchestration code only talks to the [`Reporter`] trait so
//! it never needs to know whether the run is interactive.

mod console;
pub mod document;
pub mod prompt;
pub mod spinner;
pub mod table;

pub use console::{HostInfo, ReportBuilder};
pub use prompt::{NoPrompt, Prompter, TerminalPrompter};
pub use spinner::Spinner;

use std::fmt;

/// Process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Everything succeeded.
    Success,
    /// At least one step or probe failed.
    Failure,
    /// Invalid or contradictory command line input.
    Usage,
    /// Internal error, e.g. the connection state could not be probed.
    Software,
}

impl ExitStatus {
    /// Numeric process exit code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Usage => 64,
            Self::Software => 70,
        }
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        Self::from(status.code())
    }
}

/// How results are presented. Chosen once per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Progressive console lines.
    Human,
    /// A single JSON document at the end of the run.
    Machine,
}

impl OutputMode {
    /// `true` for [`OutputMode::Machine`].
    #[must_use]
    pub const fn is_machine(self) -> bool {
        matches!(self, Self::Machine)
    }
}

/// Status glyph shown between brackets at the start of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    /// `✓`, green.
    Ok,
    /// `●`, yellow.
    Info,
    /// `𐄂`, red.
    Error,
    /// Blank, for disabled items.
    Off,
}

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

impl Icon {
    /// Bare glyph without color.
    #[must_use]
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Ok => "✓",
            Self::Info => "●",
            Self::Error => "𐄂",
            Self::Off => " ",
        }
    }

    /// Glyph wrapped in ANSI color codes when `colored` is set.
    #[must_use]
    pub fn render(self, colored: bool) -> String {
        let color = match self {
            Self::Ok => GREEN,
            Self::Info => YELLOW,
            Self::Error => RED,
            Self::Off => return self.glyph().to_string(),
        };
        if colored {
            format!("{color}{}{RESET}", self.glyph())
        } else {
            self.glyph().to_string()
        }
    }
}

/// Leading indentation of a report line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indent {
    /// One space, used for top-level steps.
    Small,
    /// Two spaces, used for per-feature lines.
    Medium,
}

impl fmt::Display for Indent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Small => f.write_str(" "),
            Self::Medium => f.write_str("  "),
        }
    }
}

/// Sink for progressive human output.
///
/// Implementations drop everything in machine mode; callers emit lines
/// unconditionally.
pub trait Reporter {
    /// Emit `<indent>[<icon>] <text>`.
    fn line(&mut self, indent: Indent, icon: Icon, text: &str);

    /// Emit free-form text verbatim (headers, blank lines).
    fn text(&mut self, text: &str);

    /// Start a spinner for a blocking call. The spinner stops when the
    /// returned guard is dropped.
    fn spinner(&self, indent: Indent, message: &str) -> Spinner;
}
