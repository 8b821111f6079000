//! Rendering of run telemetry for terminal sinks.
//!
//! Everything the engine emits (stage progress, invoker attempts, error
//! events collected at the barrier) funnels through a [`TelemetryFormatter`]
//! before it reaches stdout or a log file. The formatter decides layout and
//! color only; redaction of identifying fields happens earlier, at event
//! construction (see [`redact`]).

use std::io::IsTerminal;

use crate::channels::errors::{ChainedError, ErrorEvent};
use crate::event_bus::Event;

pub mod redact;

pub const CONTEXT_COLOR: &str = "\x1b[32m"; // green
pub const LINE_COLOR: &str = "\x1b[35m"; // magenta / dark pink
pub const RESET_COLOR: &str = "\x1b[0m";

/// Whether rendered telemetry carries ANSI color codes.
///
/// `Auto` consults `stderr.is_terminal()` at render time, so piping the
/// daily report into a file yields clean text without any flag juggling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatterMode {
    /// Decide per call from stderr TTY capability.
    #[default]
    Auto,
    /// Color unconditionally.
    Colored,
    /// Plain text unconditionally.
    Plain,
}

impl FormatterMode {
    /// Resolve `Auto` once, up front, instead of per render call.
    pub fn auto_detect() -> Self {
        if std::io::stderr().is_terminal() {
            FormatterMode::Colored
        } else {
            FormatterMode::Plain
        }
    }

    pub fn is_colored(&self) -> bool {
        match self {
            FormatterMode::Auto => std::io::stderr().is_terminal(),
            FormatterMode::Colored => true,
            FormatterMode::Plain => false,
        }
    }
}

/// A rendered telemetry item: an optional context label plus display lines.
///
/// Sinks decide what to do with the pieces; [`join_lines`](Self::join_lines)
/// collapses the body for sinks that want a single string.
#[derive(Clone, Debug, Default)]
pub struct EventRender {
    pub context: Option<String>,
    pub lines: Vec<String>,
}

impl EventRender {
    pub fn join_lines(&self) -> String {
        self.lines.concat()
    }
}

pub trait TelemetryFormatter: Send + Sync {
    fn render_event(&self, event: &Event) -> EventRender;
    fn render_errors(&self, errors: &[ErrorEvent]) -> Vec<EventRender>;
}

/// Line-oriented formatter with optional ANSI color.
///
/// # Examples
/// ```
/// use followgraph::telemetry::{PlainFormatter, FormatterMode};
///
/// // TTY-dependent color
/// let formatter = PlainFormatter::new();
///
/// // Explicit, e.g. for log files
/// let formatter = PlainFormatter::with_mode(FormatterMode::Plain);
/// ```
pub struct PlainFormatter {
    mode: FormatterMode,
}

impl PlainFormatter {
    pub fn new() -> Self {
        Self::with_mode(FormatterMode::Auto)
    }

    pub fn with_mode(mode: FormatterMode) -> Self {
        Self { mode }
    }

    /// Wrap `text` in `color`..reset when the mode calls for color.
    fn paint(&self, color: &str, text: &str) -> String {
        if self.mode.is_colored() {
            format!("{color}{text}{RESET_COLOR}")
        } else {
            text.to_string()
        }
    }

    fn detail_line(&self, label: &str, body: impl std::fmt::Display) -> String {
        let line = format!("  {label}: {body}");
        format!("{}\n", self.paint(LINE_COLOR, &line))
    }
}

impl Default for PlainFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk the cause chain, one indented line per link.
fn cause_lines(formatter: &PlainFormatter, error: &ChainedError, depth: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = error;
    let mut depth = depth;
    while let Some(cause) = current.cause.as_deref() {
        let line = format!("{}cause: {}", "  ".repeat(depth), cause.message);
        lines.push(format!("{}\n", formatter.paint(LINE_COLOR, &line)));
        current = cause;
        depth += 1;
    }
    lines
}

impl TelemetryFormatter for PlainFormatter {
    fn render_event(&self, event: &Event) -> EventRender {
        EventRender {
            context: event.scope_label().map(str::to_string),
            lines: vec![format!(
                "{}\n",
                self.paint(LINE_COLOR, &event.to_string())
            )],
        }
    }

    fn render_errors(&self, errors: &[ErrorEvent]) -> Vec<EventRender> {
        errors
            .iter()
            .enumerate()
            .map(|(i, event)| {
                let scope = format!("{:?}", event.scope);
                let mut lines = vec![format!(
                    "[{i}] {} | {}\n",
                    event.when,
                    self.paint(CONTEXT_COLOR, &scope)
                )];
                lines.push(self.detail_line("error", &event.error.message));
                lines.extend(cause_lines(self, &event.error, 1));
                if !event.tags.is_empty() {
                    lines.push(self.detail_line("tags", format_args!("{:?}", event.tags)));
                }
                if !event.context.is_null() {
                    lines.push(self.detail_line("context", &event.context));
                }
                EventRender {
                    context: Some(scope),
                    lines,
                }
            })
            .collect()
    }
}
