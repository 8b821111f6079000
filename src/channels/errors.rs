use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::telemetry::{FormatterMode, PlainFormatter, TelemetryFormatter};

// `kind` is the encoded string form of StageKind so this module stays free of
// the types module's serde choices.

/// One entry on the errors channel: where it happened, what went wrong, and
/// any tags/context the emitter attached.
///
/// Serializes to a flat object; `scope` is internally tagged on a `"scope"`
/// discriminator:
///
/// ```json
/// {
///   "when": "2025-08-21T10:30:00Z",
///   "scope": {"scope": "stage", "kind": "Stage:summary", "step": 3},
///   "error": {"message": "schema validation failed", "cause": null, "details": {"attempt": 2}},
///   "tags": ["validation", "fallback"],
///   "context": {"customer_id": "C002"}
/// }
/// ```
///
/// # Examples
///
/// ```
/// use followgraph::channels::errors::{ErrorEvent, ChainedError};
/// use serde_json::json;
///
/// let event = ErrorEvent::stage("summary", 3, ChainedError::msg("schema validation failed"))
///     .with_tag("validation")
///     .with_context(json!({"customer_id": "C002"}));
/// let wire = serde_json::to_string(&event).unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ErrorEvent {
    #[serde(default = "chrono::Utc::now")]
    pub when: DateTime<Utc>,
    #[serde(default)]
    pub scope: ErrorScope,
    #[serde(default)]
    pub error: ChainedError,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub context: serde_json::Value,
}

/// Which layer of the runtime produced an [`ErrorEvent`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ErrorScope {
    Stage {
        kind: String,
        step: u64,
    },
    Scheduler {
        step: u64,
    },
    Runner {
        session: String,
        step: u64,
    },
    #[default]
    App,
}

impl ErrorEvent {
    fn scoped(scope: ErrorScope, error: ChainedError) -> Self {
        Self {
            when: Utc::now(),
            scope,
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// Error raised while running a single stage. `kind` is the encoded
    /// stage kind, `step` the superstep it failed on.
    pub fn stage<S: Into<String>>(kind: S, step: u64, error: ChainedError) -> Self {
        Self::scoped(
            ErrorScope::Stage {
                kind: kind.into(),
                step,
            },
            error,
        )
    }

    /// Error raised by the scheduler itself (join failures, gating bugs).
    pub fn scheduler(step: u64, error: ChainedError) -> Self {
        Self::scoped(ErrorScope::Scheduler { step }, error)
    }

    /// Error raised by the session runner for `session` at `step`.
    pub fn runner<S: Into<String>>(session: S, step: u64, error: ChainedError) -> Self {
        Self::scoped(
            ErrorScope::Runner {
                session: session.into(),
                step,
            },
            error,
        )
    }

    /// Error with no runtime scope, e.g. startup or configuration.
    pub fn app(error: ChainedError) -> Self {
        Self::scoped(ErrorScope::App, error)
    }

    /// Replace the tag list.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Append one tag.
    ///
    /// ```
    /// use followgraph::channels::errors::{ErrorEvent, ChainedError};
    ///
    /// let err = ErrorEvent::stage("summary", 1, ChainedError::msg("invalid output"))
    ///     .with_tag("validation");
    /// assert_eq!(err.tags, vec!["validation"]);
    /// ```
    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Attach free-form context. Callers redact identifying fields before
    /// handing the value over; this method stores it as-is.
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

/// An error whose cause chain is plain data.
///
/// Unlike `Box<dyn Error>`, the chain survives a trip through the state
/// channels as JSON and still walks as `source()` afterwards.
///
/// ```
/// use followgraph::channels::errors::ChainedError;
///
/// let err = ChainedError::msg("analysis failed")
///     .with_cause(ChainedError::msg("order history empty"));
/// assert_eq!(err.cause.as_ref().unwrap().message, "order history empty");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainedError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ChainedError>>,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl ChainedError {
    pub fn msg<M: Into<String>>(m: M) -> Self {
        ChainedError {
            message: m.into(),
            cause: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_cause(mut self, cause: ChainedError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

impl Default for ChainedError {
    fn default() -> Self {
        ChainedError::msg("")
    }
}

impl std::fmt::Display for ChainedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ChainedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|c| c as &dyn std::error::Error)
    }
}

/// Render error events as text with explicit control over ANSI color:
/// [`FormatterMode::Plain`] for log files, [`FormatterMode::Colored`] to
/// force escapes, [`FormatterMode::Auto`] to follow the stderr TTY check.
///
/// ```
/// use followgraph::channels::errors::{ErrorEvent, ChainedError, pretty_print_with_mode};
/// use followgraph::telemetry::FormatterMode;
///
/// let events = vec![
///     ErrorEvent::stage("summary", 1, ChainedError::msg("schema validation failed")),
/// ];
/// let plain = pretty_print_with_mode(&events, FormatterMode::Plain);
/// assert!(!plain.contains("\x1b["));
/// ```
pub fn pretty_print_with_mode(events: &[ErrorEvent], mode: FormatterMode) -> String {
    let formatter = PlainFormatter::with_mode(mode);
    let mut out = String::new();
    for (idx, render) in formatter.render_errors(events).into_iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        for line in render.lines {
            out.push_str(&line);
        }
    }
    out
}

/// [`pretty_print_with_mode`] with color auto-detection.
pub fn pretty_print(events: &[ErrorEvent]) -> String {
    pretty_print_with_mode(events, FormatterMode::Auto)
}
