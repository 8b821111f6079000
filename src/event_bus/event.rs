use std::fmt;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::telemetry::redact::redact_map;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum Event {
    Stage(StageEvent),
    Diagnostic(DiagnosticEvent),
    Invoker(InvokerEvent),
}

impl Event {
    pub fn stage_message(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Stage(StageEvent::new(None, None, scope.into(), message.into()))
    }

    pub fn stage_message_with_meta(
        stage_id: impl Into<String>,
        step: u64,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Event::Stage(StageEvent::new(
            Some(stage_id.into()),
            Some(step),
            scope.into(),
            message.into(),
        ))
    }

    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Diagnostic(DiagnosticEvent {
            scope: scope.into(),
            message: message.into(),
        })
    }

    pub fn scope_label(&self) -> Option<&str> {
        match self {
            Event::Stage(stage) => Some(stage.scope()),
            Event::Diagnostic(diag) => Some(diag.scope()),
            Event::Invoker(invoker) => Some(invoker.scope().as_ref()),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Event::Stage(stage) => stage.message(),
            Event::Diagnostic(diag) => diag.message(),
            Event::Invoker(invoker) => invoker.message(),
        }
    }

    /// Convert event to structured JSON value with normalized schema.
    ///
    /// Returns a JSON object with the following structure:
    /// ```json
    /// {
    ///   "type": "stage" | "diagnostic" | "invoker",
    ///   "scope": "scope_label",
    ///   "message": "event_message",
    ///   "timestamp": "2025-08-21T12:34:56.789Z",
    ///   "metadata": { /* variant-specific fields */ }
    /// }
    /// ```
    ///
    /// # Example
    ///
    /// ```
    /// use followgraph::event_bus::Event;
    ///
    /// let event = Event::stage_message_with_meta("rfm", 2, "scoring", "Computing RFM score");
    /// let json = event.to_json_value();
    ///
    /// assert_eq!(json["type"], "stage");
    /// assert_eq!(json["scope"], "scoring");
    /// assert_eq!(json["message"], "Computing RFM score");
    /// assert_eq!(json["metadata"]["stage_id"], "rfm");
    /// assert_eq!(json["metadata"]["step"], 2);
    /// ```
    pub fn to_json_value(&self) -> serde_json::Value {
        use serde_json::json;

        let (event_type, metadata) = match self {
            Event::Stage(stage) => {
                let mut meta = serde_json::Map::new();
                if let Some(stage_id) = stage.stage_id() {
                    meta.insert("stage_id".to_string(), json!(stage_id));
                }
                if let Some(step) = stage.step() {
                    meta.insert("step".to_string(), json!(step));
                }
                ("stage", Value::Object(meta))
            }
            Event::Diagnostic(_) => {
                let meta = serde_json::Map::new();
                ("diagnostic", Value::Object(meta))
            }
            Event::Invoker(invoker) => {
                let mut meta = serde_json::Map::new();
                if let Some(stage) = invoker.stage() {
                    meta.insert("stage".to_string(), json!(stage));
                }
                meta.insert("attempt".to_string(), json!(invoker.attempt()));
                if let Some(latency_ms) = invoker.latency_ms() {
                    meta.insert("latency_ms".to_string(), json!(latency_ms));
                }
                if let Some(tokens_in) = invoker.tokens_in() {
                    meta.insert("tokens_in".to_string(), json!(tokens_in));
                }
                if let Some(tokens_out) = invoker.tokens_out() {
                    meta.insert("tokens_out".to_string(), json!(tokens_out));
                }
                if let Some(cost_usd) = invoker.cost_usd() {
                    meta.insert("cost_usd".to_string(), json!(cost_usd));
                }

                // Include caller-supplied metadata fields
                for (key, value) in invoker.metadata() {
                    meta.insert(key.clone(), value.clone());
                }

                ("invoker", Value::Object(meta))
            }
        };

        let timestamp = match self {
            Event::Invoker(invoker) => invoker.timestamp(),
            _ => Utc::now(),
        };

        json!({
            "type": event_type,
            "scope": self.scope_label(),
            "message": self.message(),
            "timestamp": timestamp.to_rfc3339(),
            "metadata": metadata,
        })
    }

    /// Convert event to compact JSON string representation.
    ///
    /// # Example
    ///
    /// ```
    /// use followgraph::event_bus::Event;
    ///
    /// let event = Event::diagnostic("test", "message");
    /// let json_str = event.to_json_string().unwrap();
    /// assert!(json_str.contains("\"type\":\"diagnostic\""));
    /// ```
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_json_value())
    }

    /// Convert event to pretty-printed JSON string with indentation.
    ///
    /// Useful for debugging and log files where human readability is important.
    ///
    /// # Example
    ///
    /// ```
    /// use followgraph::event_bus::Event;
    ///
    /// let event = Event::stage_message("test", "hello");
    /// let json_str = event.to_json_pretty().unwrap();
    /// assert!(json_str.contains("  \"type\": \"stage\""));
    /// ```
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_json_value())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Stage(stage) => match (stage.stage_id(), stage.step()) {
                (Some(id), Some(step)) => write!(f, "[{id}@{step}] {}", stage.message()),
                (Some(id), None) => write!(f, "[{id}] {}", stage.message()),
                (None, Some(step)) => write!(f, "[step {step}] {}", stage.message()),
                (None, None) => write!(f, "{}", stage.message()),
            },
            Event::Diagnostic(diag) => write!(f, "{}", diag.message()),
            Event::Invoker(invoker) => {
                if let Some(stage) = invoker.stage() {
                    write!(
                        f,
                        "[invoke {stage}#{}] {}",
                        invoker.attempt(),
                        invoker.message()
                    )
                } else {
                    write!(f, "{}", invoker.message())
                }
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageEvent {
    stage_id: Option<String>,
    step: Option<u64>,
    scope: String,
    message: String,
}

impl StageEvent {
    pub fn new(
        stage_id: Option<String>,
        step: Option<u64>,
        scope: String,
        message: String,
    ) -> Self {
        Self {
            stage_id,
            step,
            scope,
            message,
        }
    }

    pub fn stage_id(&self) -> Option<&str> {
        self.stage_id.as_deref()
    }

    pub fn step(&self) -> Option<u64> {
        self.step
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticEvent {
    scope: String,
    message: String,
}

impl DiagnosticEvent {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum InvokerEventScope {
    Attempt,
    Fallback,
}

impl AsRef<str> for InvokerEventScope {
    fn as_ref(&self) -> &str {
        match self {
            InvokerEventScope::Attempt => "attempt",
            InvokerEventScope::Fallback => "fallback",
        }
    }
}

/// Telemetry for one remote invocation attempt or the fallback that
/// replaced it.
///
/// Caller-supplied metadata passes through PII redaction at construction,
/// so identifying free text never reaches a sink. Numeric identifiers are
/// left alone.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InvokerEvent {
    stage: Option<String>,
    attempt: u32,
    message: String,
    latency_ms: Option<u64>,
    tokens_in: Option<u64>,
    tokens_out: Option<u64>,
    cost_usd: Option<f64>,
    scope: InvokerEventScope,
    metadata: FxHashMap<String, Value>,
    timestamp: DateTime<Utc>,
}

impl InvokerEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stage: Option<String>,
        attempt: u32,
        message: impl Into<String>,
        latency_ms: Option<u64>,
        tokens_in: Option<u64>,
        tokens_out: Option<u64>,
        cost_usd: Option<f64>,
        scope: Option<InvokerEventScope>,
        metadata: FxHashMap<String, Value>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            stage,
            attempt,
            message: message.into(),
            latency_ms,
            tokens_in,
            tokens_out,
            cost_usd,
            scope: scope.unwrap_or(InvokerEventScope::Attempt),
            metadata: redact_map(metadata),
            timestamp,
        }
    }

    /// One remote call attempt, successful or not.
    pub fn attempt_event(
        stage: impl Into<String>,
        attempt: u32,
        message: impl Into<String>,
        latency_ms: u64,
        tokens_in: u64,
        tokens_out: u64,
        cost_usd: f64,
        metadata: FxHashMap<String, Value>,
    ) -> Self {
        Self::new(
            Some(stage.into()),
            attempt,
            message,
            Some(latency_ms),
            Some(tokens_in),
            Some(tokens_out),
            Some(cost_usd),
            Some(InvokerEventScope::Attempt),
            metadata,
            Utc::now(),
        )
    }

    /// Attempts exhausted; a fallback output was substituted.
    pub fn fallback_event(
        stage: impl Into<String>,
        attempts: u32,
        message: impl Into<String>,
        metadata: FxHashMap<String, Value>,
    ) -> Self {
        Self::new(
            Some(stage.into()),
            attempts,
            message,
            None,
            None,
            None,
            None,
            Some(InvokerEventScope::Fallback),
            metadata,
            Utc::now(),
        )
    }

    pub fn stage(&self) -> Option<&str> {
        self.stage.as_deref()
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn latency_ms(&self) -> Option<u64> {
        self.latency_ms
    }

    pub fn tokens_in(&self) -> Option<u64> {
        self.tokens_in
    }

    pub fn tokens_out(&self) -> Option<u64> {
        self.tokens_out
    }

    pub fn cost_usd(&self) -> Option<f64> {
        self.cost_usd
    }

    pub fn scope(&self) -> &InvokerEventScope {
        &self.scope
    }

    pub fn metadata(&self) -> &FxHashMap<String, Value> {
        &self.metadata
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
