//! Remote model invocation with timeout, bounded retries, and fallback.
//!
//! [`StageInvoker`] is the single choke point between workflow stages and a
//! [`ModelClient`]. It enforces the degradation contract: a stage that
//! reaches the remote boundary always comes back with *some* output. Retries
//! are bounded, a timed-out attempt is never retried (the latency budget is
//! already spent), and when attempts are exhausted the caller-supplied
//! fallback is substituted with `failed: true` recorded in the telemetry.
//!
//! Every attempt and every fallback substitution is emitted on the event bus
//! as an [`InvokerEvent`], with caller metadata passing through PII
//! redaction at construction.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::instrument;

use crate::config::{CostRates, EngineConfig};
use crate::event_bus::{Event, InvokerEvent};
use crate::models::StageResult;

/// Output schema rejection raised by a [`PromptSpec`] validator.
///
/// Violations are retryable: the model may produce conforming output on the
/// next attempt.
#[derive(Debug, Error, Diagnostic)]
#[error("output schema violation: {message}")]
#[diagnostic(code(followgraph::invoker::schema))]
pub struct SchemaViolation {
    pub message: String,
}

impl SchemaViolation {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failures surfaced by a [`ModelClient`] implementation.
#[derive(Debug, Error, Diagnostic)]
pub enum ModelClientError {
    /// The transport failed before a usable response arrived.
    #[error("model transport error: {0}")]
    #[diagnostic(code(followgraph::invoker::transport))]
    Transport(String),

    /// The provider answered with nothing usable.
    #[error("model returned an empty response")]
    #[diagnostic(code(followgraph::invoker::empty_response))]
    EmptyResponse,
}

/// One completion request as handed to a [`ModelClient`].
#[derive(Clone, Debug, PartialEq)]
pub struct ModelRequest {
    pub stage: String,
    pub prompt: String,
    pub max_tokens: u64,
    pub temperature: f64,
}

/// Raw completion text plus the token accounting for one attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelResponse {
    pub text: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

/// The remote analysis capability behind the invoker.
///
/// Implementations own transport, authentication, and provider quirks; the
/// invoker owns timeout, retry, validation, and fallback. Production wiring
/// would put an HTTP client here; [`OfflineClient`] is the deterministic
/// stand-in this crate ships with.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ModelClientError>;
}

/// Validator applied to the parsed JSON of a model response.
///
/// Returns the normalized output value to store, or a [`SchemaViolation`]
/// that makes the attempt retryable.
pub type OutputValidator = Arc<dyn Fn(&Value) -> Result<Value, SchemaViolation> + Send + Sync>;

/// Everything one remote stage invocation needs: the prompt, the acceptance
/// criteria, and the output to substitute when attempts are exhausted.
#[derive(Clone)]
pub struct PromptSpec {
    /// Stage name, used for telemetry and request routing.
    pub stage: String,
    /// Fully rendered prompt text.
    pub prompt: String,
    /// Completion budget override; the invoker default applies when `None`.
    pub max_tokens: Option<u64>,
    /// Schema check applied to the parsed response.
    pub validator: OutputValidator,
    /// Output substituted when every attempt fails.
    pub fallback: Value,
}

impl PromptSpec {
    #[must_use]
    pub fn new(
        stage: impl Into<String>,
        prompt: impl Into<String>,
        validator: OutputValidator,
        fallback: Value,
    ) -> Self {
        Self {
            stage: stage.into(),
            prompt: prompt.into(),
            max_tokens: None,
            validator,
            fallback,
        }
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

impl fmt::Debug for PromptSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptSpec")
            .field("stage", &self.stage)
            .field("prompt_len", &self.prompt.len())
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

/// The outcome of one invocation: always an output, plus the telemetry
/// record describing how it was obtained.
#[derive(Clone, Debug)]
pub struct Invocation {
    /// Validated model output, or the prompt's fallback.
    pub output: Value,
    /// Telemetry for the results channel; `failed` marks a fallback.
    pub result: StageResult,
}

impl Invocation {
    /// True when the output is the prompt's fallback rather than accepted
    /// model output.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.result.failed
    }
}

/// Drives remote invocations under the configured timeout and retry budget.
///
/// Cloneable and cheap to clone; stages typically hold one each.
#[derive(Clone)]
pub struct StageInvoker {
    client: Arc<dyn ModelClient>,
    timeout: std::time::Duration,
    max_retries: u32,
    temperature: f64,
    max_tokens: u64,
    cost: CostRates,
}

impl StageInvoker {
    /// Build an invoker over `client` using the engine's invocation budget.
    #[must_use]
    pub fn new(client: Arc<dyn ModelClient>, config: &EngineConfig) -> Self {
        Self {
            client,
            timeout: config.stage_timeout,
            max_retries: config.max_retries,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            cost: config.cost,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Run one invocation to completion.
    ///
    /// Attempts the remote call up to `1 + max_retries` times. Transport
    /// failures and schema violations consume a retry; a timeout aborts the
    /// sequence immediately. When no attempt produces an accepted output,
    /// the prompt's fallback is returned with `failed: true`.
    ///
    /// Token and cost totals accumulate across all attempts, including
    /// responses that were later rejected by the validator.
    #[instrument(skip(self, spec, sender), fields(stage = %spec.stage))]
    pub async fn invoke(&self, spec: &PromptSpec, sender: &flume::Sender<Event>) -> Invocation {
        let started = Instant::now();
        let max_tokens = spec.max_tokens.unwrap_or(self.max_tokens);

        let mut tokens_in = 0u64;
        let mut tokens_out = 0u64;
        let mut cost_usd = 0.0f64;
        let mut attempts = 0u32;
        let mut last_failure = String::new();

        while attempts <= self.max_retries {
            attempts += 1;
            let request = ModelRequest {
                stage: spec.stage.clone(),
                prompt: spec.prompt.clone(),
                max_tokens,
                temperature: self.temperature,
            };

            let attempt_started = Instant::now();
            let outcome = tokio::time::timeout(self.timeout, self.client.complete(request)).await;
            let latency_ms = attempt_started.elapsed().as_millis() as u64;

            match outcome {
                Err(_) => {
                    // The latency budget is spent; retrying would double it.
                    last_failure = format!("timed out after {}ms", self.timeout.as_millis());
                    self.emit_attempt(sender, spec, attempts, &last_failure, latency_ms, 0, 0, 0.0, "timeout");
                    break;
                }
                Ok(Err(err)) => {
                    last_failure = err.to_string();
                    self.emit_attempt(sender, spec, attempts, &last_failure, latency_ms, 0, 0, 0.0, "transport_error");
                }
                Ok(Ok(response)) => {
                    let attempt_cost = self.cost.estimate(response.tokens_in, response.tokens_out);
                    tokens_in += response.tokens_in;
                    tokens_out += response.tokens_out;
                    cost_usd += attempt_cost;

                    match parse_and_validate(&response.text, &spec.validator) {
                        Ok(output) => {
                            self.emit_attempt(
                                sender,
                                spec,
                                attempts,
                                "completed",
                                latency_ms,
                                response.tokens_in,
                                response.tokens_out,
                                attempt_cost,
                                "ok",
                            );
                            return Invocation {
                                output,
                                result: StageResult {
                                    stage: spec.stage.clone(),
                                    failed: false,
                                    retries: attempts - 1,
                                    latency_ms: started.elapsed().as_millis() as u64,
                                    tokens_in,
                                    tokens_out,
                                    cost_usd,
                                },
                            };
                        }
                        Err(violation) => {
                            last_failure = violation.to_string();
                            self.emit_attempt(
                                sender,
                                spec,
                                attempts,
                                &last_failure,
                                latency_ms,
                                response.tokens_in,
                                response.tokens_out,
                                attempt_cost,
                                "rejected",
                            );
                        }
                    }
                }
            }
        }

        tracing::warn!(
            stage = %spec.stage,
            attempts,
            failure = %last_failure,
            "substituting fallback output"
        );
        let mut metadata = FxHashMap::default();
        metadata.insert("reason".to_string(), json!(last_failure));
        self.emit(
            sender,
            InvokerEvent::fallback_event(
                &spec.stage,
                attempts,
                format!("fallback after {attempts} attempt(s): {last_failure}"),
                metadata,
            ),
        );

        Invocation {
            output: spec.fallback.clone(),
            result: StageResult {
                stage: spec.stage.clone(),
                failed: true,
                retries: attempts.saturating_sub(1),
                latency_ms: started.elapsed().as_millis() as u64,
                tokens_in,
                tokens_out,
                cost_usd,
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_attempt(
        &self,
        sender: &flume::Sender<Event>,
        spec: &PromptSpec,
        attempt: u32,
        message: &str,
        latency_ms: u64,
        tokens_in: u64,
        tokens_out: u64,
        cost_usd: f64,
        outcome: &str,
    ) {
        let mut metadata = FxHashMap::default();
        metadata.insert("outcome".to_string(), json!(outcome));
        self.emit(
            sender,
            InvokerEvent::attempt_event(
                &spec.stage,
                attempt,
                message,
                latency_ms,
                tokens_in,
                tokens_out,
                cost_usd,
                metadata,
            ),
        );
    }

    fn emit(&self, sender: &flume::Sender<Event>, event: InvokerEvent) {
        if sender.send(Event::Invoker(event)).is_err() {
            tracing::debug!("event bus receiver dropped; invoker event discarded");
        }
    }
}

impl fmt::Debug for StageInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageInvoker")
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

fn parse_and_validate(text: &str, validator: &OutputValidator) -> Result<Value, SchemaViolation> {
    let cleaned = strip_code_fences(text);
    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| SchemaViolation::new(format!("response is not valid JSON: {e}")))?;
    validator(&value)
}

/// Strip a Markdown code fence wrapper, with or without a `json` tag.
///
/// Models frequently wrap JSON output in fences even when told not to.
///
/// # Examples
///
/// ```
/// use followgraph::invoker::strip_code_fences;
///
/// assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
/// assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
/// ```
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Deterministic in-process stand-in for a remote analysis provider.
///
/// Produces fixed, schema-conforming completions per stage with token counts
/// derived from text length, so runs are reproducible and cost accounting is
/// exercised without network access.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineClient;

impl OfflineClient {
    fn canned_text(stage: &str) -> String {
        match stage {
            "summary" => json!({
                "summary": "Established account with recent purchasing activity. \
                    Order cadence and spend levels support a scheduled follow-up \
                    this week to protect the relationship."
            })
            .to_string(),
            "recommend" => json!({
                "recommendations": [
                    {"action": "call", "reason": "Recent order pattern suggests readiness for a larger commitment"},
                    {"action": "offer_bundle", "reason": "Frequently ordered items can be bundled at better margin"},
                    {"action": "email", "reason": "A short product update keeps the account engaged between orders"},
                ]
            })
            .to_string(),
            other => json!({"stage": other, "note": "offline completion"}).to_string(),
        }
    }

    fn estimate_tokens(text: &str) -> u64 {
        (text.len() as u64 / 4).max(1)
    }
}

#[async_trait]
impl ModelClient for OfflineClient {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ModelClientError> {
        let text = Self::canned_text(&request.stage);
        Ok(ModelResponse {
            tokens_in: Self::estimate_tokens(&request.prompt),
            tokens_out: Self::estimate_tokens(&text),
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn accept_any() -> OutputValidator {
        Arc::new(|value| Ok(value.clone()))
    }

    fn spec_with(fallback: Value) -> PromptSpec {
        PromptSpec::new("summary", "summarize C001", accept_any(), fallback)
    }

    fn test_invoker(client: Arc<dyn ModelClient>) -> StageInvoker {
        StageInvoker::new(client, &EngineConfig::default())
    }

    struct AlwaysFails;

    #[async_trait]
    impl ModelClient for AlwaysFails {
        async fn complete(&self, _request: ModelRequest) -> Result<ModelResponse, ModelClientError> {
            Err(ModelClientError::Transport("connection reset".into()))
        }
    }

    struct Sleeper;

    #[async_trait]
    impl ModelClient for Sleeper {
        async fn complete(&self, _request: ModelRequest) -> Result<ModelResponse, ModelClientError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ModelResponse {
                text: "{}".into(),
                tokens_in: 1,
                tokens_out: 1,
            })
        }
    }

    fn drain(rx: &flume::Receiver<Event>) -> Vec<Event> {
        rx.try_iter().collect()
    }

    #[test]
    fn fence_stripping_variants() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn invalid_json_is_a_schema_violation() {
        let err = parse_and_validate("not json at all", &accept_any()).unwrap_err();
        assert!(err.message.contains("not valid JSON"));
    }

    #[tokio::test]
    async fn offline_client_is_deterministic() {
        let client = OfflineClient;
        let request = ModelRequest {
            stage: "summary".into(),
            prompt: "summarize C001".into(),
            max_tokens: 256,
            temperature: 0.2,
        };
        let a = client.complete(request.clone()).await.unwrap();
        let b = client.complete(request).await.unwrap();
        assert_eq!(a, b);
        assert!(a.tokens_in > 0 && a.tokens_out > 0);
    }

    #[tokio::test]
    async fn transport_failures_retry_up_to_cap_then_fall_back() {
        let invoker = test_invoker(Arc::new(AlwaysFails)).with_max_retries(2);
        let (tx, rx) = flume::unbounded();
        let spec = spec_with(json!({"summary": "fallback"}));

        let invocation = invoker.invoke(&spec, &tx).await;

        assert!(invocation.is_fallback());
        assert_eq!(invocation.output, json!({"summary": "fallback"}));
        assert_eq!(invocation.result.retries, 2);
        assert_eq!(invocation.result.tokens_in, 0);
        assert_eq!(invocation.result.cost_usd, 0.0);

        let events = drain(&rx);
        let attempts = events
            .iter()
            .filter(|e| matches!(e, Event::Invoker(i) if i.scope().as_ref() == "attempt"))
            .count();
        let fallbacks = events
            .iter()
            .filter(|e| matches!(e, Event::Invoker(i) if i.scope().as_ref() == "fallback"))
            .count();
        assert_eq!(attempts, 3);
        assert_eq!(fallbacks, 1);
    }

    #[tokio::test]
    async fn timeout_is_never_retried() {
        let invoker = test_invoker(Arc::new(Sleeper))
            .with_max_retries(5)
            .with_timeout(Duration::from_millis(20));
        let (tx, rx) = flume::unbounded();
        let spec = spec_with(json!({"summary": "fallback"}));

        let invocation = invoker.invoke(&spec, &tx).await;

        assert!(invocation.is_fallback());
        assert_eq!(invocation.result.retries, 0);

        let events = drain(&rx);
        let attempts = events
            .iter()
            .filter(|e| matches!(e, Event::Invoker(i) if i.scope().as_ref() == "attempt"))
            .count();
        assert_eq!(attempts, 1, "a timed-out attempt must not be retried");
    }

    #[tokio::test]
    async fn validator_rejection_consumes_retries_and_tokens() {
        let reject_all: OutputValidator =
            Arc::new(|_| Err(SchemaViolation::new("missing required field")));
        let spec = PromptSpec::new(
            "summary",
            "summarize C001",
            reject_all,
            json!({"summary": "fallback"}),
        );
        let invoker = test_invoker(Arc::new(OfflineClient)).with_max_retries(1);
        let (tx, rx) = flume::unbounded();

        let invocation = invoker.invoke(&spec, &tx).await;

        assert!(invocation.is_fallback());
        assert_eq!(invocation.result.retries, 1);
        assert!(invocation.result.tokens_in > 0, "rejected responses still cost tokens");
        assert!(invocation.result.cost_usd > 0.0);
        assert_eq!(drain(&rx).len(), 3); // two attempts, one fallback
    }

    #[tokio::test]
    async fn accepted_output_reports_no_failure() {
        let invoker = test_invoker(Arc::new(OfflineClient));
        let (tx, rx) = flume::unbounded();
        let spec = spec_with(json!({"summary": "fallback"}));

        let invocation = invoker.invoke(&spec, &tx).await;

        assert!(!invocation.is_fallback());
        assert_eq!(invocation.result.retries, 0);
        assert!(invocation.output["summary"].is_string());
        assert_eq!(drain(&rx).len(), 1);
    }
}
