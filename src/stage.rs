//! Stage execution framework for the analysis workflow.
//!
//! This module provides the core abstractions for executable workflow stages,
//! including the [`Stage`] trait, execution context, state updates, and error handling.

// Standard library and external crates
use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json;
use thiserror::Error;

// Internal crate modules
use crate::channels::errors::ErrorEvent;
use crate::event_bus::Event;
use crate::models::StageResult;
use crate::state::StateSnapshot;

// ============================================================================
// Core Trait
// ============================================================================

/// Core trait defining executable workflow stages.
///
/// The `Stage` trait represents a single unit of analysis within a workflow.
/// Stages receive the current state snapshot and execution context, perform
/// their work (local scoring or a remote invocation), and return partial
/// state updates.
///
/// # Design Principles
///
/// - **Stateless**: Stages should be stateless; determinism lives in the
///   local scoring functions
/// - **Focused**: Each stage should have a single, well-defined responsibility
/// - **Composable**: Stages are combined into the analysis graph declaratively
/// - **Observable**: Use the context to emit events for monitoring
///
/// # Error Handling
///
/// Stages can handle errors in two ways:
/// 1. **Fatal errors**: Return `Err(StageError)` to stop workflow execution
/// 2. **Degradations**: Add to `StagePartial.errors` and return `Ok` with a
///    fallback output, keeping the run alive
///
/// # Examples
///
/// ```rust,no_run
/// use followgraph::stage::{Stage, StageContext, StagePartial, StageError};
/// use followgraph::state::StateSnapshot;
/// use followgraph::channels::errors::{ErrorEvent, ChainedError};
/// use async_trait::async_trait;
///
/// struct InputCheckStage {
///     required_keys: Vec<String>,
/// }
///
/// #[async_trait]
/// impl Stage for InputCheckStage {
///     async fn run(&self, snapshot: StateSnapshot, ctx: StageContext) -> Result<StagePartial, StageError> {
///         ctx.emit("input_check", "Validating request inputs")?;
///
///         for key in &self.required_keys {
///             if !snapshot.outputs.contains_key(key) {
///                 return Err(StageError::ValidationFailed(format!("missing key: {}", key)));
///             }
///         }
///
///         // Degradation without failing the run
///         if snapshot.results.is_empty() {
///             let warning = ErrorEvent {
///                 error: ChainedError {
///                     message: "No telemetry yet, but continuing".to_string(),
///                     ..Default::default()
///                 },
///                 ..Default::default()
///             };
///             return Ok(StagePartial::new().with_errors(vec![warning]));
///         }
///
///         Ok(StagePartial::default())
///     }
/// }
/// ```
#[async_trait]
pub trait Stage: Send + Sync {
    /// Execute this stage with the given state snapshot and context.
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: StageContext,
    ) -> Result<StagePartial, StageError>;
}

// ============================================================================
// Execution Context
// ============================================================================

/// Execution context passed to stages during workflow execution.
///
/// Provides stages with access to their execution environment, including step
/// information, stage identity, and the event channel for observability.
#[derive(Clone, Debug)]
pub struct StageContext {
    /// Unique identifier for this stage instance.
    pub stage_id: String,
    /// Current execution step number.
    pub step: u64,
    /// Channel for emitting events to the workflow's event system.
    pub event_bus_sender: flume::Sender<Event>,
}

impl StageContext {
    /// Emit a stage-scoped event enriched with this context's metadata.
    ///
    /// Creates structured events that include the stage's ID and step
    /// information, making them traceable in the execution log. Event
    /// payloads pass through PII redaction before leaving the context.
    pub fn emit(
        &self,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), StageContextError> {
        self.event_bus_sender
            .send(Event::stage_message_with_meta(
                self.stage_id.clone(),
                self.step,
                scope,
                message,
            ))
            .map_err(|_| StageContextError::EventBusUnavailable)
    }
}

// ============================================================================
// State Updates
// ============================================================================

/// Partial state updates returned by stage execution.
///
/// Represents the changes a stage wants to make to the workflow state.
/// All fields are optional, allowing stages to update only the channels
/// they care about. The barrier merges these partial updates
/// deterministically.
///
/// # Examples
///
/// ```rust
/// use followgraph::stage::StagePartial;
/// use followgraph::models::StageResult;
/// use followgraph::channels::errors::{ErrorEvent, ChainedError};
/// use followgraph::utils::collections::new_output_map;
/// use serde_json::json;
///
/// // Telemetry-only update
/// let partial = StagePartial::new().with_results(vec![StageResult::local("rfm", 3)]);
///
/// // Rich update with outputs
/// let mut outputs = new_output_map();
/// outputs.insert("rfm".to_string(), json!(72));
/// outputs.insert("rfm_no_history".to_string(), json!(false));
/// let partial = StagePartial::new()
///     .with_results(vec![StageResult::local("rfm", 3)])
///     .with_outputs(outputs);
///
/// // Update carrying a degradation
/// let errors = vec![ErrorEvent {
///     error: ChainedError {
///         message: "fallback summary used".to_string(),
///         ..Default::default()
///     },
///     ..Default::default()
/// }];
/// let partial = StagePartial::new().with_errors(errors);
/// ```
#[derive(Clone, Debug, Default)]
pub struct StagePartial {
    /// Telemetry records to append to the results channel.
    pub results: Option<Vec<StageResult>>,
    /// Key-value products to merge into the outputs channel.
    pub outputs: Option<FxHashMap<String, serde_json::Value>>,
    /// Errors to add to the workflow's error collection.
    pub errors: Option<Vec<ErrorEvent>>,
}

impl StagePartial {
    pub fn new() -> Self {
        Self {
            ..Default::default()
        }
    }
    /// Create a `StagePartial` with one or more stage results.
    #[must_use]
    pub fn with_results(mut self, results: Vec<StageResult>) -> Self {
        self.results = Some(results);
        self
    }

    /// Create a `StagePartial` with output data.
    #[must_use]
    pub fn with_outputs(mut self, outputs: FxHashMap<String, serde_json::Value>) -> Self {
        self.outputs = Some(outputs);
        self
    }

    /// Create a `StagePartial` with one or more errors.
    #[must_use]
    pub fn with_errors(mut self, errors: Vec<ErrorEvent>) -> Self {
        self.errors = Some(errors);
        self
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when using StageContext methods.
#[derive(Debug, Error, Diagnostic)]
pub enum StageContextError {
    /// Event could not be sent due to event bus disconnection or capacity issues.
    #[error("failed to emit event: event bus unavailable")]
    #[diagnostic(
        code(followgraph::stage::event_bus_unavailable),
        help("The event bus may be disconnected or at capacity. Check workflow state.")
    )]
    EventBusUnavailable,
}

/// Errors that can occur during stage execution.
///
/// `StageError` represents fatal errors that should halt workflow execution.
/// For degradations that should be tracked but not halt execution, use
/// `StagePartial.errors` with a fallback output instead.
#[derive(Debug, Error, Diagnostic)]
pub enum StageError {
    /// Expected input data is missing from the state snapshot.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(followgraph::stage::missing_input),
        help("Check that the upstream stage produced the required output key.")
    )]
    MissingInput { what: &'static str },

    /// External provider or service error.
    #[error("provider error ({provider}): {message}")]
    #[diagnostic(code(followgraph::stage::provider))]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(followgraph::stage::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Input validation failed.
    #[error("validation failed: {0}")]
    #[diagnostic(
        code(followgraph::stage::validation),
        help("Check input data format and required fields.")
    )]
    ValidationFailed(String),

    /// Event bus communication error.
    #[error("event bus error: {0}")]
    #[diagnostic(code(followgraph::stage::event_bus))]
    EventBus(#[from] StageContextError),
}
