//! State management for analysis workflow executions.
//!
//! This module provides versioned state management with multiple channels
//! for different types of workflow data. State is managed through versioned
//! channels that support snapshotting and deep cloning; one `VersionedState`
//! is owned by exactly one execution and never shared across requests.
//!
//! # Core Types
//!
//! - [`VersionedState`]: The main state container with versioned channels
//! - [`StateSnapshot`]: Immutable snapshot of state at a point in time
//!
//! # Channels
//!
//! State is organized into three channels:
//! - **Results**: per-stage telemetry records, append-only
//! - **Outputs**: keyed stage products (scores, summary, recommendations)
//! - **Errors**: error events and degradation records
//!
//! # Examples
//!
//! ```rust
//! use followgraph::state::VersionedState;
//! use followgraph::channels::Channel;
//! use serde_json::json;
//!
//! let mut state = VersionedState::builder()
//!     .with_output("customer", json!({"id": "C001"}))
//!     .build();
//!
//! state.outputs.get_mut().insert("rfm".to_string(), json!(72));
//!
//! let snapshot = state.snapshot();
//! assert_eq!(snapshot.outputs.get("rfm"), Some(&json!(72)));
//! ```

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::{
    channels::{Channel, ErrorsChannel, OutputsChannel, ResultsChannel},
    models::StageResult,
};

/// The main state container for one workflow execution.
///
/// `VersionedState` manages three independent channels of versioned data:
/// stage results, outputs, and error events. Each channel maintains its own
/// version number for change detection; versions move only at the barrier.
///
/// # Channels
///
/// - **results**: per-stage telemetry ([`ResultsChannel`])
/// - **outputs**: keyed stage products ([`OutputsChannel`])
/// - **errors**: error events and degradations ([`ErrorsChannel`])
///
/// # Examples
///
/// ```rust
/// use followgraph::state::VersionedState;
/// use followgraph::models::StageResult;
/// use followgraph::channels::Channel;
/// use serde_json::json;
///
/// let mut state = VersionedState::builder()
///     .with_output("orders", json!([]))
///     .build();
///
/// state.add_result(StageResult::local("rfm", 2));
/// state.add_output("rfm", json!(64));
///
/// let snapshot = state.snapshot();
/// assert_eq!(snapshot.results.len(), 1);
/// assert_eq!(snapshot.outputs.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VersionedState {
    /// Per-stage telemetry records
    pub results: ResultsChannel,
    /// Keyed stage products and request inputs
    pub outputs: OutputsChannel,
    /// Error channel for degradations and runtime faults
    pub errors: ErrorsChannel,
}

/// Immutable snapshot of workflow state at a specific point in time.
///
/// `StateSnapshot` provides a read-only view of the state that stages can
/// safely access during execution without affecting the underlying state.
/// It contains cloned data from all three channels along with their version
/// numbers.
///
/// Snapshots are created by [`VersionedState::snapshot()`] and passed to
/// stages during execution; stages treat them as immutable input data.
///
/// # Examples
///
/// ```rust
/// use followgraph::state::VersionedState;
/// use followgraph::channels::Channel;
/// use serde_json::json;
///
/// let mut state = VersionedState::builder()
///     .with_output("key", json!("value"))
///     .build();
///
/// let snapshot = state.snapshot();
///
/// // Snapshot is independent of original state
/// state.outputs.get_mut().clear();
/// assert_eq!(snapshot.outputs.get("key"), Some(&json!("value")));
/// assert!(state.outputs.snapshot().is_empty());
/// ```
#[derive(Clone, Debug)]
pub struct StateSnapshot {
    /// Stage results at the time of snapshot
    pub results: Vec<StageResult>,
    /// Version of results channel when snapshot was taken
    pub results_version: u32,
    /// Outputs at the time of snapshot
    pub outputs: FxHashMap<String, Value>,
    /// Version of outputs channel when snapshot was taken
    pub outputs_version: u32,
    /// Error events at the time of snapshot
    pub errors: Vec<crate::channels::errors::ErrorEvent>,
    /// Version of errors channel when snapshot was taken
    pub errors_version: u32,
}

impl StateSnapshot {
    /// Fetch one output value by key.
    #[must_use]
    pub fn output(&self, key: &str) -> Option<&Value> {
        self.outputs.get(key)
    }
}

impl VersionedState {
    /// Creates a builder for constructing `VersionedState` with a fluent API.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use followgraph::state::VersionedState;
    /// use serde_json::json;
    ///
    /// let state = VersionedState::builder()
    ///     .with_output("customer", json!({"id": "C001", "segment": "HORECA"}))
    ///     .with_output("orders", json!([]))
    ///     .build();
    ///
    /// let snapshot = state.snapshot();
    /// assert_eq!(snapshot.outputs.len(), 2);
    /// ```
    pub fn builder() -> VersionedStateBuilder {
        VersionedStateBuilder::new()
    }

    /// Convenience method for appending a stage result.
    ///
    /// The version is not incremented; that is handled by the barrier.
    #[must_use = "consider using the returned self for method chaining"]
    pub fn add_result(&mut self, result: StageResult) -> &mut Self {
        self.results.get_mut().push(result);
        self
    }

    /// Convenience method for inserting an output value.
    ///
    /// The version is not incremented; that is handled by the barrier.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use followgraph::state::VersionedState;
    /// use followgraph::channels::Channel;
    /// use serde_json::json;
    ///
    /// let mut state = VersionedState::default();
    /// state.add_output("churn_risk", json!(0.35))
    ///      .add_output("priority", json!(4));
    ///
    /// let snapshot = state.snapshot();
    /// assert_eq!(snapshot.outputs.len(), 2);
    /// ```
    #[must_use = "consider using the returned self for method chaining"]
    pub fn add_output(&mut self, key: &str, value: Value) -> &mut Self {
        self.outputs.get_mut().insert(key.to_string(), value);
        self
    }

    /// Creates an immutable snapshot of the current state.
    ///
    /// Clones current channel data and version numbers into a point-in-time
    /// view that is safe to hand to concurrently running stages while the
    /// original state is later mutated at the barrier.
    ///
    /// This clones all channel data, so it is O(n) in the state size.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            results: self.results.snapshot(),
            results_version: self.results.version(),
            outputs: self.outputs.snapshot(),
            outputs_version: self.outputs.version(),
            errors: self.errors.snapshot(),
            errors_version: self.errors.version(),
        }
    }
}

/// Builder for constructing `VersionedState` with a fluent API.
///
/// Useful when setting up request state (customer profile plus order
/// history) or complex fixtures in tests.
///
/// # Examples
///
/// ```rust
/// use followgraph::state::VersionedState;
/// use followgraph::models::StageResult;
/// use serde_json::json;
///
/// let state = VersionedState::builder()
///     .with_output("customer", json!({"id": "C002"}))
///     .with_result(StageResult::local("fetch", 1))
///     .build();
///
/// let snapshot = state.snapshot();
/// assert_eq!(snapshot.results.len(), 1);
/// assert_eq!(snapshot.outputs.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct VersionedStateBuilder {
    results: Vec<StageResult>,
    outputs: FxHashMap<String, Value>,
}

impl VersionedStateBuilder {
    /// Creates a new empty builder.
    fn new() -> Self {
        Self::default()
    }

    /// Adds a pre-recorded stage result.
    pub fn with_result(mut self, result: StageResult) -> Self {
        self.results.push(result);
        self
    }

    /// Adds an output value under `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use followgraph::state::VersionedState;
    /// use serde_json::json;
    ///
    /// let state = VersionedState::builder()
    ///     .with_output("orders", json!([{"order_id": "SO-101"}]))
    ///     .build();
    /// ```
    pub fn with_output(mut self, key: &str, value: Value) -> Self {
        self.outputs.insert(key.to_string(), value);
        self
    }

    /// Builds the final `VersionedState`.
    ///
    /// All channels are initialized at version 1; channels with no
    /// configured data start empty.
    pub fn build(self) -> VersionedState {
        VersionedState {
            results: ResultsChannel::new(self.results, 1),
            outputs: OutputsChannel::new(self.outputs, 1),
            errors: ErrorsChannel::default(),
        }
    }
}
