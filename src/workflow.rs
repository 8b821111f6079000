use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::channels::Channel;
use crate::channels::errors::{ErrorEvent, ErrorScope};
use crate::event_bus::{ChannelSink, EventBus};
use crate::graphs::ConditionalEdge;
use crate::models::StageResult;
use crate::reducers::{ReducerError, ReducerRegistry};
use crate::runtimes::runner::{RunnerError, WorkflowRunner};
use crate::stage::{Stage, StagePartial};
use crate::state::VersionedState;
use crate::types::{ChannelType, StageKind};
use crate::utils::collections::new_output_map;
use tracing::instrument;
use uuid::Uuid;

/// Orchestrates graph execution and applies reducers at barriers.
///
/// `Workflow` is the compiled, immutable form of a graph: the stage registry,
/// the static and conditional edges, and the reducer registry that merges
/// stage output at each superstep barrier. Execution state lives elsewhere
/// (see [`WorkflowRunner`]), so one `Workflow` can back many concurrent runs.
///
/// # Examples
///
/// ```rust,no_run
/// use followgraph::graphs::GraphBuilder;
/// use followgraph::state::VersionedState;
/// use followgraph::types::StageKind;
/// use followgraph::stage::{Stage, StageContext, StageError, StagePartial};
/// use async_trait::async_trait;
///
/// # struct ScoreStage;
/// # #[async_trait]
/// # impl Stage for ScoreStage {
/// #     async fn run(&self, _: followgraph::state::StateSnapshot, _: StageContext) -> Result<StagePartial, StageError> {
/// #         Ok(StagePartial::default())
/// #     }
/// # }
/// #
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let workflow = GraphBuilder::new()
///     .add_stage(StageKind::Custom("rfm".into()), ScoreStage)
///     .add_edge(StageKind::Start, StageKind::Custom("rfm".into()))
///     .add_edge(StageKind::Custom("rfm".into()), StageKind::End)
///     .compile()?;
///
/// let initial_state = VersionedState::builder()
///     .with_output("customer", serde_json::json!({"id": "C001"}))
///     .build();
/// let final_state = workflow.invoke(initial_state).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Workflow {
    stages: FxHashMap<StageKind, Arc<dyn Stage>>,
    edges: FxHashMap<StageKind, Vec<StageKind>>,
    conditional_edges: Vec<ConditionalEdge>,
    reducer_registry: ReducerRegistry,
}

/// Result of applying stage partials at a barrier.
///
/// The outcome aggregates channel and error information in a deterministic
/// order so downstream consumers (runner, report assembly, tests) observe
/// stable behaviour across executions.
#[derive(Debug, Clone, Default)]
pub struct BarrierOutcome {
    /// Channels that were updated during the barrier.
    pub updated_channels: Vec<ChannelType>,
    /// Aggregated error events emitted by stages in the superstep.
    pub errors: Vec<ErrorEvent>,
}

impl Workflow {
    /// Internal (crate) factory to build a Workflow while keeping stages/edges private.
    pub(crate) fn from_parts(
        stages: FxHashMap<StageKind, Arc<dyn Stage>>,
        edges: FxHashMap<StageKind, Vec<StageKind>>,
        conditional_edges: Vec<ConditionalEdge>,
    ) -> Self {
        Workflow {
            stages,
            edges,
            conditional_edges,
            reducer_registry: ReducerRegistry::default(),
        }
    }

    /// Returns a reference to the stage registry.
    #[must_use]
    pub fn stages(&self) -> &FxHashMap<StageKind, Arc<dyn Stage>> {
        &self.stages
    }

    /// Returns a reference to the unconditional edges in this graph.
    #[must_use]
    pub fn edges(&self) -> &FxHashMap<StageKind, Vec<StageKind>> {
        &self.edges
    }

    /// Returns a reference to the conditional edges in this graph.
    ///
    /// Predicates return stage names which are resolved against the registry
    /// at runtime; "End" routes to the virtual terminal. Unknown targets are
    /// skipped with a warning, preserving progress.
    #[must_use]
    pub fn conditional_edges(&self) -> &Vec<ConditionalEdge> {
        &self.conditional_edges
    }

    /// Internal helper that centralises runner setup for the public `invoke*` helpers.
    ///
    /// - `R` represents any auxiliary handle the caller wants to extract alongside
    ///   the run result (for example, a `flume::Receiver<Event>` when wiring a channel).
    /// - `F` is a closure invoked exactly once to construct the `EventBus` together
    ///   with that auxiliary handle. Using `FnOnce` lets the closure move ownership
    ///   of channels or sink vectors.
    async fn invoke_with_bus_builder<R, F>(
        &self,
        initial_state: VersionedState,
        build_event_bus: F,
    ) -> (Result<VersionedState, RunnerError>, R)
    where
        F: FnOnce() -> (EventBus, R),
    {
        let (event_bus, output) = build_event_bus();
        let mut runner = WorkflowRunner::with_bus(self.clone(), event_bus, true);
        let session_id = Uuid::new_v4().to_string();

        let result = match runner.create_session(session_id.clone(), initial_state) {
            Ok(()) => runner.run_until_complete(&session_id).await,
            Err(err) => Err(err),
        };

        (result, output)
    }

    /// Execute the entire workflow until completion or no stages remain.
    ///
    /// This is the primary entry point for simple workflow execution. It
    /// creates a [`WorkflowRunner`] with a default event bus (stdout sink),
    /// creates a session with a random id, and drives supersteps to
    /// completion.
    ///
    /// For custom event handling use [`invoke_with_channel`](Self::invoke_with_channel)
    /// or [`invoke_with_sinks`](Self::invoke_with_sinks), or drop down to
    /// [`WorkflowRunner::with_bus`] when you need per-request isolation.
    ///
    /// # Errors
    ///
    /// Returns a [`RunnerError`] if execution fails due to stage errors or
    /// barrier application problems.
    #[instrument(skip(self, initial_state), err)]
    pub async fn invoke(
        &self,
        initial_state: VersionedState,
    ) -> Result<VersionedState, RunnerError> {
        self.invoke_with_bus_builder(initial_state, || (EventBus::default(), ()))
            .await
            .0
    }

    /// Execute the workflow with event streaming to a channel.
    ///
    /// Convenience wrapper that appends a [`ChannelSink`] to a default event
    /// bus so callers can consume events alongside execution without managing
    /// the bus themselves.
    ///
    /// # Returns
    ///
    /// A tuple of the final state result and a `flume::Receiver` yielding
    /// every event emitted during the run.
    #[instrument(skip(self, initial_state))]
    pub async fn invoke_with_channel(
        &self,
        initial_state: VersionedState,
    ) -> (
        Result<VersionedState, RunnerError>,
        flume::Receiver<crate::event_bus::Event>,
    ) {
        self.invoke_with_bus_builder(initial_state, || {
            let (tx, rx) = flume::unbounded();
            let event_bus = EventBus::default();
            event_bus.add_sink(ChannelSink::new(tx));
            (event_bus, rx)
        })
        .await
    }

    /// Execute the workflow with custom event sinks.
    ///
    /// Use this when you want multiple destinations (stdout plus a memory
    /// sink in tests, for example) without constructing the bus by hand.
    #[instrument(skip(self, initial_state, sinks), err)]
    pub async fn invoke_with_sinks(
        &self,
        initial_state: VersionedState,
        sinks: Vec<Box<dyn crate::event_bus::EventSink>>,
    ) -> Result<VersionedState, RunnerError> {
        self.invoke_with_bus_builder(initial_state, move || (EventBus::with_sinks(sinks), ()))
            .await
            .0
    }

    /// Merge stage outputs and apply state reductions after a superstep.
    ///
    /// This method coordinates the barrier synchronization phase of workflow
    /// execution, where all stage outputs from a superstep are collected,
    /// merged, and applied to the global state via registered reducers. The
    /// returned [`BarrierOutcome`] captures channel updates and aggregated
    /// errors in a stable order so downstream consumers can rely on
    /// deterministic behaviour.
    ///
    /// # State Management
    /// - Aggregates stage results, keyed outputs, and errors from all stages
    /// - Applies registered reducers to merge updates into global state
    /// - Bumps channel versions only when content actually changed
    /// - Preserves deterministic merge behavior for reproducible execution
    #[instrument(skip(self, state, ran_stages, partials), err)]
    pub async fn apply_barrier(
        &self,
        state: &mut VersionedState,
        ran_stages: &[StageKind],
        partials: Vec<StagePartial>,
    ) -> Result<BarrierOutcome, ReducerError> {
        let mut results_all: Vec<StageResult> = Vec::new();
        let mut outputs_all = new_output_map();
        let mut errors_all: Vec<ErrorEvent> = Vec::new();

        for (i, partial) in partials.iter().enumerate() {
            let fallback = StageKind::Custom("?".to_string());
            let sid = ran_stages.get(i).unwrap_or(&fallback);

            if let Some(results) = &partial.results
                && !results.is_empty()
            {
                tracing::debug!(stage = ?sid, count = results.len(), "stage produced results");
                results_all.extend(results.clone());
            }

            if let Some(outputs) = &partial.outputs
                && !outputs.is_empty()
            {
                tracing::debug!(stage = ?sid, keys = outputs.len(), "stage produced outputs");
                // Sort keys to keep the merged map deterministic across runs.
                let mut sorted_pairs: Vec<_> = outputs.iter().collect();
                sorted_pairs.sort_by(|(left, _), (right, _)| left.cmp(right));
                for (k, v) in sorted_pairs {
                    outputs_all.insert(k.clone(), v.clone());
                }
            }

            if let Some(errs) = &partial.errors
                && !errs.is_empty()
            {
                tracing::debug!(stage = ?sid, count = errs.len(), "stage produced errors");
                errors_all.extend(errs.clone());
            }
        }

        fn scope_sort_key(scope: &ErrorScope) -> (u8, &str, u64) {
            match scope {
                ErrorScope::Stage { kind, step } => (0, kind.as_str(), *step),
                ErrorScope::Scheduler { step } => (1, "", *step),
                ErrorScope::Runner { session, step } => (2, session.as_str(), *step),
                ErrorScope::App => (3, "", 0),
            }
        }

        // Sort aggregated errors so downstream consumers observe a stable order.
        errors_all.sort_by(|a, b| {
            let key_a = scope_sort_key(&a.scope);
            let key_b = scope_sort_key(&b.scope);
            key_a
                .cmp(&key_b)
                .then_with(|| a.when.cmp(&b.when))
                .then_with(|| a.error.message.cmp(&b.error.message))
        });

        let merged_updates = StagePartial {
            results: if results_all.is_empty() {
                None
            } else {
                Some(results_all)
            },
            outputs: if outputs_all.is_empty() {
                None
            } else {
                Some(outputs_all)
            },
            errors: if errors_all.is_empty() {
                None
            } else {
                Some(errors_all.clone())
            },
        };

        // Record before-states for version bump decisions
        let results_before_len = state.results.get().len();
        let results_before_ver = state.results.version();
        let outputs_before = state.outputs.snapshot();
        let outputs_before_ver = state.outputs.version();
        let errors_before_len = state.errors.get().len();
        let errors_before_ver = state.errors.version();

        // Apply reducers (they do NOT bump versions)
        self.reducer_registry.apply_all(&mut *state, &merged_updates)?;

        // Detect changes & bump versions responsibly
        let mut updated: Vec<ChannelType> = Vec::new();

        if state.results.get().len() != results_before_len {
            state
                .results
                .set_version(results_before_ver.saturating_add(1));
            tracing::info!(
                target: "followgraph::workflow",
                channel = "results",
                before_count = results_before_len,
                after_count = state.results.get().len(),
                before_version = results_before_ver,
                after_version = state.results.version(),
                "channel updated"
            );
            updated.push(ChannelType::Results);
        }

        let outputs_after = state.outputs.snapshot();
        if outputs_after != outputs_before {
            state
                .outputs
                .set_version(outputs_before_ver.saturating_add(1));
            tracing::info!(
                target: "followgraph::workflow",
                channel = "outputs",
                before_count = outputs_before.len(),
                after_count = outputs_after.len(),
                before_version = outputs_before_ver,
                after_version = state.outputs.version(),
                "channel updated"
            );
            updated.push(ChannelType::Outputs);
        }

        if state.errors.get().len() != errors_before_len {
            state
                .errors
                .set_version(errors_before_ver.saturating_add(1));
            tracing::info!(
                target: "followgraph::workflow",
                channel = "errors",
                before_count = errors_before_len,
                after_count = state.errors.get().len(),
                before_version = errors_before_ver,
                after_version = state.errors.version(),
                "channel updated"
            );
            updated.push(ChannelType::Errors);
        }

        Ok(BarrierOutcome {
            updated_channels: updated,
            errors: errors_all,
        })
    }
}
