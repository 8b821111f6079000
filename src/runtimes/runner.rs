use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

use crate::channels::Channel;
use crate::channels::errors::{ChainedError, ErrorEvent};
use crate::event_bus::{Event, EventBus};
use crate::reducers::ReducerError;
use crate::runtimes::execution::{SchedulerOutcome, StepReport};
use crate::runtimes::session::{SessionState, StateVersions};
use crate::schedulers::{Scheduler, SchedulerError, SchedulerState};
use crate::stage::StagePartial;
use crate::state::VersionedState;
use crate::types::StageKind;
use crate::workflow::{BarrierOutcome, Workflow};

/// Runtime execution engine for workflow graphs with session management and
/// event streaming.
///
/// `WorkflowRunner` wraps a [`Workflow`] and manages the runtime execution
/// environment:
/// - **Session management**: multiple isolated runs over one graph
/// - **Event streaming**: a pluggable [`EventBus`] handed to every stage
/// - **Step control**: stepwise execution with per-step reports
///
/// # Architecture: Workflow vs WorkflowRunner
///
/// - **`Workflow`**: the compiled graph structure (stages, edges, reducers)
/// - **`WorkflowRunner`**: the runtime environment (sessions, events)
///
/// This separation allows one `Workflow` to be reused across many runner
/// instances, each with isolated event bus configuration. That is the
/// pattern for per-request isolation: build the graph once, spin up a
/// runner per analysis run.
///
/// # Usage
///
/// ```rust,no_run
/// use followgraph::event_bus::{EventBus, MemorySink};
/// use followgraph::runtimes::WorkflowRunner;
/// use followgraph::state::VersionedState;
/// # async fn example(workflow: followgraph::workflow::Workflow) -> Result<(), Box<dyn std::error::Error>> {
/// let sink = MemorySink::new();
/// let bus = EventBus::with_sink(sink.clone());
///
/// let mut runner = WorkflowRunner::with_bus(workflow, bus, true);
/// let session_id = "analysis-C001".to_string();
/// runner.create_session(
///     session_id.clone(),
///     VersionedState::builder()
///         .with_output("customer", serde_json::json!({"id": "C001"}))
///         .build(),
/// )?;
///
/// let final_state = runner.run_until_complete(&session_id).await?;
/// # Ok(())
/// # }
/// ```
pub struct WorkflowRunner {
    workflow: Arc<Workflow>,
    sessions: FxHashMap<String, SessionState>,
    event_bus: EventBus,
    concurrency_limit: Option<usize>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("session not found: {session_id}")]
    #[diagnostic(code(followgraph::runner::session_not_found))]
    SessionNotFound { session_id: String },

    #[error("session already exists: {session_id}")]
    #[diagnostic(
        code(followgraph::runner::session_exists),
        help("Session ids must be unique per runner; use a fresh id for each run.")
    )]
    SessionExists { session_id: String },

    #[error("no stages to run from Start (empty frontier)")]
    #[diagnostic(
        code(followgraph::runner::no_start_stages),
        help("Add edges from Start, or make sure a Start conditional edge routes somewhere.")
    )]
    NoStartStages,

    #[error("barrier application failed: {0}")]
    #[diagnostic(code(followgraph::runner::barrier))]
    Barrier(#[from] ReducerError),

    #[error(transparent)]
    #[diagnostic(code(followgraph::runner::scheduler))]
    Scheduler(#[from] SchedulerError),
}

impl WorkflowRunner {
    /// Create a runner with a default event bus (stdout sink only).
    ///
    /// For custom event handling (memory sinks in tests, channel streaming)
    /// use [`with_bus`](Self::with_bus) instead.
    #[must_use]
    pub fn new(workflow: Workflow) -> Self {
        Self::with_bus(workflow, EventBus::default(), true)
    }

    /// Create a runner with a custom event bus.
    ///
    /// The bus is a runtime concern owned by the runner, not the workflow:
    /// each runner can stream the same graph's events to different sinks.
    /// When `start_listener` is true the bus's forwarding task starts
    /// immediately; pass false if the caller starts it separately.
    #[must_use]
    pub fn with_bus(workflow: Workflow, event_bus: EventBus, start_listener: bool) -> Self {
        Self::from_arc(Arc::new(workflow), event_bus, start_listener)
    }

    /// Variant of [`with_bus`](Self::with_bus) for an already-shared workflow.
    #[must_use]
    pub fn from_arc(workflow: Arc<Workflow>, event_bus: EventBus, start_listener: bool) -> Self {
        if start_listener {
            event_bus.listen_for_events();
        }
        Self {
            workflow,
            sessions: FxHashMap::default(),
            event_bus,
            concurrency_limit: None,
        }
    }

    /// Cap the stages run concurrently within a superstep for new sessions.
    ///
    /// Without this, sessions default to the host's available parallelism.
    #[must_use]
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = Some(limit.max(1));
        self
    }

    /// Initialize a new session with the given initial state.
    ///
    /// Seeds the frontier from the static edges out of `Start` plus any
    /// conditional edges anchored at `Start`, evaluated against the initial
    /// state snapshot. Conditional targets that name unregistered stages are
    /// skipped with a warning.
    ///
    /// # Errors
    ///
    /// - [`RunnerError::SessionExists`] when the id is already in use
    /// - [`RunnerError::NoStartStages`] when the seeded frontier is empty
    #[instrument(skip(self, initial_state), err)]
    pub fn create_session(
        &mut self,
        session_id: String,
        initial_state: VersionedState,
    ) -> Result<(), RunnerError> {
        if self.sessions.contains_key(&session_id) {
            return Err(RunnerError::SessionExists { session_id });
        }

        let mut frontier: Vec<StageKind> = Vec::new();
        for target in self
            .workflow
            .edges()
            .get(&StageKind::Start)
            .cloned()
            .unwrap_or_default()
        {
            if !frontier.contains(&target) {
                frontier.push(target);
            }
        }

        let snapshot = initial_state.snapshot();
        for edge in self
            .workflow
            .conditional_edges()
            .iter()
            .filter(|e| e.from().is_start())
        {
            for target_name in (edge.predicate())(snapshot.clone()) {
                let target = StageKind::from(target_name.as_str());
                if self.is_valid_target(&target) {
                    if !frontier.contains(&target) {
                        frontier.push(target);
                    }
                } else {
                    tracing::warn!(
                        target = %target.encode(),
                        "Start conditional routed to unknown stage; skipping"
                    );
                }
            }
        }

        if frontier.is_empty() {
            return Err(RunnerError::NoStartStages);
        }

        let limit = self.concurrency_limit.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        let session_state = SessionState {
            state: initial_state,
            step: 0,
            frontier,
            scheduler: Scheduler::new(limit),
            scheduler_state: SchedulerState::default(),
        };
        self.sessions.insert(session_id, session_state);
        Ok(())
    }

    /// Execute one superstep for the given session.
    ///
    /// A terminal session (empty frontier or only `End` entries) returns a
    /// report with `completed = true` and no ran stages. On a scheduler
    /// failure the error is first recorded on the errors channel through the
    /// barrier, then rethrown, so the session keeps a durable trace of what
    /// went wrong.
    #[instrument(skip(self), err)]
    pub async fn run_step(&mut self, session_id: &str) -> Result<StepReport, RunnerError> {
        let (current_step, current_frontier, current_versions) = {
            let session_state =
                self.sessions
                    .get(session_id)
                    .ok_or_else(|| RunnerError::SessionNotFound {
                        session_id: session_id.to_string(),
                    })?;
            (
                session_state.step,
                session_state.frontier.clone(),
                Self::versions_of(&session_state.state),
            )
        };

        if current_frontier.is_empty() || current_frontier.iter().all(|s| *s == StageKind::End) {
            return Ok(StepReport {
                step: current_step,
                ran_stages: vec![],
                skipped_stages: current_frontier,
                barrier_outcome: BarrierOutcome::default(),
                next_frontier: vec![],
                state_versions: current_versions,
                completed: true,
            });
        }

        // Take ownership of session state for execution.
        let mut session_state = self
            .sessions
            .remove(session_id)
            .expect("session exists after initial lookup");

        let step_report = match self.run_one_superstep(&mut session_state).await {
            Ok(report) => report,
            Err(e) => {
                let event = Self::error_event_for(&e, session_id, &session_state);
                // Inject via barrier mechanics so the failure lands on the
                // errors channel with a version bump like any stage error.
                let mut update_state = session_state.state.clone();
                let partial = StagePartial {
                    results: None,
                    outputs: None,
                    errors: Some(vec![event]),
                };
                let _ = self
                    .workflow
                    .apply_barrier(&mut update_state, &[], vec![partial])
                    .await;
                session_state.state = update_state;
                self.sessions.insert(session_id.to_string(), session_state);
                return Err(e);
            }
        };

        self.sessions.insert(session_id.to_string(), session_state);
        Ok(step_report)
    }

    /// Map an execution error onto the errors-channel event that records it.
    fn error_event_for(
        error: &RunnerError,
        session_id: &str,
        session_state: &SessionState,
    ) -> ErrorEvent {
        match error {
            RunnerError::Scheduler(SchedulerError::StageRun { kind, step, source }) => {
                ErrorEvent::stage(kind.encode(), *step, ChainedError::msg(source.to_string()))
                    .with_tag("stage")
            }
            RunnerError::Scheduler(SchedulerError::Join(_)) => {
                ErrorEvent::scheduler(session_state.step, ChainedError::msg(error.to_string()))
                    .with_tag("scheduler")
            }
            _ => ErrorEvent::runner(
                session_id,
                session_state.step,
                ChainedError::msg(error.to_string()),
            )
            .with_tag("runner")
            .with_context(serde_json::json!({
                "frontier": session_state
                    .frontier
                    .iter()
                    .map(|k| k.encode())
                    .collect::<Vec<_>>()
            })),
        }
    }

    /// Schedule one step: invoke scheduler and normalize outputs to ordered partials.
    #[inline]
    async fn schedule_step(
        &self,
        session_state: &mut SessionState,
        step: u64,
    ) -> Result<SchedulerOutcome, RunnerError> {
        let snapshot = session_state.state.snapshot();
        let result = session_state
            .scheduler
            .superstep(
                &mut session_state.scheduler_state,
                self.workflow.stages(),
                session_state.frontier.clone(),
                snapshot,
                step,
                self.event_bus.get_sender(),
            )
            .await?;

        let mut partials_by_kind: FxHashMap<StageKind, StagePartial> = FxHashMap::default();
        for (kind, partial) in result.outputs {
            partials_by_kind.insert(kind, partial);
        }
        let ran_stages = result.ran_stages;
        let partials = ran_stages
            .iter()
            .cloned()
            .filter_map(|kind| partials_by_kind.remove(&kind))
            .collect();

        Ok(SchedulerOutcome {
            ran_stages,
            skipped_stages: result.skipped_stages,
            partials,
        })
    }

    /// Apply barrier and update session state with the results.
    #[instrument(skip(self, session_state, partials, ran), err)]
    async fn apply_barrier_and_update(
        &self,
        session_state: &mut SessionState,
        ran: &[StageKind],
        partials: Vec<StagePartial>,
    ) -> Result<BarrierOutcome, RunnerError> {
        let mut update_state = session_state.state.clone();
        let outcome = self
            .workflow
            .apply_barrier(&mut update_state, ran, partials)
            .await?;
        session_state.state = update_state;
        Ok(outcome)
    }

    /// Compute the next frontier from static and conditional edges.
    #[inline]
    fn compute_next_frontier(
        &self,
        session_state: &SessionState,
        ran: &[StageKind],
        step: u64,
    ) -> Vec<StageKind> {
        let mut next_frontier: Vec<StageKind> = Vec::new();
        let graph_edges = self.workflow.edges();
        let conditional_edges = self.workflow.conditional_edges();
        let state_snapshot = session_state.state.snapshot();

        for id in ran.iter() {
            let mut next_targets: Vec<StageKind> =
                graph_edges.get(id).cloned().unwrap_or_default();

            for conditional_edge in conditional_edges.iter().filter(|ce| ce.from() == id) {
                tracing::debug!(from = ?conditional_edge.from(), step, "evaluating conditional edge");
                let target_names = (conditional_edge.predicate())(state_snapshot.clone());

                for target_name in target_names {
                    let target = StageKind::from(target_name.as_str());
                    tracing::debug!(target = ?target, step, "conditional edge routed");
                    next_targets.push(target);
                }
            }

            for target in next_targets {
                if self.is_valid_target(&target) {
                    if !next_frontier.contains(&target) {
                        next_frontier.push(target);
                    }
                } else {
                    tracing::warn!(
                        step,
                        origin = %id.encode(),
                        target = %target.encode(),
                        "frontier target not found; skipping"
                    );
                }
            }
        }

        next_frontier
    }

    fn is_valid_target(&self, target: &StageKind) -> bool {
        match target {
            StageKind::Start | StageKind::End => true,
            StageKind::Custom(_) => self.workflow.stages().contains_key(target),
        }
    }

    fn versions_of(state: &VersionedState) -> StateVersions {
        StateVersions {
            results_version: state.results.version(),
            outputs_version: state.outputs.version(),
            errors_version: state.errors.version(),
        }
    }

    /// Executes exactly one superstep on the given session state.
    #[instrument(skip(self, session_state), err)]
    async fn run_one_superstep(
        &self,
        session_state: &mut SessionState,
    ) -> Result<StepReport, RunnerError> {
        session_state.step += 1;
        let step = session_state.step;

        tracing::debug!(step, "starting superstep");

        // Phase 1: schedule and normalize outputs
        let schedule_span = tracing::info_span!(
            "schedule",
            step,
            frontier_len = session_state.frontier.len()
        );
        let scheduler_outcome = schedule_span
            .in_scope(|| self.schedule_step(session_state, step))
            .await?;

        // Phase 2: apply barrier and update state
        let errors_in_partials = scheduler_outcome
            .partials
            .iter()
            .filter_map(|p| p.errors.as_ref())
            .map(|e| e.len())
            .sum::<usize>();
        let barrier_span = tracing::info_span!(
            "barrier",
            ran_stages_len = scheduler_outcome.ran_stages.len(),
            errors_in_partials
        );
        let barrier_outcome = barrier_span
            .in_scope(|| {
                self.apply_barrier_and_update(
                    session_state,
                    &scheduler_outcome.ran_stages,
                    scheduler_outcome.partials,
                )
            })
            .await?;

        // Phase 3: compute next frontier
        let conditional_edges_evaluated = self.workflow.conditional_edges().len();
        let frontier_span = tracing::info_span!("frontier", conditional_edges_evaluated);
        let next_frontier = frontier_span.in_scope(|| {
            self.compute_next_frontier(session_state, &scheduler_outcome.ran_stages, step)
        });

        tracing::debug!(
            step,
            updated_channels = ?barrier_outcome.updated_channels,
            error_count = barrier_outcome.errors.len(),
            "barrier applied"
        );
        tracing::debug!(step, next_frontier = ?next_frontier, "computed next frontier");

        let completed =
            next_frontier.is_empty() || next_frontier.iter().all(|s| *s == StageKind::End);

        session_state.frontier = next_frontier.clone();

        Ok(StepReport {
            step,
            ran_stages: scheduler_outcome.ran_stages,
            skipped_stages: scheduler_outcome.skipped_stages,
            barrier_outcome,
            next_frontier,
            state_versions: Self::versions_of(&session_state.state),
            completed,
        })
    }

    /// Run until completion (End stages or no frontier) - the canonical execution method.
    #[instrument(skip(self, session_id), err)]
    pub async fn run_until_complete(
        &mut self,
        session_id: &str,
    ) -> Result<VersionedState, RunnerError> {
        tracing::info!(session = %session_id, "workflow run started");

        loop {
            let session_state =
                self.sessions
                    .get(session_id)
                    .ok_or_else(|| RunnerError::SessionNotFound {
                        session_id: session_id.to_string(),
                    })?;

            if Self::is_session_complete(session_state) {
                tracing::info!(
                    session = %session_id,
                    step = session_state.step,
                    "frontier reached terminal state"
                );
                break;
            }

            let report = match self.run_step(session_id).await {
                Ok(report) => report,
                Err(err) => {
                    self.emit_run_end(session_id, Some(&err));
                    return Err(err);
                }
            };
            if report.completed {
                break;
            }
        }

        tracing::info!(session = %session_id, "workflow run completed");
        let session_state =
            self.sessions
                .get(session_id)
                .ok_or_else(|| RunnerError::SessionNotFound {
                    session_id: session_id.to_string(),
                })?;
        let final_state = session_state.state.clone();
        let final_step = session_state.step;

        for (i, result) in final_state.results.get().iter().enumerate() {
            tracing::debug!(
                session = %session_id,
                result_index = i,
                stage = %result.stage,
                failed = result.failed,
                latency_ms = result.latency_ms,
                "final stage result entry"
            );
        }
        tracing::debug!(
            session = %session_id,
            results_version = final_state.results.version(),
            outputs_version = final_state.outputs.version(),
            outputs_keys = final_state.outputs.get().len(),
            errors_recorded = final_state.errors.get().len(),
            step = final_step,
            "final channel summary"
        );

        self.emit_run_end(session_id, None);
        Ok(final_state)
    }

    /// Emit a terminal diagnostic event so sinks observe the run boundary.
    fn emit_run_end(&self, session_id: &str, error: Option<&RunnerError>) {
        let step = self.sessions.get(session_id).map(|s| s.step);
        let message = match (step, error) {
            (Some(step), None) => format!("session={session_id} status=completed step={step}"),
            (Some(step), Some(err)) => {
                format!("session={session_id} status=error step={step} error={err}")
            }
            (None, Some(err)) => format!("session={session_id} status=error error={err}"),
            (None, None) => format!("session={session_id} status=completed"),
        };
        if let Err(send_err) = self
            .event_bus
            .get_sender()
            .send(Event::diagnostic("run_end", message))
        {
            tracing::debug!(
                session = %session_id,
                error = ?send_err,
                "failed to emit run termination event"
            );
        }
    }

    /// Get a snapshot of the current session state.
    #[must_use]
    pub fn get_session(&self, session_id: &str) -> Option<&SessionState> {
        self.sessions.get(session_id)
    }

    /// List all active session IDs.
    #[must_use]
    pub fn list_sessions(&self) -> Vec<&String> {
        self.sessions.keys().collect()
    }

    /// Determine if a session has reached a terminal frontier.
    #[inline]
    fn is_session_complete(session_state: &SessionState) -> bool {
        session_state.frontier.is_empty()
            || session_state.frontier.iter().all(|s| *s == StageKind::End)
    }
}
