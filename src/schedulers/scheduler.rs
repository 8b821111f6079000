use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::instrument;

use crate::event_bus::Event;
use crate::stage::{Stage, StageContext, StageError, StagePartial};
use crate::state::StateSnapshot;
use crate::types::StageKind;

/// Concurrency-limited executor for one superstep of the workflow.
///
/// A `Scheduler` is cheap to clone and carries no per-run state of its own;
/// everything mutable lives in [`SchedulerState`] so sessions can be
/// persisted and inspected independently of the executor.
#[derive(Clone, Debug)]
pub struct Scheduler {
    /// Maximum number of stages allowed to run concurrently in a superstep.
    pub concurrency_limit: usize,
}

/// Channel versions a stage had observed the last time it ran.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeenVersions {
    pub results: u32,
    pub outputs: u32,
    pub errors: u32,
}

/// Mutable bookkeeping the scheduler threads through supersteps.
///
/// Keyed by the encoded stage label (see [`StageKind::encode`]) so the map
/// survives serialization-friendly session handling without borrowing kinds.
#[derive(Clone, Debug, Default)]
pub struct SchedulerState {
    pub versions_seen: FxHashMap<String, SeenVersions>,
}

/// Outcome of a single superstep.
///
/// `ran_stages` preserves frontier order after gating. `outputs` arrives in
/// completion order when the concurrency limit allows parallelism; callers
/// that need ordered partials should normalize against `ran_stages`.
#[derive(Debug)]
pub struct StepRunResult {
    pub ran_stages: Vec<StageKind>,
    pub skipped_stages: Vec<StageKind>,
    pub outputs: Vec<(StageKind, StagePartial)>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum SchedulerError {
    #[error("stage {kind} failed at step {step}: {source}")]
    #[diagnostic(code(followgraph::scheduler::stage_run))]
    StageRun {
        kind: StageKind,
        step: u64,
        #[source]
        source: StageError,
    },

    #[error("stage task join error: {0}")]
    #[diagnostic(code(followgraph::scheduler::join))]
    Join(#[from] tokio::task::JoinError),
}

impl Scheduler {
    /// Create a scheduler that runs at most `concurrency_limit` stages at once.
    ///
    /// A limit of 1 serializes execution, which is occasionally useful for
    /// deterministic debugging.
    #[must_use]
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            concurrency_limit: concurrency_limit.max(1),
        }
    }

    /// Whether a stage should run given the versions it last observed.
    ///
    /// A stage runs when it has never been recorded, or when any channel
    /// version in `snapshot` is ahead of the recorded value.
    #[must_use]
    pub fn should_run(&self, state: &SchedulerState, id: &str, snapshot: &StateSnapshot) -> bool {
        match state.versions_seen.get(id) {
            None => true,
            Some(seen) => {
                snapshot.results_version > seen.results
                    || snapshot.outputs_version > seen.outputs
                    || snapshot.errors_version > seen.errors
            }
        }
    }

    /// Record the channel versions a stage observed when it was dispatched.
    pub fn record_seen(&self, state: &mut SchedulerState, id: &str, snapshot: &StateSnapshot) {
        state.versions_seen.insert(
            id.to_string(),
            SeenVersions {
                results: snapshot.results_version,
                outputs: snapshot.outputs_version,
                errors: snapshot.errors_version,
            },
        );
    }

    /// Execute one superstep over the given frontier.
    ///
    /// Virtual `Start`/`End` kinds and version-gated stages are skipped.
    /// Runnable stages execute concurrently under the configured limit; each
    /// receives the same immutable `snapshot` plus a [`StageContext`] wired
    /// to the event bus sender.
    ///
    /// The first stage failure aborts the superstep: remaining tasks are
    /// cancelled when the join set is dropped and the error is returned to
    /// the caller for barrier-level recording.
    #[instrument(skip(self, scheduler_state, stages, snapshot, event_bus_sender), err)]
    pub async fn superstep(
        &self,
        scheduler_state: &mut SchedulerState,
        stages: &FxHashMap<StageKind, Arc<dyn Stage>>,
        frontier: Vec<StageKind>,
        snapshot: StateSnapshot,
        step: u64,
        event_bus_sender: flume::Sender<Event>,
    ) -> Result<StepRunResult, SchedulerError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let mut join_set: JoinSet<Result<(StageKind, StagePartial), SchedulerError>> =
            JoinSet::new();
        let mut ran_stages: Vec<StageKind> = Vec::new();
        let mut skipped_stages: Vec<StageKind> = Vec::new();

        // Duplicate frontier entries collapse to a single dispatch.
        let mut unique_frontier: Vec<StageKind> = Vec::new();
        for kind in frontier {
            if !unique_frontier.contains(&kind) {
                unique_frontier.push(kind);
            }
        }

        for kind in unique_frontier {
            if kind.is_start() || kind.is_end() {
                skipped_stages.push(kind);
                continue;
            }

            let id = kind.encode();
            if !self.should_run(scheduler_state, &id, &snapshot) {
                tracing::debug!(stage = %id, step, "stage version-gated; skipping");
                skipped_stages.push(kind);
                continue;
            }

            let Some(stage) = stages.get(&kind) else {
                tracing::warn!(stage = %id, step, "frontier stage not in registry; skipping");
                skipped_stages.push(kind);
                continue;
            };

            self.record_seen(scheduler_state, &id, &snapshot);
            ran_stages.push(kind.clone());

            let permit_sem = semaphore.clone();
            let stage = stage.clone();
            let task_snapshot = snapshot.clone();
            let sender = event_bus_sender.clone();
            join_set.spawn(async move {
                let _permit = permit_sem
                    .acquire_owned()
                    .await
                    .expect("superstep semaphore never closed while tasks run");
                let ctx = StageContext {
                    stage_id: kind.encode(),
                    step,
                    event_bus_sender: sender,
                };
                match stage.run(task_snapshot, ctx).await {
                    Ok(partial) => Ok((kind, partial)),
                    Err(source) => Err(SchedulerError::StageRun { kind, step, source }),
                }
            });
        }

        let mut outputs: Vec<(StageKind, StagePartial)> = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(output)) => outputs.push(output),
                Ok(Err(stage_err)) => return Err(stage_err),
                Err(join_err) => return Err(SchedulerError::Join(join_err)),
            }
        }

        tracing::debug!(
            step,
            ran = ran_stages.len(),
            skipped = skipped_stages.len(),
            "superstep finished"
        );

        Ok(StepRunResult {
            ran_stages,
            skipped_stages,
            outputs,
        })
    }
}
