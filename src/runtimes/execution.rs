//! Step execution types for workflow runs.
//!
//! This module defines the types used to represent step execution results
//! during workflow processing.

use crate::runtimes::session::StateVersions;
use crate::stage::StagePartial;
use crate::types::StageKind;
use crate::workflow::BarrierOutcome;

/// Result of executing one superstep in a session.
///
/// The embedded [`BarrierOutcome`] carries the canonical ordering of
/// updates/errors so callers can inspect each step without drift.
///
/// # Examples
///
/// ```rust,no_run
/// use followgraph::runtimes::StepReport;
///
/// fn analyze_step(report: &StepReport) {
///     println!("Step {} completed", report.step);
///     println!("Ran {} stages, skipped {}",
///              report.ran_stages.len(),
///              report.skipped_stages.len());
///     if report.completed {
///         println!("Workflow finished!");
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct StepReport {
    /// The step number that was executed.
    pub step: u64,
    /// Stages that ran during this step.
    pub ran_stages: Vec<StageKind>,
    /// Stages that were skipped (e.g., End stages or version-gated).
    pub skipped_stages: Vec<StageKind>,
    /// The outcome from applying the barrier.
    pub barrier_outcome: BarrierOutcome,
    /// The frontier for the next step.
    pub next_frontier: Vec<StageKind>,
    /// Channel versions after this step completed.
    pub state_versions: StateVersions,
    /// Whether the workflow has completed (reached End or empty frontier).
    pub completed: bool,
}

/// Internal outcome from scheduler after normalization.
///
/// Contains ordered partials ready for barrier application.
pub(crate) struct SchedulerOutcome {
    pub ran_stages: Vec<StageKind>,
    pub skipped_stages: Vec<StageKind>,
    pub partials: Vec<StagePartial>,
}
