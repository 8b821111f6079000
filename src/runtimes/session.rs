//! Session state management for workflow execution.
//!
//! This module defines the core types for managing session state during
//! workflow execution. A session is one in-flight run: its versioned state,
//! its frontier, and the scheduler bookkeeping that carries across steps.

use crate::schedulers::{Scheduler, SchedulerState};
use crate::state::VersionedState;
use crate::types::StageKind;

/// Session state carried across steps of one workflow run.
///
/// # Examples
///
/// ```rust
/// use followgraph::runtimes::SessionState;
/// use followgraph::schedulers::{Scheduler, SchedulerState};
/// use followgraph::state::VersionedState;
/// use followgraph::types::StageKind;
///
/// let session = SessionState {
///     state: VersionedState::builder()
///         .with_output("customer", serde_json::json!({"id": "C001"}))
///         .build(),
///     step: 0,
///     frontier: vec![StageKind::Custom("rfm".into())],
///     scheduler: Scheduler::new(4),
///     scheduler_state: SchedulerState::default(),
/// };
///
/// assert_eq!(session.step, 0);
/// ```
#[derive(Debug, Clone)]
pub struct SessionState {
    /// The versioned state containing stage results, outputs, and errors.
    pub state: VersionedState,
    /// The current step number in the workflow execution.
    pub step: u64,
    /// The current execution frontier - stages to be processed next.
    pub frontier: Vec<StageKind>,
    /// The scheduler managing concurrent stage execution.
    pub scheduler: Scheduler,
    /// Internal scheduler tracking state.
    pub scheduler_state: SchedulerState,
}

/// Snapshot of channel versions for tracking state evolution.
///
/// Used to detect state changes between steps and enable version-based
/// gating in the scheduler.
#[derive(Debug, Clone)]
pub struct StateVersions {
    /// Version counter for the stage results channel.
    pub results_version: u32,
    /// Version counter for the keyed outputs channel.
    pub outputs_version: u32,
    /// Version counter for the errors channel.
    pub errors_version: u32,
}
