//! Concurrent stage scheduling for superstep execution.
//!
//! The scheduler owns the fan-out half of the execution model: given the
//! current frontier it decides which stages actually run, executes them
//! concurrently under a configurable limit, and hands the collected
//! [`StagePartial`](crate::stage::StagePartial)s back to the runner for the
//! barrier merge.
//!
//! Version gating keeps re-entrant frontiers cheap: a stage only runs when
//! some channel version moved past what that stage last observed.

pub mod scheduler;

pub use scheduler::{Scheduler, SchedulerError, SchedulerState, StepRunResult};
