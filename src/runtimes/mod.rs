//! Workflow runtime infrastructure for session management and stepwise execution.
//!
//! This module provides the core runtime components for executing compiled
//! workflows: the runner that drives supersteps, the session types that carry
//! state between steps, and the per-step reports callers can inspect.
//!
//! # Architecture
//!
//! - **[`WorkflowRunner`]** - Main orchestrator for stepwise workflow execution
//! - **[`SessionState`]** - In-memory representation of one run's state
//! - **[`StepReport`]** - Deterministic record of what one superstep did
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use followgraph::runtimes::WorkflowRunner;
//! use followgraph::state::VersionedState;
//! # async fn example(workflow: followgraph::workflow::Workflow) -> Result<(), Box<dyn std::error::Error>> {
//!
//! let mut runner = WorkflowRunner::new(workflow);
//! let initial_state = VersionedState::builder()
//!     .with_output("customer", serde_json::json!({"id": "C001"}))
//!     .build();
//!
//! // Create session and run to completion
//! runner.create_session("session_1".to_string(), initial_state)?;
//! let final_state = runner.run_until_complete("session_1").await?;
//! # Ok(())
//! # }
//! ```

pub mod execution;
pub mod runner;
pub mod session;

pub use execution::StepReport;
pub use runner::{RunnerError, WorkflowRunner};
pub use session::{SessionState, StateVersions};
