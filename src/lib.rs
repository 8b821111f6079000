//! # Followgraph: Graph-driven Sales Follow-up Analysis
//!
//! Followgraph runs customer follow-up analysis as a concurrent workflow:
//! scoring stages execute in parallel over versioned state, remote analysis
//! stages degrade to deterministic fallbacks instead of failing, and the
//! result is an assembled report plus a ranked daily follow-up queue.
//!
//! ## Core Concepts
//!
//! - **Stages**: Async units of analysis that process state snapshots
//! - **State**: Versioned, channel-based state owned by one run
//! - **Graph**: Declarative workflow definition with conditional routing
//! - **Scheduler**: Concurrent superstep execution with version gating
//! - **Invoker**: Timeout, bounded retries, and fallback at the remote boundary
//!
//! ## Quick Start
//!
//! ### Analyzing a customer
//!
//! ```
//! use followgraph::config::EngineConfig;
//! use followgraph::engine::FollowUpEngine;
//! use followgraph::invoker::OfflineClient;
//! use followgraph::sources::InMemorySource;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = FollowUpEngine::new(
//!     EngineConfig::default(),
//!     Arc::new(InMemorySource::with_sample_data()),
//!     Arc::new(OfflineClient),
//! )?;
//!
//! let as_of = "2025-08-21".parse()?;
//! let report = engine.analyze_as_of("C001", as_of).await?;
//! assert_eq!(report.recommendations.len(), 3);
//! assert!(report.scores.priority >= 1 && report.scores.priority <= 5);
//! # Ok(())
//! # }
//! ```
//!
//! ### Building a custom workflow
//!
//! ```
//! use followgraph::{
//!     graphs::GraphBuilder,
//!     stage::{Stage, StageContext, StagePartial},
//!     state::VersionedState,
//!     types::StageKind,
//! };
//! use async_trait::async_trait;
//! use serde_json::json;
//!
//! struct MarkerStage;
//!
//! #[async_trait]
//! impl Stage for MarkerStage {
//!     async fn run(
//!         &self,
//!         _snapshot: followgraph::state::StateSnapshot,
//!         _ctx: StageContext,
//!     ) -> Result<StagePartial, followgraph::stage::StageError> {
//!         let mut outputs = followgraph::utils::collections::new_output_map();
//!         outputs.insert("marker".to_string(), json!(true));
//!         Ok(StagePartial::new().with_outputs(outputs))
//!     }
//! }
//!
//! # fn main() -> Result<(), followgraph::graphs::GraphCompileError> {
//! let workflow = GraphBuilder::new()
//!     .add_stage(StageKind::Custom("marker".into()), MarkerStage)
//!     .add_edge(StageKind::Start, StageKind::Custom("marker".into()))
//!     .add_edge(StageKind::Custom("marker".into()), StageKind::End)
//!     .compile()?;
//! assert_eq!(workflow.stages().len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ### State Management
//!
//! ```
//! use followgraph::state::VersionedState;
//! use serde_json::json;
//!
//! let state = VersionedState::builder()
//!     .with_output("customer", json!({"id": "C002", "segment": "Cafe"}))
//!     .with_output("orders", json!([]))
//!     .build();
//!
//! let snapshot = state.snapshot();
//! assert_eq!(snapshot.outputs_version, 1);
//! ```
//!
//! ## Degradation Contract
//!
//! Remote stages never abort a run. A timed-out invocation falls back
//! immediately; transport failures and schema violations retry up to the
//! configured cap and then fall back. Every fallback is visible as a
//! `failed` telemetry record, an entry in the report's `degraded_stages`,
//! and an event on the bus.
//!
//! ## Module Guide
//!
//! - [`engine`] - The façade: graph assembly, analysis runs, daily queues
//! - [`analysis`] - Pure RFM, churn, priority, and rule-table math
//! - [`stages`] - The five workflow stages wired into the graph
//! - [`invoker`] - Timeout/retry/fallback harness over a model client
//! - [`sources`] - Customer master data and order history access
//! - [`state`] - Versioned state management and snapshots
//! - [`graphs`] - Workflow graph definition and compilation
//! - [`schedulers`] - Concurrent superstep execution
//! - [`runtimes`] - Session management and the workflow runner
//! - [`channels`] - Channel-based state storage and versioning
//! - [`reducers`] - State merge strategies applied at the barrier
//! - [`telemetry`] - Event formatting and PII redaction

pub mod analysis;
pub mod channels;
pub mod config;
pub mod engine;
pub mod event_bus;
pub mod graphs;
pub mod invoker;
pub mod models;
pub mod ranking;
pub mod reducers;
pub mod runtimes;
pub mod schedulers;
pub mod sources;
pub mod stage;
pub mod stages;
pub mod state;
pub mod telemetry;
pub mod types;
pub mod utils;
pub mod workflow;
