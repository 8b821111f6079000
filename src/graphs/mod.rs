//! Graph definition and compilation for analysis workflows.
//!
//! This module provides the core graph building functionality for creating
//! workflow graphs with stages, edges, and conditional routing. The main
//! entry point is [`GraphBuilder`], which uses a builder pattern to
//! construct workflows that compile into executable
//! [`Workflow`](crate::workflow::Workflow) instances.
//!
//! # Core Concepts
//!
//! - **Stages**: Executable units of work implementing the [`Stage`](crate::stage::Stage) trait
//! - **Edges**: Connections between stages defining execution flow
//! - **Conditional Edges**: Dynamic routing based on state predicates
//! - **Virtual Endpoints**: `StageKind::Start` and `StageKind::End` for structural definition
//! - **Compilation**: Validation and conversion to an executable [`Workflow`](crate::workflow::Workflow)
//!
//! # Quick Start
//!
//! ```
//! use followgraph::graphs::GraphBuilder;
//! use followgraph::types::StageKind;
//!
//! # struct MyStage;
//! # #[async_trait::async_trait]
//! # impl followgraph::stage::Stage for MyStage {
//! #     async fn run(&self, _: followgraph::state::StateSnapshot, _: followgraph::stage::StageContext) -> Result<followgraph::stage::StagePartial, followgraph::stage::StageError> {
//! #         Ok(followgraph::stage::StagePartial::default())
//! #     }
//! # }
//!
//! let workflow = GraphBuilder::new()
//!     .add_stage(StageKind::Custom("summary".into()), MyStage)
//!     .add_edge(StageKind::Start, StageKind::Custom("summary".into()))
//!     .add_edge(StageKind::Custom("summary".into()), StageKind::End)
//!     .compile()
//!     .unwrap();
//! ```

mod builder;
mod compilation;
mod edges;

pub use builder::GraphBuilder;
pub use compilation::GraphCompileError;
pub use edges::{ConditionalEdge, EdgePredicate};
