//! GraphBuilder implementation for constructing analysis workflow graphs.
//!
//! This module contains the main GraphBuilder type and its fluent API
//! for constructing workflow graphs with stages and edges.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::edges::{ConditionalEdge, EdgePredicate};
use crate::stage::Stage;
use crate::types::StageKind;

/// Builder for constructing workflow graphs with fluent API.
///
/// `GraphBuilder` provides a builder pattern for constructing workflow graphs
/// by adding stages and edges before compiling to an executable
/// [`Workflow`](crate::workflow::Workflow). The graph is declared once at
/// process start and is immutable after compilation.
///
/// # Required Configuration
///
/// Every graph must have:
/// - At least one executable stage added via [`add_stage`](Self::add_stage)
/// - Edges connecting from `StageKind::Start` to define entry points
/// - Edges connecting to `StageKind::End` to define exit points
///
/// Note: `StageKind::Start` and `StageKind::End` are virtual endpoints and should
/// never be registered with `add_stage`. They exist only for structural definition.
///
/// # Examples
///
/// ## Simple Linear Workflow
/// ```
/// use followgraph::graphs::GraphBuilder;
/// use followgraph::types::StageKind;
///
/// # struct MyStage;
/// # #[async_trait::async_trait]
/// # impl followgraph::stage::Stage for MyStage {
/// #     async fn run(&self, _: followgraph::state::StateSnapshot, _: followgraph::stage::StageContext) -> Result<followgraph::stage::StagePartial, followgraph::stage::StageError> {
/// #         Ok(followgraph::stage::StagePartial::default())
/// #     }
/// # }
///
/// let workflow = GraphBuilder::new()
///     .add_stage(StageKind::Custom("summary".into()), MyStage)
///     .add_edge(StageKind::Start, StageKind::Custom("summary".into()))
///     .add_edge(StageKind::Custom("summary".into()), StageKind::End)
///     .compile()
///     .unwrap();
/// ```
///
/// ## Parallel Group with Fan-out
/// ```
/// use followgraph::graphs::GraphBuilder;
/// use followgraph::types::StageKind;
///
/// # struct MyStage;
/// # #[async_trait::async_trait]
/// # impl followgraph::stage::Stage for MyStage {
/// #     async fn run(&self, _: followgraph::state::StateSnapshot, _: followgraph::stage::StageContext) -> Result<followgraph::stage::StagePartial, followgraph::stage::StageError> {
/// #         Ok(followgraph::stage::StagePartial::default())
/// #     }
/// # }
///
/// // rfm and churn share the same upstream and run concurrently
/// let workflow = GraphBuilder::new()
///     .add_stage(StageKind::Custom("rfm".into()), MyStage)
///     .add_stage(StageKind::Custom("churn".into()), MyStage)
///     .add_edge(StageKind::Start, StageKind::Custom("rfm".into()))
///     .add_edge(StageKind::Start, StageKind::Custom("churn".into()))
///     .add_edge(StageKind::Custom("rfm".into()), StageKind::End)
///     .add_edge(StageKind::Custom("churn".into()), StageKind::End)
///     .compile()
///     .unwrap();
/// ```
pub struct GraphBuilder {
    /// Registry of all stages in the graph, keyed by their identifier.
    pub stages: FxHashMap<StageKind, Arc<dyn Stage>>,
    /// Unconditional edges defining static graph topology.
    pub edges: FxHashMap<StageKind, Vec<StageKind>>,
    /// Conditional edges for dynamic routing based on state.
    pub conditional_edges: Vec<ConditionalEdge>,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    /// Creates a new, empty graph builder.
    ///
    /// The builder starts with no stages or edges. Use the fluent API
    /// methods to add components before calling [`compile`](Self::compile).
    #[must_use]
    pub fn new() -> Self {
        Self {
            stages: FxHashMap::default(),
            edges: FxHashMap::default(),
            conditional_edges: Vec::new(),
        }
    }

    /// Adds a stage to the graph.
    ///
    /// NOTE: `StageKind::Start` and `StageKind::End` are virtual structural endpoints.
    /// If either is passed to `add_stage`, the registration is ignored and a warning
    /// is emitted. They are not stored in the stage registry and are never executed;
    /// the scheduler skips them automatically while still allowing edges from
    /// `Start` and to `End` for topology.
    ///
    /// # Parameters
    ///
    /// - `id`: Unique identifier for this stage in the graph
    /// - `stage`: Implementation of the [`Stage`] trait
    #[must_use]
    pub fn add_stage(mut self, id: StageKind, stage: impl Stage + 'static) -> Self {
        // Ignore attempts to register virtual Start/End stage kinds; emit a warning.
        match id {
            StageKind::Start | StageKind::End => {
                tracing::warn!(
                    ?id,
                    "Ignoring registration of virtual stage kind (Start/End are virtual)"
                );
                // Do not insert into registry.
            }
            _ => {
                self.stages.insert(id, Arc::new(stage));
            }
        }
        self
    }

    /// Adds an unconditional edge between two stages.
    ///
    /// Creates a direct connection from one stage to another. When the `from`
    /// stage completes execution, the scheduler will consider the `to` stage
    /// for execution in the next step. Multiple edges from the same stage
    /// create fan-out patterns, while multiple edges to the same stage
    /// create fan-in patterns.
    ///
    /// # Examples
    ///
    /// ```
    /// use followgraph::graphs::GraphBuilder;
    /// use followgraph::types::StageKind;
    ///
    /// # struct MyStage;
    /// # #[async_trait::async_trait]
    /// # impl followgraph::stage::Stage for MyStage {
    /// #     async fn run(&self, _: followgraph::state::StateSnapshot, _: followgraph::stage::StageContext) -> Result<followgraph::stage::StagePartial, followgraph::stage::StageError> {
    /// #         Ok(followgraph::stage::StagePartial::default())
    /// #     }
    /// # }
    ///
    /// let builder = GraphBuilder::new()
    ///     .add_stage(StageKind::Custom("summary".into()), MyStage)
    ///     .add_edge(StageKind::Start, StageKind::Custom("summary".into()))
    ///     .add_edge(StageKind::Custom("summary".into()), StageKind::End);
    /// ```
    #[must_use]
    pub fn add_edge(mut self, from: StageKind, to: StageKind) -> Self {
        self.edges.entry(from).or_default().push(to);
        self
    }

    /// Adds a conditional edge to the graph.
    ///
    /// Conditional edges enable dynamic routing based on the current state.
    /// When execution moves past the `from` stage, the `predicate` function is
    /// evaluated with the current [`StateSnapshot`](crate::state::StateSnapshot)
    /// and returns the target stage names for routing.
    ///
    /// # Parameters
    ///
    /// - `from`: The source stage for the conditional edge
    /// - `predicate`: Function that determines target stages based on state
    ///
    /// # Examples
    ///
    /// ```
    /// use followgraph::graphs::{GraphBuilder, EdgePredicate};
    /// use followgraph::types::StageKind;
    /// use std::sync::Arc;
    ///
    /// # struct MyStage;
    /// # #[async_trait::async_trait]
    /// # impl followgraph::stage::Stage for MyStage {
    /// #     async fn run(&self, _: followgraph::state::StateSnapshot, _: followgraph::stage::StageContext) -> Result<followgraph::stage::StagePartial, followgraph::stage::StageError> {
    /// #         Ok(followgraph::stage::StagePartial::default())
    /// #     }
    /// # }
    ///
    /// let predicate: EdgePredicate = Arc::new(|snapshot| {
    ///     let has_orders = snapshot
    ///         .outputs
    ///         .get("orders")
    ///         .and_then(|v| v.as_array())
    ///         .map(|a| !a.is_empty())
    ///         .unwrap_or(false);
    ///     if has_orders {
    ///         vec!["rfm".to_string(), "churn".to_string()]
    ///     } else {
    ///         vec!["no_history".to_string()]
    ///     }
    /// });
    ///
    /// let builder = GraphBuilder::new()
    ///     .add_stage(StageKind::Custom("rfm".into()), MyStage)
    ///     .add_stage(StageKind::Custom("churn".into()), MyStage)
    ///     .add_stage(StageKind::Custom("no_history".into()), MyStage)
    ///     .add_conditional_edge(StageKind::Start, predicate);
    /// ```
    #[must_use]
    pub fn add_conditional_edge(mut self, from: StageKind, predicate: EdgePredicate) -> Self {
        self.conditional_edges
            .push(ConditionalEdge::new(from, predicate));
        self
    }
}
