//! Edge types and routing predicates for conditional graph flow.
//!
//! This module contains the types and predicates used for dynamic routing
//! in the analysis graph, including conditional edges that can route based
//! on runtime state evaluation.

use crate::types::StageKind;
use std::sync::Arc;

/// Predicate function for conditional edge routing.
///
/// Takes a [`StateSnapshot`](crate::state::StateSnapshot) and returns target stage names to determine
/// which stages should be executed next. Predicates are used with
/// [`GraphBuilder::add_conditional_edge`](crate::graphs::GraphBuilder::add_conditional_edge) to create dynamic routing based
/// on the current state.
///
/// # Examples
///
/// ```
/// use followgraph::graphs::EdgePredicate;
/// use followgraph::types::StageKind;
/// use std::sync::Arc;
///
/// // Route customers without order history past the scoring stages
/// let route_by_history: EdgePredicate = Arc::new(|snapshot| {
///     let has_orders = snapshot
///         .outputs
///         .get("orders")
///         .and_then(|v| v.as_array())
///         .map(|a| !a.is_empty())
///         .unwrap_or(false);
///     if has_orders {
///         vec![
///             StageKind::Custom("rfm".into()).as_target(),
///             StageKind::Custom("churn".into()).as_target(),
///         ]
///     } else {
///         vec![StageKind::Custom("no_history".into()).as_target()]
///     }
/// });
///
/// // Route straight to End once a terminal marker is present
/// let route_by_done: EdgePredicate = Arc::new(|snapshot| {
///     if snapshot.outputs.contains_key("recommendations") {
///         vec![StageKind::end_target()]
///     } else {
///         vec![StageKind::Custom("recommend".into()).as_target()]
///     }
/// });
/// ```
pub type EdgePredicate =
    Arc<dyn Fn(crate::state::StateSnapshot) -> Vec<String> + Send + Sync + 'static>;

/// A conditional edge that routes based on a predicate function.
///
/// Conditional edges allow dynamic routing based on the current state. When
/// the runner expands the frontier past the `from` stage, it evaluates the
/// predicate function and routes to the returned target stages.
///
/// # Purpose
///
/// This type encapsulates conditional routing logic to enable clean builder patterns
/// and maintain consistency with other edge types. The private fields ensure that
/// conditional edges are constructed through proper APIs rather than direct field access.
///
/// # Examples
///
/// ```
/// use followgraph::graphs::{ConditionalEdge, EdgePredicate};
/// use followgraph::types::StageKind;
/// use std::sync::Arc;
///
/// let predicate: EdgePredicate = Arc::new(|snapshot| {
///     if snapshot.outputs.contains_key("orders") {
///         vec![StageKind::Custom("rfm".into()).as_target()]
///     } else {
///         vec![StageKind::Custom("no_history".into()).as_target()]
///     }
/// });
/// let edge = ConditionalEdge::new(StageKind::Start, predicate);
/// ```
#[derive(Clone)]
pub struct ConditionalEdge {
    /// The source stage for this conditional edge.
    from: StageKind,
    /// The predicate function that determines target stages.
    predicate: EdgePredicate,
}

impl ConditionalEdge {
    /// Creates a new conditional edge.
    ///
    /// # Parameters
    ///
    /// - `from`: The source stage identifier
    /// - `predicate`: The routing predicate function
    ///
    /// # Examples
    ///
    /// ```
    /// use followgraph::graphs::{ConditionalEdge, EdgePredicate};
    /// use followgraph::types::StageKind;
    /// use std::sync::Arc;
    ///
    /// let predicate: EdgePredicate = Arc::new(|_snapshot| {
    ///     vec![StageKind::Custom("summary".into()).as_target()]
    /// });
    ///
    /// let edge = ConditionalEdge::new(StageKind::Custom("churn".into()), predicate.clone());
    /// let edge2 = ConditionalEdge::new(StageKind::Start, predicate);
    /// ```
    pub fn new(from: impl Into<StageKind>, predicate: EdgePredicate) -> Self {
        Self {
            from: from.into(),
            predicate,
        }
    }

    /// Returns the source stage of this conditional edge.
    pub fn from(&self) -> &StageKind {
        &self.from
    }

    /// Returns the predicate function of this conditional edge.
    pub fn predicate(&self) -> &EdgePredicate {
        &self.predicate
    }
}
