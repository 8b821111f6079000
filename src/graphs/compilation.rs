//! Graph compilation: validating a [`GraphBuilder`] and producing an
//! executable [`Workflow`].
//!
//! Compilation is the single point where structural mistakes surface.
//! After `compile()` succeeds the topology is frozen; the runner never
//! revalidates it.

use miette::Diagnostic;
use thiserror::Error;

use super::builder::GraphBuilder;
use crate::types::StageKind;
use crate::workflow::Workflow;

/// Errors that can occur when compiling a graph into a [`Workflow`].
#[derive(Debug, Error, Diagnostic)]
pub enum GraphCompileError {
    /// The builder contains no executable stages.
    #[error("graph has no stages registered")]
    #[diagnostic(
        code(followgraph::graphs::empty),
        help("Register at least one stage with GraphBuilder::add_stage before compiling.")
    )]
    EmptyGraph,

    /// No edge (static or conditional) leaves the virtual `Start` stage,
    /// so execution could never begin.
    #[error("graph has no entry edge from Start")]
    #[diagnostic(
        code(followgraph::graphs::missing_entry),
        help("Add an edge or conditional edge from StageKind::Start to an executable stage.")
    )]
    MissingEntry,

    /// A static edge references a stage that was never registered.
    #[error("edge {from} -> {to} references an unknown stage")]
    #[diagnostic(
        code(followgraph::graphs::unknown_edge_target),
        help("Every edge endpoint must be Start, End, or a stage registered with add_stage.")
    )]
    UnknownEdgeTarget {
        /// Source endpoint of the offending edge.
        from: StageKind,
        /// Target endpoint of the offending edge.
        to: StageKind,
    },

    /// The static edges form a cycle, which would make a run never terminate.
    #[error("static edges form a cycle through stage {stage}")]
    #[diagnostic(
        code(followgraph::graphs::cycle),
        help("Remove the back edge; workflows must be acyclic over their static edges.")
    )]
    Cycle {
        /// A stage that participates in the detected cycle.
        stage: StageKind,
    },
}

impl GraphBuilder {
    /// Compiles the graph definition into an executable [`Workflow`].
    ///
    /// Validates the topology before handing it to the runtime:
    ///
    /// - at least one executable stage is registered,
    /// - some edge (static or conditional) leaves `Start`,
    /// - every static edge endpoint is `Start`, `End`, or a registered stage,
    /// - the static edges are acyclic.
    ///
    /// Conditional edge targets are strings resolved at runtime, so they are
    /// checked when the predicate fires rather than here.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphCompileError`] describing the first structural
    /// problem found.
    pub fn compile(self) -> Result<Workflow, GraphCompileError> {
        if self.stages.is_empty() {
            return Err(GraphCompileError::EmptyGraph);
        }

        let has_static_entry = self
            .edges
            .get(&StageKind::Start)
            .is_some_and(|targets| !targets.is_empty());
        let has_conditional_entry = self
            .conditional_edges
            .iter()
            .any(|edge| edge.from().is_start());
        if !has_static_entry && !has_conditional_entry {
            return Err(GraphCompileError::MissingEntry);
        }

        for (from, targets) in &self.edges {
            if !from.is_start() && !self.stages.contains_key(from) {
                return Err(GraphCompileError::UnknownEdgeTarget {
                    from: from.clone(),
                    to: targets.first().cloned().unwrap_or(StageKind::End),
                });
            }
            for to in targets {
                if !to.is_end() && !self.stages.contains_key(to) {
                    return Err(GraphCompileError::UnknownEdgeTarget {
                        from: from.clone(),
                        to: to.clone(),
                    });
                }
            }
        }

        detect_cycle(&self)?;

        Ok(Workflow::from_parts(
            self.stages,
            self.edges,
            self.conditional_edges,
        ))
    }
}

/// Depth-first search over the static edges looking for a back edge.
///
/// Conditional edges are excluded: their targets depend on runtime state and
/// routing through them is bounded by the predicates themselves.
fn detect_cycle(builder: &GraphBuilder) -> Result<(), GraphCompileError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit(
        node: &StageKind,
        edges: &rustc_hash::FxHashMap<StageKind, Vec<StageKind>>,
        marks: &mut rustc_hash::FxHashMap<StageKind, Mark>,
    ) -> Result<(), GraphCompileError> {
        match marks.get(node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(GraphCompileError::Cycle {
                    stage: node.clone(),
                });
            }
            None => {}
        }
        marks.insert(node.clone(), Mark::Visiting);
        if let Some(targets) = edges.get(node) {
            for next in targets {
                visit(next, edges, marks)?;
            }
        }
        marks.insert(node.clone(), Mark::Done);
        Ok(())
    }

    let mut marks = rustc_hash::FxHashMap::default();
    for from in builder.edges.keys() {
        visit(from, &builder.edges, &mut marks)?;
    }
    Ok(())
}
