//! Core identifier types for the followgraph engine.
//!
//! This module defines the fundamental types used throughout the system for
//! identifying stages and state channels in the analysis workflow graph.
//!
//! # Key Types
//!
//! - [`StageKind`]: Identifies a stage in the workflow graph
//! - [`ChannelType`]: Identifies a versioned state channel
//!
//! # Examples
//!
//! ```rust
//! use followgraph::types::{StageKind, ChannelType};
//!
//! let start = StageKind::Start;
//! let rfm = StageKind::Custom("rfm".to_string());
//!
//! let encoded = rfm.encode();
//! assert_eq!(encoded, "Stage:rfm");
//!
//! let channel = ChannelType::Outputs;
//! println!("Channel: {}", channel);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a stage within the analysis workflow graph.
///
/// `StageKind` is the unique identifier for stages in the execution graph.
/// `Start` and `End` are virtual endpoints used only for topology; they are
/// never registered with an implementation and never executed. Real work
/// happens in `Custom` stages ("rfm", "churn", "summary", ...).
///
/// # Examples
///
/// ```rust
/// use followgraph::types::StageKind;
///
/// let churn = StageKind::Custom("churn".to_string());
///
/// // Encode/decode round-trip for reports and error scopes
/// let encoded = churn.encode();
/// let decoded = StageKind::decode(&encoded);
/// assert_eq!(churn, decoded);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    /// Virtual entry point; the initial frontier of every execution.
    ///
    /// Must never be registered with an implementation. Every graph declares
    /// at least one edge out of `Start`.
    Start,

    /// Virtual terminal endpoint; reaching it completes a workflow branch.
    End,

    /// A named executable stage.
    ///
    /// The name should be short and unique within the graph; the built-in
    /// analysis graph uses the names in [`crate::stages::names`].
    Custom(String),
}

impl StageKind {
    /// Encode a StageKind into its string form, used in step reports and
    /// error scopes.
    ///
    /// - `Start` → `"Start"`
    /// - `End` → `"End"`
    /// - `Custom("rfm")` → `"Stage:rfm"`
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            StageKind::Start => "Start".to_string(),
            StageKind::End => "End".to_string(),
            StageKind::Custom(s) => format!("Stage:{s}"),
        }
    }

    /// Decode the string form back into a StageKind.
    ///
    /// Unrecognized formats fall back to `Custom(s)` so older reports stay
    /// readable.
    pub fn decode(s: &str) -> Self {
        if s == "Start" {
            StageKind::Start
        } else if s == "End" {
            StageKind::End
        } else if let Some(rest) = s.strip_prefix("Stage:") {
            StageKind::Custom(rest.to_string())
        } else {
            StageKind::Custom(s.to_string())
        }
    }

    /// String form used by conditional edge predicates to name this stage
    /// as a routing target.
    ///
    /// Targets use the bare stage name; `"End"` routes to the virtual
    /// terminal endpoint.
    #[must_use]
    pub fn as_target(&self) -> String {
        match self {
            StageKind::Start => "Start".to_string(),
            StageKind::End => "End".to_string(),
            StageKind::Custom(s) => s.clone(),
        }
    }

    /// Routing target naming the virtual [`End`](Self::End) endpoint.
    #[must_use]
    pub fn end_target() -> String {
        "End".to_string()
    }

    /// Returns `true` if this is the virtual [`Start`](Self::Start) endpoint.
    #[must_use]
    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }

    /// Returns `true` if this is the virtual [`End`](Self::End) endpoint.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }

    /// Returns `true` if this is an executable stage.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "Start"),
            Self::End => write!(f, "End"),
            Self::Custom(name) => write!(f, "{}", name),
        }
    }
}

// Developer experience: allow string literals where a StageKind is expected.
impl From<&str> for StageKind {
    fn from(s: &str) -> Self {
        match s {
            "Start" => StageKind::Start,
            "End" => StageKind::End,
            other => StageKind::Custom(other.to_string()),
        }
    }
}

/// Identifies one of the versioned state channels.
///
/// Each channel has its own reducer and update semantics: stage results are
/// appended, outputs are merged key-by-key, errors are appended.
///
/// # Examples
///
/// ```rust
/// use followgraph::types::ChannelType;
///
/// let outputs = ChannelType::Outputs;
/// println!("Merging {} channel", outputs);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    /// Append-only log of per-stage telemetry records.
    ///
    /// Every executed stage contributes one [`StageResult`](crate::models::StageResult)
    /// describing latency, token usage, cost, and failure status.
    Results,

    /// Key-value store of analysis outputs.
    ///
    /// Stages publish their products here (scores, summary text,
    /// recommendations) for downstream stages and the final report.
    Outputs,

    /// Append-only log of error events.
    ///
    /// Collects degradations and faults that did not halt execution, plus
    /// any runtime failures injected by the runner.
    Errors,
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Results => write!(f, "results"),
            Self::Outputs => write!(f, "outputs"),
            Self::Errors => write!(f, "errors"),
        }
    }
}
