//! The analysis stages wired into the follow-up workflow graph.
//!
//! Five stages cover the two analysis paths:
//!
//! - [`RfmStage`] and [`ChurnStage`] run in parallel and score locally.
//! - [`SummaryStage`] then [`RecommendStage`] call the remote analysis
//!   capability through the invoker, falling back deterministically.
//! - [`NoHistoryStage`] replaces all four for customers without orders.
//!
//! Stages communicate exclusively through the outputs channel using the
//! keys in [`keys`]; the engine seeds the request keys before the run.

use chrono::NaiveDate;
use serde_json::Value;

use crate::models::OrderRecord;
use crate::stage::StageError;
use crate::state::StateSnapshot;

mod no_history;
mod recommend;
mod scoring;
mod summary;

pub use no_history::NoHistoryStage;
pub use recommend::{recommendations_validator, RecommendStage};
pub use scoring::{ChurnStage, RfmStage};
pub use summary::{summary_validator, SummaryStage};

/// Stage names as registered in the workflow graph.
pub mod names {
    pub const RFM: &str = "rfm";
    pub const CHURN: &str = "churn";
    pub const SUMMARY: &str = "summary";
    pub const RECOMMEND: &str = "recommend";
    pub const NO_HISTORY: &str = "no_history";
}

/// Output channel keys: request inputs seeded by the engine plus the
/// products each stage contributes.
pub mod keys {
    /// Customer profile JSON, seeded per request.
    pub const CUSTOMER: &str = "customer";
    /// Order history array, seeded per request.
    pub const ORDERS: &str = "orders";
    /// Reference date (`YYYY-MM-DD`) for recency math, seeded per request.
    pub const AS_OF: &str = "as_of";
    /// RFM score, 0-100.
    pub const RFM: &str = "rfm";
    /// True when the score reflects an empty order history.
    pub const RFM_NO_HISTORY: &str = "rfm_no_history";
    /// Churn probability, 0.0-1.0.
    pub const CHURN_RISK: &str = "churn_risk";
    /// Customer summary text.
    pub const SUMMARY: &str = "summary";
    /// Array of exactly three recommendation objects.
    pub const RECOMMENDATIONS: &str = "recommendations";
}

/// Decode the seeded order history from a snapshot.
pub(crate) fn read_orders(snapshot: &StateSnapshot) -> Result<Vec<OrderRecord>, StageError> {
    let value = snapshot
        .output(keys::ORDERS)
        .ok_or(StageError::MissingInput {
            what: "orders array",
        })?;
    Ok(serde_json::from_value(value.clone())?)
}

/// Decode the seeded reference date from a snapshot.
pub(crate) fn read_as_of(snapshot: &StateSnapshot) -> Result<NaiveDate, StageError> {
    let value = snapshot
        .output(keys::AS_OF)
        .and_then(Value::as_str)
        .ok_or(StageError::MissingInput {
            what: "as_of date string",
        })?;
    value
        .parse()
        .map_err(|e| StageError::ValidationFailed(format!("bad as_of date {value:?}: {e}")))
}

/// Read the scores produced by the parallel scoring stages.
pub(crate) fn read_scores(snapshot: &StateSnapshot) -> Result<(u8, f64), StageError> {
    let rfm = snapshot
        .output(keys::RFM)
        .and_then(Value::as_u64)
        .ok_or(StageError::MissingInput { what: "rfm score" })?;
    let churn = snapshot
        .output(keys::CHURN_RISK)
        .and_then(Value::as_f64)
        .ok_or(StageError::MissingInput {
            what: "churn_risk score",
        })?;
    Ok((rfm.min(100) as u8, churn))
}
