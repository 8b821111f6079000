//! Domain data model for customer follow-up analysis.
//!
//! These are the externally-sourced records ([`OrderRecord`], [`CustomerProfile`]),
//! the derived analysis values ([`ScoreSet`], [`Recommendation`]), the per-stage
//! telemetry record ([`StageResult`]), and the assembled outputs
//! ([`CustomerAnalysis`], [`FollowUpQueue`]).
//!
//! All types serialize with serde so they can flow through the versioned state
//! channels as JSON and out to callers unchanged.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A single sales order line, sourced externally and never mutated.
///
/// # Examples
///
/// ```
/// use followgraph::models::OrderRecord;
///
/// let order = OrderRecord::new("C001", "SO-101", "2025-08-20", "CAKE-CHOC", 3, 12.50);
/// assert_eq!(order.total(), 37.50);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub customer_id: String,
    pub order_id: String,
    pub order_date: NaiveDate,
    pub sku: String,
    pub quantity: u32,
    pub unit_price: f64,
}

impl OrderRecord {
    /// Creates an order record. `order_date` must be `YYYY-MM-DD`.
    ///
    /// # Panics
    /// Panics on an unparseable date; intended for fixtures and seed data
    /// where the literal is known-good.
    #[must_use]
    pub fn new(
        customer_id: &str,
        order_id: &str,
        order_date: &str,
        sku: &str,
        quantity: u32,
        unit_price: f64,
    ) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            order_id: order_id.to_string(),
            order_date: NaiveDate::parse_from_str(order_date, "%Y-%m-%d")
                .unwrap_or_else(|e| panic!("bad order date {order_date:?}: {e}")),
            sku: sku.to_string(),
            quantity,
            unit_price,
        }
    }

    /// Line total: quantity times unit price.
    #[must_use]
    pub fn total(&self) -> f64 {
        f64::from(self.quantity) * self.unit_price
    }
}

/// Master data for one customer, sourced externally and never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub id: String,
    /// Free-text identifying field; redacted before any telemetry emission.
    pub name: String,
    pub segment: String,
    pub territory: String,
    pub credit_terms: String,
}

impl CustomerProfile {
    #[must_use]
    pub fn new(id: &str, name: &str, segment: &str, territory: &str, credit_terms: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            segment: segment.to_string(),
            territory: territory.to_string(),
            credit_terms: credit_terms.to_string(),
        }
    }
}

/// Composite scores for one customer.
///
/// `priority` is always derivable from `(rfm, churn_risk)` via
/// [`crate::analysis::priority_for`]; it is stored here so ranking and
/// reporting do not recompute it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreSet {
    /// Composite RFM score, 0 (worst) to 100 (best).
    pub rfm: u8,
    /// Estimated churn probability in `[0.0, 1.0]`.
    pub churn_risk: f64,
    /// Follow-up priority, 1 (lowest) to 5 (highest).
    pub priority: u8,
}

/// The follow-up actions a recommendation may propose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecAction {
    Call,
    Email,
    OfferBundle,
    Promo,
}

impl RecAction {
    /// Every allowed action, in no particular order. Used by output
    /// validation to reject values outside the enumeration.
    pub const ALL: [RecAction; 4] = [
        RecAction::Call,
        RecAction::Email,
        RecAction::OfferBundle,
        RecAction::Promo,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RecAction::Call => "call",
            RecAction::Email => "email",
            RecAction::OfferBundle => "offer_bundle",
            RecAction::Promo => "promo",
        }
    }
}

impl fmt::Display for RecAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" | "phone" | "phone_call" => Ok(RecAction::Call),
            "email" | "mail" => Ok(RecAction::Email),
            "offer_bundle" | "bundle" => Ok(RecAction::OfferBundle),
            "promo" | "promotion" | "discount" => Ok(RecAction::Promo),
            other => Err(format!("unknown action {other:?}")),
        }
    }
}

/// One recommended follow-up action with its rationale.
///
/// A customer always receives exactly three, ordered by expected impact,
/// with no duplicate actions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: RecAction,
    pub reason: String,
}

impl Recommendation {
    #[must_use]
    pub fn new(action: RecAction, reason: &str) -> Self {
        Self {
            action,
            reason: reason.to_string(),
        }
    }
}

/// Telemetry record for one stage execution, successful or degraded.
///
/// One of these is appended to the results channel for every stage that
/// runs; the stage's actual product goes to the outputs channel instead.
///
/// # Examples
///
/// ```
/// use followgraph::models::StageResult;
///
/// let local = StageResult::local("rfm", 2);
/// assert!(!local.failed);
/// assert_eq!(local.cost_usd, 0.0);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// Stage name as registered in the workflow graph.
    pub stage: String,
    /// True when the recorded output is a fallback produced after retries
    /// or timeout were exhausted.
    pub failed: bool,
    /// Retries performed beyond the first attempt.
    pub retries: u32,
    pub latency_ms: u64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost_usd: f64,
}

impl StageResult {
    /// Record for a purely local stage: no tokens, no cost.
    #[must_use]
    pub fn local(stage: &str, latency_ms: u64) -> Self {
        Self {
            stage: stage.to_string(),
            failed: false,
            retries: 0,
            latency_ms,
            tokens_in: 0,
            tokens_out: 0,
            cost_usd: 0.0,
        }
    }
}

/// One entry in the daily follow-up queue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FollowUpEntry {
    pub customer_id: String,
    pub name: String,
    pub priority: u8,
    pub churn_risk: f64,
    pub rfm: u8,
    /// Locally derived suggestion; the queue never consults the remote
    /// analysis capability.
    pub action: RecAction,
}

/// The ordered daily follow-up queue for one date.
///
/// Recomputed on every request and never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FollowUpQueue {
    pub date: NaiveDate,
    pub entries: Vec<FollowUpEntry>,
}

impl FollowUpQueue {
    /// Number of customers queued for the day.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

/// The assembled result of analyzing one customer.
///
/// This is what the handler body hands back to the (out-of-scope) request
/// surface. A degraded stage never aborts the run; it is listed in
/// `degraded_stages` and its telemetry shows `failed: true`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomerAnalysis {
    pub run_id: Uuid,
    pub customer_id: String,
    pub customer_name: String,
    pub segment: String,
    /// True for the zero-order path: minimum scores, no remote stages run.
    pub no_order_history: bool,
    pub scores: ScoreSet,
    pub summary: String,
    pub recommendations: Vec<Recommendation>,
    /// The daily follow-up ordering across the whole customer set, so a
    /// caller can see where this customer sits today.
    pub followup_order: Vec<String>,
    /// Names of stages whose output is a fallback.
    pub degraded_stages: Vec<String>,
    pub stage_results: Vec<StageResult>,
    pub total_cost_usd: f64,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// Verifies order line totals multiply quantity by unit price.
    fn test_order_total() {
        let order = OrderRecord::new("C001", "SO-101", "2025-08-20", "CAKE-CHOC", 3, 12.50);
        assert_eq!(order.total(), 37.50);
        assert_eq!(order.order_date.to_string(), "2025-08-20");
    }

    #[test]
    /// Checks action parsing accepts canonical names and common aliases.
    fn test_action_parsing() {
        assert_eq!("call".parse::<RecAction>().unwrap(), RecAction::Call);
        assert_eq!("Email".parse::<RecAction>().unwrap(), RecAction::Email);
        assert_eq!(
            "offer_bundle".parse::<RecAction>().unwrap(),
            RecAction::OfferBundle
        );
        assert_eq!("discount".parse::<RecAction>().unwrap(), RecAction::Promo);
        assert!("carrier_pigeon".parse::<RecAction>().is_err());
    }

    #[test]
    /// Display and serde agree on the wire spelling of actions.
    fn test_action_wire_format() {
        for action in RecAction::ALL {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{action}\""));
            let back: RecAction = serde_json::from_str(&json).unwrap();
            assert_eq!(back, action);
        }
    }

    #[test]
    /// Local stage results carry latency but no token usage or cost.
    fn test_local_stage_result() {
        let result = StageResult::local("churn", 4);
        assert_eq!(result.stage, "churn");
        assert!(!result.failed);
        assert_eq!(result.retries, 0);
        assert_eq!(result.latency_ms, 4);
        assert_eq!(result.tokens_in, 0);
        assert_eq!(result.cost_usd, 0.0);
    }

    #[test]
    /// Queue count reflects the number of entries.
    fn test_queue_count() {
        let queue = FollowUpQueue {
            date: NaiveDate::from_ymd_opt(2025, 8, 21).unwrap(),
            entries: vec![],
        };
        assert_eq!(queue.count(), 0);
    }

    #[test]
    /// Round-trips a score set through JSON.
    fn test_scoreset_serialization() {
        let scores = ScoreSet {
            rfm: 72,
            churn_risk: 0.35,
            priority: 4,
        };
        let json = serde_json::to_string(&scores).unwrap();
        let back: ScoreSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scores);
    }
}
