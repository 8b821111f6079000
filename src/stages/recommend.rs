//! Recommendation stage: asks the remote analysis capability for exactly
//! three distinct follow-up actions, falling back to the rule table.

use std::sync::Arc;

use async_trait::async_trait;

use crate::analysis::{rule_based_recommendations, OrderStats};
use crate::channels::errors::{ChainedError, ErrorEvent};
use crate::config::ScoringConfig;
use crate::invoker::{OutputValidator, PromptSpec, SchemaViolation, StageInvoker};
use crate::models::{RecAction, Recommendation};
use crate::stage::{Stage, StageContext, StageError, StagePartial};
use crate::state::StateSnapshot;
use crate::utils::collections::new_output_map;
use crate::utils::json_ext::{array_field, str_field};

use super::{keys, names, read_as_of, read_orders, read_scores};

/// Produces the three-action recommendation list via the invoker.
#[derive(Clone, Debug)]
pub struct RecommendStage {
    invoker: StageInvoker,
    scoring: ScoringConfig,
}

impl RecommendStage {
    #[must_use]
    pub fn new(invoker: StageInvoker, scoring: ScoringConfig) -> Self {
        Self { invoker, scoring }
    }
}

#[async_trait]
impl Stage for RecommendStage {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: StageContext,
    ) -> Result<StagePartial, StageError> {
        let (rfm, churn) = read_scores(&snapshot)?;
        let orders = read_orders(&snapshot)?;
        let as_of = read_as_of(&snapshot)?;
        let stats = OrderStats::from_orders(&orders, as_of);

        let fallback = rule_based_recommendations(&stats, rfm, churn, &self.scoring);
        let spec = PromptSpec::new(
            names::RECOMMEND,
            build_prompt(rfm, churn, &stats),
            recommendations_validator(),
            serde_json::to_value(&fallback)?,
        );

        ctx.emit("invoke", "requesting follow-up recommendations")?;
        let invocation = self.invoker.invoke(&spec, &ctx.event_bus_sender).await;

        let mut outputs = new_output_map();
        outputs.insert(keys::RECOMMENDATIONS.to_string(), invocation.output.clone());

        let mut partial = StagePartial::new()
            .with_results(vec![invocation.result.clone()])
            .with_outputs(outputs);
        if invocation.is_fallback() {
            partial = partial.with_errors(vec![ErrorEvent::stage(
                names::RECOMMEND,
                ctx.step,
                ChainedError::msg("recommendations degraded to the rule table"),
            )
            .with_tag("fallback")]);
        }
        Ok(partial)
    }
}

/// Accepts an object with a `recommendations` array of exactly three items,
/// each a known action with a non-empty reason and no duplicates.
///
/// Normalizes to the bare array with canonical action spellings.
pub fn recommendations_validator() -> OutputValidator {
    Arc::new(|value| {
        let items = array_field(value, "recommendations").ok_or_else(|| {
            SchemaViolation::new("expected an object with a `recommendations` array")
        })?;
        if items.len() != 3 {
            return Err(SchemaViolation::new(format!(
                "expected exactly 3 recommendations, got {}",
                items.len()
            )));
        }

        let mut seen: Vec<RecAction> = Vec::with_capacity(3);
        let mut normalized: Vec<Recommendation> = Vec::with_capacity(3);
        for item in items {
            let action: RecAction = str_field(item, "action")
                .ok_or_else(|| SchemaViolation::new("recommendation missing string `action`"))?
                .parse()
                .map_err(SchemaViolation::new)?;
            let reason = str_field(item, "reason").map(str::trim).ok_or_else(|| {
                SchemaViolation::new("recommendation missing non-empty `reason`")
            })?;
            if seen.contains(&action) {
                return Err(SchemaViolation::new(format!("duplicate action {action}")));
            }
            seen.push(action);
            normalized.push(Recommendation::new(action, reason));
        }

        serde_json::to_value(normalized).map_err(|e| SchemaViolation::new(e.to_string()))
    })
}

fn build_prompt(rfm: u8, churn: f64, stats: &OrderStats) -> String {
    format!(
        "You are a sales analyst for a bakery supplier. Propose the three \
         most impactful follow-up actions for this customer, most impactful first.\n\
         Scores: rfm={rfm}, churn_risk={churn:.3}\n\
         History: {} orders, {:.2} average order value, last order {} days ago.\n\
         Allowed actions: call, email, offer_bundle, promo. Each action at most once.\n\
         Respond with JSON of the form \
         {{\"recommendations\": [{{\"action\": \"...\", \"reason\": \"...\"}}]}} \
         containing exactly three entries and nothing else.",
        stats.order_count, stats.avg_order_value, stats.days_since_last
    )
}
