//! Summary stage: renders the customer context into a prompt and asks the
//! remote analysis capability for a short narrative summary.
//!
//! Runs after both scoring stages. When the invocation degrades, a
//! deterministic summary built from the scores is substituted and the
//! degradation is recorded on the errors channel.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::analysis::OrderStats;
use crate::channels::errors::{ChainedError, ErrorEvent};
use crate::invoker::{OutputValidator, PromptSpec, SchemaViolation, StageInvoker};
use crate::stage::{Stage, StageContext, StageError, StagePartial};
use crate::state::StateSnapshot;
use crate::utils::collections::new_output_map;
use crate::utils::json_ext::str_field;

use super::{keys, names, read_as_of, read_orders, read_scores};

const MAX_SUMMARY_CHARS: usize = 1000;

/// Produces the narrative summary via the invoker.
#[derive(Clone, Debug)]
pub struct SummaryStage {
    invoker: StageInvoker,
}

impl SummaryStage {
    #[must_use]
    pub fn new(invoker: StageInvoker) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl Stage for SummaryStage {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: StageContext,
    ) -> Result<StagePartial, StageError> {
        let (rfm, churn) = read_scores(&snapshot)?;
        let orders = read_orders(&snapshot)?;
        let as_of = read_as_of(&snapshot)?;
        let stats = OrderStats::from_orders(&orders, as_of);
        let customer = snapshot.output(keys::CUSTOMER).cloned().unwrap_or(Value::Null);

        let spec = PromptSpec::new(
            names::SUMMARY,
            build_prompt(&customer, rfm, churn, &stats),
            summary_validator(),
            json!(fallback_summary(rfm, churn, &stats)),
        );

        ctx.emit("invoke", "requesting customer summary")?;
        let invocation = self.invoker.invoke(&spec, &ctx.event_bus_sender).await;

        let mut outputs = new_output_map();
        outputs.insert(keys::SUMMARY.to_string(), invocation.output.clone());

        let mut partial = StagePartial::new()
            .with_results(vec![invocation.result.clone()])
            .with_outputs(outputs);
        if invocation.is_fallback() {
            partial = partial.with_errors(vec![ErrorEvent::stage(
                names::SUMMARY,
                ctx.step,
                ChainedError::msg("summary degraded to rule-based text"),
            )
            .with_tag("fallback")]);
        }
        Ok(partial)
    }
}

/// Accepts an object with a non-empty `summary` string of sane length and
/// normalizes it to the bare string.
pub fn summary_validator() -> OutputValidator {
    Arc::new(|value| {
        let summary = str_field(value, "summary").ok_or_else(|| {
            SchemaViolation::new("expected an object with a non-empty `summary` string")
        })?;
        let trimmed = summary.trim();
        if trimmed.len() > MAX_SUMMARY_CHARS {
            return Err(SchemaViolation::new(format!(
                "summary text exceeds {MAX_SUMMARY_CHARS} characters"
            )));
        }
        Ok(Value::String(trimmed.to_string()))
    })
}

fn build_prompt(customer: &Value, rfm: u8, churn: f64, stats: &OrderStats) -> String {
    format!(
        "You are a sales analyst for a bakery supplier. Write a 2-3 sentence \
         summary of this customer for the account manager.\n\
         Customer: {customer}\n\
         Scores: rfm={rfm}, churn_risk={churn:.3}\n\
         History: {} orders, {:.2} total, {:.2} average, last order {} days ago.\n\
         Respond with JSON of the form {{\"summary\": \"...\"}} and nothing else.",
        stats.order_count, stats.total_spent, stats.avg_order_value, stats.days_since_last
    )
}

fn fallback_summary(rfm: u8, churn: f64, stats: &OrderStats) -> String {
    format!(
        "Account with RFM {rfm} and churn risk {churn:.2}: {} orders on record, \
         the last {} days ago. Narrative summary unavailable; scores and \
         rule-based guidance apply.",
        stats.order_count, stats.days_since_last
    )
}
