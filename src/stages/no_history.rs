//! Terminal stage for customers without any order history.
//!
//! Replaces the whole scoring-and-analysis pipeline in one step: minimum
//! scores, a canned summary, and rule-based recommendations, with no remote
//! invocation at any point.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use crate::analysis::{rule_based_recommendations, score_set, OrderStats};
use crate::config::ScoringConfig;
use crate::models::StageResult;
use crate::stage::{Stage, StageContext, StageError, StagePartial};
use crate::state::StateSnapshot;
use crate::utils::collections::new_output_map;

use super::{keys, names};

const NO_HISTORY_SUMMARY: &str = "New account with no recorded orders. Scores reflect \
    the missing history rather than observed behavior; begin with an introductory \
    contact to establish the relationship.";

/// Assigns introductory scores and guidance without touching the network.
#[derive(Clone, Debug)]
pub struct NoHistoryStage {
    config: ScoringConfig,
}

impl NoHistoryStage {
    #[must_use]
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Stage for NoHistoryStage {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        ctx: StageContext,
    ) -> Result<StagePartial, StageError> {
        let started = Instant::now();
        let stats = OrderStats::default();
        let scores = score_set(&stats, &self.config);
        let recommendations =
            rule_based_recommendations(&stats, scores.rfm, scores.churn_risk, &self.config);

        ctx.emit("scoring", "no order history; assigning introductory scores")?;

        let mut outputs = new_output_map();
        outputs.insert(keys::RFM.to_string(), json!(scores.rfm));
        outputs.insert(keys::RFM_NO_HISTORY.to_string(), json!(true));
        outputs.insert(keys::CHURN_RISK.to_string(), json!(scores.churn_risk));
        outputs.insert(keys::SUMMARY.to_string(), json!(NO_HISTORY_SUMMARY));
        outputs.insert(
            keys::RECOMMENDATIONS.to_string(),
            serde_json::to_value(recommendations)?,
        );

        Ok(StagePartial::new()
            .with_results(vec![StageResult::local(
                names::NO_HISTORY,
                started.elapsed().as_millis() as u64,
            )])
            .with_outputs(outputs))
    }
}
