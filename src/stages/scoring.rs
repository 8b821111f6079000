//! Local scoring stages: RFM and churn risk.
//!
//! Both read the seeded order history, derive [`OrderStats`], and apply the
//! pure formulas from [`crate::analysis`]. They share no state and run in
//! parallel within one superstep; the barrier merges their outputs.

use std::time::Instant;

use async_trait::async_trait;

use crate::analysis::{churn_risk, rfm_score, OrderStats};
use crate::config::ScoringConfig;
use crate::models::StageResult;
use crate::stage::{Stage, StageContext, StageError, StagePartial};
use crate::state::StateSnapshot;
use crate::utils::collections::new_output_map;

use super::{keys, names, read_as_of, read_orders};

/// Computes the composite RFM score and the no-history marker.
#[derive(Clone, Debug)]
pub struct RfmStage {
    config: ScoringConfig,
}

impl RfmStage {
    #[must_use]
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Stage for RfmStage {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: StageContext,
    ) -> Result<StagePartial, StageError> {
        let started = Instant::now();
        let orders = read_orders(&snapshot)?;
        let as_of = read_as_of(&snapshot)?;

        let stats = OrderStats::from_orders(&orders, as_of);
        let score = rfm_score(&stats, &self.config);
        ctx.emit(
            "scoring",
            format!("RFM {score} from {} orders", stats.order_count),
        )?;

        let mut outputs = new_output_map();
        outputs.insert(keys::RFM.to_string(), serde_json::json!(score));
        outputs.insert(
            keys::RFM_NO_HISTORY.to_string(),
            serde_json::json!(stats.is_empty()),
        );

        Ok(StagePartial::new()
            .with_results(vec![StageResult::local(
                names::RFM,
                started.elapsed().as_millis() as u64,
            )])
            .with_outputs(outputs))
    }
}

/// Estimates churn probability from silence, frequency, and order value.
#[derive(Clone, Debug)]
pub struct ChurnStage {
    config: ScoringConfig,
}

impl ChurnStage {
    #[must_use]
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Stage for ChurnStage {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: StageContext,
    ) -> Result<StagePartial, StageError> {
        let started = Instant::now();
        let orders = read_orders(&snapshot)?;
        let as_of = read_as_of(&snapshot)?;

        let stats = OrderStats::from_orders(&orders, as_of);
        let risk = churn_risk(&stats, &self.config);
        ctx.emit(
            "scoring",
            format!("churn risk {risk:.3} after {} days silence", stats.days_since_last),
        )?;

        let mut outputs = new_output_map();
        outputs.insert(keys::CHURN_RISK.to_string(), serde_json::json!(risk));

        Ok(StagePartial::new()
            .with_results(vec![StageResult::local(
                names::CHURN,
                started.elapsed().as_millis() as u64,
            )])
            .with_outputs(outputs))
    }
}
