//! The follow-up engine: graph assembly, per-customer analysis runs, and
//! the daily follow-up queue.
//!
//! [`FollowUpEngine`] compiles the analysis workflow once at construction
//! and shares it across runs; every [`analyze`](FollowUpEngine::analyze)
//! call gets its own session, its own state, and its own event bus built
//! from the configured sinks. The daily queue never touches the workflow:
//! it is pure local scoring over the whole customer set.
//!
//! # Graph shape
//!
//! ```text
//!          Start
//!            | (conditional on order history)
//!     +------+---------+
//!     v      v         v
//!    rfm   churn   no_history
//!     \      /         |
//!      v    v          |
//!     summary          |
//!        |             |
//!        v             |
//!    recommend         |
//!        \             /
//!         v           v
//!            End
//! ```

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use futures_util::future::try_join_all;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::analysis::{priority_for, rule_based_recommendations, score_set, OrderStats};
use crate::config::{ConfigError, EngineConfig};
use crate::graphs::{EdgePredicate, GraphBuilder, GraphCompileError};
use crate::invoker::{ModelClient, StageInvoker};
use crate::models::{
    CustomerAnalysis, CustomerProfile, FollowUpEntry, FollowUpQueue, Recommendation, ScoreSet,
};
use crate::ranking::rank;
use crate::runtimes::{RunnerError, WorkflowRunner};
use crate::sources::{CustomerSource, SourceError};
use crate::stages::{
    keys, names, ChurnStage, NoHistoryStage, RecommendStage, RfmStage, SummaryStage,
};
use crate::state::{StateSnapshot, VersionedState};
use crate::types::StageKind;
use crate::workflow::Workflow;

/// Failures while constructing a [`FollowUpEngine`].
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Compile(#[from] GraphCompileError),
}

/// Failures of one analysis or queue request.
#[derive(Debug, Error, Diagnostic)]
pub enum AnalyzeError {
    /// The requested id is not in the customer master data.
    #[error("unknown customer: {customer_id}")]
    #[diagnostic(
        code(followgraph::engine::unknown_customer),
        help("Check the id against the customer master data.")
    )]
    UnknownCustomer { customer_id: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Runner(#[from] RunnerError),

    /// A completed run is missing an output the report needs. Indicates a
    /// wiring defect, not a degraded stage.
    #[error("workflow completed without output {key:?}")]
    #[diagnostic(code(followgraph::engine::missing_output))]
    MissingOutput { key: &'static str },

    #[error(transparent)]
    #[diagnostic(code(followgraph::engine::serde_json))]
    Serde(#[from] serde_json::Error),
}

/// Compiled analysis workflow plus the data source and run configuration.
pub struct FollowUpEngine {
    config: EngineConfig,
    source: Arc<dyn CustomerSource>,
    workflow: Arc<Workflow>,
}

impl FollowUpEngine {
    /// Validate the configuration, wire the stages, and compile the graph.
    pub fn new(
        config: EngineConfig,
        source: Arc<dyn CustomerSource>,
        client: Arc<dyn ModelClient>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let workflow = Arc::new(build_graph(&config, client)?);
        Ok(Self {
            config,
            source,
            workflow,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn workflow(&self) -> &Arc<Workflow> {
        &self.workflow
    }

    /// Analyze one customer as of today.
    pub async fn analyze(&self, customer_id: &str) -> Result<CustomerAnalysis, AnalyzeError> {
        self.analyze_as_of(customer_id, Utc::now().date_naive())
            .await
    }

    /// Analyze one customer against a fixed reference date.
    ///
    /// Runs the workflow in a fresh session with its own event bus, then
    /// assembles the report from the final state. Degraded stages surface
    /// in `degraded_stages` and as `failed` telemetry records; they never
    /// fail the request.
    #[instrument(skip(self), err)]
    pub async fn analyze_as_of(
        &self,
        customer_id: &str,
        as_of: NaiveDate,
    ) -> Result<CustomerAnalysis, AnalyzeError> {
        let profile = self
            .source
            .get_profile(customer_id)
            .await?
            .ok_or_else(|| AnalyzeError::UnknownCustomer {
                customer_id: customer_id.to_string(),
            })?;
        let orders = self.source.get_orders(customer_id).await?;
        let no_order_history = orders.is_empty();

        let initial_state = VersionedState::builder()
            .with_output(keys::CUSTOMER, serde_json::to_value(&profile)?)
            .with_output(keys::ORDERS, serde_json::to_value(&orders)?)
            .with_output(keys::AS_OF, json!(as_of.to_string()))
            .build();

        let run_id = Uuid::new_v4();
        let event_bus = self.config.event_bus.build_event_bus();
        let mut runner = WorkflowRunner::from_arc(Arc::clone(&self.workflow), event_bus, true)
            .with_concurrency_limit(self.config.concurrency_limit);
        runner.create_session(run_id.to_string(), initial_state)?;
        let final_state = runner.run_until_complete(&run_id.to_string()).await?;

        let followup_order = rank(&self.local_scores(as_of).await?);
        self.assemble_report(
            run_id,
            profile,
            no_order_history,
            &final_state.snapshot(),
            followup_order,
        )
    }

    /// Build the ordered follow-up queue for one date.
    ///
    /// Scores every customer locally, ranks them, and caps the queue at the
    /// configured limit. No workflow session and no remote invocation is
    /// involved; the queue is recomputed from scratch on every call.
    #[instrument(skip(self), err)]
    pub async fn daily_followups(&self, date: NaiveDate) -> Result<FollowUpQueue, AnalyzeError> {
        let profiles = self.source.list_all().await?;
        let histories =
            try_join_all(profiles.iter().map(|p| self.source.get_orders(&p.id))).await?;

        let mut scores: FxHashMap<String, ScoreSet> = FxHashMap::default();
        let mut stats_by_id: FxHashMap<String, OrderStats> = FxHashMap::default();
        let mut names_by_id: FxHashMap<String, String> = FxHashMap::default();
        for (profile, orders) in profiles.into_iter().zip(histories) {
            let stats = OrderStats::from_orders(&orders, date);
            scores.insert(profile.id.clone(), score_set(&stats, &self.config.scoring));
            stats_by_id.insert(profile.id.clone(), stats);
            names_by_id.insert(profile.id.clone(), profile.name);
        }

        let mut entries = Vec::new();
        for customer_id in rank(&scores) {
            if entries.len() >= self.config.queue_limit {
                break;
            }
            let Some(score) = scores.get(&customer_id) else {
                continue;
            };
            let Some(stats) = stats_by_id.get(&customer_id) else {
                continue;
            };
            let action = rule_based_recommendations(
                stats,
                score.rfm,
                score.churn_risk,
                &self.config.scoring,
            )[0]
            .action;
            entries.push(FollowUpEntry {
                customer_id: customer_id.clone(),
                name: names_by_id.get(&customer_id).cloned().unwrap_or_default(),
                priority: score.priority,
                churn_risk: score.churn_risk,
                rfm: score.rfm,
                action,
            });
        }

        tracing::info!(%date, queued = entries.len(), "daily follow-up queue built");
        Ok(FollowUpQueue { date, entries })
    }

    /// Local score sets for every known customer, for ranking.
    async fn local_scores(
        &self,
        as_of: NaiveDate,
    ) -> Result<FxHashMap<String, ScoreSet>, SourceError> {
        let profiles = self.source.list_all().await?;
        let histories =
            try_join_all(profiles.iter().map(|p| self.source.get_orders(&p.id))).await?;

        let mut scores = FxHashMap::default();
        for (profile, orders) in profiles.into_iter().zip(histories) {
            let stats = OrderStats::from_orders(&orders, as_of);
            scores.insert(profile.id, score_set(&stats, &self.config.scoring));
        }
        Ok(scores)
    }

    fn assemble_report(
        &self,
        run_id: Uuid,
        profile: CustomerProfile,
        no_order_history: bool,
        snapshot: &StateSnapshot,
        followup_order: Vec<String>,
    ) -> Result<CustomerAnalysis, AnalyzeError> {
        let rfm = snapshot
            .output(keys::RFM)
            .and_then(Value::as_u64)
            .ok_or(AnalyzeError::MissingOutput { key: keys::RFM })?
            .min(100) as u8;
        let churn_risk = snapshot
            .output(keys::CHURN_RISK)
            .and_then(Value::as_f64)
            .ok_or(AnalyzeError::MissingOutput {
                key: keys::CHURN_RISK,
            })?;
        let summary = snapshot
            .output(keys::SUMMARY)
            .and_then(Value::as_str)
            .ok_or(AnalyzeError::MissingOutput { key: keys::SUMMARY })?
            .to_string();
        let recommendations: Vec<Recommendation> = serde_json::from_value(
            snapshot
                .output(keys::RECOMMENDATIONS)
                .ok_or(AnalyzeError::MissingOutput {
                    key: keys::RECOMMENDATIONS,
                })?
                .clone(),
        )?;

        let scores = ScoreSet {
            rfm,
            churn_risk,
            priority: priority_for(rfm, churn_risk, &self.config.scoring),
        };
        let degraded_stages: Vec<String> = snapshot
            .results
            .iter()
            .filter(|r| r.failed)
            .map(|r| r.stage.clone())
            .collect();
        let total_cost_usd = snapshot.results.iter().map(|r| r.cost_usd).sum();

        Ok(CustomerAnalysis {
            run_id,
            customer_id: profile.id,
            customer_name: profile.name,
            segment: profile.segment,
            no_order_history,
            scores,
            summary,
            recommendations,
            followup_order,
            degraded_stages,
            stage_results: snapshot.results.clone(),
            total_cost_usd,
            generated_at: Utc::now(),
        })
    }
}

/// Wire the five stages into the compiled analysis workflow.
pub fn build_graph(
    config: &EngineConfig,
    client: Arc<dyn ModelClient>,
) -> Result<Workflow, GraphCompileError> {
    let invoker = StageInvoker::new(client, config);

    let route_by_history: EdgePredicate = Arc::new(|snapshot| {
        let has_orders = snapshot
            .outputs
            .get(keys::ORDERS)
            .and_then(Value::as_array)
            .map(|orders| !orders.is_empty())
            .unwrap_or(false);
        if has_orders {
            vec![
                StageKind::Custom(names::RFM.into()).as_target(),
                StageKind::Custom(names::CHURN.into()).as_target(),
            ]
        } else {
            vec![StageKind::Custom(names::NO_HISTORY.into()).as_target()]
        }
    });

    GraphBuilder::new()
        .add_stage(
            StageKind::Custom(names::RFM.into()),
            RfmStage::new(config.scoring),
        )
        .add_stage(
            StageKind::Custom(names::CHURN.into()),
            ChurnStage::new(config.scoring),
        )
        .add_stage(
            StageKind::Custom(names::SUMMARY.into()),
            SummaryStage::new(invoker.clone()),
        )
        .add_stage(
            StageKind::Custom(names::RECOMMEND.into()),
            RecommendStage::new(invoker, config.scoring),
        )
        .add_stage(
            StageKind::Custom(names::NO_HISTORY.into()),
            NoHistoryStage::new(config.scoring),
        )
        .add_conditional_edge(StageKind::Start, route_by_history)
        .add_edge(
            StageKind::Custom(names::RFM.into()),
            StageKind::Custom(names::SUMMARY.into()),
        )
        .add_edge(
            StageKind::Custom(names::CHURN.into()),
            StageKind::Custom(names::SUMMARY.into()),
        )
        .add_edge(
            StageKind::Custom(names::SUMMARY.into()),
            StageKind::Custom(names::RECOMMEND.into()),
        )
        .add_edge(StageKind::Custom(names::RECOMMEND.into()), StageKind::End)
        .add_edge(StageKind::Custom(names::NO_HISTORY.into()), StageKind::End)
        .compile()
}
