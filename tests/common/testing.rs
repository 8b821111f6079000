#![allow(dead_code)]

use async_trait::async_trait;
use followgraph::models::StageResult;
use followgraph::stage::{Stage, StageContext, StageError, StagePartial};
use followgraph::state::StateSnapshot;
use followgraph::types::StageKind;
use rustc_hash::FxHashMap;
use serde_json::json;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

#[derive(Debug, Clone)]
pub struct TestStage {
    pub name: &'static str,
}

// Example usage to avoid dead_code warning
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_teststage_construction() {
        let stage = TestStage { name: "example" };
        let bus = followgraph::event_bus::EventBus::default();
        let ctx = StageContext {
            stage_id: "test_stage".to_string(),
            step: 1,
            event_bus_sender: bus.get_sender(),
        };
        let snapshot = create_test_snapshot(1, 1);
        let result = stage.run(snapshot, ctx).await;
        assert!(result.is_ok());
    }
}

#[async_trait]
impl Stage for TestStage {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        ctx: StageContext,
    ) -> Result<StagePartial, StageError> {
        let mut outputs = FxHashMap::default();
        outputs.insert(format!("{}_ran", self.name), json!(ctx.step));
        Ok(StagePartial::new()
            .with_results(vec![StageResult::local(self.name, 0)])
            .with_outputs(outputs))
    }
}

#[derive(Debug, Clone)]
pub struct DelayedStage {
    pub name: &'static str,
    pub delay_ms: u64,
}

#[async_trait]
impl Stage for DelayedStage {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        ctx: StageContext,
    ) -> Result<StagePartial, StageError> {
        sleep(Duration::from_millis(self.delay_ms)).await;
        let mut outputs = FxHashMap::default();
        outputs.insert(format!("{}_ran", self.name), json!(ctx.step));
        Ok(StagePartial::new()
            .with_results(vec![StageResult::local(self.name, self.delay_ms)])
            .with_outputs(outputs))
    }
}

#[derive(Debug, Clone)]
pub struct FailingStage {
    pub error_message: &'static str,
}

impl Default for FailingStage {
    fn default() -> Self {
        Self {
            error_message: "test_key",
        }
    }
}

#[async_trait]
impl Stage for FailingStage {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        _ctx: StageContext,
    ) -> Result<StagePartial, StageError> {
        Err(StageError::MissingInput {
            what: self.error_message,
        })
    }
}

pub fn make_test_registry() -> FxHashMap<StageKind, Arc<dyn Stage>> {
    let mut registry = FxHashMap::default();
    registry.insert(
        StageKind::Custom("A".into()),
        Arc::new(TestStage { name: "A" }) as Arc<dyn Stage>,
    );
    registry.insert(
        StageKind::Custom("B".into()),
        Arc::new(TestStage { name: "B" }) as Arc<dyn Stage>,
    );
    registry.insert(
        StageKind::End,
        Arc::new(TestStage { name: "END" }) as Arc<dyn Stage>,
    );
    registry
}

pub fn make_delayed_registry() -> FxHashMap<StageKind, Arc<dyn Stage>> {
    let mut registry = FxHashMap::default();
    registry.insert(
        StageKind::Custom("A".into()),
        Arc::new(DelayedStage {
            name: "A",
            delay_ms: 30,
        }) as Arc<dyn Stage>,
    );
    registry.insert(
        StageKind::Custom("B".into()),
        Arc::new(DelayedStage {
            name: "B",
            delay_ms: 1,
        }) as Arc<dyn Stage>,
    );
    registry
}

pub fn create_test_snapshot(results_version: u32, outputs_version: u32) -> StateSnapshot {
    StateSnapshot {
        results: vec![],
        results_version,
        outputs: FxHashMap::default(),
        outputs_version,
        errors: vec![],
        errors_version: 1,
    }
}
