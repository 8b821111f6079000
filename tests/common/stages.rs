use async_trait::async_trait;
use followgraph::stage::{Stage, StageContext, StageError, StagePartial};
use followgraph::state::StateSnapshot;
use rustc_hash::FxHashMap;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct SimpleOutputStage {
    pub key: &'static str,
    pub value: Value,
}

impl SimpleOutputStage {
    pub fn new(key: &'static str, value: Value) -> Self {
        Self { key, value }
    }
}

#[async_trait]
impl Stage for SimpleOutputStage {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        _ctx: StageContext,
    ) -> Result<StagePartial, StageError> {
        let mut outputs = FxHashMap::default();
        outputs.insert(self.key.to_string(), self.value.clone());
        Ok(StagePartial::new().with_outputs(outputs))
    }
}

#[derive(Debug, Clone)]
pub struct NoopStage;

#[async_trait]
impl Stage for NoopStage {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        _ctx: StageContext,
    ) -> Result<StagePartial, StageError> {
        Ok(StagePartial::default())
    }
}
