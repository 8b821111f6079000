use super::Reducer;
use crate::{channels::Channel, stage::StagePartial, state::VersionedState};

#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct MapMerge;
impl Reducer for MapMerge {
    fn apply(&self, state: &mut VersionedState, update: &StagePartial) {
        if let Some(outputs_update) = &update.outputs
            && !outputs_update.is_empty()
        {
            let state_map = state.outputs.get_mut();
            for (k, v) in outputs_update.iter() {
                state_map.insert(k.clone(), v.clone());
            }
        }
    }
}
