use super::Reducer;
use crate::{channels::Channel, stage::StagePartial, state::VersionedState};

#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct AddResults;
impl Reducer for AddResults {
    fn apply(&self, state: &mut VersionedState, update: &StagePartial) {
        if let Some(results_update) = &update.results
            && !results_update.is_empty()
        {
            state.results.get_mut().extend(results_update.iter().cloned());
        }
    }
}
