use rustc_hash::FxHashMap;
use std::sync::Arc;

use tracing::instrument;

use crate::reducers::{AddErrors, AddResults, MapMerge, Reducer, ReducerError};
use crate::stage::StagePartial;
use crate::state::VersionedState;
use crate::types::ChannelType;

/// Channel-keyed dispatch table of [`Reducer`]s.
///
/// The barrier hands every merged [`StagePartial`] to the registry, which
/// routes each channel's payload to the reducers registered for it. More
/// than one reducer may watch a channel; they run in registration order.
#[derive(Clone)]
pub struct ReducerRegistry {
    reducer_map: FxHashMap<ChannelType, Vec<Arc<dyn Reducer>>>,
}

/// True when the partial carries something a reducer could act on for
/// `channel`. Lets the registry skip channels with nothing to do.
fn has_payload(channel: ChannelType, partial: &StagePartial) -> bool {
    match channel {
        ChannelType::Results => partial.results.as_ref().is_some_and(|v| !v.is_empty()),
        ChannelType::Outputs => partial.outputs.as_ref().is_some_and(|m| !m.is_empty()),
        ChannelType::Errors => partial.errors.as_ref().is_some_and(|v| !v.is_empty()),
    }
}

impl Default for ReducerRegistry {
    fn default() -> Self {
        Self::new()
            .with_reducer(ChannelType::Results, Arc::new(AddResults))
            .with_reducer(ChannelType::Outputs, Arc::new(MapMerge))
            .with_reducer(ChannelType::Errors, Arc::new(AddErrors))
    }
}

impl ReducerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            reducer_map: FxHashMap::default(),
        }
    }

    /// Register another reducer for `channel`, after any already present.
    pub fn register(&mut self, channel: ChannelType, reducer: Arc<dyn Reducer>) -> &mut Self {
        self.reducer_map.entry(channel).or_default().push(reducer);
        self
    }

    /// Builder form of [`register`](Self::register).
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use followgraph::reducers::{ReducerRegistry, AddResults};
    /// use followgraph::types::ChannelType;
    ///
    /// let registry = ReducerRegistry::new()
    ///     .with_reducer(ChannelType::Results, Arc::new(AddResults));
    /// ```
    #[must_use]
    pub fn with_reducer(mut self, channel: ChannelType, reducer: Arc<dyn Reducer>) -> Self {
        self.register(channel, reducer);
        self
    }

    /// Run the reducers for one channel against `state`.
    ///
    /// A partial with no payload for the channel is a no-op. Asking for a
    /// channel nothing is registered for is an error; the default registry
    /// covers all three channels.
    #[instrument(skip(self, state, to_update), err)]
    pub fn try_update(
        &self,
        channel_type: ChannelType,
        state: &mut VersionedState,
        to_update: &StagePartial,
    ) -> Result<(), ReducerError> {
        if !has_payload(channel_type.clone(), to_update) {
            return Ok(());
        }

        let reducers = self
            .reducer_map
            .get(&channel_type)
            .ok_or(ReducerError::UnknownChannel(channel_type))?;
        for reducer in reducers {
            reducer.apply(state, to_update);
        }
        Ok(())
    }

    /// Apply `merged_updates` across every registered channel.
    #[instrument(skip(self, state, merged_updates), err)]
    pub fn apply_all(
        &self,
        state: &mut VersionedState,
        merged_updates: &StagePartial,
    ) -> Result<(), ReducerError> {
        for channel in self.reducer_map.keys() {
            self.try_update(channel.clone(), state, merged_updates)?;
        }
        Ok(())
    }
}
