mod add_errors;
mod add_results;
mod map_merge;
mod reducer_registry;

pub use add_errors::AddErrors;
pub use add_results::AddResults;
pub use map_merge::MapMerge;
pub use reducer_registry::*;

use crate::stage::StagePartial;
use crate::state::VersionedState;
use crate::types::ChannelType;
use std::fmt;

/// Unified reducer trait: every reducer mutates VersionedState using a StagePartial delta.
/// Channels currently implemented: results (append), outputs (shallow JSON map merge),
/// and errors (append).
pub trait Reducer: Send + Sync {
    fn apply(&self, state: &mut VersionedState, update: &StagePartial);
}

#[derive(Debug)]
pub enum ReducerError {
    UnknownChannel(ChannelType),

    Apply {
        channel: ChannelType,
        message: String,
    },
}

impl fmt::Display for ReducerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReducerError::UnknownChannel(channel) => {
                write!(f, "no reducers registered for channel: {channel:?}")
            }
            ReducerError::Apply { channel, message } => {
                write!(f, "reducer apply failed for channel {channel:?}: {message}")
            }
        }
    }
}

impl std::error::Error for ReducerError {}
