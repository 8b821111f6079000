//! Versioned storage channels backing [`crate::state::VersionedState`].
//!
//! Each channel pairs a payload with a monotonically increasing version
//! number. Reducers mutate payloads during the barrier; the barrier alone
//! decides when a version is bumped, which is what downstream version gating
//! keys on.
//!
//! # Channels
//!
//! - [`ResultsChannel`]: append-only `Vec<StageResult>` of stage telemetry
//! - [`OutputsChannel`]: `FxHashMap<String, Value>` of stage products
//! - [`ErrorsChannel`]: append-only `Vec<ErrorEvent>` of recorded faults

pub mod errors;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::channels::errors::ErrorEvent;
use crate::models::StageResult;

/// Common interface over a versioned payload.
///
/// Versions start at 1 and only move forward. Mutating the payload through
/// [`get_mut`](Channel::get_mut) does not touch the version; data changed
/// outside the barrier is invisible to version gating until the next
/// barrier bump.
pub trait Channel {
    type Payload;

    /// Borrow the payload read-only.
    fn get(&self) -> &Self::Payload;

    /// Borrow the payload mutably. Does not bump the version.
    fn get_mut(&mut self) -> &mut Self::Payload;

    /// Clone the payload out, detached from future mutations.
    fn snapshot(&self) -> Self::Payload
    where
        Self::Payload: Clone,
    {
        self.get().clone()
    }

    fn version(&self) -> u32;

    fn set_version(&mut self, version: u32);
}

/// Append-only log of per-stage telemetry records.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultsChannel {
    results: Vec<StageResult>,
    version: u32,
}

impl ResultsChannel {
    #[must_use]
    pub fn new(results: Vec<StageResult>, version: u32) -> Self {
        Self { results, version }
    }
}

impl Default for ResultsChannel {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            version: 1,
        }
    }
}

impl Channel for ResultsChannel {
    type Payload = Vec<StageResult>;

    fn get(&self) -> &Self::Payload {
        &self.results
    }

    fn get_mut(&mut self) -> &mut Self::Payload {
        &mut self.results
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn set_version(&mut self, version: u32) {
        self.version = version;
    }
}

/// Keyed stage products, merged map-style at the barrier.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputsChannel {
    outputs: FxHashMap<String, Value>,
    version: u32,
}

impl OutputsChannel {
    #[must_use]
    pub fn new(outputs: FxHashMap<String, Value>, version: u32) -> Self {
        Self { outputs, version }
    }
}

impl Default for OutputsChannel {
    fn default() -> Self {
        Self {
            outputs: FxHashMap::default(),
            version: 1,
        }
    }
}

impl Channel for OutputsChannel {
    type Payload = FxHashMap<String, Value>;

    fn get(&self) -> &Self::Payload {
        &self.outputs
    }

    fn get_mut(&mut self) -> &mut Self::Payload {
        &mut self.outputs
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn set_version(&mut self, version: u32) {
        self.version = version;
    }
}

/// Append-only log of recorded error events.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorsChannel {
    events: Vec<ErrorEvent>,
    version: u32,
}

impl ErrorsChannel {
    #[must_use]
    pub fn new(events: Vec<ErrorEvent>, version: u32) -> Self {
        Self { events, version }
    }
}

impl Default for ErrorsChannel {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            version: 1,
        }
    }
}

impl Channel for ErrorsChannel {
    type Payload = Vec<ErrorEvent>;

    fn get(&self) -> &Self::Payload {
        &self.events
    }

    fn get_mut(&mut self) -> &mut Self::Payload {
        &mut self.events
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn set_version(&mut self, version: u32) {
        self.version = version;
    }
}
