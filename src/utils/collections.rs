//! Small constructors for the collection types used across the crate.

use rustc_hash::FxHashMap;
use serde_json::Value;

/// New empty outputs map, as carried by `StagePartial.outputs`.
///
/// # Examples
///
/// ```rust
/// use followgraph::utils::collections::new_output_map;
/// use serde_json::json;
///
/// let mut outputs = new_output_map();
/// outputs.insert("rfm".to_string(), json!(72));
/// ```
#[must_use]
pub fn new_output_map() -> FxHashMap<String, Value> {
    FxHashMap::default()
}

/// New outputs map with room for `capacity` entries.
#[must_use]
pub fn new_output_map_with_capacity(capacity: usize) -> FxHashMap<String, Value> {
    FxHashMap::with_capacity_and_hasher(capacity, rustc_hash::FxBuildHasher)
}
