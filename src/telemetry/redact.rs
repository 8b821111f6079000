//! PII redaction applied to telemetry payloads before they reach any sink.
//!
//! Redaction keys on field names: values stored under a recognized
//! identifying key are replaced wholesale with [`REDACTED`], recursively
//! through nested objects and arrays. Numeric identifiers such as
//! `customer_id` are deliberately not on the list.

use rustc_hash::FxHashMap;
use serde_json::Value;

/// Replacement marker for redacted values.
pub const REDACTED: &str = "[REDACTED]";

/// Field names treated as personally identifying free text.
const PII_KEYS: [&str; 6] = ["name", "customer_name", "email", "phone", "address", "contact"];

fn is_pii_key(key: &str) -> bool {
    PII_KEYS.iter().any(|k| key.eq_ignore_ascii_case(k))
}

/// Redact identifying fields in place, recursing through the whole value.
///
/// # Examples
///
/// ```
/// use followgraph::telemetry::redact::{redact_value, REDACTED};
/// use serde_json::json;
///
/// let mut value = json!({
///     "customer_id": "C001",
///     "name": "Gourmet Gateway",
///     "orders": [{"sku": "CAKE-CHOC", "contact": "front desk"}],
/// });
/// redact_value(&mut value);
///
/// assert_eq!(value["customer_id"], "C001");
/// assert_eq!(value["name"], REDACTED);
/// assert_eq!(value["orders"][0]["contact"], REDACTED);
/// assert_eq!(value["orders"][0]["sku"], "CAKE-CHOC");
/// ```
pub fn redact_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if is_pii_key(key) {
                    *entry = Value::String(REDACTED.to_string());
                } else {
                    redact_value(entry);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                redact_value(item);
            }
        }
        _ => {}
    }
}

/// Redact a metadata map, consuming and returning it.
///
/// Top-level keys are checked directly; nested values are walked with
/// [`redact_value`].
#[must_use]
pub fn redact_map(mut map: FxHashMap<String, Value>) -> FxHashMap<String, Value> {
    for (key, entry) in map.iter_mut() {
        if is_pii_key(key) {
            *entry = Value::String(REDACTED.to_string());
        } else {
            redact_value(entry);
        }
    }
    map
}
