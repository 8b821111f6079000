//! JSON field extraction used by output schema validation.
//!
//! Remote stages return structured JSON; these helpers back the per-stage
//! validators that check required fields and enumerations before an output
//! is accepted.

use serde_json::Value;

/// Fetch a required string field from a JSON object, rejecting values that
/// are missing, non-string, or blank after trimming.
///
/// # Examples
///
/// ```rust
/// use followgraph::utils::json_ext::str_field;
/// use serde_json::json;
///
/// let data = json!({"summary": "Orders weekly, spend trending up."});
/// assert_eq!(str_field(&data, "summary"), Some("Orders weekly, spend trending up."));
/// assert_eq!(str_field(&data, "missing"), None);
/// assert_eq!(str_field(&json!({"summary": ""}), "summary"), None);
/// ```
#[must_use]
pub fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Fetch a required array field from a JSON object.
///
/// # Examples
///
/// ```rust
/// use followgraph::utils::json_ext::array_field;
/// use serde_json::json;
///
/// let data = json!({"recommendations": [{"action": "call"}]});
/// assert_eq!(array_field(&data, "recommendations").map(Vec::len), Some(1));
/// assert_eq!(array_field(&data, "missing"), None);
/// ```
#[must_use]
pub fn array_field<'a>(value: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    value.get(key).and_then(Value::as_array)
}
