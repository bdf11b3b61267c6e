//! PropertyMap: the key-value store on nodes and relationships.

use std::collections::HashMap;
use super::Value;

/// A map of property names to values.
pub type PropertyMap = HashMap<String, Value>;

/// Separator used when nested parameter keys are joined.
pub const FLATTEN_SEPARATOR: &str = "_";

/// Flatten a nested JSON parameter object into scalar properties.
///
/// Nested object keys are joined with `_` and spaces inside keys become `_`,
/// so `{"Base Level": {"value": 3}}` yields `Base_Level_value = 3`. Arrays
/// and scalars are kept as values.
pub fn flatten_parameters(params: &serde_json::Map<String, serde_json::Value>) -> PropertyMap {
    let mut out = PropertyMap::new();
    flatten_into(params, "", &mut out);
    out
}

fn flatten_into(
    params: &serde_json::Map<String, serde_json::Value>,
    parent: &str,
    out: &mut PropertyMap,
) {
    for (key, value) in params {
        let key = key.replace(' ', "_");
        let full_key = if parent.is_empty() {
            key
        } else {
            format!("{parent}{FLATTEN_SEPARATOR}{key}")
        };
        match value {
            serde_json::Value::Object(nested) => flatten_into(nested, &full_key, out),
            other => {
                out.insert(full_key, Value::from(other.clone()));
            }
        }
    }
}
