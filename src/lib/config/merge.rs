//! Recursive merge of partially specified configuration trees.

use serde_json::Value;

/// Merge `overlay` onto `base`.
///
/// Objects merge key by key, recursively. Any other explicit value (arrays
/// included) replaces the base value; `null` leaves the base untouched.
/// Keys present only in `base` are kept.
pub fn merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in overlay_map {
                let next = match merged.get(key) {
                    Some(existing) => merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, Value::Null) => base.clone(),
        (_, other) => other.clone(),
    }
}
