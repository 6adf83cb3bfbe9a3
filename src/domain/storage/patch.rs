//! Patch validation and shallow merge.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use super::{ModifyOptions, StorageSnapshot};
use crate::domain::foundation::DomainError;

/// Validates a raw patch value and returns its top-level object.
///
/// Rejects non-objects and empty keys. A rejected patch changes nothing.
pub fn validate_patch(patch: Value) -> Result<Map<String, Value>, DomainError> {
    let map = match patch {
        Value::Object(map) => map,
        other => {
            return Err(DomainError::invalid_patch(format!(
                "Patch must be an object, got {}",
                json_type_name(&other)
            )))
        }
    };

    if map.keys().any(|key| key.trim().is_empty()) {
        return Err(DomainError::invalid_patch("Patch keys must be non-empty"));
    }

    Ok(map)
}

/// Applies a top-level merge in place and returns the keys whose value changed.
///
/// Nested values are replaced wholesale. Keys come back in map order.
pub fn merge_patch(state: &mut StorageSnapshot, patch: Map<String, Value>) -> Vec<String> {
    let mut changed = Vec::new();
    for (key, value) in patch {
        if state.get(&key) != Some(&value) {
            state.insert(key.clone(), value);
            changed.push(key);
        }
    }
    changed
}

/// Keys of this patch that become durable.
///
/// An explicit key list wins over the blanket flag. Only keys present in the
/// patch are promoted.
pub fn persist_targets(patch: &Map<String, Value>, options: &ModifyOptions) -> BTreeSet<String> {
    if !options.persist_keys.is_empty() {
        options
            .persist_keys
            .iter()
            .filter(|key| patch.contains_key(key.as_str()))
            .cloned()
            .collect()
    } else if options.persist {
        patch.keys().cloned().collect()
    } else {
        BTreeSet::new()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
