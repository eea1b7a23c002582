//! Structural diff between two JSON snapshots.
//!
//! Clients are pushed a full snapshot once and minimal change-sets from
//! then on, so the diff only ever reports keys from the *new* side.
//! Deletions are not representable: the snapshots it is applied to are
//! additive collections keyed by stable job id.

use serde_json::{Map, Value};

/// Compute the minimal change-set between two JSON objects.
///
/// For every key in `new`:
/// - absent from `old`: included verbatim;
/// - present in both as objects: recursed, included only when the nested
///   diff is non-empty;
/// - present in both as non-objects with different values: the new value
///   is included;
/// - equal in both: omitted.
///
/// Keys present only in `old` never appear in the result, so
/// `diff(a, a)` is always empty and `diff` is not symmetric.
pub fn diff(old: &Map<String, Value>, new: &Map<String, Value>) -> Map<String, Value> {
    let mut changes = Map::new();

    for (key, new_value) in new {
        match old.get(key) {
            None => {
                changes.insert(key.clone(), new_value.clone());
            }
            Some(old_value) => match (old_value, new_value) {
                (Value::Object(old_inner), Value::Object(new_inner)) => {
                    let nested = diff(old_inner, new_inner);
                    if !nested.is_empty() {
                        changes.insert(key.clone(), Value::Object(nested));
                    }
                }
                _ => {
                    if old_value != new_value {
                        changes.insert(key.clone(), new_value.clone());
                    }
                }
            },
        }
    }

    changes
}
