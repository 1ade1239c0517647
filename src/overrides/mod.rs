//! Copy-on-write override helpers for decoded document trees.
//!
//! Embedding tools use these to apply `--override-property` style patches to
//! a workload document before handing it to
//! [`crate::state::State::with_workload`]. Like the state container, every
//! function here returns a new tree and shares untouched branches with the
//! input; only the path being modified is cloned.
//!
//! Override semantics: maps merge recursively, any other value replaces, and
//! a `null` value deletes the key it addresses.

use serde_json::{Map, Value};

use crate::core::{PlaitError, Result};

/// Parse a `.`-separated override path into its segments.
///
/// `\.` escapes a literal dot inside a segment and `\\` a literal backslash.
pub fn parse_dot_path_parts(input: &str) -> Vec<String> {
    let masked = input.replace("\\\\", "\u{1}").replace("\\.", "\u{0}");
    masked
        .split('.')
        .map(|part| part.replace('\u{0}', ".").replace('\u{1}', "\\"))
        .collect()
}

/// Merge `overrides` into `input`. Nested maps are merged recursively, other
/// value types are replaced, and `null` override values delete the key.
/// Returns a shallow copy; untouched entries are shared with the input.
pub fn override_map_in_map(
    input: &Map<String, Value>,
    overrides: &Map<String, Value>,
) -> Result<Map<String, Value>> {
    let mut output = input.clone();
    for (key, value) in overrides {
        if value.is_null() {
            output.remove(key);
            continue;
        }
        match (output.get(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                let merged = override_map_in_map(existing, incoming)?;
                output.insert(key.clone(), Value::Object(merged));
            }
            _ => {
                output.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(output)
}

/// Set or delete the value at `path` within `input`. Intermediate maps are
/// created as needed when setting; arrays are indexed numerically, with `-1`
/// appending. Returns a shallow copy of the modified branch.
pub fn override_path_in_map(
    input: &Map<String, Value>,
    path: &[String],
    is_delete: bool,
    value: Option<&Value>,
) -> Result<Map<String, Value>> {
    let Some((head, rest)) = path.split_first() else {
        return Err(PlaitError::OverrideRootNode);
    };

    let mut output = input.clone();
    if rest.is_empty() {
        if is_delete || value.is_none_or(Value::is_null) {
            output.remove(head);
        } else if let Some(value) = value {
            output.insert(head.clone(), value.clone());
        }
        return Ok(output);
    }

    let next = match output.get(head) {
        None => {
            let sub = override_path_in_map(&Map::new(), rest, is_delete, value)
                .map_err(|e| e.context(head.clone()))?;
            Value::Object(sub)
        }
        Some(Value::Object(map)) => {
            let sub = override_path_in_map(map, rest, is_delete, value)
                .map_err(|e| e.context(head.clone()))?;
            Value::Object(sub)
        }
        Some(Value::Array(items)) => {
            let sub = override_path_in_array(items, rest, is_delete, value)
                .map_err(|e| e.context(head.clone()))?;
            Value::Array(sub)
        }
        Some(_) => {
            return Err(PlaitError::NotAContainer {
                segment: head.clone(),
            });
        }
    };
    output.insert(head.clone(), next);
    Ok(output)
}

fn override_path_in_array(
    input: &[Value],
    path: &[String],
    is_delete: bool,
    value: Option<&Value>,
) -> Result<Vec<Value>> {
    let Some((head, rest)) = path.split_first() else {
        return Err(PlaitError::OverrideRootNode);
    };

    let index: i64 = head.parse().map_err(|_| PlaitError::InvalidArrayIndex {
        segment: head.clone(),
    })?;

    let mut output = input.to_vec();
    if rest.is_empty() {
        if is_delete || value.is_none_or(Value::is_null) {
            if index < 0 || index as usize >= input.len() {
                return Err(PlaitError::ArrayIndexOutOfRange {
                    action: "remove",
                    index,
                });
            }
            output.remove(index as usize);
            return Ok(output);
        }
        let value = value.cloned().unwrap_or(Value::Null);
        if index == -1 {
            output.push(value);
            return Ok(output);
        }
        if index < 0 || index as usize >= input.len() {
            return Err(PlaitError::ArrayIndexOutOfRange {
                action: "set",
                index,
            });
        }
        output[index as usize] = value;
        return Ok(output);
    }

    if index < 0 || index as usize >= input.len() {
        return Err(PlaitError::ArrayIndexOutOfRange {
            action: "set",
            index,
        });
    }
    let next = match &output[index as usize] {
        Value::Object(map) => {
            let sub = override_path_in_map(map, rest, is_delete, value)
                .map_err(|e| e.context(head.clone()))?;
            Value::Object(sub)
        }
        Value::Array(items) => {
            let sub = override_path_in_array(items, rest, is_delete, value)
                .map_err(|e| e.context(head.clone()))?;
            Value::Array(sub)
        }
        _ => {
            return Err(PlaitError::NotAContainer {
                segment: head.clone(),
            });
        }
    };
    output[index as usize] = next;
    Ok(output)
}
