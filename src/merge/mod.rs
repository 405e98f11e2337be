//! Override-merge with sequence append.
//!
//! Sources are folded in priority order, highest first, into an accumulator:
//!
//! - a key already set in the accumulator keeps its value; a missing (or
//!   `null`) key takes the incoming value;
//! - two mappings at the same key merge recursively;
//! - two sequences at the same key concatenate, accumulator elements first;
//! - a mapping or a sequence meeting any other shape is a
//!   [`StackError::MergeConflict`] naming the dotted key path;
//! - two scalars of different kinds are not a conflict; the accumulator wins.
//!
//! ```rust
//! use serde_json::json;
//! use stackctl::merge::merge_all;
//!
//! let high = json!({"image": "nginx:1.27", "ports": [80]});
//! let low = json!({"image": "nginx:1.25", "ports": [443], "replicas": 2});
//! let merged = merge_all([&high, &low]).unwrap();
//! assert_eq!(merged, json!({"image": "nginx:1.27", "ports": [80, 443], "replicas": 2}));
//! ```

use serde_json::Value;

use crate::core::StackError;
use crate::document::{Tree, kind_name};

/// Merge the lower-priority `src` into the higher-priority `acc`.
pub fn merge_into(acc: &mut Value, src: &Value) -> Result<(), StackError> {
    let mut path = Vec::new();
    merge_value(acc, src, &mut path)
}

/// Merge the lower-priority mapping `src` into `acc`.
pub fn merge_tree(acc: &mut Tree, src: &Tree) -> Result<(), StackError> {
    let mut path = Vec::new();
    merge_map(acc, src, &mut path)
}

/// Fold `sources` (highest priority first) into one value.
pub fn merge_all<'a, I>(sources: I) -> Result<Value, StackError>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut acc = Value::Null;
    for src in sources {
        merge_into(&mut acc, src)?;
    }
    Ok(acc)
}

fn merge_value(acc: &mut Value, src: &Value, path: &mut Vec<String>) -> Result<(), StackError> {
    if src.is_null() {
        return Ok(());
    }
    if acc.is_null() {
        *acc = src.clone();
        return Ok(());
    }

    let conflict = match (acc.is_object(), src.is_object(), acc.is_array(), src.is_array()) {
        (true, true, _, _) | (_, _, true, true) => false,
        (a_obj, s_obj, a_arr, s_arr) => a_obj || s_obj || a_arr || s_arr,
    };
    if conflict {
        return Err(StackError::MergeConflict {
            path: if path.is_empty() { "<root>".to_string() } else { path.join(".") },
            reason: format!("{} cannot merge with {}", kind_name(acc), kind_name(src)),
        });
    }

    match (acc, src) {
        (Value::Object(a), Value::Object(s)) => merge_map(a, s, path),
        (Value::Array(a), Value::Array(s)) => {
            a.extend(s.iter().cloned());
            Ok(())
        }
        _ => Ok(()),
    }
}

fn merge_map(acc: &mut Tree, src: &Tree, path: &mut Vec<String>) -> Result<(), StackError> {
    for (key, value) in src {
        match acc.get_mut(key) {
            Some(existing) => {
                path.push(key.clone());
                let result = merge_value(existing, value, path);
                path.pop();
                result?;
            }
            None => {
                acc.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(())
}
