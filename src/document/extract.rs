//! Typed extraction from a decoded tree.
//!
//! [`extract`] walks a key path and deserializes whatever it finds. The two
//! failure modes are kept apart so callers can treat an absent section as
//! optional while still failing hard on a section of the wrong shape:
//!
//! - [`StackError::MissingKey`]: some segment of the path is absent (or `null`).
//! - [`StackError::TypeMismatch`]: the value exists but is not the requested shape.
//!
//! A segment that parses as an integer indexes into a sequence.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::StackError;

fn dotted(path: &[&str]) -> String {
    path.join(".")
}

/// Borrow the value at `path`.
pub fn lookup<'a>(root: &'a Value, path: &[&str]) -> Result<&'a Value, StackError> {
    let mut current = root;
    for (depth, segment) in path.iter().enumerate() {
        let next = match current {
            Value::Object(map) => map.get(*segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        current = match next {
            Some(Value::Null) | None => {
                return Err(StackError::MissingKey {
                    key: dotted(&path[..=depth]),
                });
            }
            Some(value) => value,
        };
    }
    Ok(current)
}

/// Deserialize the value at `path` into `T`.
///
/// ```rust
/// use serde_json::json;
/// use stackctl::document::extract;
///
/// let tree = json!({"services": {"web": {"replicas": 3}}});
/// let replicas: u32 = extract(&tree, &["services", "web", "replicas"]).unwrap();
/// assert_eq!(replicas, 3);
/// ```
pub fn extract<T: DeserializeOwned>(root: &Value, path: &[&str]) -> Result<T, StackError> {
    let value = lookup(root, path)?;
    T::deserialize(value).map_err(|e| StackError::TypeMismatch {
        key: dotted(path),
        reason: e.to_string(),
    })
}

/// Like [`extract`], but an absent path yields `Ok(None)`.
pub fn extract_optional<T: DeserializeOwned>(
    root: &Value,
    path: &[&str],
) -> Result<Option<T>, StackError> {
    match extract(root, path) {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_missing_key() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Remove `key` from a mapping and deserialize it.
///
/// Absent or `null` yields `Ok(None)`; the key is gone afterwards either way.
pub fn take_section<T: DeserializeOwned>(
    tree: &mut crate::document::Tree,
    key: &str,
) -> Result<Option<T>, StackError> {
    match tree.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => T::deserialize(value).map(Some).map_err(|e| StackError::TypeMismatch {
            key: key.to_string(),
            reason: e.to_string(),
        }),
    }
}
