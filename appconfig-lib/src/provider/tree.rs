//! Flat snapshot to nested settings tree

use serde_json::Map;
use serde_json::Value;

use super::Snapshot;
use crate::model::is_json_content_type;

/// Builds a JSON tree by splitting keys on `separator`.
///
/// JSON content types are parsed; other values stay strings, missing values
/// become `null`. When a key is both a value and a section (`a` and `a.b`),
/// the section wins.
pub(crate) fn build(snapshot: &Snapshot, separator: &str) -> Value {
    let mut root = Map::new();

    for (key, entry) in snapshot.iter() {
        let value = match (&entry.value, &entry.content_type) {
            (None, _) => Value::Null,
            (Some(raw), Some(ct)) if is_json_content_type(ct) => {
                serde_json::from_str(raw).unwrap_or_else(|e| {
                    log::debug!("Setting '{}' is not valid JSON ({}), binding as text", key, e);
                    Value::String(raw.clone())
                })
            }
            (Some(raw), _) => Value::String(raw.clone()),
        };

        let path: Vec<&str> = key.split(separator).collect();
        insert(&mut root, &path, value, key, separator, 0);
    }

    Value::Object(root)
}

fn insert(
    map: &mut Map<String, Value>,
    path: &[&str],
    value: Value,
    key: &str,
    separator: &str,
    depth: usize,
) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };

    if rest.is_empty() {
        if let Some(Value::Object(_)) = map.get(*first) {
            log::warn!("Setting '{}' is also a section; its value is ignored", key);
        } else {
            map.insert(first.to_string(), value);
        }
        return;
    }

    let child = map
        .entry(first.to_string())
        .or_insert_with(|| Value::Object(Map::new()));

    if !child.is_object() {
        let shadowed = key
            .split(separator)
            .take(depth + 1)
            .collect::<Vec<_>>()
            .join(separator);
        log::warn!("Setting '{}' is also a section; its value is ignored", shadowed);
        *child = Value::Object(Map::new());
    }

    if let Value::Object(child) = child {
        insert(child, rest, value, key, separator, depth + 1);
    }
}
