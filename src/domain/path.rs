// Path addressing - `$.a.b[2]` style reads and copy-on-write writes over JSON values
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// How far past the end of an array a write may pad with nulls
pub const MAX_INDEX_GAP: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::Index(index) => write!(f, "[{}]", index),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PathError {
    #[error("cannot address '{segment}' inside {found} value")]
    NotAddressable { segment: String, found: &'static str },

    #[error("index {index} is too far past the end of an array of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Navigation<'a> {
    pub parent: Option<&'a Value>,
    pub key: Option<PathSegment>,
    pub exists: bool,
    pub value: Option<&'a Value>,
}

/// `$` or an empty path address the whole value
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let path = path.trim();
    let body = path
        .strip_prefix("$.")
        .or_else(|| path.strip_prefix('$'))
        .unwrap_or(path);

    body.split(['.', '[', ']'])
        .map(|raw| raw.trim().trim_matches(|c: char| c == '\'' || c == '"'))
        .filter(|raw| !raw.is_empty())
        .map(|raw| {
            if raw.bytes().all(|b| b.is_ascii_digit()) {
                raw.parse()
                    .map(PathSegment::Index)
                    .unwrap_or_else(|_| PathSegment::Key(raw.to_string()))
            } else {
                PathSegment::Key(raw.to_string())
            }
        })
        .collect()
}

fn child<'a>(value: &'a Value, segment: &PathSegment) -> Option<&'a Value> {
    match (value, segment) {
        (Value::Object(map), PathSegment::Key(key)) => map.get(key),
        (Value::Object(map), PathSegment::Index(index)) => map.get(&index.to_string()),
        (Value::Array(items), PathSegment::Index(index)) => items.get(*index),
        _ => None,
    }
}

pub fn navigate<'a>(obj: &'a Value, path: &str) -> Navigation<'a> {
    let segments = parse_path(path);
    let Some((last, init)) = segments.split_last() else {
        return Navigation {
            parent: None,
            key: None,
            exists: true,
            value: Some(obj),
        };
    };

    let mut current = obj;
    for segment in init {
        match child(current, segment) {
            Some(next) if !next.is_null() => current = next,
            _ => {
                return Navigation {
                    parent: Some(current),
                    key: Some(segment.clone()),
                    exists: false,
                    value: None,
                };
            }
        }
    }

    let value = child(current, last);
    Navigation {
        parent: Some(current),
        key: Some(last.clone()),
        exists: value.is_some(),
        value,
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "a null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Slot for `segment` inside `value`, creating containers where the path runs out
fn slot_mut<'a>(value: &'a mut Value, segment: &PathSegment) -> Result<&'a mut Value, PathError> {
    if value.is_null() {
        *value = match segment {
            PathSegment::Key(_) => Value::Object(Map::new()),
            PathSegment::Index(_) => Value::Array(Vec::new()),
        };
    }

    match (value, segment) {
        (Value::Object(map), PathSegment::Key(key)) => Ok(map.entry(key.clone()).or_insert(Value::Null)),
        (Value::Object(map), PathSegment::Index(index)) => {
            Ok(map.entry(index.to_string()).or_insert(Value::Null))
        }
        (Value::Array(items), PathSegment::Index(index)) => {
            let len = items.len();
            if *index >= len {
                let new_len = index
                    .checked_add(1)
                    .filter(|new_len| new_len - len <= MAX_INDEX_GAP)
                    .ok_or(PathError::IndexOutOfRange { index: *index, len })?;
                items.resize(new_len, Value::Null);
            }
            Ok(&mut items[*index])
        }
        (other, segment) => Err(PathError::NotAddressable {
            segment: segment.to_string(),
            found: kind_name(other),
        }),
    }
}

/// Returns an updated deep copy; `obj` itself is never touched
pub fn set_value_at_path(obj: &Value, path: &str, value: Value) -> Result<Value, PathError> {
    let segments = parse_path(path);
    if segments.is_empty() {
        return Ok(value);
    }

    let mut root = obj.clone();
    let mut current = &mut root;
    for segment in &segments {
        current = slot_mut(current, segment)?;
    }
    *current = value;

    Ok(root)
}
