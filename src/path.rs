//! Field paths into JSON responses
//!
//! Servers disagree on where they put things: `{"token": ...}`,
//! `{"data": {"access": ...}}`, and so on. A [`FieldPath`] is a validated,
//! slash-delimited locator (`"data/access"`) resolved against a
//! [`serde_json::Value`] at runtime.
//!
//! The empty path is the root path: it resolves to the whole value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, FieldExtractionError};

/// A validated slash-delimited path into a JSON value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse and validate a path.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidFieldPath` if any segment is empty
    /// (`"a//b"`, `"/a"`, `"a/"`).
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        if raw.is_empty() {
            return Ok(Self::root());
        }

        let segments: Vec<String> = raw.split('/').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(ConfigError::InvalidFieldPath {
                path: raw.to_string(),
                reason: "path segments must not be empty".to_string(),
            });
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The root path, resolving to the whole value
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Whether this is the root path
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Path as originally written
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Individual segments
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for FieldPath {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for FieldPath {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.raw
    }
}

fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Walk `root` along `path`.
///
/// Missing keys, `null` intermediates and non-container values all resolve
/// to `None`; this never fails. The root path returns `root` itself.
#[must_use]
pub fn extract<'a>(root: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    path.segments().iter().try_fold(root, |current, segment| {
        if current.is_null() {
            None
        } else {
            step(current, segment)
        }
    })
}

/// Resolve a mandatory field.
///
/// `null` and empty strings count as absent, matching how servers signal
/// "no token".
///
/// # Errors
///
/// Returns `FieldExtractionError` labelled with `field` when nothing usable
/// is found.
pub fn extract_required<'a>(
    root: &'a Value,
    path: &FieldPath,
    field: &str,
) -> Result<&'a Value, FieldExtractionError> {
    match extract(root, path) {
        None | Some(Value::Null) => Err(FieldExtractionError::new(field, path.as_str())),
        Some(Value::String(s)) if s.is_empty() => {
            Err(FieldExtractionError::new(field, path.as_str()))
        }
        Some(value) => Ok(value),
    }
}

/// Resolve a mandatory field as a string; numbers are rendered as text.
///
/// # Errors
///
/// Returns `FieldExtractionError` if the field is absent or is not a scalar.
pub fn extract_string(
    root: &Value,
    path: &FieldPath,
    field: &str,
) -> Result<String, FieldExtractionError> {
    match extract_required(root, path, field)? {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(FieldExtractionError::new(field, path.as_str())),
    }
}

/// Resolve a mandatory field as unsigned epoch seconds.
///
/// Accepts JSON numbers (fractions are truncated) and numeric strings.
///
/// # Errors
///
/// Returns `FieldExtractionError` if the field is absent or not numeric.
pub fn extract_epoch_secs(
    root: &Value,
    path: &FieldPath,
    field: &str,
) -> Result<u64, FieldExtractionError> {
    let value = extract_required(root, path, field)?;
    let parsed = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| FieldExtractionError::new(field, path.as_str()))
}

/// Set `value` at `path` unless something is already there.
///
/// Intermediate objects are created as needed. Returns `false` without
/// modifying `root` when the path is the root path or crosses a non-object.
pub fn insert_if_absent(root: &mut Value, path: &FieldPath, value: Value) -> bool {
    let Some((last, parents)) = path.segments().split_last() else {
        return false;
    };

    let mut current = root;
    for segment in parents {
        let Value::Object(map) = current else {
            return false;
        };
        let next = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if next.is_null() {
            *next = Value::Object(serde_json::Map::new());
        }
        current = next;
    }

    let Value::Object(map) = current else {
        return false;
    };
    match map.get(last) {
        Some(existing) if !existing.is_null() => false,
        _ => {
            map.insert(last.clone(), value);
            true
        }
    }
}
