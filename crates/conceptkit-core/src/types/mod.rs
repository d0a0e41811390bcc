//! # Core Type Definitions
//!
//! This module contains the storage-level types shared by every concept:
//! - Record values (`FieldValue`, `Record`)
//! - Record identity (`Key`)
//! - Match criteria for `find`/`del_many` (`Criteria`)
//! - Error types (`KernelError`)
//!
//! ## Determinism Guarantees
//!
//! Records, keys and criteria are all backed by ordered collections, so
//! iteration order (and therefore every derived output) is stable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// FIELD VALUES
// =============================================================================

/// A single field value inside a record.
///
/// The set of kinds is closed: nested structure is carried as JSON text in
/// `Json`, never as an open-ended tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    Int(i64),
    /// JSON-encoded nested structure.
    Json(String),
}

impl FieldValue {
    /// Encode a serializable value as a `Json` field.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, KernelError> {
        serde_json::to_string(value)
            .map(Self::Json)
            .map_err(|e| KernelError::Encoding(e.to_string()))
    }

    /// Canonical string form used by `find` criteria comparison.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Text(s) | Self::Json(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

// =============================================================================
// RECORD
// =============================================================================

/// One stored entity instance: field name -> value, in field-name order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check a record against criteria (every criterion present and equal).
    #[must_use]
    pub fn matches(&self, criteria: &Criteria) -> bool {
        criteria
            .iter()
            .all(|(field, expected)| self.get(field).is_some_and(|v| v.render() == expected))
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// =============================================================================
// KEY
// =============================================================================

/// Identity of a record within its relation.
///
/// An ordered tuple of identifier parts. Parts are never joined into a single
/// string for storage, so an id containing `:` cannot collide with another
/// key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key(Vec<String>);

impl Key {
    #[must_use]
    pub fn single(part: impl Into<String>) -> Self {
        Self(vec![part.into()])
    }

    #[must_use]
    pub fn pair(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self(vec![a.into(), b.into()])
    }

    #[must_use]
    pub fn triple(a: impl Into<String>, b: impl Into<String>, c: impl Into<String>) -> Self {
        Self(vec![a.into(), b.into(), c.into()])
    }
}

impl<S: Into<String>> FromIterator<S> for Key {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Display only; storage compares parts, not this rendering.
        write!(f, "{}", self.0.join(":"))
    }
}

// =============================================================================
// CRITERIA
// =============================================================================

/// Field -> expected value filter for `find` and `del_many`.
///
/// Empty criteria match every record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Criteria(BTreeMap<String, String>);

impl Criteria {
    /// Criteria matching everything.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Criteria with a single field constraint.
    #[must_use]
    pub fn field(field: impl Into<String>, expected: impl Into<FieldValue>) -> Self {
        Self::all().and(field, expected)
    }

    /// Add a constraint.
    #[must_use]
    pub fn and(mut self, field: impl Into<String>, expected: impl Into<FieldValue>) -> Self {
        self.0.insert(field.into(), expected.into().render());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Failures that abort a handler call.
///
/// Domain outcomes (not found, not allowed, ...) are NOT errors; they are
/// variants of each operation's output. Only encoding problems and
/// corrupted stored data surface here.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A value could not be encoded to, or decoded from, its stored/wire form.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A stored record is missing an expected field or holds the wrong kind.
    #[error("Corrupted record {relation}[{key}]: field '{field}'")]
    Corrupted {
        relation: String,
        key: String,
        field: String,
    },

    /// An I/O error occurred (binary layer: bind, file access).
    #[error("I/O error: {0}")]
    Io(String),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KernelError {
    /// Build a `Corrupted` error for a field of a record.
    #[must_use]
    pub fn corrupted(relation: &str, key: &Key, field: &str) -> Self {
        Self::Corrupted {
            relation: relation.to_string(),
            key: key.to_string(),
            field: field.to_string(),
        }
    }
}

impl From<serde_json::Error> for KernelError {
    fn from(e: serde_json::Error) -> Self {
        Self::Encoding(e.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_is_string_comparable() {
        assert_eq!(FieldValue::from("x").render(), "x");
        assert_eq!(FieldValue::from(true).render(), "true");
        assert_eq!(FieldValue::from(-42i64).render(), "-42");
        let json = FieldValue::json(&["a", "b"]).expect("encode");
        assert_eq!(json.render(), r#"["a","b"]"#);
    }

    #[test]
    fn record_matches_criteria() {
        let record = Record::new()
            .with("source_id", "a")
            .with("active", true)
            .with("weight", 3i64);

        assert!(record.matches(&Criteria::all()));
        assert!(record.matches(&Criteria::field("source_id", "a")));
        assert!(record.matches(&Criteria::field("active", "true")));
        assert!(record.matches(&Criteria::field("weight", 3i64).and("source_id", "a")));
        assert!(!record.matches(&Criteria::field("source_id", "b")));
        // Missing field never matches.
        assert!(!record.matches(&Criteria::field("target_id", "a")));
    }

    #[test]
    fn keys_do_not_collide_on_delimiter() {
        let a = Key::pair("a:b", "c");
        let b = Key::pair("a", "b:c");
        assert_ne!(a, b);
        // Rendering is identical, identity is not.
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn key_ordering_is_by_parts() {
        let mut keys = vec![Key::pair("b", "a"), Key::pair("a", "z"), Key::single("a")];
        keys.sort();
        assert_eq!(
            keys,
            vec![Key::single("a"), Key::pair("a", "z"), Key::pair("b", "a")]
        );
    }

    #[test]
    fn record_from_iterator() {
        let record: Record = [("node_id", "n1"), ("tag_name", "x")].into_iter().collect();
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("tag_name").and_then(FieldValue::as_text), Some("x"));
    }

    #[test]
    fn corrupted_error_names_location() {
        let err = KernelError::corrupted("tag_index", &Key::single("x"), "node_ids");
        assert_eq!(
            err.to_string(),
            "Corrupted record tag_index[x]: field 'node_ids'"
        );
    }
}
