//! # Concept Contract
//!
//! The shape every feature module follows.
//!
//! A concept is a stateless handler type owning a fixed set of relations.
//! Each operation takes one input struct and a store reference, and returns
//! `Result<Output, KernelError>` where `Output` is a closed tagged union:
//! exactly one success variant plus the named failures relevant to that
//! operation. `Err` is reserved for aborts (encoding, corrupted records).
//!
//! Concepts never call each other. The only shared state is the store.

use crate::{FieldValue, Key, KernelError, Record};

// =============================================================================
// VARIANT NAMES
// =============================================================================

/// Wire names of the result variants.
pub mod variant {
    pub const OK: &str = "ok";
    pub const NOT_FOUND: &str = "notfound";
    pub const ALREADY_EXISTS: &str = "alreadyExists";
    pub const INVALID: &str = "invalid";
    pub const NOT_ALLOWED: &str = "notAllowed";
}

// =============================================================================
// TRAITS
// =============================================================================

/// A feature module and the relations it owns.
pub trait Concept {
    /// Concept name. Dispatch prefixes action names with it (`graph.add_node`).
    const NAME: &'static str;

    /// Relations this concept reads and writes. No other concept touches them.
    /// Status reporting groups record counts by this list.
    const RELATIONS: &'static [&'static str];
}

/// Common view over every operation output.
///
/// Presentation layers map failures to user-facing text through `message`,
/// which is always present on failure variants.
pub trait VariantOutput {
    /// The wire name of the variant (`"ok"`, `"notfound"`, ...).
    fn variant(&self) -> &'static str;

    /// Failure message, `None` for the success variant.
    fn message(&self) -> Option<&str>;

    fn is_ok(&self) -> bool {
        self.variant() == variant::OK
    }
}

// =============================================================================
// TYPED RECORDS
// =============================================================================

/// Conversion between a typed record shape and the store's schemaless form.
///
/// Decoding is strict: a missing or mistyped field is `KernelError::Corrupted`
/// rather than a silently substituted default.
pub trait TypedRecord: Sized {
    /// The relation records of this shape live in.
    const RELATION: &'static str;

    /// The key this record is stored under.
    fn key(&self) -> Key;

    fn to_record(&self) -> Result<Record, KernelError>;

    fn from_record(key: &Key, record: &Record) -> Result<Self, KernelError>;
}

/// Read a required text field.
pub(crate) fn text_field(
    relation: &str,
    key: &Key,
    record: &Record,
    field: &str,
) -> Result<String, KernelError> {
    record
        .get(field)
        .and_then(FieldValue::as_text)
        .map(str::to_string)
        .ok_or_else(|| KernelError::corrupted(relation, key, field))
}

/// Read an optional text field. Present-but-mistyped is still corruption.
pub(crate) fn optional_text_field(
    relation: &str,
    key: &Key,
    record: &Record,
    field: &str,
) -> Result<Option<String>, KernelError> {
    match record.get(field) {
        None => Ok(None),
        Some(FieldValue::Text(s)) => Ok(Some(s.clone())),
        Some(_) => Err(KernelError::corrupted(relation, key, field)),
    }
}

/// Read a required `Json` field holding a list of strings.
pub(crate) fn string_list_field(
    relation: &str,
    key: &Key,
    record: &Record,
    field: &str,
) -> Result<Vec<String>, KernelError> {
    match record.get(field) {
        Some(FieldValue::Json(encoded)) => serde_json::from_str(encoded)
            .map_err(|_| KernelError::corrupted(relation, key, field)),
        _ => Err(KernelError::corrupted(relation, key, field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_field_rejects_missing_and_mistyped() {
        let key = Key::single("k");
        let record = Record::new().with("name", "x").with("count", 1i64);

        assert_eq!(
            text_field("r", &key, &record, "name").expect("name"),
            "x".to_string()
        );
        assert!(matches!(
            text_field("r", &key, &record, "count"),
            Err(KernelError::Corrupted { .. })
        ));
        assert!(matches!(
            text_field("r", &key, &record, "absent"),
            Err(KernelError::Corrupted { .. })
        ));
    }

    #[test]
    fn optional_text_field_distinguishes_absent() {
        let key = Key::single("k");
        let record = Record::new().with("flag", true);

        assert_eq!(
            optional_text_field("r", &key, &record, "missing").expect("ok"),
            None
        );
        assert!(optional_text_field("r", &key, &record, "flag").is_err());
    }

    #[test]
    fn string_list_field_decodes_json() {
        let key = Key::single("k");
        let record = Record::new()
            .with("ids", FieldValue::json(&["a", "b"]).expect("encode"))
            .with("broken", FieldValue::Json("{not json".to_string()));

        assert_eq!(
            string_list_field("r", &key, &record, "ids").expect("ids"),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(string_list_field("r", &key, &record, "broken").is_err());
        assert!(string_list_field("r", &key, &record, "missing").is_err());
    }
}
