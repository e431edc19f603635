//! C1 — Typed Value: validated `<kind>:<value>` pairs over a closed,
//! category-specific kind vocabulary.
//!
//! Grounded in the original system's `TypedTuple`/`Label`/`Capacity`
//! classes (`original_source/fim/graph/typed_tuples.py`): the separator
//! `:` must not appear in `kind`, but may appear freely in `value`, so
//! parsing splits on the *first* `:` only.

use crate::dictionary::ValueCategory;
use crate::error::{Result, SingleTestbedError};

const SEPARATOR: char = ':';

/// A `(kind, value)` pair validated against one of the four closed
/// category dictionaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypedValue {
    category: ValueCategory,
    kind: String,
    value: String,
}

impl TypedValue {
    /// Builds a `TypedValue` from already-split fields, validating `kind`
    /// against `category`'s dictionary.
    pub fn parse_fields(category: ValueCategory, kind: &str, value: &str) -> Result<Self> {
        category.require(kind)?;
        Ok(Self {
            category,
            kind: kind.to_owned(),
            value: value.to_owned(),
        })
    }

    /// Parses a serialized `"kind:value"` string.
    pub fn parse(category: ValueCategory, serialized: &str) -> Result<Self> {
        let (kind, value) = serialized
            .split_once(SEPARATOR)
            .ok_or_else(|| SingleTestbedError::Malformed {
                value: serialized.to_owned(),
            })?;
        Self::parse_fields(category, kind, value)
    }

    pub fn category(&self) -> ValueCategory {
        self.category
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Serializes back to `"kind:value"`.
    pub fn serialize(&self) -> String {
        format!("{}{}{}", self.kind, SEPARATOR, self.value)
    }

    /// `true` if `self` and `other` share both category and kind.
    pub fn same_kind(&self, other: &TypedValue) -> bool {
        self.category == other.category && self.kind == other.kind
    }
}

impl std::fmt::Display for TypedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.serialize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_label_value() {
        let tv = TypedValue::parse(ValueCategory::Label, "vlan_range:100-200").unwrap();
        assert_eq!(tv.kind(), "vlan_range");
        assert_eq!(tv.value(), "100-200");
        assert_eq!(tv.serialize(), "vlan_range:100-200");
    }

    #[test]
    fn value_body_may_contain_colons() {
        let tv = TypedValue::parse(ValueCategory::Label, "ipv6:fe80::1").unwrap();
        assert_eq!(tv.kind(), "ipv6");
        assert_eq!(tv.value(), "fe80::1");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = TypedValue::parse(ValueCategory::Cap, "bogus:1").unwrap_err();
        assert!(matches!(
            err.errors()[0],
            SingleTestbedError::InvalidKind { .. }
        ));
    }

    #[test]
    fn missing_separator_is_malformed() {
        let err = TypedValue::parse(ValueCategory::Cap, "core-1").unwrap_err();
        assert!(matches!(err.errors()[0], SingleTestbedError::Malformed { .. }));
    }

    #[test]
    fn same_kind_compares_category_and_kind() {
        let a = TypedValue::parse(ValueCategory::Cap, "core:4").unwrap();
        let b = TypedValue::parse(ValueCategory::Cap, "core:8").unwrap();
        let c = TypedValue::parse(ValueCategory::Cap, "ram:8").unwrap();
        assert!(a.same_kind(&b));
        assert!(!a.same_kind(&c));
    }
}
