//! Static `kind -> description` dictionaries for each typed-value category,
//! loaded once and shared for the lifetime of the process.
//!
//! Grounded in the original system's `TypeValidator`, which reads a JSON
//! file out of an installed package's data directory exactly once per
//! category and caches the result in a class-level dict. A Rust crate has
//! no installed data directory at runtime, so the dictionaries are
//! embedded at compile time with `include_str!` instead.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde_json::Value;

use crate::error::{Result, SingleTestbedError};

/// The four closed categories a `TypedValue` can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum ValueCategory {
    #[strum(to_string = "label")]
    Label,
    #[strum(to_string = "cap")]
    Cap,
    #[strum(to_string = "location")]
    Location,
    #[strum(to_string = "constraint")]
    Constraint,
}

impl ValueCategory {
    fn raw(self) -> &'static str {
        match self {
            ValueCategory::Label => include_str!("dictionaries/label_types.json"),
            ValueCategory::Cap => include_str!("dictionaries/capacity_types.json"),
            ValueCategory::Location => include_str!("dictionaries/location_types.json"),
            ValueCategory::Constraint => include_str!("dictionaries/constraint_types.json"),
        }
    }

    fn dictionary(self) -> &'static HashMap<String, String> {
        static LABEL: LazyLock<HashMap<String, String>> =
            LazyLock::new(|| load(ValueCategory::Label));
        static CAP: LazyLock<HashMap<String, String>> = LazyLock::new(|| load(ValueCategory::Cap));
        static LOCATION: LazyLock<HashMap<String, String>> =
            LazyLock::new(|| load(ValueCategory::Location));
        static CONSTRAINT: LazyLock<HashMap<String, String>> =
            LazyLock::new(|| load(ValueCategory::Constraint));

        match self {
            ValueCategory::Label => &LABEL,
            ValueCategory::Cap => &CAP,
            ValueCategory::Location => &LOCATION,
            ValueCategory::Constraint => &CONSTRAINT,
        }
    }

    /// Returns `true` if `kind` is a recognized kind in this category.
    pub fn validate(self, kind: &str) -> bool {
        self.dictionary().contains_key(kind)
    }

    /// Returns the human-readable description of `kind`, if recognized.
    pub fn describe(self, kind: &str) -> Option<&'static str> {
        self.dictionary().get(kind).map(String::as_str)
    }

    /// All recognized kinds in this category.
    pub fn kinds(self) -> Vec<&'static str> {
        self.dictionary().keys().map(String::as_str).collect()
    }

    pub(crate) fn category_name(self) -> &'static str {
        match self {
            ValueCategory::Label => "label",
            ValueCategory::Cap => "cap",
            ValueCategory::Location => "location",
            ValueCategory::Constraint => "constraint",
        }
    }

    pub(crate) fn require(self, kind: &str) -> Result<()> {
        if self.validate(kind) {
            Ok(())
        } else {
            Err(SingleTestbedError::InvalidKind {
                category: self.category_name(),
                kind: kind.to_owned(),
            }
            .into())
        }
    }
}

fn load(category: ValueCategory) -> HashMap<String, String> {
    let parsed: Value =
        serde_json::from_str(category.raw()).expect("embedded type dictionary must be valid JSON");
    let Value::Object(map) = parsed else {
        panic!("embedded type dictionary for {category} must be a JSON object");
    };
    map.into_iter()
        .map(|(k, v)| {
            let desc = v.as_str().unwrap_or_default().to_owned();
            (k, desc)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_dictionary_loads_and_validates_known_kinds() {
        assert!(ValueCategory::Label.validate("vlan_range"));
        assert!(!ValueCategory::Label.validate("not_a_real_kind"));
    }

    #[test]
    fn cap_dictionary_has_core_and_bw() {
        assert!(ValueCategory::Cap.validate("core"));
        assert!(ValueCategory::Cap.validate("bw"));
    }
}
