//! Enum registry: per-type mapping between integer codes and symbolic labels.
//!
//! Labels are what ends up in storage (`color="red"` rather than
//! `color=1`), which keeps hand-edited files readable.  The registry is
//! populated during startup and only read afterwards.
//!
//! A label must start with an ASCII letter and must not contain whitespace,
//! quotes or backslashes, e.g. `yes`, `light_cyan`, `green-orange`.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::domain::type_tag::TypeTag;

/// Errors raised while registering enum labels.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnumRegistryError {
    /// The label breaks the label rules.
    #[error("invalid enum label {label:?} for {type_tag}")]
    InvalidLabel { type_tag: TypeTag, label: String },

    /// Only [`TypeTag::Enum`] tags can carry labels.
    #[error("{0} is not an enumeration tag")]
    NotAnEnum(TypeTag),
}

#[derive(Debug, Default)]
struct EnumTable {
    by_label: HashMap<String, i64>,
    by_code: BTreeMap<i64, String>,
}

/// Bidirectional code/label tables keyed by enum type tag.
#[derive(Debug, Default)]
pub struct EnumRegistry {
    tables: HashMap<TypeTag, EnumTable>,
}

impl EnumRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `label` as the symbolic name of `code` for `type_tag`.
    ///
    /// Registering the same code or label again replaces the earlier
    /// mapping in that direction.
    ///
    /// # Errors
    ///
    /// Returns [`EnumRegistryError::NotAnEnum`] for non-enum tags and
    /// [`EnumRegistryError::InvalidLabel`] for labels that could not be
    /// stored unquoted.
    pub fn register(
        &mut self,
        type_tag: &TypeTag,
        code: i64,
        label: &str,
    ) -> Result<(), EnumRegistryError> {
        if !matches!(type_tag, TypeTag::Enum(_)) {
            return Err(EnumRegistryError::NotAnEnum(type_tag.clone()));
        }
        if !is_valid_label(label) {
            return Err(EnumRegistryError::InvalidLabel {
                type_tag: type_tag.clone(),
                label: label.to_string(),
            });
        }
        let table = self.tables.entry(type_tag.clone()).or_default();
        table.by_label.insert(label.to_string(), code);
        table.by_code.insert(code, label.to_string());
        Ok(())
    }

    /// Returns `true` if at least one label is registered for `type_tag`.
    pub fn is_enum(&self, type_tag: &TypeTag) -> bool {
        self.tables.contains_key(type_tag)
    }

    /// Looks up the code registered for `label`.
    pub fn code_of(&self, type_tag: &TypeTag, label: &str) -> Option<i64> {
        self.tables.get(type_tag)?.by_label.get(label).copied()
    }

    /// Looks up the label registered for `code`.
    pub fn label_of(&self, type_tag: &TypeTag, code: i64) -> Option<&str> {
        self.tables
            .get(type_tag)?
            .by_code
            .get(&code)
            .map(String::as_str)
    }

    /// All (code, label) pairs of `type_tag`, ordered by code.
    pub fn labels(&self, type_tag: &TypeTag) -> Vec<(i64, String)> {
        self.tables
            .get(type_tag)
            .map(|table| {
                table
                    .by_code
                    .iter()
                    .map(|(code, label)| (*code, label.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn is_valid_label(label: &str) -> bool {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| !c.is_whitespace() && !matches!(c, '"' | '\'' | '\\'))
}
