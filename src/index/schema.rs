//! Typed attribute schemas.
//!
//! Each namespace declares its attribute fields up front. `add` validates
//! against the declaration, so a wrong-kinded or undeclared attribute fails
//! at write time instead of surfacing later as a stringified value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::model::Attributes;

/// Kind of an attribute field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
        }
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Text,
        }
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Number,
        }
    }
}

/// Declared attribute fields of a namespace.
///
/// Fields are optional per record; what the schema enforces is that every
/// attribute a record does carry is declared and correctly kinded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    fields: BTreeMap<String, FieldKind>,
}

/// A single schema check failure, reported by field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaCheck {
    UndeclaredField {
        field: String,
    },
    KindMismatch {
        field: String,
        declared: FieldKind,
        actual: FieldKind,
    },
}

impl std::fmt::Display for SchemaCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaCheck::UndeclaredField { field } => {
                write!(f, "attribute '{field}' is not declared in the schema")
            }
            SchemaCheck::KindMismatch {
                field,
                declared,
                actual,
            } => write!(
                f,
                "attribute '{field}' is declared as {} but got {}",
                declared.as_str(),
                actual.as_str()
            ),
        }
    }
}

impl Schema {
    pub fn new(fields: impl IntoIterator<Item = FieldSpec>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|spec| (spec.name, spec.kind))
                .collect(),
        }
    }

    pub fn field(&self, name: &str) -> Option<FieldKind> {
        self.fields.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Checks an attribute map against the declaration. Returns the first
    /// violation found, in field order, or `Ok(())`.
    pub fn check(&self, attributes: &Attributes) -> Result<(), SchemaCheck> {
        for (name, value) in attributes {
            match self.fields.get(name) {
                None => {
                    return Err(SchemaCheck::UndeclaredField {
                        field: name.clone(),
                    });
                }
                Some(declared) if *declared != value.kind() => {
                    return Err(SchemaCheck::KindMismatch {
                        field: name.clone(),
                        declared: *declared,
                        actual: value.kind(),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}
