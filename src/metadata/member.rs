//! Member references and fully-qualified member signatures.
//!
//! A module's instruction stream never embeds member names directly; instructions carry
//! indices into the module's reference tables ([`TypeRefRow`], [`MethodRefRow`],
//! [`FieldRefRow`]). Rewriting a table row therefore retargets every call site that uses it.
//!
//! [`MethodSig`] and [`FieldSig`] are the resolved, fully-qualified forms used for matching
//! against host metadata and the facade table. Their `Display` output is the canonical
//! signature text, e.g. `System.Void Game.Inventory::Add(Game.Item, System.Int32)`.

use std::fmt;

/// A row in the type reference table: an external type referenced by the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRefRow {
    /// The namespace-qualified type name, e.g. `Game.Inventory`.
    pub full_name: String,
}

/// A row in the method reference table: an external method referenced by the module.
///
/// The declaring type is an index into the type reference table, so renaming a type
/// reference retargets every method reference into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRefRow {
    /// Index into the type reference table for the declaring type.
    pub declaring_type: u32,
    /// The method name.
    pub name: String,
    /// The namespace-qualified return type name.
    pub return_type: String,
    /// The namespace-qualified parameter type names, in order.
    pub params: Vec<String>,
}

/// A row in the field reference table: an external field referenced by the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRefRow {
    /// Index into the type reference table for the declaring type.
    pub declaring_type: u32,
    /// The field name.
    pub name: String,
    /// The namespace-qualified field type name.
    pub field_type: String,
}

/// A fully-qualified method signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSig {
    /// The namespace-qualified declaring type name.
    pub declaring_type: String,
    /// The method name.
    pub name: String,
    /// The namespace-qualified return type name.
    pub return_type: String,
    /// The namespace-qualified parameter type names, in order.
    pub params: Vec<String>,
}

impl MethodSig {
    /// Create a signature from its parts.
    #[must_use]
    pub fn new(
        declaring_type: impl Into<String>,
        name: impl Into<String>,
        return_type: impl Into<String>,
        params: Vec<String>,
    ) -> Self {
        MethodSig {
            declaring_type: declaring_type.into(),
            name: name.into(),
            return_type: return_type.into(),
            params,
        }
    }
}

impl fmt::Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}::{}({})",
            self.return_type,
            self.declaring_type,
            self.name,
            self.params.join(", ")
        )
    }
}

/// A fully-qualified field signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldSig {
    /// The namespace-qualified declaring type name.
    pub declaring_type: String,
    /// The field name.
    pub name: String,
    /// The namespace-qualified field type name.
    pub field_type: String,
}

impl FieldSig {
    /// Create a signature from its parts.
    #[must_use]
    pub fn new(
        declaring_type: impl Into<String>,
        name: impl Into<String>,
        field_type: impl Into<String>,
    ) -> Self {
        FieldSig {
            declaring_type: declaring_type.into(),
            name: name.into(),
            field_type: field_type.into(),
        }
    }
}

impl fmt::Display for FieldSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}::{}", self.field_type, self.declaring_type, self.name)
    }
}
