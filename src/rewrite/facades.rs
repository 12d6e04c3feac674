//! The facade table: declarative substitutes for removed or changed host members.
//!
//! Each entry maps an old member signature (what mods compiled against a previous host
//! version expect) to its current replacement. Method facades may carry a short instruction
//! prelude inserted before each rewritten call site, e.g. pushing a default value for a
//! parameter the old overload didn't have, so the call site's own argument pushes stay
//! untouched.
//!
//! Facades are purely additive: the rewriter only consults this table after confirming the
//! original reference target is absent from the host metadata, so a facade can never shadow
//! a real member. Entries are immutable once added; changing a published facade signature
//! would break every mod compiled against it.

use std::collections::HashMap;

use crate::metadata::{
    instruction::Instruction,
    member::{FieldSig, MethodSig},
};

/// A substitute for a removed or changed host method.
#[derive(Debug, Clone)]
pub struct MethodFacade {
    /// The old signature mods were compiled against.
    pub old: MethodSig,
    /// The current method the call should target instead.
    pub replacement: MethodSig,
    /// Instructions inserted before each rewritten call site, typically pushes of
    /// default values for parameters added since the old signature.
    pub prelude: Vec<Instruction>,
}

/// A substitute for a removed or replaced host field.
#[derive(Debug, Clone)]
pub struct FieldFacade {
    /// The old signature mods were compiled against.
    pub old: FieldSig,
    /// The current field the access should target instead.
    pub replacement: FieldSig,
}

/// The set of all facades known to the runtime, built once at startup.
#[derive(Debug, Default)]
pub struct FacadeTable {
    methods: HashMap<String, MethodFacade>,
    fields: HashMap<String, FieldFacade>,
    types: HashMap<String, String>,
    assemblies: Vec<String>,
}

impl FacadeTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        FacadeTable::default()
    }

    /// Register a method facade.
    pub fn add_method(&mut self, facade: MethodFacade) {
        self.methods.insert(facade.old.to_string(), facade);
    }

    /// Register a field facade.
    pub fn add_field(&mut self, facade: FieldFacade) {
        self.fields.insert(facade.old.to_string(), facade);
    }

    /// Register a type facade mapping an old namespace-qualified type name to its
    /// current name.
    pub fn add_type(&mut self, old: impl Into<String>, replacement: impl Into<String>) {
        self.types.insert(old.into(), replacement.into());
    }

    /// Register the simple name of an assembly that ships facades, so references to it
    /// aren't reported as broken.
    pub fn add_assembly(&mut self, name: impl Into<String>) {
        self.assemblies.push(name.into());
    }

    /// Look up a method facade by the old signature.
    #[must_use]
    pub fn method(&self, old: &MethodSig) -> Option<&MethodFacade> {
        self.methods.get(&old.to_string())
    }

    /// Look up a field facade by the old signature.
    #[must_use]
    pub fn field(&self, old: &FieldSig) -> Option<&FieldFacade> {
        self.fields.get(&old.to_string())
    }

    /// Look up the replacement for an old type name.
    #[must_use]
    pub fn type_replacement(&self, old: &str) -> Option<&str> {
        self.types.get(old).map(String::as_str)
    }

    /// Whether the given simple assembly name is a facade assembly.
    #[must_use]
    pub fn has_assembly(&self, name: &str) -> bool {
        self.assemblies.iter().any(|a| a == name)
    }

    /// The number of registered facades across all member kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len() + self.fields.len() + self.types.len()
    }

    /// Whether the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_lookup_matches_old_signature_exactly() {
        let mut table = FacadeTable::new();
        let old = MethodSig::new(
            "Game.Inventory",
            "Add",
            "System.Void",
            vec!["Game.Item".into(), "System.Int32".into()],
        );
        let replacement = MethodSig::new(
            "Game.Inventory",
            "Add",
            "System.Void",
            vec!["Game.Item".into(), "System.Int32".into(), "System.Boolean".into()],
        );
        table.add_method(MethodFacade {
            old: old.clone(),
            replacement,
            prelude: vec![Instruction::ldc_i4(0)],
        });

        assert!(table.method(&old).is_some());

        let two_params_swapped = MethodSig::new(
            "Game.Inventory",
            "Add",
            "System.Void",
            vec!["System.Int32".into(), "Game.Item".into()],
        );
        assert!(table.method(&two_params_swapped).is_none());
    }

    #[test]
    fn type_replacement_lookup() {
        let mut table = FacadeTable::new();
        table.add_type("Game.Menu.InventoryPage", "Game.UI.InventoryPage");
        assert_eq!(
            table.type_replacement("Game.Menu.InventoryPage"),
            Some("Game.UI.InventoryPage")
        );
        assert_eq!(table.type_replacement("Game.UI.InventoryPage"), None);
    }
}
