//! The module data model: tokens, reference tables, type and method definitions, and the
//! reader/writer pair for the on-disk module image format.
//!
//! A [`Module`] is the in-memory form of one mod assembly. The loader owns it exclusively
//! while the rewriter mutates it in place; afterwards [`writer::write_module`] serializes the
//! mutated tables back to bytes for the process's assembly-loading mechanism.

pub mod body;
pub mod host;
pub mod instruction;
pub mod member;
pub mod reader;
pub mod token;
pub mod writer;

use bitflags::bitflags;

use crate::metadata::{
    body::MethodBody,
    member::{FieldRefRow, FieldSig, MethodRefRow, MethodSig, TypeRefRow},
    token::{table, Token},
};

bitflags! {
    /// Module-level attribute flags stored in the image header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModuleFlags: u32 {
        /// The module can only be loaded into a 64-bit host process.
        const REQUIRES_64BIT = 0x0000_0001;
    }
}

/// The debug header embedded in a module image, describing its adjacent symbol stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugHeader {
    /// The symbol format identifier the symbols were written with.
    pub format: u16,
    /// The symbol generation, incremented on each rebuild.
    pub age: u32,
}

/// A method definition within a type definition.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    /// The method name.
    pub name: String,
    /// The method body.
    pub body: MethodBody,
}

/// A type definition within a module.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    /// The namespace-qualified type name.
    pub full_name: String,
    /// The methods defined by this type.
    pub methods: Vec<MethodDef>,
}

/// A parsed module: metadata tables plus type definitions with method bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// The module name, e.g. `ExampleMod`.
    pub name: String,
    /// Module-level attribute flags.
    pub flags: ModuleFlags,
    /// The debug header, if the module was built with symbols.
    pub debug_header: Option<DebugHeader>,
    /// Simple names of assemblies this module references.
    pub assembly_refs: Vec<String>,
    /// The type reference table.
    pub type_refs: Vec<TypeRefRow>,
    /// The method reference table.
    pub method_refs: Vec<MethodRefRow>,
    /// The field reference table.
    pub field_refs: Vec<FieldRefRow>,
    /// The type definitions.
    pub types: Vec<TypeDef>,
}

impl Module {
    /// Create an empty module with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            flags: ModuleFlags::empty(),
            debug_header: None,
            assembly_refs: Vec::new(),
            type_refs: Vec::new(),
            method_refs: Vec::new(),
            field_refs: Vec::new(),
            types: Vec::new(),
        }
    }

    /// The full name of the type reference at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the index is out of range.
    pub fn type_ref_name(&self, index: u32) -> crate::Result<&str> {
        self.type_refs
            .get(index as usize)
            .map(|row| row.full_name.as_str())
            .ok_or_else(|| malformed_error!("Type ref index out of range - {}", index))
    }

    /// Resolve the method reference at `index` to a fully-qualified signature.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the index or its declaring type is out of range.
    pub fn method_sig(&self, index: u32) -> crate::Result<MethodSig> {
        let row = self
            .method_refs
            .get(index as usize)
            .ok_or_else(|| malformed_error!("Method ref index out of range - {}", index))?;
        Ok(MethodSig {
            declaring_type: self.type_ref_name(row.declaring_type)?.to_string(),
            name: row.name.clone(),
            return_type: row.return_type.clone(),
            params: row.params.clone(),
        })
    }

    /// Resolve the field reference at `index` to a fully-qualified signature.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the index or its declaring type is out of range.
    pub fn field_sig(&self, index: u32) -> crate::Result<FieldSig> {
        let row = self
            .field_refs
            .get(index as usize)
            .ok_or_else(|| malformed_error!("Field ref index out of range - {}", index))?;
        Ok(FieldSig {
            declaring_type: self.type_ref_name(row.declaring_type)?.to_string(),
            name: row.name.clone(),
            field_type: row.field_type.clone(),
        })
    }

    /// Find or add a type reference for the given full name, returning its index.
    pub fn ensure_type_ref(&mut self, full_name: &str) -> u32 {
        if let Some(index) = self
            .type_refs
            .iter()
            .position(|row| row.full_name == full_name)
        {
            return index as u32;
        }
        self.type_refs.push(TypeRefRow {
            full_name: full_name.to_string(),
        });
        (self.type_refs.len() - 1) as u32
    }

    /// Find or add a method reference matching the given signature, returning its index.
    pub fn ensure_method_ref(&mut self, sig: &MethodSig) -> u32 {
        let declaring_type = self.ensure_type_ref(&sig.declaring_type);
        if let Some(index) = self.method_refs.iter().position(|row| {
            row.declaring_type == declaring_type
                && row.name == sig.name
                && row.return_type == sig.return_type
                && row.params == sig.params
        }) {
            return index as u32;
        }
        self.method_refs.push(MethodRefRow {
            declaring_type,
            name: sig.name.clone(),
            return_type: sig.return_type.clone(),
            params: sig.params.clone(),
        });
        (self.method_refs.len() - 1) as u32
    }

    /// Find or add a field reference matching the given signature, returning its index.
    pub fn ensure_field_ref(&mut self, sig: &FieldSig) -> u32 {
        let declaring_type = self.ensure_type_ref(&sig.declaring_type);
        if let Some(index) = self.field_refs.iter().position(|row| {
            row.declaring_type == declaring_type
                && row.name == sig.name
                && row.field_type == sig.field_type
        }) {
            return index as u32;
        }
        self.field_refs.push(FieldRefRow {
            declaring_type,
            name: sig.name.clone(),
            field_type: sig.field_type.clone(),
        });
        (self.field_refs.len() - 1) as u32
    }

    /// The metadata token for a method definition, identified by type and method position.
    ///
    /// Rows are numbered sequentially across all type definitions in declaration order,
    /// matching the numbering symbol streams use.
    #[must_use]
    pub fn method_token(&self, type_index: usize, method_index: usize) -> Token {
        let mut row = 1u32;
        for t in self.types.iter().take(type_index) {
            row += t.methods.len() as u32;
        }
        row += method_index as u32;
        Token::from_row(table::METHOD_DEF, row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_type_ref_deduplicates() {
        let mut module = Module::new("Test");
        let a = module.ensure_type_ref("Game.Item");
        let b = module.ensure_type_ref("Game.Item");
        let c = module.ensure_type_ref("Game.Player");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(module.type_refs.len(), 2);
    }

    #[test]
    fn method_sig_resolves_declaring_type() {
        let mut module = Module::new("Test");
        let sig = MethodSig::new("Game.Inventory", "Add", "System.Void", vec!["Game.Item".into()]);
        let index = module.ensure_method_ref(&sig);
        assert_eq!(module.method_sig(index).unwrap(), sig);
        assert!(module.method_sig(99).is_err());
    }

    #[test]
    fn method_tokens_number_rows_across_types() {
        let mut module = Module::new("Test");
        module.types.push(TypeDef {
            full_name: "Mod.A".into(),
            methods: vec![
                MethodDef { name: "M1".into(), body: MethodBody::default() },
                MethodDef { name: "M2".into(), body: MethodBody::default() },
            ],
        });
        module.types.push(TypeDef {
            full_name: "Mod.B".into(),
            methods: vec![MethodDef { name: "M3".into(), body: MethodBody::default() }],
        });

        assert_eq!(module.method_token(0, 0).row(), 1);
        assert_eq!(module.method_token(0, 1).row(), 2);
        assert_eq!(module.method_token(1, 0).row(), 3);
        assert_eq!(module.method_token(1, 0).table(), table::METHOD_DEF);
    }
}
