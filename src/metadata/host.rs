//! An index of the host game's real, currently-loaded metadata.
//!
//! The rewriter and the patcher both resolve mod references against this index: a reference
//! into a host namespace must match a real member here, match a facade, or be reported as an
//! incompatibility. The embedding runtime builds one instance at startup from the game's
//! loaded assemblies and passes it by reference to all consumers.

use std::collections::HashSet;

use crate::metadata::member::{FieldSig, MethodSig};

/// The host process's loaded metadata: assemblies, types, methods, and fields.
#[derive(Debug, Default)]
pub struct HostMetadata {
    sixty_four_bit: bool,
    assemblies: HashSet<String>,
    namespaces: Vec<String>,
    types: HashSet<String>,
    methods: HashSet<String>,
    fields: HashSet<String>,
}

impl HostMetadata {
    /// Create an empty index for a 64-bit host.
    #[must_use]
    pub fn new() -> Self {
        HostMetadata {
            sixty_four_bit: true,
            ..HostMetadata::default()
        }
    }

    /// Set whether the host process is 64-bit.
    #[must_use]
    pub fn with_64bit(mut self, sixty_four_bit: bool) -> Self {
        self.sixty_four_bit = sixty_four_bit;
        self
    }

    /// Whether the host process is 64-bit.
    #[must_use]
    pub fn is_64bit(&self) -> bool {
        self.sixty_four_bit
    }

    /// Register a loaded host assembly by simple name.
    pub fn add_assembly(&mut self, name: impl Into<String>) {
        self.assemblies.insert(name.into());
    }

    /// Register a namespace prefix owned by the host, e.g. `Game`.
    ///
    /// Only references into registered namespaces are validated; everything else is assumed
    /// to be runtime or third-party code outside this core's responsibility.
    pub fn add_namespace(&mut self, prefix: impl Into<String>) {
        self.namespaces.push(prefix.into());
    }

    /// Register a real host type by namespace-qualified name.
    pub fn add_type(&mut self, full_name: impl Into<String>) {
        self.types.insert(full_name.into());
    }

    /// Register a real host method.
    pub fn add_method(&mut self, sig: &MethodSig) {
        self.methods.insert(sig.to_string());
    }

    /// Register a real host field.
    pub fn add_field(&mut self, sig: &FieldSig) {
        self.fields.insert(sig.to_string());
    }

    /// Whether an assembly with the given simple name is loaded in the host.
    #[must_use]
    pub fn has_assembly(&self, name: &str) -> bool {
        self.assemblies.contains(name)
    }

    /// Whether the given namespace-qualified type exists in the host.
    #[must_use]
    pub fn has_type(&self, full_name: &str) -> bool {
        self.types.contains(full_name)
    }

    /// Whether the given method exists in the host with an identical signature.
    #[must_use]
    pub fn has_method(&self, sig: &MethodSig) -> bool {
        self.methods.contains(&sig.to_string())
    }

    /// Whether the given method signature text exists in the host.
    #[must_use]
    pub fn has_method_signature(&self, signature: &str) -> bool {
        self.methods.contains(signature)
    }

    /// Iterate every registered method signature text.
    pub fn method_signatures(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(String::as_str)
    }

    /// Whether the given field exists in the host with an identical signature.
    #[must_use]
    pub fn has_field(&self, sig: &FieldSig) -> bool {
        self.fields.contains(&sig.to_string())
    }

    /// Whether a namespace-qualified type name falls within a host-owned namespace.
    #[must_use]
    pub fn is_host_type(&self, full_name: &str) -> bool {
        self.namespaces.iter().any(|ns| {
            full_name == ns
                || (full_name.len() > ns.len()
                    && full_name.starts_with(ns.as_str())
                    && full_name.as_bytes()[ns.len()] == b'.')
        })
    }
}
