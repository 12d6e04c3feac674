//! The handler trait through which all rewrite rules run.
//!
//! Each rule inspects one metadata node at a time (the module itself, a reference table row,
//! or a single body instruction) and either leaves it untouched, rewrites it, or flags it.
//! Rules run in a fixed, declared order; a node is claimed by the first rule that returns
//! anything other than [`HandleResult::Unchanged`], so specific rules (an exact removed
//! method) take precedence over general ones (any unresolved host reference).

use crate::{
    metadata::{host::HostMetadata, Module},
    rewrite::{facades::FacadeTable, Severity},
};

/// How a handler disposed of a metadata node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleResult {
    /// The node needs no special handling; later handlers may still claim it.
    Unchanged,
    /// The node was rewritten for compatibility. The phrase is a brief noun phrase
    /// describing what was fixed, e.g. a removed method's signature.
    Rewritten {
        /// What was rewritten.
        phrase: String,
    },
    /// The node was claimed but could not (or must not) be fixed.
    Flagged {
        /// How badly the issue affects loadability.
        severity: Severity,
        /// A brief noun phrase describing the issue.
        phrase: String,
    },
}

impl HandleResult {
    /// Shorthand for an incompatible flag.
    #[must_use]
    pub fn incompatible(phrase: impl Into<String>) -> Self {
        HandleResult::Flagged {
            severity: Severity::Incompatible,
            phrase: phrase.into(),
        }
    }

    /// Shorthand for a fatal flag.
    #[must_use]
    pub fn fatal(phrase: impl Into<String>) -> Self {
        HandleResult::Flagged {
            severity: Severity::Fatal,
            phrase: phrase.into(),
        }
    }

    /// Shorthand for a successful rewrite.
    #[must_use]
    pub fn rewritten(phrase: impl Into<String>) -> Self {
        HandleResult::Rewritten {
            phrase: phrase.into(),
        }
    }
}

/// Shared, read-only context passed to every handler invocation.
pub struct HandlerContext<'a> {
    /// The host process's real loaded metadata.
    pub host: &'a HostMetadata,
    /// The facade table for removed/changed host members.
    pub facades: &'a FacadeTable,
    /// Whether rewriting is enabled; when false, handlers report incompatibilities
    /// instead of fixing them.
    pub rewrite: bool,
}

/// Performs predefined logic for one kind of metadata node.
///
/// Default implementations leave every node untouched, so a rule only overrides the node
/// kinds it cares about.
pub trait InstructionHandler {
    /// A brief noun phrase indicating what the handler matches, used in diagnostics when
    /// a specific phrase isn't available.
    fn default_phrase(&self) -> &str;

    /// Handle the module definition itself (flags, header-level issues).
    fn handle_module(&mut self, module: &mut Module, cx: &HandlerContext<'_>) -> HandleResult {
        let _ = (module, cx);
        HandleResult::Unchanged
    }

    /// Handle the type reference table row at `index`.
    fn handle_type_ref(
        &mut self,
        module: &mut Module,
        index: usize,
        cx: &HandlerContext<'_>,
    ) -> HandleResult {
        let _ = (module, index, cx);
        HandleResult::Unchanged
    }

    /// Handle the method reference table row at `index`.
    fn handle_method_ref(
        &mut self,
        module: &mut Module,
        index: usize,
        cx: &HandlerContext<'_>,
    ) -> HandleResult {
        let _ = (module, index, cx);
        HandleResult::Unchanged
    }

    /// Handle the field reference table row at `index`.
    fn handle_field_ref(
        &mut self,
        module: &mut Module,
        index: usize,
        cx: &HandlerContext<'_>,
    ) -> HandleResult {
        let _ = (module, index, cx);
        HandleResult::Unchanged
    }

    /// Handle one body instruction, identified by type, method, and instruction index.
    ///
    /// Handlers may mutate the body, including inserting instructions before
    /// `il_index`; the engine detects insertions and renumbers its walk accordingly.
    fn handle_instruction(
        &mut self,
        module: &mut Module,
        type_index: usize,
        method_index: usize,
        il_index: usize,
        cx: &HandlerContext<'_>,
    ) -> HandleResult {
        let _ = (module, type_index, method_index, il_index, cx);
        HandleResult::Unchanged
    }
}
