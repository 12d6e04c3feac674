//! The built-in rewrite rules, in their declared precedence order.
//!
//! 1. [`ArchitectureFinder`] - module flagged 64-bit-only on a 32-bit host (fatal).
//! 2. [`FacadeMethodRewriter`] - removed host method with a facade replacement.
//! 3. [`FacadeFieldRewriter`] - removed/replaced host field with a facade replacement.
//! 4. [`FacadeTypeRewriter`] - moved/renamed host type with a facade replacement.
//! 5. [`MissingMemberFinder`] - any remaining host reference that resolves to nothing.

use std::collections::HashMap;

use crate::{
    metadata::{instruction::Instruction, Module, ModuleFlags},
    rewrite::handler::{HandleResult, HandlerContext, InstructionHandler},
};

/// Flags assemblies that can't load on the current host architecture at all.
#[derive(Debug, Default)]
pub struct ArchitectureFinder;

impl InstructionHandler for ArchitectureFinder {
    fn default_phrase(&self) -> &str {
        "32-bit architecture"
    }

    fn handle_module(&mut self, module: &mut Module, cx: &HandlerContext<'_>) -> HandleResult {
        if module.flags.contains(ModuleFlags::REQUIRES_64BIT) && !cx.host.is_64bit() {
            return HandleResult::fatal("the assembly requires a 64-bit process");
        }
        HandleResult::Unchanged
    }
}

/// A call-site prelude pending insertion for a rewritten method reference.
#[derive(Debug, Clone)]
struct PendingPrelude {
    phrase: String,
    instructions: Vec<Instruction>,
}

/// Rewrites references to removed host methods to their facade replacements.
///
/// The reference table row is rewritten in place so every call site retargets at once;
/// facades with an instruction prelude additionally get the prelude inserted before each
/// call site during the body walk.
#[derive(Debug, Default)]
pub struct FacadeMethodRewriter {
    preludes: HashMap<u32, PendingPrelude>,
}

impl InstructionHandler for FacadeMethodRewriter {
    fn default_phrase(&self) -> &str {
        "removed method"
    }

    fn handle_method_ref(
        &mut self,
        module: &mut Module,
        index: usize,
        cx: &HandlerContext<'_>,
    ) -> HandleResult {
        let Ok(sig) = module.method_sig(index as u32) else {
            return HandleResult::Unchanged;
        };
        if !cx.host.is_host_type(&sig.declaring_type) || cx.host.has_method(&sig) {
            return HandleResult::Unchanged;
        }
        let Some(facade) = cx.facades.method(&sig) else {
            return HandleResult::Unchanged;
        };
        if !cx.rewrite {
            return HandleResult::incompatible(format!("reference to removed method '{sig}'"));
        }

        let replacement = facade.replacement.clone();
        let prelude = facade.prelude.clone();
        let phrase = sig.to_string();

        let declaring_type = module.ensure_type_ref(&replacement.declaring_type);
        let row = &mut module.method_refs[index];
        row.declaring_type = declaring_type;
        row.name = replacement.name;
        row.return_type = replacement.return_type;
        row.params = replacement.params;

        if !prelude.is_empty() {
            self.preludes.insert(
                index as u32,
                PendingPrelude {
                    phrase: phrase.clone(),
                    instructions: prelude,
                },
            );
        }

        HandleResult::rewritten(phrase)
    }

    fn handle_instruction(
        &mut self,
        module: &mut Module,
        type_index: usize,
        method_index: usize,
        il_index: usize,
        _cx: &HandlerContext<'_>,
    ) -> HandleResult {
        let body = &module.types[type_index].methods[method_index].body;
        let Some(method_ref) = body.instructions[il_index].method_ref() else {
            return HandleResult::Unchanged;
        };
        let Some(pending) = self.preludes.get(&method_ref).cloned() else {
            return HandleResult::Unchanged;
        };

        let body = &mut module.types[type_index].methods[method_index].body;
        body.insert_before(il_index, pending.instructions);
        HandleResult::rewritten(pending.phrase)
    }
}

/// Rewrites references to removed or replaced host fields to their facade replacements.
#[derive(Debug, Default)]
pub struct FacadeFieldRewriter;

impl InstructionHandler for FacadeFieldRewriter {
    fn default_phrase(&self) -> &str {
        "removed field"
    }

    fn handle_field_ref(
        &mut self,
        module: &mut Module,
        index: usize,
        cx: &HandlerContext<'_>,
    ) -> HandleResult {
        let Ok(sig) = module.field_sig(index as u32) else {
            return HandleResult::Unchanged;
        };
        if !cx.host.is_host_type(&sig.declaring_type) || cx.host.has_field(&sig) {
            return HandleResult::Unchanged;
        }
        let Some(facade) = cx.facades.field(&sig) else {
            return HandleResult::Unchanged;
        };
        if !cx.rewrite {
            return HandleResult::incompatible(format!("reference to removed field '{sig}'"));
        }

        let replacement = facade.replacement.clone();
        let declaring_type = module.ensure_type_ref(&replacement.declaring_type);
        let row = &mut module.field_refs[index];
        row.declaring_type = declaring_type;
        row.name = replacement.name;
        row.field_type = replacement.field_type;

        HandleResult::rewritten(sig.to_string())
    }
}

/// Rewrites references to moved or renamed host types to their facade replacements.
///
/// Renaming the type reference row in place retargets every method and field reference
/// declared on that type, since they point at the row by index.
#[derive(Debug, Default)]
pub struct FacadeTypeRewriter;

impl InstructionHandler for FacadeTypeRewriter {
    fn default_phrase(&self) -> &str {
        "moved type"
    }

    fn handle_type_ref(
        &mut self,
        module: &mut Module,
        index: usize,
        cx: &HandlerContext<'_>,
    ) -> HandleResult {
        let old_name = module.type_refs[index].full_name.clone();
        if !cx.host.is_host_type(&old_name) || cx.host.has_type(&old_name) {
            return HandleResult::Unchanged;
        }
        let Some(replacement) = cx.facades.type_replacement(&old_name) else {
            return HandleResult::Unchanged;
        };
        if !cx.rewrite {
            return HandleResult::incompatible(format!("reference to moved type '{old_name}'"));
        }

        module.type_refs[index].full_name = replacement.to_string();
        HandleResult::rewritten(old_name)
    }
}

/// Flags any remaining host reference that resolves to neither real metadata nor a facade.
///
/// Runs last so the facade rewriters get the first chance at every node. Type references
/// are checked at the table level; member references are checked at their call and access
/// sites instead, so the diagnostic points at the mod author's source line when symbols
/// are available. A member reference no instruction uses is harmless and stays unflagged.
#[derive(Debug, Default)]
pub struct MissingMemberFinder;

impl InstructionHandler for MissingMemberFinder {
    fn default_phrase(&self) -> &str {
        "missing member"
    }

    fn handle_type_ref(
        &mut self,
        module: &mut Module,
        index: usize,
        cx: &HandlerContext<'_>,
    ) -> HandleResult {
        let name = &module.type_refs[index].full_name;
        if cx.host.is_host_type(name)
            && !cx.host.has_type(name)
            && cx.facades.type_replacement(name).is_none()
        {
            return HandleResult::incompatible(format!("reference to missing type '{name}'"));
        }
        HandleResult::Unchanged
    }

    fn handle_instruction(
        &mut self,
        module: &mut Module,
        type_index: usize,
        method_index: usize,
        il_index: usize,
        cx: &HandlerContext<'_>,
    ) -> HandleResult {
        let instruction = &module.types[type_index].methods[method_index].body.instructions[il_index];

        if let Some(index) = instruction.method_ref() {
            let Ok(sig) = module.method_sig(index) else {
                return HandleResult::Unchanged;
            };
            if cx.host.is_host_type(&sig.declaring_type)
                && !cx.host.has_method(&sig)
                && cx.facades.method(&sig).is_none()
            {
                return HandleResult::incompatible(format!("reference to missing method '{sig}'"));
            }
        } else if let Some(index) = instruction.field_ref() {
            let Ok(sig) = module.field_sig(index) else {
                return HandleResult::Unchanged;
            };
            if cx.host.is_host_type(&sig.declaring_type)
                && !cx.host.has_field(&sig)
                && cx.facades.field(&sig).is_none()
            {
                return HandleResult::incompatible(format!("reference to missing field '{sig}'"));
            }
        }
        HandleResult::Unchanged
    }
}
