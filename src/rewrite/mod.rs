//! The compatibility engine: walks a module's metadata and rewrites or flags references
//! to host members that changed shape since the mod was compiled.
//!
//! The engine runs a fixed, ordered set of [`handler::InstructionHandler`] rules over every
//! type reference, method reference, field reference, and body instruction. A node is
//! claimed by the first rule that handles it; rewrites mutate the module in place and
//! everything noteworthy accumulates as [`Diagnostic`] entries. One unrewritable reference
//! never aborts the walk - the caller decides afterwards whether the accumulated
//! diagnostics are severe enough to refuse loading.

pub mod facades;
pub mod handler;
pub mod handlers;

use std::collections::HashSet;
use std::fmt;

use crate::{
    loader::symbols::SymbolReader,
    metadata::{host::HostMetadata, token::Token, Module},
    rewrite::{
        facades::FacadeTable,
        handler::{HandleResult, HandlerContext, InstructionHandler},
        handlers::{
            ArchitectureFinder, FacadeFieldRewriter, FacadeMethodRewriter, FacadeTypeRewriter,
            MissingMemberFinder,
        },
    },
};

/// How badly a rewrite issue affects loadability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
pub enum Severity {
    /// The issue was rewritten for compatibility; behavior may differ subtly.
    Warning,
    /// The reference could not be rewritten; the assembly will likely fail at the
    /// affected call site.
    Incompatible,
    /// The assembly cannot be loaded at all.
    Fatal,
}

/// One diagnostic entry produced while rewriting a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Where the issue was found: a type/method and IL offset (with source line info when
    /// symbols are available), or the module name for table-level issues.
    pub location: String,
    /// How badly the issue affects loadability.
    pub severity: Severity,
    /// The human-readable message, phrased for the mod's end user.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.severity, self.message, self.location)
    }
}

/// Configuration for the rewrite pipeline.
#[derive(Debug, Clone, Copy)]
pub struct RewritePolicy {
    /// Whether to rewrite assemblies for compatibility. When false, incompatibilities
    /// are reported but not fixed.
    pub rewrite_enabled: bool,
    /// Whether to load assemblies despite `Incompatible` diagnostics, favoring partial
    /// functionality over refusal. Mods are expected to fail at the specific broken call
    /// site instead of not loading at all.
    pub assume_compatible: bool,
}

impl Default for RewritePolicy {
    fn default() -> Self {
        RewritePolicy {
            rewrite_enabled: true,
            assume_compatible: true,
        }
    }
}

/// The result of rewriting one module.
#[derive(Debug)]
pub struct RewriteOutcome {
    /// Whether any metadata was changed.
    pub changed: bool,
    /// All diagnostics, deduplicated by message, in discovery order.
    pub diagnostics: Vec<Diagnostic>,
}

impl RewriteOutcome {
    /// The highest severity across all diagnostics, if any.
    #[must_use]
    pub fn max_severity(&self) -> Option<Severity> {
        self.diagnostics.iter().map(|d| d.severity).max()
    }
}

/// The compatibility engine for one resolution context.
pub struct RewriteEngine<'a> {
    host: &'a HostMetadata,
    facades: &'a FacadeTable,
    policy: RewritePolicy,
    handlers: Vec<Box<dyn InstructionHandler>>,
}

impl<'a> RewriteEngine<'a> {
    /// Create an engine with the built-in rule set in its declared order.
    #[must_use]
    pub fn new(host: &'a HostMetadata, facades: &'a FacadeTable, policy: RewritePolicy) -> Self {
        RewriteEngine {
            host,
            facades,
            policy,
            handlers: vec![
                Box::new(ArchitectureFinder),
                Box::new(FacadeMethodRewriter::default()),
                Box::new(FacadeFieldRewriter),
                Box::new(FacadeTypeRewriter),
                Box::new(MissingMemberFinder),
            ],
        }
    }

    /// Rewrite a module in place, returning accumulated diagnostics.
    ///
    /// When a symbol reader is supplied, instruction-level diagnostic locations include
    /// the original source line and column.
    pub fn rewrite_module(
        &mut self,
        module: &mut Module,
        mut symbols: Option<&mut SymbolReader>,
    ) -> RewriteOutcome {
        let cx = HandlerContext {
            host: self.host,
            facades: self.facades,
            rewrite: self.policy.rewrite_enabled,
        };
        let mut collector = Collector::new(&module.name);

        // the module node itself
        let filename = collector.filename.clone();
        for h in &mut self.handlers {
            match h.handle_module(module, &cx) {
                HandleResult::Unchanged => {}
                result => {
                    collector.record(filename, result);
                    break;
                }
            }
        }

        // reference tables; handlers may append rows, so walk by index
        let mut index = 0;
        while index < module.type_refs.len() {
            Self::claim(&mut self.handlers, &mut collector, |h| {
                h.handle_type_ref(module, index, &cx)
            });
            index += 1;
        }
        let mut index = 0;
        while index < module.method_refs.len() {
            Self::claim(&mut self.handlers, &mut collector, |h| {
                h.handle_method_ref(module, index, &cx)
            });
            index += 1;
        }
        let mut index = 0;
        while index < module.field_refs.len() {
            Self::claim(&mut self.handlers, &mut collector, |h| {
                h.handle_field_ref(module, index, &cx)
            });
            index += 1;
        }

        // method bodies
        for type_index in 0..module.types.len() {
            for method_index in 0..module.types[type_index].methods.len() {
                let token = module.method_token(type_index, method_index);
                let mut il_index = 0;
                while il_index < module.types[type_index].methods[method_index].body.instructions.len()
                {
                    let before = module.types[type_index].methods[method_index]
                        .body
                        .instructions
                        .len();
                    let mut claimed = None;
                    for h in &mut self.handlers {
                        match h.handle_instruction(module, type_index, method_index, il_index, &cx)
                        {
                            HandleResult::Unchanged => {}
                            result => {
                                claimed = Some(result);
                                break;
                            }
                        }
                    }
                    let inserted = module.types[type_index].methods[method_index]
                        .body
                        .instructions
                        .len()
                        - before;

                    if let Some(result) = claimed {
                        let location = instruction_location(
                            module,
                            type_index,
                            method_index,
                            il_index + inserted,
                            token,
                            symbols.as_deref_mut(),
                        );
                        collector.record(location, result);
                    }

                    il_index += inserted + 1;
                }
            }
        }

        RewriteOutcome {
            changed: collector.changed,
            diagnostics: collector.diagnostics,
        }
    }

    fn claim<F>(
        handlers: &mut [Box<dyn InstructionHandler>],
        collector: &mut Collector,
        mut node: F,
    ) where
        F: FnMut(&mut Box<dyn InstructionHandler>) -> HandleResult,
    {
        let location = collector.filename.clone();
        for h in handlers {
            match node(h) {
                HandleResult::Unchanged => {}
                result => {
                    collector.record(location, result);
                    return;
                }
            }
        }
    }
}

/// Accumulates diagnostics with message-level deduplication, matching the "log each
/// distinct issue once per assembly" behavior users see.
struct Collector {
    filename: String,
    seen: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
    changed: bool,
}

impl Collector {
    fn new(module_name: &str) -> Self {
        Collector {
            filename: format!("{module_name}.dll"),
            seen: HashSet::new(),
            diagnostics: Vec::new(),
            changed: false,
        }
    }

    fn record(&mut self, location: String, result: HandleResult) {
        let (severity, message) = match result {
            HandleResult::Unchanged => return,
            HandleResult::Rewritten { phrase } => {
                self.changed = true;
                (
                    Severity::Warning,
                    format!("Rewrote {} to fix {}...", self.filename, phrase),
                )
            }
            HandleResult::Flagged { severity, phrase } => {
                let message = match severity {
                    Severity::Warning => format!("Detected {} in {}.", phrase, self.filename),
                    Severity::Incompatible => {
                        format!("Broken code in {}: {}.", self.filename, phrase)
                    }
                    Severity::Fatal => format!("Failed to load {}: {}.", self.filename, phrase),
                };
                (severity, message)
            }
        };

        if self.seen.insert(message.clone()) {
            self.diagnostics.push(Diagnostic {
                location,
                severity,
                message,
            });
        }
    }
}

fn instruction_location(
    module: &Module,
    type_index: usize,
    method_index: usize,
    il_index: usize,
    token: Token,
    symbols: Option<&mut SymbolReader>,
) -> String {
    let type_def = &module.types[type_index];
    let method = &type_def.methods[method_index];
    let base = format!("{}.{} @ IL_{:04}", type_def.full_name, method.name, il_index);

    if let Some(reader) = symbols {
        let info = reader.read(token);
        if let Some(point) = info.nearest(il_index as u32) {
            return format!("{base} (line {}:{})", point.line, point.column);
        }
    }
    base
}
