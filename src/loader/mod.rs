//! Loads mod assemblies from disk, rewriting them for compatibility on the way in.
//!
//! The loader is the one place that sequences the whole pipeline: read the image bytes,
//! parse the metadata, attach debug symbols if a symbol file sits next to the assembly,
//! check assembly references, run the rewrite engine, log what happened, and decide per
//! policy whether the assembly may load. Rewritten assemblies are re-serialized so the
//! caller always receives loadable bytes.

pub mod symbols;

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::{
    error::error_summary,
    metadata::{host::HostMetadata, reader::read_module, writer::write_module, Module},
    monitor::{LogLevel, Monitor},
    rewrite::{facades::FacadeTable, Diagnostic, RewriteEngine, RewritePolicy, Severity},
    Error, Result,
};

use symbols::SymbolProvider;

/// A successfully loaded (and possibly rewritten) assembly.
#[derive(Debug)]
pub struct LoadOutcome {
    /// The parsed module, with any rewrites applied.
    pub module: Module,
    /// The loadable image bytes: re-serialized if rewritten, otherwise the original
    /// bytes unchanged.
    pub bytes: Vec<u8>,
    /// Whether any metadata was rewritten.
    pub rewritten: bool,
    /// Everything noteworthy found while loading.
    pub diagnostics: Vec<Diagnostic>,
}

/// Loads mod assemblies into the current resolution context.
///
/// Each load attempt logs its own summary: repeated issues within one assembly (the same
/// broken reference from fifty call sites) collapse to one log line, while re-loading an
/// assembly reports its problems again.
pub struct AssemblyLoader<'a> {
    host: &'a HostMetadata,
    facades: &'a FacadeTable,
    policy: RewritePolicy,
    monitor: &'a dyn Monitor,
    symbols: SymbolProvider,
}

impl<'a> AssemblyLoader<'a> {
    /// Create a loader for the given host metadata and facade table.
    #[must_use]
    pub fn new(
        host: &'a HostMetadata,
        facades: &'a FacadeTable,
        policy: RewritePolicy,
        monitor: &'a dyn Monitor,
    ) -> Self {
        AssemblyLoader {
            host,
            facades,
            policy,
            monitor,
            symbols: SymbolProvider::new(),
        }
    }

    /// Load one assembly from disk, rewriting it for compatibility per policy.
    ///
    /// # Errors
    /// Returns [`Error::AssemblyLoadFailed`] when the file can't be read, the image
    /// doesn't parse, a fatal incompatibility is found, or the policy refuses an
    /// incompatible assembly.
    pub fn load(&mut self, path: &Path) -> Result<LoadOutcome> {
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let bytes = fs::read(path).map_err(|err| Error::AssemblyLoadFailed {
            path: path.to_owned(),
            reason: error_summary(&err),
        })?;

        let mut module = match read_module(&bytes) {
            Ok(module) => module,
            Err(err) => {
                self.monitor.log(
                    LogLevel::Error,
                    &format!("Failed to load {display_name}: the module image is invalid."),
                );
                self.monitor
                    .log(LogLevel::Trace, &format!("   Technical details: {}", error_summary(&err)));
                return Err(Error::AssemblyLoadFailed {
                    path: path.to_owned(),
                    reason: error_summary(&err),
                });
            }
        };

        self.attach_symbols(path, &module);

        let mut diagnostics = self.check_assembly_refs(&module);

        let mut engine = RewriteEngine::new(self.host, self.facades, self.policy);
        let symbols = self.symbols.get_reader(&module.name);
        let outcome = engine.rewrite_module(&mut module, symbols);
        let rewritten = outcome.changed;
        diagnostics.extend(outcome.diagnostics);

        // dedup scope is one load attempt: re-loading the same assembly logs again
        let mut logged = HashSet::new();
        for diagnostic in &diagnostics {
            self.log_diagnostic(&mut logged, diagnostic);
        }

        let max_severity = diagnostics.iter().map(|d| d.severity).max();
        match max_severity {
            Some(Severity::Fatal) => {
                let reason = diagnostics
                    .iter()
                    .find(|d| d.severity == Severity::Fatal)
                    .map(|d| d.message.clone())
                    .unwrap_or_else(|| "fatal incompatibility".into());
                return Err(Error::AssemblyLoadFailed {
                    path: path.to_owned(),
                    reason,
                });
            }
            Some(Severity::Incompatible) if !self.policy.assume_compatible => {
                return Err(Error::AssemblyLoadFailed {
                    path: path.to_owned(),
                    reason: format!(
                        "{display_name} references code that no longer exists; consider updating the mod"
                    ),
                });
            }
            _ => {}
        }

        let bytes = if rewritten { write_module(&module)? } else { bytes };
        Ok(LoadOutcome {
            module,
            bytes,
            rewritten,
            diagnostics,
        })
    }

    /// Look for a symbol file next to the assembly and register it for diagnostics.
    ///
    /// Missing or unparseable symbols are never an error; the assembly just loads
    /// without source locations.
    fn attach_symbols(&mut self, path: &Path, module: &Module) {
        let Some(header) = &module.debug_header else {
            return;
        };
        let symbol_path = path.with_extension("sym");
        let Ok(data) = fs::read(&symbol_path) else {
            return;
        };
        if !self.symbols.try_add_symbol_data(&module.name, data, header) {
            self.monitor.log(
                LogLevel::Debug,
                &format!(
                    "Ignored unreadable symbol file for {}; error locations will show IL offsets.",
                    module.name
                ),
            );
        }
    }

    /// Flag references to assemblies that neither the host, the facade set, nor the
    /// platform provides.
    fn check_assembly_refs(&self, module: &Module) -> Vec<Diagnostic> {
        let filename = format!("{}.dll", module.name);
        module
            .assembly_refs
            .iter()
            .filter(|name| {
                !self.host.has_assembly(name)
                    && !self.facades.has_assembly(name)
                    && !is_platform_assembly(name)
            })
            .map(|name| Diagnostic {
                location: filename.clone(),
                severity: Severity::Incompatible,
                message: format!("Broken code in {filename}: reference to missing assembly '{name}'."),
            })
            .collect()
    }

    fn log_diagnostic(&self, logged: &mut HashSet<String>, diagnostic: &Diagnostic) {
        let level = match diagnostic.severity {
            Severity::Warning => LogLevel::Debug,
            Severity::Incompatible => LogLevel::Warn,
            Severity::Fatal => LogLevel::Error,
        };
        self.monitor.log_once(logged, level, &diagnostic.message);
        self.monitor
            .log(LogLevel::Trace, &format!("   at {}", diagnostic.location));
    }
}

fn is_platform_assembly(name: &str) -> bool {
    name == "mscorlib"
        || name == "netstandard"
        || name == "System"
        || name.starts_with("System.")
}
