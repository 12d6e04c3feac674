//! # modscope Prelude
//!
//! A convenient prelude for the most commonly used types and traits. Import this module
//! to get quick access to everything an embedding runtime typically needs.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all modscope operations
pub use crate::Error;

/// The result type used throughout modscope
pub use crate::Result;

/// User-facing error summaries including the source chain
pub use crate::error_summary;

// ================================================================================================
// Logging
// ================================================================================================

/// The logging abstraction every component emits through
pub use crate::monitor::{BufferMonitor, LogLevel, LogMonitor, Monitor};

// ================================================================================================
// Metadata System
// ================================================================================================

/// The host process's real loaded metadata
pub use crate::metadata::host::HostMetadata;

/// The parsed module image and its building blocks
pub use crate::metadata::{DebugHeader, MethodDef, Module, ModuleFlags, TypeDef};

/// Member signatures used for lookups and facades
pub use crate::metadata::member::{FieldSig, MethodSig};

/// Method bodies and the instructions they hold
pub use crate::metadata::body::{ExceptionRegion, MethodBody};

/// CIL-style instructions and opcodes
pub use crate::metadata::instruction::{Instruction, OpCode, Operand};

/// Metadata token type for referencing table entries
pub use crate::metadata::token::Token;

/// Module image parsing and serialization
pub use crate::metadata::{reader::read_module, writer::write_module};

// ================================================================================================
// Rewriting and Loading
// ================================================================================================

/// The facade table of substitutes for removed host members
pub use crate::rewrite::facades::{FacadeTable, FieldFacade, MethodFacade};

/// The compatibility rewrite engine and its outputs
pub use crate::rewrite::{Diagnostic, RewriteEngine, RewriteOutcome, RewritePolicy, Severity};

/// The assembly load pipeline
pub use crate::loader::{AssemblyLoader, LoadOutcome};

/// Debug symbol access for diagnostic source locations
pub use crate::loader::symbols::{SymbolProvider, SymbolReader};

// ================================================================================================
// Method Interception
// ================================================================================================

/// Runtime method interception
pub use crate::patch::{
    apply_all, InterceptContext, InterceptionRegistry, MethodHandle, Patch, PatchRole,
    PatchStatus, Patcher,
};

// ================================================================================================
// Deprecation Tracking
// ================================================================================================

/// Deprecation warning attribution and batching
pub use crate::deprecations::{
    DeprecationLevel, DeprecationManager, ModContext, ModEntry, ModIndex, StackTrace,
};
