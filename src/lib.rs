// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # modscope
//!
//! The loading and compatibility core of a mod runtime: it takes mod assemblies compiled
//! against old host versions and makes them loadable against the current one.
//!
//! ## Features
//!
//! - **Assembly loading** - Parse mod module images, attach debug symbols, and validate
//!   assembly references before anything executes
//! - **Compatibility rewriting** - Retarget references to removed, moved, or reshaped host
//!   members onto facade replacements, directly in the module metadata
//! - **Actionable diagnostics** - Every rewrite and every unfixable reference is reported
//!   with the mod author's source location when symbols are available
//! - **Method interception** - Prefix/postfix/finalizer/transpiler hooks on host methods,
//!   staged and committed atomically per patch
//! - **Deprecation tracking** - Attribute deprecated API use to the responsible mod,
//!   deduplicate, and flush warnings in batches
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modscope::prelude::*;
//!
//! // describe the host's real metadata (built once at startup)
//! let mut host = HostMetadata::new();
//! host.add_namespace("Game");
//! host.add_assembly("GameEngine");
//!
//! // load a mod assembly, rewriting it for compatibility
//! let facades = FacadeTable::new();
//! let monitor = LogMonitor;
//! let mut loader = AssemblyLoader::new(&host, &facades, RewritePolicy::default(), &monitor);
//! let outcome = loader.load("Mods/Example/Example.dll".as_ref())?;
//! println!("rewritten: {}", outcome.rewritten);
//! # Ok::<(), modscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! The crate is layered bottom-up:
//!
//! - [`file`] - cursor-based binary parsing primitives
//! - [`metadata`] - the module image format: reference tables, method bodies, and the
//!   host metadata index everything resolves against
//! - [`rewrite`] - the handler-chain rewrite engine and the facade table
//! - [`loader`] - the load pipeline tying parsing, symbols, rewriting, and policy together
//! - [`patch`] - runtime method interception with per-patch atomicity
//! - [`deprecations`] - deprecation warning attribution and batching
//!
//! Nothing in the crate writes to the console or to files on its own; all output goes
//! through the injected [`monitor::Monitor`].

#[macro_use]
pub(crate) mod error;

pub mod deprecations;
pub mod file;
pub mod loader;
pub mod metadata;
pub mod monitor;
pub mod patch;
pub mod prelude;
pub mod rewrite;

pub use error::{error_summary, Error};

/// The result type used throughout this library.
pub type Result<T> = std::result::Result<T, Error>;
