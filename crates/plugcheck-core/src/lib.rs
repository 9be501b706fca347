#![deny(missing_docs)]

//! # plugcheck-core: Foundational Types for Plugin Validation
//!
//! Every other crate in the workspace depends on `plugcheck-core`; it depends
//! on nothing internal.
//!
//! ## Contents
//!
//! 1. **[`PluginValidationError`] hierarchy.** One `thiserror` enum covering
//!    every way a plugin config can be rejected, from unreadable files to a
//!    missing entry-point symbol. Messages carry the file path and either a
//!    position or the symbol/module names so authors can fix the fault
//!    without reading internals.
//!
//! 2. **[`ValidationMode`].** The reporting policy (error / warning / info)
//!    applied to a failed validation.
//!
//! 3. **[`EntryPointRef`].** The parsed `<module>:<symbol>` reference.
//!
//! 4. **[`resolve_src_dir`].** Resolution of a config-relative source
//!    directory to an absolute path.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `plugcheck-*` crates.
//! - No `unsafe` code.
//! - No `.unwrap()` outside tests.

pub mod entry_point;
pub mod error;
pub mod mode;
pub mod paths;

pub use entry_point::EntryPointRef;
pub use error::{ModuleLoadError, PathError, PluginValidationError, YamlPosition};
pub use mode::{ParseModeError, ValidationMode};
pub use paths::resolve_src_dir;
