//! # plugcheck-validator: Plugin Validation Engine
//!
//! Validates a plugin's `plugin_config.yml` and its entry point in one
//! pass:
//!
//! - the config must be readable, well-formed YAML;
//! - it must conform to the plugin config schema;
//! - `srcDir` must name an existing directory relative to the config;
//! - `entryPoint` (`module:symbol`) must name a loadable module that binds
//!   the symbol.
//!
//! ## Reporting
//!
//! Failures are routed through the validator's
//! [`ValidationMode`](plugcheck_core::ValidationMode): `Error` returns them,
//! `Warning` and `Info` log them at that level and let the caller continue.
//! A schema that cannot be read or parsed is returned in every mode.
//!
//! ## Module Loading
//!
//! The entry-point check goes through the [`ModuleLoader`] trait. The
//! default [`PythonSourceLoader`] parses source files without running
//! them; tests and embedding pipelines can supply their own loader.

pub mod loader;
pub mod validator;

pub use loader::{
    scan_module, LoadedModule, ModuleBindings, ModuleLoader, PythonSourceLoader, SourceModule,
    SourceSyntaxError, StarImport, StaticModuleLoader,
};
pub use validator::{report_failure, PluginValidator};
