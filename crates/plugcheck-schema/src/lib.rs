//! # plugcheck-schema: Plugin Config Loading & Schema Validation
//!
//! ## Responsibilities
//!
//! - **Config loading ([`config`]):** read `plugin_config.yml`, report YAML
//!   syntax errors with 1-based positions, and project the document into
//!   JSON for schema validation. Callers that already hold the content
//!   pass it in as [`SuppliedConfig`] and no file is read.
//! - **Schema validation ([`validate`]):** load the plugin config schema,
//!   reject it outright if it is not valid JSON, and check a config
//!   document against it.
//!
//! ## Design
//!
//! All failures are [`plugcheck_core::PluginValidationError`] values so the
//! validator engine can route them through a single reporting policy.

pub mod config;
pub mod validate;

// Re-export primary types.
pub use config::{load_plugin_config, parse_plugin_config, PluginConfigContent, SuppliedConfig};
pub use validate::PluginConfigSchema;
