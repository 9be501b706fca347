//! # Plugin Config Schema
//!
//! Loads the JSON Schema that every `plugin_config.yml` must satisfy and
//! checks config documents against it.
//!
//! ## Integrity Before Use
//!
//! The schema is parsed and compiled before any document is validated. A
//! schema that is unreadable, not JSON, or not a compilable JSON Schema is
//! reported as [`PluginValidationError::SchemaRead`] or
//! [`PluginValidationError::InvalidSchema`]; callers treat both as fatal.
//!
//! ## Reference Resolution
//!
//! Internal `$ref`s (`#/definitions/...`) are resolved by the jsonschema
//! crate. External references are resolved only against files sitting next
//! to the schema on disk; no network requests are made.

use std::fmt;
use std::path::{Path, PathBuf};

use jsonschema::{Retrieve, Uri, Validator};
use plugcheck_core::PluginValidationError;
use serde_json::Value;

use crate::config::PluginConfigContent;

/// Resolves external `$ref` URIs to schema files in one directory.
struct SiblingSchemaRetriever {
    base_dir: PathBuf,
}

impl Retrieve for SiblingSchemaRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let uri_str = uri.as_str();
        let without_fragment = uri_str.split('#').next().unwrap_or(uri_str);
        let filename = without_fragment
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| format!("unresolvable schema reference '{uri_str}'"))?;

        let candidate = self.base_dir.join(filename);
        if !candidate.is_file() {
            return Err(format!(
                "unresolvable schema reference '{uri_str}': {} not found",
                candidate.display()
            )
            .into());
        }
        let content = std::fs::read_to_string(&candidate)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// A loaded and compiled plugin config schema.
pub struct PluginConfigSchema {
    path: PathBuf,
    validator: Validator,
}

impl fmt::Debug for PluginConfigSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginConfigSchema")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl PluginConfigSchema {
    /// Read, parse, and compile the schema at `path`.
    ///
    /// # Errors
    ///
    /// - [`PluginValidationError::SchemaRead`] if the file cannot be read.
    /// - [`PluginValidationError::InvalidSchema`] if it is not JSON or does
    ///   not compile as a JSON Schema.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PluginValidationError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PluginValidationError::schema_read(path, &e))?;
        let document: Value =
            serde_json::from_str(&content).map_err(|e| PluginValidationError::InvalidSchema {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Self::from_document(path, document)
    }

    /// Compile an already-parsed schema. `path` labels errors and anchors
    /// external `$ref` resolution.
    ///
    /// # Errors
    ///
    /// Returns [`PluginValidationError::InvalidSchema`] if the document does
    /// not compile.
    pub fn from_document(
        path: impl Into<PathBuf>,
        document: Value,
    ) -> Result<Self, PluginValidationError> {
        let path = path.into();
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut opts = jsonschema::options();
        opts.with_retriever(SiblingSchemaRetriever { base_dir });
        let validator = opts
            .build(&document)
            .map_err(|e| PluginValidationError::InvalidSchema {
                path: path.clone(),
                reason: format!("not a usable JSON Schema: {e}"),
            })?;

        tracing::debug!(schema = %path.display(), "compiled plugin config schema");
        Ok(Self { path, validator })
    }

    /// The schema file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `content` conforms, without building error messages.
    pub fn is_valid(&self, content: &PluginConfigContent) -> bool {
        self.validator.is_valid(content.as_json())
    }

    /// Check `content` against the schema. `config_path` names the config
    /// file in the error message.
    ///
    /// # Errors
    ///
    /// Returns [`PluginValidationError::SchemaMismatch`] listing every
    /// violation, each prefixed with its location when not at the root.
    pub fn validate(
        &self,
        config_path: &Path,
        content: &PluginConfigContent,
    ) -> Result<(), PluginValidationError> {
        let violations: Vec<String> = self
            .validator
            .iter_errors(content.as_json())
            .map(|e| {
                let location = e.instance_path.to_string();
                if location.is_empty() {
                    e.to_string()
                } else {
                    format!("{location}: {e}")
                }
            })
            .collect();

        if violations.is_empty() {
            return Ok(());
        }
        Err(PluginValidationError::SchemaMismatch {
            path: config_path.to_path_buf(),
            message: violations.join("; "),
        })
    }
}
