//! # Error Types: Structured Error Hierarchy
//!
//! Defines the errors raised while validating a plugin. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - I/O failures carry the OS error code, its description, and the path.
//! - YAML syntax failures carry the 1-based line and column when the parser
//!   reports one.
//! - Schema integrity failures ([`PluginValidationError::is_fatal`]) are
//!   never subject to the reporting mode.
//! - Module load failures are passed through unchanged from the loader.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for plugin validation.
#[derive(Error, Debug)]
pub enum PluginValidationError {
    /// The plugin config file could not be opened or read.
    #[error("Unable to read plugin config file '{path}'\nError code: {code}. Error message: {message}")]
    ConfigRead {
        /// The path that was attempted.
        path: PathBuf,
        /// OS error code, or -1 when the platform did not supply one.
        code: i32,
        /// Human-readable description of the OS error.
        message: String,
    },

    /// The plugin config file is not valid YAML.
    #[error(
        "Command failed because the plugin config file provided as input '{path}' \
         was not valid yaml. Verify the file contents. {position}"
    )]
    InvalidYaml {
        /// The config file path.
        path: PathBuf,
        /// Where the parser gave up.
        position: YamlPosition,
    },

    /// The plugin config parsed as YAML but has no JSON representation
    /// (non-scalar map keys, non-finite floats).
    #[error("Plugin config file '{path}' cannot be represented as JSON: {reason}")]
    ConfigNotJson {
        /// The config file path.
        path: PathBuf,
        /// What could not be converted.
        reason: String,
    },

    /// The schema file could not be opened or read.
    #[error("Unable to read plugin config schema file '{path}'\nError code: {code}. Error message: {message}")]
    SchemaRead {
        /// The schema path that was attempted.
        path: PathBuf,
        /// OS error code, or -1 when the platform did not supply one.
        code: i32,
        /// Human-readable description of the OS error.
        message: String,
    },

    /// The schema file is not valid JSON or not a usable JSON Schema.
    #[error("Failed to load schemas because '{path}' is not a valid json file. Error: {reason}")]
    InvalidSchema {
        /// The schema path.
        path: PathBuf,
        /// Parser or compiler message.
        reason: String,
    },

    /// The config document does not conform to the schema.
    #[error("Validation failed on {path}, Error message: {message}")]
    SchemaMismatch {
        /// The config file path.
        path: PathBuf,
        /// Message from the schema validator.
        message: String,
    },

    /// The declared source directory does not resolve to a directory.
    #[error(transparent)]
    SourceDir(#[from] PathError),

    /// The `entryPoint` value has no `module:symbol` delimiter.
    #[error("Entry point '{0}' provided in the plugin config file is not of the form '<module>:<symbol>'.")]
    InvalidEntryPoint(String),

    /// The entry-point module loaded but does not bind the symbol.
    #[error("Entry point '{symbol}' provided in the plugin config file is not found in module '{module}'.")]
    EntryPointNotFound {
        /// Symbol named on the right-hand side of `entryPoint`.
        symbol: String,
        /// Module named on the left-hand side of `entryPoint`.
        module: String,
    },

    /// The entry-point module could not be loaded.
    #[error(transparent)]
    ModuleLoad(#[from] ModuleLoadError),
}

impl PluginValidationError {
    /// Build a [`PluginValidationError::ConfigRead`] from an I/O error.
    pub fn config_read(path: impl Into<PathBuf>, err: &io::Error) -> Self {
        let (code, message) = os_error_parts(err);
        Self::ConfigRead {
            path: path.into(),
            code,
            message,
        }
    }

    /// Build a [`PluginValidationError::SchemaRead`] from an I/O error.
    pub fn schema_read(path: impl Into<PathBuf>, err: &io::Error) -> Self {
        let (code, message) = os_error_parts(err);
        Self::SchemaRead {
            path: path.into(),
            code,
            message,
        }
    }

    /// Schema integrity failures make every later check meaningless, so
    /// they are returned regardless of the reporting mode.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SchemaRead { .. } | Self::InvalidSchema { .. })
    }
}

/// Position of a YAML parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YamlPosition {
    /// 1-based line and column reported by the parser.
    At {
        /// 1-based line.
        line: usize,
        /// 1-based column.
        column: usize,
    },
    /// The parser did not report a location.
    Unknown(String),
}

impl std::fmt::Display for YamlPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::At { line, column } => write!(f, "Error position: {line}:{column}"),
            Self::Unknown(reason) => write!(f, "Error: {reason}"),
        }
    }
}

/// Failures resolving the declared source directory.
#[derive(Error, Debug)]
pub enum PathError {
    /// Nothing exists at the resolved path.
    #[error("The path '{0}' does not exist.")]
    DoesNotExist(PathBuf),

    /// Something exists at the resolved path but it is not a directory.
    #[error("The path '{0}' should be a directory but is not.")]
    NotADirectory(PathBuf),

    /// A relative config path could not be anchored to the working directory.
    #[error("unable to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),
}

/// Failures loading an entry-point module from a source tree.
#[derive(Error, Debug)]
pub enum ModuleLoadError {
    /// The module path is empty or has a segment that is not an identifier.
    #[error("No module named '{module}': invalid module name")]
    InvalidName {
        /// The module path as written.
        module: String,
    },

    /// No module file exists for the module path under the search path.
    #[error("No module named '{module}' (searched {search_path})")]
    NotFound {
        /// The module path as written.
        module: String,
        /// The directory that was searched.
        search_path: PathBuf,
    },

    /// The module file, or a module it star-imports, does not parse.
    #[error("invalid syntax in module '{module}' ({path}, line {line}, column {column}): {message}")]
    Syntax {
        /// The module path as written.
        module: String,
        /// The file that failed to parse.
        path: PathBuf,
        /// 1-based line of the parse error.
        line: usize,
        /// 1-based column of the parse error.
        column: usize,
        /// The parser's description.
        message: String,
    },

    /// The module file exists but could not be read.
    #[error("unable to read module '{module}' from {path}: {source}")]
    Io {
        /// The module path as written.
        module: String,
        /// The module file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Split an I/O error into `(errno, description)`. Errors that did not come
/// from the OS report code `-1`.
fn os_error_parts(err: &io::Error) -> (i32, String) {
    match err.raw_os_error() {
        Some(code) => {
            let described = io::Error::from_raw_os_error(code).to_string();
            // std renders "<description> (os error N)"; keep the description.
            let message = match described.rfind(" (os error") {
                Some(idx) => described[..idx].to_string(),
                None => described,
            };
            (code, message)
        }
        None => (-1, err.to_string()),
    }
}
