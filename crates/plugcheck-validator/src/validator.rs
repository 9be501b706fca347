//! # Plugin Validator
//!
//! Runs the full check a plugin build performs before packaging:
//!
//! 1. obtain the config document (read `plugin_config.yml`, unless content
//!    was supplied by the caller);
//! 2. load the plugin config schema;
//! 3. validate the document against the schema;
//! 4. resolve `srcDir` relative to the config file;
//! 5. split `entryPoint` into module and symbol;
//! 6. when import checks are enabled, load the module from the source
//!    directory and confirm it binds the symbol.
//!
//! ## Reporting
//!
//! A failure in any step is handed to [`report_failure`] with the
//! validator's [`ValidationMode`]. Schema integrity failures from step 2
//! bypass the mode and are always returned: without a usable schema no
//! other result means anything.

use std::fmt;
use std::path::{Path, PathBuf};

use plugcheck_core::{resolve_src_dir, EntryPointRef, PluginValidationError, ValidationMode};
use plugcheck_schema::config::{ENTRY_POINT_KEY, SRC_DIR_KEY};
use plugcheck_schema::{load_plugin_config, PluginConfigContent, PluginConfigSchema, SuppliedConfig};

use crate::loader::{LoadedModule, ModuleLoader, PythonSourceLoader};

/// Apply `mode` to a validation failure: return it, or log it and carry on.
///
/// # Errors
///
/// Returns `error` unchanged under [`ValidationMode::Error`].
pub fn report_failure(
    mode: ValidationMode,
    error: PluginValidationError,
) -> Result<(), PluginValidationError> {
    match mode {
        ValidationMode::Error => Err(error),
        ValidationMode::Warning => {
            tracing::warn!("Validation failed on plugin config file : {error}");
            Ok(())
        }
        ValidationMode::Info => {
            tracing::info!("Validation failed on plugin config file : {error}");
            Ok(())
        }
    }
}

/// Validates one plugin's config and entry point.
///
/// After [`validate`](Self::validate) returns, the loaded config, the
/// entry-point module, and the entry-point symbol are available to later
/// pipeline stages through the accessors.
pub struct PluginValidator {
    plugin_config: PathBuf,
    plugin_config_schema: PathBuf,
    mode: ValidationMode,
    supplied: Option<SuppliedConfig>,
    loader: Box<dyn ModuleLoader>,
    import_check: bool,
    config_content: Option<PluginConfigContent>,
    module_content: Option<Box<dyn LoadedModule>>,
    entry_point: Option<String>,
}

impl fmt::Debug for PluginValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginValidator")
            .field("plugin_config", &self.plugin_config)
            .field("plugin_config_schema", &self.plugin_config_schema)
            .field("mode", &self.mode)
            .field("import_check", &self.import_check)
            .field("entry_point", &self.entry_point)
            .finish_non_exhaustive()
    }
}

impl PluginValidator {
    /// Validate the config file at `plugin_config` against the schema at
    /// `plugin_config_schema`, reporting failures according to `mode`.
    pub fn new(
        plugin_config: impl Into<PathBuf>,
        plugin_config_schema: impl Into<PathBuf>,
        mode: ValidationMode,
    ) -> Self {
        Self {
            plugin_config: plugin_config.into(),
            plugin_config_schema: plugin_config_schema.into(),
            mode,
            supplied: None,
            loader: Box::new(PythonSourceLoader::new()),
            import_check: true,
            config_content: None,
            module_content: None,
            entry_point: None,
        }
    }

    /// Validate content the caller already holds, in [`ValidationMode::Error`].
    /// `plugin_config` is still the base for resolving `srcDir` but is never
    /// read.
    pub fn from_config_content(
        plugin_config: impl Into<PathBuf>,
        content: impl Into<SuppliedConfig>,
        plugin_config_schema: impl Into<PathBuf>,
    ) -> Self {
        Self::new(plugin_config, plugin_config_schema, ValidationMode::Error)
            .with_config_content(content)
    }

    /// Use `content` instead of reading the config file.
    pub fn with_config_content(mut self, content: impl Into<SuppliedConfig>) -> Self {
        self.supplied = Some(content.into());
        self
    }

    /// Replace the module loader used for the entry-point check.
    pub fn with_loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// Enable or disable loading the entry-point module. With the check
    /// disabled the entry point is still parsed but no module is loaded.
    pub fn with_import_check(mut self, enabled: bool) -> Self {
        self.import_check = enabled;
        self
    }

    /// The config file path.
    pub fn plugin_config(&self) -> &Path {
        &self.plugin_config
    }

    /// The schema file path.
    pub fn plugin_config_schema(&self) -> &Path {
        &self.plugin_config_schema
    }

    /// The reporting mode.
    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// The config document, once obtained.
    pub fn plugin_config_content(&self) -> Option<&PluginConfigContent> {
        self.config_content.as_ref()
    }

    /// The loaded entry-point module. `None` until loaded, and always `None`
    /// when import checks are disabled.
    pub fn plugin_module_content(&self) -> Option<&dyn LoadedModule> {
        self.module_content.as_deref()
    }

    /// The entry-point symbol name, once parsed.
    pub fn plugin_entry_point(&self) -> Option<&str> {
        self.entry_point.as_deref()
    }

    /// Run every validation step.
    ///
    /// # Errors
    ///
    /// Schema read/parse failures are always returned. Every other failure
    /// is returned only in [`ValidationMode::Error`]; the other modes log it
    /// and return `Ok(())`.
    pub fn validate(&mut self) -> Result<(), PluginValidationError> {
        tracing::debug!("Run config validations");
        match self.run_validations() {
            Ok(()) => Ok(()),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => report_failure(self.mode, err),
        }
    }

    fn run_validations(&mut self) -> Result<(), PluginValidationError> {
        tracing::info!(path = %self.plugin_config.display(), "Reading plugin config file");

        let (src_dir_decl, entry_point_decl) = {
            let content =
                obtain_config_content(&mut self.config_content, &self.supplied, &self.plugin_config)?;
            tracing::debug!(content = %content.as_json(), "Validating plugin config file content");

            let schema = PluginConfigSchema::load(&self.plugin_config_schema)?;
            schema.validate(&self.plugin_config, content)?;

            (
                required_str(&self.plugin_config, content, SRC_DIR_KEY)?,
                required_str(&self.plugin_config, content, ENTRY_POINT_KEY)?,
            )
        };

        let src_dir = resolve_src_dir(&self.plugin_config, &src_dir_decl)?;

        tracing::debug!(entry_point = %entry_point_decl, "Validating plugin entry point");
        self.validate_entry_point(&src_dir, &entry_point_decl)
    }

    fn validate_entry_point(
        &mut self,
        src_dir: &Path,
        entry_point: &str,
    ) -> Result<(), PluginValidationError> {
        let entry = EntryPointRef::parse(entry_point)?;
        self.entry_point = Some(entry.symbol().to_string());

        if !self.import_check {
            tracing::debug!(module = entry.module(), "import check disabled; module not loaded");
            return Ok(());
        }

        let module = self.loader.load(src_dir, entry.module())?;
        let found = module.has_attribute(entry.symbol());
        self.module_content = Some(module);

        if !found {
            return Err(PluginValidationError::EntryPointNotFound {
                symbol: entry.symbol().to_string(),
                module: entry.module().to_string(),
            });
        }
        Ok(())
    }
}

/// Content is obtained once; repeated runs reuse it.
fn obtain_config_content<'a>(
    slot: &'a mut Option<PluginConfigContent>,
    supplied: &Option<SuppliedConfig>,
    config_path: &Path,
) -> Result<&'a PluginConfigContent, PluginValidationError> {
    let content = match slot.take() {
        Some(content) => content,
        None => match supplied {
            Some(supplied) => supplied.clone().into_content(config_path)?,
            None => load_plugin_config(config_path)?,
        },
    };
    Ok(&*slot.insert(content))
}

/// A string field the rest of validation depends on. Only reachable as an
/// error when the schema does not already require it.
fn required_str(
    config_path: &Path,
    content: &PluginConfigContent,
    key: &str,
) -> Result<String, PluginValidationError> {
    content
        .get_str(key)
        .map(str::to_string)
        .ok_or_else(|| PluginValidationError::SchemaMismatch {
            path: config_path.to_path_buf(),
            message: format!("\"{key}\" is a required string property"),
        })
}
