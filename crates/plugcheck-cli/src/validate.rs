//! # Validate Subcommand
//!
//! Validates one plugin's `plugin_config.yml` and entry point.
//!
//! The schema defaults to `schemas/plugin_config.schema.json` under the
//! repository root. In `warning` and `info` mode, validation failures are
//! logged and the command still exits 0, so a build can keep going while
//! surfacing problems. A schema that cannot be loaded always fails the
//! command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use plugcheck_core::ValidationMode;
use plugcheck_validator::PluginValidator;

use crate::{schema_location, DEFAULT_PLUGIN_CONFIG};

/// Arguments for the `plugcheck validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Plugin config file to validate.
    #[arg(short = 'c', long, value_name = "PATH", default_value = DEFAULT_PLUGIN_CONFIG)]
    pub plugin_config: PathBuf,

    /// JSON schema to validate against. Defaults to the repository's bundled
    /// plugin config schema.
    #[arg(short = 's', long, value_name = "PATH")]
    pub schema: Option<PathBuf>,

    /// How to report validation failures: error, warning, or info.
    #[arg(long, default_value_t = ValidationMode::Error)]
    pub mode: ValidationMode,

    /// Parse the entry point but do not load its module.
    #[arg(long)]
    pub skip_import: bool,
}

/// Execute the validate subcommand.
///
/// Returns exit code: 0 on success (or a failure suppressed by the mode),
/// 1 on validation failure.
pub fn run_validate(args: &ValidateArgs, repo_root: &Path) -> Result<u8> {
    let schema = schema_location(args.schema.as_deref(), repo_root);
    let mut validator = PluginValidator::new(&args.plugin_config, schema, args.mode)
        .with_import_check(!args.skip_import);

    tracing::info!(
        config = %validator.plugin_config().display(),
        schema = %validator.plugin_config_schema().display(),
        mode = %validator.mode(),
        "validating plugin"
    );

    let config = validator.plugin_config().display().to_string();
    match validator.validate() {
        Ok(()) => {
            match validator.plugin_entry_point() {
                Some(entry) => println!("OK: {config} (entry point: {entry})"),
                None => println!("OK: {config}"),
            }
            Ok(0)
        }
        Err(e) if e.is_fatal() => Err(e).with_context(|| {
            format!(
                "failed to load schema {}",
                validator.plugin_config_schema().display()
            )
        }),
        Err(e) => {
            println!("FAIL: {config}: {e}");
            Ok(1)
        }
    }
}
