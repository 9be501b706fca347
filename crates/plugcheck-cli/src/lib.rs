//! # plugcheck-cli: CLI Tool for Plugin Validation
//!
//! Provides the `plugcheck` command-line interface.
//!
//! ## Subcommands
//!
//! - `plugcheck validate`: check `plugin_config.yml` against the plugin
//!   config schema and confirm the entry point exists.
//!
//! ```bash
//! plugcheck validate
//! plugcheck validate -c plugins/oracle/plugin_config.yml --mode warning
//! plugcheck -v validate --skip-import
//! ```

pub mod validate;

use std::path::{Path, PathBuf};

/// Config file name looked up when `--plugin-config` is not given.
pub const DEFAULT_PLUGIN_CONFIG: &str = "plugin_config.yml";

/// Schema location, relative to the repository root.
pub const DEFAULT_SCHEMA: &str = "schemas/plugin_config.schema.json";

/// Pick the schema file a validation run reads.
///
/// With no `--schema`, the bundled schema under `repo_root` is used. An
/// explicit absolute path is taken as given. A relative one is read from the
/// working directory when it exists there, then from `repo_root`; when
/// neither holds it, the path is returned unchanged so the load error names
/// what the user typed.
pub fn schema_location(explicit: Option<&Path>, repo_root: &Path) -> PathBuf {
    let Some(schema) = explicit else {
        return repo_root.join(DEFAULT_SCHEMA);
    };
    if schema.is_absolute() || schema.is_file() {
        return schema.to_path_buf();
    }
    let under_root = repo_root.join(schema);
    if under_root.is_file() {
        under_root
    } else {
        schema.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_schema_is_the_default() {
        let root = Path::new("/repo");
        assert_eq!(schema_location(None, root), root.join(DEFAULT_SCHEMA));
    }

    #[test]
    fn absolute_schema_is_taken_as_given() {
        let abs = std::env::temp_dir().join("custom.schema.json");
        assert_eq!(schema_location(Some(&abs), Path::new("/anywhere")), abs);
    }

    #[test]
    fn relative_schema_falls_back_to_repo_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("schemas")).unwrap();
        std::fs::write(dir.path().join("schemas/strict.schema.json"), "{}").unwrap();
        let resolved = schema_location(Some(Path::new("schemas/strict.schema.json")), dir.path());
        assert_eq!(resolved, dir.path().join("schemas/strict.schema.json"));
    }

    #[test]
    fn unknown_relative_schema_is_returned_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = schema_location(Some(Path::new("nowhere.schema.json")), dir.path());
        assert_eq!(resolved, PathBuf::from("nowhere.schema.json"));
    }
}
