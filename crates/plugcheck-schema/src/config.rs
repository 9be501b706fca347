//! # Plugin Config Loader
//!
//! Reads a plugin's `plugin_config.yml` into a [`PluginConfigContent`].
//!
//! The file is parsed as YAML and immediately projected into JSON, since
//! JSON is what the schema validates and what downstream packaging stages
//! consume. A document that is valid YAML but has no JSON form (mapping
//! keys that are themselves mappings, `.nan`) is rejected here rather than
//! surfacing as a confusing schema error later.
//!
//! A key repeated within one mapping is not an error: the last occurrence
//! wins, matching how PyYAML's `safe_load` reads plugin configs.

use std::fmt;
use std::path::Path;

use plugcheck_core::{PluginValidationError, YamlPosition};
use serde::de::{self, Deserialize, Deserializer, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor};
use serde_json::{Map, Number, Value};
use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping, Value as Yaml};

/// Key holding the plugin's machine name.
pub const NAME_KEY: &str = "name";
/// Key holding the plugin's displayed name.
pub const PRETTY_NAME_KEY: &str = "prettyName";
/// Key holding the plugin version.
pub const VERSION_KEY: &str = "version";
/// Key holding the list of supported host types.
pub const HOST_TYPES_KEY: &str = "hostTypes";
/// Key holding the `module:symbol` entry point.
pub const ENTRY_POINT_KEY: &str = "entryPoint";
/// Key holding the config-relative source directory.
pub const SRC_DIR_KEY: &str = "srcDir";
/// Key holding the plugin-defined schema file.
pub const SCHEMA_FILE_KEY: &str = "schemaFile";
/// Key holding the manual discovery flag.
pub const MANUAL_DISCOVERY_KEY: &str = "manualDiscovery";
/// Key holding the plugin execution mode (DIRECT / STAGED).
pub const PLUGIN_TYPE_KEY: &str = "pluginType";
/// Key holding the source language tag.
pub const LANGUAGE_KEY: &str = "language";

/// A loaded plugin config document.
///
/// Wraps the JSON projection of the YAML file. The document may be any JSON
/// value (a bare scalar loads as-is); shape is enforced by the schema,
/// not by this type.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginConfigContent {
    document: Value,
}

impl PluginConfigContent {
    /// Wrap an already-parsed document.
    pub fn from_json(document: Value) -> Self {
        Self { document }
    }

    /// Project a parsed YAML document into JSON.
    ///
    /// # Errors
    ///
    /// Returns a description of the first value with no JSON equivalent.
    pub fn from_yaml(document: &serde_yaml::Value) -> Result<Self, String> {
        Ok(Self {
            document: yaml_to_json_value(document, &mut Vec::new())?,
        })
    }

    /// The JSON projection validated against the schema.
    pub fn as_json(&self) -> &Value {
        &self.document
    }

    /// Top-level value for `key`, if the document is a mapping containing it.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }

    /// Top-level string value for `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// The plugin's machine name.
    pub fn name(&self) -> Option<&str> {
        self.get_str(NAME_KEY)
    }

    /// The plugin's displayed name.
    pub fn pretty_name(&self) -> Option<&str> {
        self.get_str(PRETTY_NAME_KEY)
    }

    /// The plugin version string.
    pub fn version(&self) -> Option<&str> {
        self.get_str(VERSION_KEY)
    }

    /// Supported host types. A single string counts as a one-item list;
    /// anything else yields nothing.
    pub fn host_types(&self) -> Vec<&str> {
        match self.get(HOST_TYPES_KEY) {
            Some(Value::String(single)) => vec![single.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// The raw `module:symbol` entry point.
    pub fn entry_point(&self) -> Option<&str> {
        self.get_str(ENTRY_POINT_KEY)
    }

    /// The declared, possibly relative, source directory.
    pub fn src_dir(&self) -> Option<&str> {
        self.get_str(SRC_DIR_KEY)
    }

    /// The plugin-defined schema file.
    pub fn schema_file(&self) -> Option<&str> {
        self.get_str(SCHEMA_FILE_KEY)
    }

    /// Whether the plugin implements its own source config discovery.
    /// Absent means automatic discovery.
    pub fn manual_discovery(&self) -> bool {
        self.get(MANUAL_DISCOVERY_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// DIRECT or STAGED.
    pub fn plugin_type(&self) -> Option<&str> {
        self.get_str(PLUGIN_TYPE_KEY)
    }

    /// Source language tag, e.g. `PYTHON27`.
    pub fn language(&self) -> Option<&str> {
        self.get_str(LANGUAGE_KEY)
    }
}

impl From<Value> for PluginConfigContent {
    fn from(document: Value) -> Self {
        Self::from_json(document)
    }
}

/// Config content handed to the validator instead of a file on disk.
#[derive(Debug, Clone, PartialEq)]
pub enum SuppliedConfig {
    /// Unparsed YAML text; parsed with the same rules as a file.
    Raw(String),
    /// An already-parsed document.
    Parsed(PluginConfigContent),
}

impl SuppliedConfig {
    /// Turn the supplied content into a document. `path` is only used to
    /// label errors; it is never opened.
    ///
    /// # Errors
    ///
    /// Raw text fails the same way a file would: [`PluginValidationError::InvalidYaml`]
    /// or [`PluginValidationError::ConfigNotJson`].
    pub fn into_content(self, path: &Path) -> Result<PluginConfigContent, PluginValidationError> {
        match self {
            Self::Raw(text) => parse_plugin_config(path, &text),
            Self::Parsed(content) => Ok(content),
        }
    }
}

impl From<String> for SuppliedConfig {
    fn from(text: String) -> Self {
        Self::Raw(text)
    }
}

impl From<&str> for SuppliedConfig {
    fn from(text: &str) -> Self {
        Self::Raw(text.to_string())
    }
}

impl From<PluginConfigContent> for SuppliedConfig {
    fn from(content: PluginConfigContent) -> Self {
        Self::Parsed(content)
    }
}

impl From<Value> for SuppliedConfig {
    fn from(document: Value) -> Self {
        Self::Parsed(PluginConfigContent::from_json(document))
    }
}

/// Read and parse the plugin config file at `path`.
///
/// # Errors
///
/// - [`PluginValidationError::ConfigRead`] if the file cannot be read.
/// - [`PluginValidationError::InvalidYaml`] if it is not valid YAML.
/// - [`PluginValidationError::ConfigNotJson`] if it has no JSON projection.
pub fn load_plugin_config(path: &Path) -> Result<PluginConfigContent, PluginValidationError> {
    let bytes =
        std::fs::read(path).map_err(|e| PluginValidationError::config_read(path, &e))?;
    parse_bytes(path, &bytes)
}

/// Parse plugin config YAML that has already been read. `path` labels errors.
///
/// # Errors
///
/// Same as [`load_plugin_config`], minus the read failure.
pub fn parse_plugin_config(
    path: &Path,
    text: &str,
) -> Result<PluginConfigContent, PluginValidationError> {
    parse_bytes(path, text.as_bytes())
}

fn parse_bytes(path: &Path, bytes: &[u8]) -> Result<PluginConfigContent, PluginValidationError> {
    let LastKeyWins(yaml) =
        serde_yaml::from_slice(bytes).map_err(|e| PluginValidationError::InvalidYaml {
            path: path.to_path_buf(),
            position: yaml_position(&e),
        })?;

    PluginConfigContent::from_yaml(&yaml).map_err(|reason| PluginValidationError::ConfigNotJson {
        path: path.to_path_buf(),
        reason,
    })
}

/// A YAML value whose mappings keep the last value for a repeated key.
/// `serde_yaml::Value` rejects repeats outright.
struct LastKeyWins(Yaml);

impl<'de> Deserialize<'de> for LastKeyWins {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(LastKeyWinsVisitor)
    }
}

struct LastKeyWinsVisitor;

impl<'de> Visitor<'de> for LastKeyWinsVisitor {
    type Value = LastKeyWins;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any YAML value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(LastKeyWins(Yaml::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(LastKeyWins(Yaml::Number(v.into())))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(LastKeyWins(Yaml::Number(v.into())))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(LastKeyWins(Yaml::Number(v.into())))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(LastKeyWins(Yaml::String(v.to_string())))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(LastKeyWins(Yaml::String(v)))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(LastKeyWins(Yaml::Null))
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(LastKeyWins(Yaml::Null))
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        LastKeyWins::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(LastKeyWins(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(LastKeyWins(Yaml::Sequence(items)))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut mapping = Mapping::new();
        while let Some((LastKeyWins(key), LastKeyWins(value))) = map.next_entry()? {
            mapping.insert(key, value);
        }
        Ok(LastKeyWins(Yaml::Mapping(mapping)))
    }

    // serde_yaml hands custom-tagged nodes over as enums.
    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<Self::Value, A::Error> {
        let (tag, variant): (String, _) = data.variant()?;
        let LastKeyWins(value) = variant.newtype_variant()?;
        Ok(LastKeyWins(Yaml::Tagged(Box::new(TaggedValue {
            tag: Tag::new(tag),
            value,
        }))))
    }
}

/// serde_yaml locations are already 1-based.
fn yaml_position(err: &serde_yaml::Error) -> YamlPosition {
    match err.location() {
        Some(loc) => YamlPosition::At {
            line: loc.line(),
            column: loc.column(),
        },
        None => YamlPosition::Unknown(err.to_string()),
    }
}

/// Convert a YAML value tree into JSON. `trail` tracks the key path for
/// error messages.
fn yaml_to_json_value(yaml: &Yaml, trail: &mut Vec<String>) -> Result<Value, String> {
    match yaml {
        Yaml::Null => Ok(Value::Null),
        Yaml::Bool(b) => Ok(Value::Bool(*b)),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::from(u))
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| format!("{} has non-finite number {n}", describe(trail)))
            }
        }
        Yaml::String(s) => Ok(Value::String(s.clone())),
        Yaml::Sequence(seq) => {
            let mut items = Vec::with_capacity(seq.len());
            for (idx, item) in seq.iter().enumerate() {
                trail.push(idx.to_string());
                items.push(yaml_to_json_value(item, trail)?);
                trail.pop();
            }
            Ok(Value::Array(items))
        }
        Yaml::Mapping(map) => {
            let mut object = Map::with_capacity(map.len());
            for (k, v) in map {
                let key = match k {
                    Yaml::String(s) => s.clone(),
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    Yaml::Null => "null".to_string(),
                    _ => return Err(format!("{} has a non-scalar mapping key", describe(trail))),
                };
                trail.push(key.clone());
                let value = yaml_to_json_value(v, trail)?;
                trail.pop();
                object.insert(key, value);
            }
            Ok(Value::Object(object))
        }
        // Tags carry no meaning for a plugin config.
        Yaml::Tagged(tagged) => yaml_to_json_value(&tagged.value, trail),
    }
}

fn describe(trail: &[String]) -> String {
    if trail.is_empty() {
        "document root".to_string()
    } else {
        format!("'{}'", trail.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID: &str = r#"
id: 16bef554-9470-11e9-b2e3-8c8590d4a42c
name: postgres
prettyName: Postgres Plugin
version: 0.1.0
hostTypes:
  - UNIX
entryPoint: plugin_runner:plugin
srcDir: src
schemaFile: schema.json
manualDiscovery: true
pluginType: DIRECT
language: PYTHON27
"#;

    #[test]
    fn load_valid_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugin_config.yml");
        std::fs::write(&path, VALID).unwrap();

        let content = load_plugin_config(&path).unwrap();
        assert_eq!(content.name(), Some("postgres"));
        assert_eq!(content.pretty_name(), Some("Postgres Plugin"));
        assert_eq!(content.version(), Some("0.1.0"));
        assert_eq!(content.host_types(), vec!["UNIX"]);
        assert_eq!(content.entry_point(), Some("plugin_runner:plugin"));
        assert_eq!(content.src_dir(), Some("src"));
        assert_eq!(content.schema_file(), Some("schema.json"));
        assert!(content.manual_discovery());
        assert_eq!(content.plugin_type(), Some("DIRECT"));
        assert_eq!(content.language(), Some("PYTHON27"));
    }

    #[test]
    fn missing_file_reports_errno_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yml");
        let err = load_plugin_config(&path).unwrap_err();
        match &err {
            PluginValidationError::ConfigRead { path: p, code, .. } => {
                assert_eq!(p, &path);
                assert_eq!(*code, 2, "ENOENT expected");
            }
            other => panic!("expected ConfigRead, got: {other}"),
        }
        let msg = err.to_string();
        assert!(msg.contains("absent.yml"));
        assert!(msg.contains("Error code: 2."));
    }

    #[test]
    fn bad_indentation_reports_one_based_position() {
        let text = "name: p\nprettyName: P\n  version: 1\n";
        let err = parse_plugin_config(Path::new("plugin_config.yml"), text).unwrap_err();
        match err {
            PluginValidationError::InvalidYaml {
                position: YamlPosition::At { line, column },
                ..
            } => {
                assert_eq!(line, 3);
                assert!(column >= 1);
            }
            other => panic!("expected positioned InvalidYaml, got: {other}"),
        }
    }

    proptest::proptest! {
        #[test]
        fn indentation_error_line_tracks_preceding_lines(valid_lines in 1usize..40) {
            let mut text: String = (0..valid_lines).map(|i| format!("key{i}: value\n")).collect();
            text.push_str("  stray: 1\n");
            let err = parse_plugin_config(Path::new("cfg.yml"), &text).unwrap_err();
            match err {
                PluginValidationError::InvalidYaml {
                    position: YamlPosition::At { line, .. },
                    ..
                } => proptest::prop_assert_eq!(line, valid_lines + 1),
                other => proptest::prop_assert!(false, "expected positioned InvalidYaml, got: {}", other),
            }
        }
    }

    #[test]
    fn repeated_key_keeps_last_value() {
        let text = format!("{VALID}name: q\n");
        let content = parse_plugin_config(Path::new("cfg.yml"), &text).unwrap();
        assert_eq!(content.name(), Some("q"));
        assert_eq!(content.pretty_name(), Some("Postgres Plugin"));
    }

    #[test]
    fn repeated_nested_key_keeps_last_value() {
        let text = "outer:\n  inner: 1\n  inner: 2\n";
        let content = parse_plugin_config(Path::new("cfg.yml"), text).unwrap();
        assert_eq!(content.as_json()["outer"]["inner"], 2);
    }

    #[test]
    fn custom_tags_are_dropped() {
        let content = parse_plugin_config(Path::new("cfg.yml"), "name: !custom p\n").unwrap();
        assert_eq!(content.name(), Some("p"));
    }

    #[test]
    fn unterminated_flow_sequence_is_invalid_yaml() {
        let text = "name: p\nhostTypes: [UNIX\n";
        let err = parse_plugin_config(Path::new("cfg.yml"), text).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'cfg.yml' was not valid yaml"), "{msg}");
        assert!(msg.contains("Error position: "), "{msg}");
    }

    #[test]
    fn scalar_document_loads_without_keys() {
        let content = parse_plugin_config(Path::new("cfg.yml"), "just a string\n").unwrap();
        assert_eq!(content.as_json(), &Value::String("just a string".to_string()));
        assert_eq!(content.entry_point(), None);
        assert!(content.host_types().is_empty());
    }

    #[test]
    fn non_finite_float_has_no_json_form() {
        let err = parse_plugin_config(Path::new("cfg.yml"), "name: p\nweight: .nan\n").unwrap_err();
        match err {
            PluginValidationError::ConfigNotJson { reason, .. } => {
                assert!(reason.contains("'weight'"), "{reason}");
            }
            other => panic!("expected ConfigNotJson, got: {other}"),
        }
    }

    #[test]
    fn scalar_keys_are_stringified() {
        let content = parse_plugin_config(Path::new("cfg.yml"), "1: one\ntrue: yes\n").unwrap();
        assert_eq!(content.get_str("1"), Some("one"));
        assert_eq!(content.get_str("true"), Some("yes"));
    }

    #[test]
    fn nested_values_convert() {
        let text = "a:\n  b: [1, 2.5, x]\n  c: ~\n";
        let content = parse_plugin_config(Path::new("cfg.yml"), text).unwrap();
        let json = content.as_json();
        assert_eq!(json["a"]["b"][0], 1);
        assert_eq!(json["a"]["b"][1], 2.5);
        assert_eq!(json["a"]["b"][2], "x");
        assert!(json["a"]["c"].is_null());
    }

    #[test]
    fn supplied_raw_text_never_touches_disk() {
        let path = PathBuf::from("/definitely/not/here/plugin_config.yml");
        let content = SuppliedConfig::from(VALID).into_content(&path).unwrap();
        assert_eq!(content.name(), Some("postgres"));
    }

    #[test]
    fn supplied_parsed_content_is_used_as_is() {
        let doc = serde_json::json!({"name": "direct"});
        let content = SuppliedConfig::from(doc.clone())
            .into_content(Path::new("unused"))
            .unwrap();
        assert_eq!(content.as_json(), &doc);
    }

    #[test]
    fn single_host_type_string_is_a_one_item_list() {
        let content = PluginConfigContent::from_json(serde_json::json!({"hostTypes": "UNIX"}));
        assert_eq!(content.host_types(), vec!["UNIX"]);
    }

    #[test]
    fn manual_discovery_defaults_to_false() {
        let content = PluginConfigContent::from_json(serde_json::json!({"name": "x"}));
        assert!(!content.manual_discovery());
    }
}
