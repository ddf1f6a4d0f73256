//! Config - Named configuration values for a stack
//!
//! Values are read from a stack file in the `Pulumi.<stack>.yaml` layout:
//!
//! ```yaml
//! config:
//!   aws:region: us-east-1
//!   webapp:vpcCidrBlock: 10.0.0.0/16
//! ```
//!
//! Keys without a namespace belong to the project namespace.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

/// Error type for configuration loading and lookup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration key '{key}'")]
    Missing { key: String },

    #[error("Invalid value '{value}' for configuration key '{key}': {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse stack file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{} configuration error(s):\n{}", .0.len(), format_errors(.0))]
    Multiple(Vec<ConfigError>),
}

fn format_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| format!("  {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Deserialize)]
struct StackFile {
    #[serde(default)]
    config: BTreeMap<String, serde_yaml::Value>,
}

/// Configuration values of one stack
#[derive(Debug, Clone, Default)]
pub struct StackConfig {
    project: String,
    values: BTreeMap<String, String>,
}

impl StackConfig {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            values: BTreeMap::new(),
        }
    }

    /// Load a stack file from disk
    pub fn load(path: &Path, project: impl Into<String>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loaded stack file {}", path.display());
        Self::from_yaml_str(&content, project)
    }

    /// Parse a stack file's contents
    pub fn from_yaml_str(content: &str, project: impl Into<String>) -> Result<Self, ConfigError> {
        let file: StackFile = serde_yaml::from_str(content)?;
        let mut config = Self::new(project);
        let mut errors = Vec::new();

        for (key, value) in file.config {
            match scalar_to_string(&value) {
                Ok(Some(s)) => {
                    config.set(&key, s);
                }
                Ok(None) => {}
                Err(reason) => errors.push(ConfigError::Invalid {
                    key,
                    value: format!("{:?}", value),
                    reason,
                }),
            }
        }

        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Multiple(errors))
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn qualify(&self, key: &str) -> String {
        if key.contains(':') {
            key.to_string()
        } else {
            format!("{}:{}", self.project, key)
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        let key = self.qualify(key);
        self.values.insert(key, value.into());
        self
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let key = self.qualify(key);
        self.values.remove(&key)
    }

    /// All fully qualified keys
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&self.qualify(key)).map(String::as_str)
    }

    /// Required value; blank values are rejected like missing ones
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        match self.get(key) {
            None => Err(ConfigError::Missing {
                key: self.qualify(key),
            }),
            Some(value) if value.trim().is_empty() => Err(ConfigError::Invalid {
                key: self.qualify(key),
                value: value.to_string(),
                reason: "must not be empty".to_string(),
            }),
            Some(value) => Ok(value),
        }
    }

    /// Parse an optional value
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| ConfigError::Invalid {
                    key: self.qualify(key),
                    value: raw.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    pub fn require_parsed<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.get_parsed(key)?.ok_or_else(|| ConfigError::Missing {
            key: self.qualify(key),
        })
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        self.get_parsed(key)
    }

    /// Comma-separated list, items trimmed, empty items dropped
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }

    /// Comma-separated list of parsed items
    pub fn get_parsed_list<T>(&self, key: &str) -> Result<Option<Vec<T>>, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let Some(items) = self.get_list(key) else {
            return Ok(None);
        };
        items
            .iter()
            .map(|item| {
                item.parse::<T>().map_err(|e| ConfigError::Invalid {
                    key: self.qualify(key),
                    value: item.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Reader that records every failed lookup instead of stopping at the first
    pub fn reader(&self) -> ConfigReader<'_> {
        ConfigReader {
            config: self,
            errors: Vec::new(),
        }
    }
}

fn scalar_to_string(value: &serde_yaml::Value) -> Result<Option<String>, String> {
    match value {
        serde_yaml::Value::Null => Ok(None),
        serde_yaml::Value::Bool(b) => Ok(Some(b.to_string())),
        serde_yaml::Value::Number(n) => Ok(Some(n.to_string())),
        serde_yaml::Value::String(s) => Ok(Some(s.clone())),
        serde_yaml::Value::Sequence(items) => {
            let parts = items
                .iter()
                .map(|item| match scalar_to_string(item)? {
                    Some(s) => Ok(s),
                    None => Err("list items must not be null".to_string()),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(parts.join(",")))
        }
        serde_yaml::Value::Mapping(map) if map.contains_key("secure") => {
            Err("encrypted values are not supported; provide the plaintext value".to_string())
        }
        serde_yaml::Value::Mapping(_) => Err("expected a scalar or a list".to_string()),
        serde_yaml::Value::Tagged(tagged) => scalar_to_string(&tagged.value),
    }
}

/// Collects lookup errors so a caller can report every problem at once
pub struct ConfigReader<'a> {
    config: &'a StackConfig,
    errors: Vec<ConfigError>,
}

impl<'a> ConfigReader<'a> {
    pub fn config(&self) -> &'a StackConfig {
        self.config
    }

    /// Required string; records an error and returns an empty string when absent
    pub fn require(&mut self, key: &str) -> String {
        match self.config.require(key) {
            Ok(v) => v.to_string(),
            Err(e) => {
                self.errors.push(e);
                String::new()
            }
        }
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.config.get(key).unwrap_or(default).to_string()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(str::to_string)
    }

    /// Required parsed value; records an error and returns the default type value
    pub fn require_parsed<T>(&mut self, key: &str) -> T
    where
        T: FromStr + Default,
        T::Err: fmt::Display,
    {
        match self.config.require_parsed(key) {
            Ok(v) => v,
            Err(e) => {
                self.errors.push(e);
                T::default()
            }
        }
    }

    pub fn parsed_or<T>(&mut self, key: &str, default: T) -> T
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.config.get_parsed(key) {
            Ok(Some(v)) => v,
            Ok(None) => default,
            Err(e) => {
                self.errors.push(e);
                default
            }
        }
    }

    pub fn list(&self, key: &str) -> Option<Vec<String>> {
        self.config.get_list(key)
    }

    pub fn parsed_list<T>(&mut self, key: &str) -> Option<Vec<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.config.get_parsed_list(key) {
            Ok(v) => v,
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    /// Record a semantic error found while interpreting values
    pub fn invalid(&mut self, key: &str, value: impl Into<String>, reason: impl Into<String>) {
        self.errors.push(ConfigError::Invalid {
            key: self.config.qualify(key),
            value: value.into(),
            reason: reason.into(),
        });
    }

    pub fn missing(&mut self, key: &str) {
        self.errors.push(ConfigError::Missing {
            key: self.config.qualify(key),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Finish reading; fails with every recorded error
    pub fn finish(self) -> Result<(), ConfigError> {
        let mut errors = self.errors;
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::Multiple(errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const STACK: &str = r#"
config:
  aws:region: us-east-1
  webapp:vpcCidrBlock: 10.0.0.0/16
  webapp:dbPort: 3306
  webapp:enableDns: false
  ports: "22,80, 443"
  webapp:availabilityZones:
    - us-east-1a
    - us-east-1b
"#;

    #[test]
    fn keys_resolve_in_project_namespace() {
        let config = StackConfig::from_yaml_str(STACK, "webapp").unwrap();
        assert_eq!(config.get("vpcCidrBlock"), Some("10.0.0.0/16"));
        assert_eq!(config.get("aws:region"), Some("us-east-1"));
        assert_eq!(config.get("webapp:vpcCidrBlock"), Some("10.0.0.0/16"));
        assert_eq!(config.get("region"), None);
    }

    #[test]
    fn scalars_are_kept_as_strings() {
        let config = StackConfig::from_yaml_str(STACK, "webapp").unwrap();
        assert_eq!(config.require_parsed::<u16>("dbPort").unwrap(), 3306);
        assert_eq!(config.get_bool("enableDns").unwrap(), Some(false));
        assert_eq!(
            config.get_list("availabilityZones").unwrap(),
            vec!["us-east-1a", "us-east-1b"]
        );
    }

    #[test]
    fn parsed_list_trims_items() {
        let config = StackConfig::from_yaml_str(STACK, "webapp").unwrap();
        let ports: Vec<u16> = config.get_parsed_list("ports").unwrap().unwrap();
        assert_eq!(ports, vec![22, 80, 443]);
    }

    #[test]
    fn missing_key_names_qualified_key() {
        let config = StackConfig::new("webapp");
        let err = config.require("dbName").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required configuration key 'webapp:dbName'"
        );
    }

    #[test]
    fn blank_required_value_is_invalid() {
        let config = StackConfig::new("webapp").with("primaryVPCName", "  ");
        match config.require("primaryVPCName") {
            Err(ConfigError::Invalid { key, reason, .. }) => {
                assert_eq!(key, "webapp:primaryVPCName");
                assert_eq!(reason, "must not be empty");
            }
            other => panic!("Expected invalid value, got {:?}", other),
        }

        let mut reader = config.reader();
        assert_eq!(reader.require("primaryVPCName"), "");
        assert!(reader.has_errors());
    }

    #[test]
    fn invalid_number_is_reported() {
        let config = StackConfig::new("webapp").with("dbPort", "db");
        assert!(matches!(
            config.require_parsed::<u16>("dbPort"),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn encrypted_values_are_rejected() {
        let yaml = "config:\n  webapp:dbPassword:\n    secure: AAABAxyz\n";
        let err = StackConfig::from_yaml_str(yaml, "webapp").unwrap_err();
        assert!(err.to_string().contains("encrypted values are not supported"));
    }

    #[test]
    fn reader_collects_every_error() {
        let config = StackConfig::new("webapp").with("dbPort", "x");
        let mut reader = config.reader();
        let _ = reader.require("vpcCidrBlock");
        let _: u16 = reader.require_parsed("dbPort");
        let _ = reader.require("dbName");
        match reader.finish() {
            Err(ConfigError::Multiple(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("Expected multiple errors, got {:?}", other),
        }
    }

    #[test]
    fn load_reads_stack_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(STACK.as_bytes()).unwrap();
        let config = StackConfig::load(file.path(), "webapp").unwrap();
        assert_eq!(config.get("aws:region"), Some("us-east-1"));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = StackConfig::load(&dir.path().join("Pulumi.dev.yaml"), "webapp").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
