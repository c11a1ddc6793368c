use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constraint::{ConstraintDescriptors, ConstraintSet};
use crate::error::{ConfigError, ConfigResult as Result};
use crate::report::{ErrorReporter, VerbosityLevel};

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Main validator configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub validation: ValidationConfig,
    pub output: OutputConfig,
    /// PARAM and FIELD constraints applied to every table
    pub constraints: ConstraintDescriptors,
}

/// Traversal behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ValidationConfig {
    /// Abort on the first error instead of accumulating them
    pub fail_fast: bool,
}

/// Report rendering
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormatConfig,
    pub verbose: bool,
    /// Errors only
    pub quiet: bool,
    pub show_timestamps: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatConfig {
    #[default]
    Human,
    Json,
}

impl Config {
    /// Build the constraint set described by this configuration
    pub fn constraint_set(&self) -> Result<ConstraintSet> {
        Ok(ConstraintSet::from_descriptors(&self.constraints)?)
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.output.quiet {
            VerbosityLevel::Quiet
        } else if self.output.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    pub fn reporter(&self) -> ErrorReporter {
        ErrorReporter::with_options(self.verbosity(), self.output.show_timestamps)
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from a file (TOML or JSON)
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => Self::parse(&content),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Config> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Config> {
        Ok(serde_json::from_str(content)?)
    }

    /// Try TOML first, then JSON
    pub fn parse(content: &str) -> Result<Config> {
        match toml::from_str::<Config>(content) {
            Ok(config) => Ok(config),
            Err(_) => Self::from_json_str(content),
        }
    }

    /// Load a standalone constraints document with `params` and `fields` lists
    pub fn constraints_from_toml_str(content: &str) -> Result<ConstraintSet> {
        let descriptors: ConstraintDescriptors = toml::from_str(content)?;
        Ok(ConstraintSet::from_descriptors(&descriptors)?)
    }

    pub fn constraints_from_json_str(content: &str) -> Result<ConstraintSet> {
        let descriptors: ConstraintDescriptors = serde_json::from_str(content)?;
        Ok(ConstraintSet::from_descriptors(&descriptors)?)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(fail_fast) = env.get("VALIDATE_VOTABLE_FAIL_FAST") {
            config.validation.fail_fast = parse_bool("VALIDATE_VOTABLE_FAIL_FAST", &fail_fast)?;
        }

        if let Some(verbose) = env.get("VALIDATE_VOTABLE_VERBOSE") {
            config.output.verbose = parse_bool("VALIDATE_VOTABLE_VERBOSE", &verbose)?;
        }

        if let Some(quiet) = env.get("VALIDATE_VOTABLE_QUIET") {
            config.output.quiet = parse_bool("VALIDATE_VOTABLE_QUIET", &quiet)?;
        }

        if let Some(format) = env.get("VALIDATE_VOTABLE_FORMAT") {
            config.output.format = match format.to_lowercase().as_str() {
                "human" => OutputFormatConfig::Human,
                "json" => OutputFormatConfig::Json,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid VALIDATE_VOTABLE_FORMAT value: {}",
                        format
                    )));
                }
            };
        }

        Ok(config)
    }

    /// Merge two configurations; the override wins, and its constraint
    /// lists replace the base lists when non-empty
    pub fn merge_configs(mut base: Config, override_config: Config) -> Config {
        base.validation.fail_fast = override_config.validation.fail_fast;

        base.output.format = override_config.output.format;
        base.output.verbose = override_config.output.verbose;
        base.output.quiet = override_config.output.quiet;
        base.output.show_timestamps = override_config.output.show_timestamps;

        if !override_config.constraints.params.is_empty() {
            base.constraints.params = override_config.constraints.params;
        }
        if !override_config.constraints.fields.is_empty() {
            base.constraints.fields = override_config.constraints.fields;
        }

        base
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot be both verbose and quiet".to_string(),
            ));
        }

        config.constraint_set()?;
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    value
        .parse()
        .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_key::FieldKey;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    /// Mock environment variable provider for testing
    #[derive(Default)]
    struct MockEnvProvider {
        vars: HashMap<String, String>,
    }

    impl MockEnvProvider {
        fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
            self.vars.insert(key.into(), value.into());
        }
    }

    impl EnvProvider for MockEnvProvider {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).cloned()
        }
    }

    const TOML_CONFIG: &str = r#"
[validation]
fail_fast = true

[output]
format = "json"
show_timestamps = true

[[constraints.params]]
name = "epoch"
datatype = "int"

[[constraints.fields]]
name = "flux"
ucd = "phot.flux"
unit = "mJy"
maxprecision = "E3"

[[constraints.fields]]
name = "comment"
optional = true
"#;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.validation.fail_fast);
        assert_eq!(config.output.format, OutputFormatConfig::Human);
        assert!(!config.output.verbose);
        assert!(!config.output.quiet);
        assert!(config.constraints.fields.is_empty());
        assert_eq!(config.verbosity(), VerbosityLevel::Normal);
    }

    #[test]
    fn test_load_toml_config() {
        let config = ConfigManager::from_toml_str(TOML_CONFIG).unwrap();
        assert!(config.validation.fail_fast);
        assert_eq!(config.output.format, OutputFormatConfig::Json);
        assert!(config.output.show_timestamps);
        assert_eq!(config.constraints.params.len(), 1);
        assert_eq!(config.constraints.fields.len(), 2);

        let set = config.constraint_set().unwrap();
        assert_eq!(set.fields()[0].get(FieldKey::Precision), Some("E3"));
        assert!(set.fields()[1].is_optional());
        assert_eq!(set.params()[0].get(FieldKey::Datatype), Some("int"));
    }

    #[test]
    fn test_load_json_config() {
        let json = r#"{
            "validation": {"fail_fast": false},
            "output": {"verbose": true},
            "constraints": {"fields": [{"ucd": "pos.eq.ra", "maxwidth": "10"}]}
        }"#;
        let config = ConfigManager::from_json_str(json).unwrap();
        assert!(config.output.verbose);
        assert_eq!(config.verbosity(), VerbosityLevel::Verbose);

        let set = config.constraint_set().unwrap();
        assert_eq!(set.fields()[0].get(FieldKey::Width), Some("10"));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();

        let toml_path = temp_dir.path().join("votable.toml");
        fs::write(&toml_path, TOML_CONFIG).unwrap();
        let config = ConfigManager::load_from_file(&toml_path).unwrap();
        assert!(config.validation.fail_fast);

        let bare_path = temp_dir.path().join("votable-config");
        fs::write(&bare_path, r#"{"output": {"quiet": true}}"#).unwrap();
        let config = ConfigManager::load_from_file(&bare_path).unwrap();
        assert!(config.output.quiet);

        let yaml_path = temp_dir.path().join("votable.yaml");
        fs::write(&yaml_path, "validation: {}").unwrap();
        assert!(matches!(
            ConfigManager::load_from_file(&yaml_path),
            Err(ConfigError::UnsupportedFormat(ext)) if ext == "yaml"
        ));
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(
            ConfigManager::from_toml_str("[validation\nfail_fast = true"),
            Err(ConfigError::TomlParsing(_))
        ));
        assert!(matches!(
            ConfigManager::from_json_str("{\"validation\": "),
            Err(ConfigError::JsonParsing(_))
        ));
        assert!(matches!(
            ConfigManager::constraints_from_json_str(r#"{"fields": [{"maxwidth": "-2", "name": "x"}]}"#),
            Err(ConfigError::Constraint(_))
        ));
        assert!(matches!(
            ConfigManager::constraints_from_toml_str("[[fields]]\nnmae = \"typo\""),
            Err(ConfigError::TomlParsing(_))
        ));
    }

    #[test]
    fn test_standalone_constraints() {
        let set = ConfigManager::constraints_from_toml_str(
            r#"
[[params]]
name = "survey"

[[fields]]
datatype = "double"
maxprecision = "F6"
"#,
        )
        .unwrap();
        assert_eq!(set.params().len(), 1);
        assert_eq!(set.fields()[0].get(FieldKey::Precision), Some("F6"));
    }

    #[test]
    fn test_environment_overrides() {
        let mut mock_env = MockEnvProvider::default();
        mock_env.set("VALIDATE_VOTABLE_FAIL_FAST", "true");
        mock_env.set("VALIDATE_VOTABLE_VERBOSE", "true");
        mock_env.set("VALIDATE_VOTABLE_FORMAT", "JSON");

        let config =
            ConfigManager::apply_environment_overrides_with(&mock_env, Config::default()).unwrap();
        assert!(config.validation.fail_fast);
        assert!(config.output.verbose);
        assert_eq!(config.output.format, OutputFormatConfig::Json);
    }

    #[test]
    fn test_invalid_environment_values() {
        let mut mock_env = MockEnvProvider::default();
        mock_env.set("VALIDATE_VOTABLE_QUIET", "maybe");
        let result = ConfigManager::apply_environment_overrides_with(&mock_env, Config::default());
        assert!(matches!(result, Err(ConfigError::Environment(_))));

        let mut mock_env = MockEnvProvider::default();
        mock_env.set("VALIDATE_VOTABLE_FORMAT", "xml");
        let result = ConfigManager::apply_environment_overrides_with(&mock_env, Config::default());
        assert!(matches!(result, Err(ConfigError::Environment(_))));
    }

    #[test]
    fn test_merge_configs() {
        let base = ConfigManager::from_toml_str(TOML_CONFIG).unwrap();
        let mut override_config = Config::default();
        override_config.output.verbose = true;

        let merged = ConfigManager::merge_configs(base, override_config);
        assert!(!merged.validation.fail_fast);
        assert!(merged.output.verbose);
        assert_eq!(merged.constraints.fields.len(), 2);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(ConfigManager::validate_config(&config).is_ok());

        config.output.verbose = true;
        config.output.quiet = true;
        assert!(matches!(
            ConfigManager::validate_config(&config),
            Err(ConfigError::Validation(_))
        ));

        let config = ConfigManager::from_json_str(
            r#"{"constraints": {"fields": [{"id": "col1"}]}}"#,
        )
        .unwrap();
        assert!(matches!(
            ConfigManager::validate_config(&config),
            Err(ConfigError::Constraint(_))
        ));
    }
}
