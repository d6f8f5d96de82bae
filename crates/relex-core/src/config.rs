//! relex Configuration Management
//!
//! Handles configuration from environment variables, config files,
//! and command-line arguments with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Engine mode and sampling
    pub engine: EngineConfig,

    /// Feature extractor selection and parameters
    pub features: FeatureConfig,

    /// Relation categories added to the built-in registry
    pub categories: CategoryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    /// Apply every `RELEX_*` variable that `lookup` resolves
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Engine
        if let Some(value) = lookup("RELEX_TRAINING") {
            self.engine.training = parse_bool("RELEX_TRAINING", &value)?;
        }
        if let Some(value) = lookup("RELEX_KEEP_PROBABILITY") {
            self.engine.negative_keep_probability =
                value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "RELEX_KEEP_PROBABILITY".to_string(),
                    value,
                })?;
        }
        if let Some(path) = lookup("RELEX_MODEL") {
            self.engine.classifier_location = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("RELEX_OUTPUT") {
            self.engine.output_location = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup("RELEX_SEED") {
            self.engine.seed = Some(value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "RELEX_SEED".to_string(),
                value,
            })?);
        }
        if let Some(target) = lookup("RELEX_TARGET_TYPE") {
            self.engine.target_mention_type = target;
        }

        // Features
        if let Some(path) = lookup("RELEX_CONCEPT_DICTIONARY") {
            self.features.concept_dictionary = Some(PathBuf::from(path));
        }

        // Logging
        if let Some(level) = lookup("RELEX_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(value) = lookup("RELEX_LOG_JSON") {
            self.logging.json_format = parse_bool("RELEX_LOG_JSON", &value)?;
        }

        Ok(())
    }

    /// Check cross-field constraints before an engine is built
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = self.engine.negative_keep_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::InvalidValue {
                key: "negative_keep_probability".to_string(),
                value: p.to_string(),
            });
        }

        if self.engine.target_mention_type.trim().is_empty() {
            return Err(ConfigError::MissingRequired(
                "target_mention_type".to_string(),
            ));
        }

        if self.engine.training && self.engine.output_location.is_none() {
            return Err(ConfigError::MissingRequired(
                "output_location (required for training)".to_string(),
            ));
        }

        if !self.engine.training && self.engine.classifier_location.is_none() {
            return Err(ConfigError::MissingRequired(
                "classifier_location (required for prediction)".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Write training data instead of classifying
    pub training: bool,

    /// Probability of keeping a candidate pair with no gold relation
    pub negative_keep_probability: f64,

    /// Trained model file (prediction)
    pub classifier_location: Option<PathBuf>,

    /// Directory for training data (training)
    pub output_location: Option<PathBuf>,

    /// Seed for negative sampling; `None` draws from OS entropy
    pub seed: Option<u64>,

    /// Exact mention type paired by the candidate generator
    pub target_mention_type: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            training: false,
            negative_keep_probability: 1.0,
            classifier_location: None,
            output_location: None,
            seed: None,
            target_mention_type: "EventMention".to_string(),
        }
    }
}

/// Feature extractor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Extractors to run, in order
    pub extractors: Vec<String>,

    /// Token window searched for verbs around each argument
    pub verb_window: usize,

    /// Maximum number of between-argument words emitted as features
    pub max_words_between: usize,

    /// Cue words looked up between arguments
    pub special_words: Vec<String>,

    /// JSON concept dictionary (surface form -> semantic groups)
    pub concept_dictionary: Option<PathBuf>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            extractors: [
                "token",
                "pos",
                "section",
                "verb_tense",
                "special_word",
                "concept",
                "dependency",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            verb_window: 5,
            max_words_between: 10,
            special_words: [
                "before", "after", "during", "while", "prior", "following", "since", "until",
                "then", "when", "previously", "subsequently", "post", "pre",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            concept_dictionary: None,
        }
    }
}

/// Additional relation categories
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryConfig {
    /// Categories whose meaning is unchanged when arguments are swapped
    pub symmetric: Vec<String>,

    /// Categories that get an inverse marker when matched in reverse
    pub directional: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {message}", path.display())]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(!config.engine.training);
        assert_eq!(config.engine.negative_keep_probability, 1.0);
        assert_eq!(config.engine.target_mention_type, "EventMention");
        assert_eq!(config.features.extractors.len(), 7);
        assert_eq!(config.features.verb_window, 5);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(lookup_from(&[
                ("RELEX_TRAINING", "true"),
                ("RELEX_KEEP_PROBABILITY", "0.25"),
                ("RELEX_OUTPUT", "/tmp/out"),
                ("RELEX_SEED", "7"),
            ]))
            .unwrap();

        assert!(config.engine.training);
        assert_eq!(config.engine.negative_keep_probability, 0.25);
        assert_eq!(config.engine.output_location, Some(PathBuf::from("/tmp/out")));
        assert_eq!(config.engine.seed, Some(7));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let mut config = AppConfig::default();
        assert!(config
            .apply_env(lookup_from(&[("RELEX_KEEP_PROBABILITY", "often")]))
            .is_err());
        assert!(config
            .apply_env(lookup_from(&[("RELEX_TRAINING", "maybe")]))
            .is_err());
    }

    #[test]
    fn test_validate_probability_range() {
        let mut config = AppConfig::default();
        config.engine.classifier_location = Some(PathBuf::from("model.json"));
        assert!(config.validate().is_ok());

        config.engine.negative_keep_probability = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_mode_requirements() {
        let mut config = AppConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));

        config.engine.training = true;
        assert!(config.validate().is_err());
        config.engine.output_location = Some(PathBuf::from("out"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relex.toml");
        std::fs::write(
            &path,
            r#"
[engine]
training = true
negative_keep_probability = 0.1
output_location = "train-out"

[categories]
symmetric = ["SIMULTANEOUS"]
"#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert!(config.engine.training);
        assert_eq!(config.engine.negative_keep_probability, 0.1);
        assert_eq!(config.categories.symmetric, vec!["SIMULTANEOUS"]);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_file_missing() {
        let err = AppConfig::from_file("/nonexistent/relex.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }
}
