//! Engine configuration, loadable from a `[parity]`-style TOML document.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Annotation type names that mark trusted test infrastructure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagNames {
    /// Verification entry point
    pub verify: String,
    /// Value generator
    pub generator: String,
    /// Case producer
    pub next: String,
    /// Helper
    pub helper: String,
}

impl Default for TagNames {
    fn default() -> Self {
        Self {
            verify: "parity/Verify".to_string(),
            generator: "parity/Generator".to_string(),
            next: "parity/Next".to_string(),
            helper: "parity/Helper".to_string(),
        }
    }
}

/// Configuration shared by the patcher, auditor and proxy forwarder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Package of generated top-level mirror classes
    pub mirror_package: String,
    /// Simple-name prefix of generated top-level mirror classes
    pub mirror_prefix: String,
    /// Separator marking nested types and compiler-synthesized members
    pub synthetic_separator: char,
    /// Tag annotation type names
    pub tags: TagNames,
    /// Methods never intercepted by proxy subtypes
    pub proxy_excluded_methods: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mirror_package: "mirror".to_string(),
            mirror_prefix: "m".to_string(),
            synthetic_separator: '$',
            tags: TagNames::default(),
            proxy_excluded_methods: vec!["finalize".to_string()],
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from TOML text; missing keys take their defaults
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mirror_package.is_empty() || self.mirror_package.contains('.') {
            return Err(ConfigError::ValidationError(format!(
                "Invalid mirror package: {:?}. Use `/` between segments",
                self.mirror_package
            )));
        }
        let reserved = ['/', self.synthetic_separator];
        if self.mirror_prefix.is_empty() || self.mirror_prefix.contains(reserved) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid mirror prefix: {:?}",
                self.mirror_prefix
            )));
        }
        let tags = [
            &self.tags.verify,
            &self.tags.generator,
            &self.tags.next,
            &self.tags.helper,
        ];
        if tags.iter().any(|tag| tag.is_empty()) {
            return Err(ConfigError::ValidationError(
                "Tag names cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.mirror_package, "mirror");
        assert_eq!(config.synthetic_separator, '$');
        assert_eq!(config.proxy_excluded_methods, vec!["finalize"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            mirror_package = "grading/mirrors"

            [tags]
            helper = "course/Helper"
            "#,
        )
        .unwrap();
        assert_eq!(config.mirror_package, "grading/mirrors");
        assert_eq!(config.mirror_prefix, "m");
        assert_eq!(config.tags.helper, "course/Helper");
        assert_eq!(config.tags.verify, "parity/Verify");
    }

    #[test]
    fn test_invalid_prefix_rejected() {
        let err = EngineConfig::from_toml(r#"mirror_prefix = "a$b""#).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            EngineConfig::from_toml("mirror_package = ["),
            Err(ConfigError::ParseError(_))
        ));
    }
}
