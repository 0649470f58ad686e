//! # Configuration File Loading
//!
//! Loads configuration from TOML or YAML files, picking the format from the
//! file extension.

use crate::config::Config;
use std::path::Path;

/// Configuration file loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(String),

    #[error("Config file has no extension")]
    NoExtension,

    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(String)
}

/// Load configuration from a TOML file.
///
/// Sections missing from the file keep their defaults.
pub fn load_from_toml(path: &Path) -> Result<Config, ConfigFileError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|_e| ConfigFileError::FileNotFound(path.display().to_string()))?;

    toml::from_str(&contents).map_err(|e| ConfigFileError::TomlParse(e.to_string()))
}

/// Load configuration from a YAML file.
pub fn load_from_yaml(path: &Path) -> Result<Config, ConfigFileError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|_e| ConfigFileError::FileNotFound(path.display().to_string()))?;

    serde_yaml::from_str(&contents).map_err(|e| ConfigFileError::YamlParse(e.to_string()))
}

/// Load configuration from file with auto-detection.
///
/// # M-CANONICAL-DOCS
///
/// ## Supported Formats
/// - `.toml`: TOML format
/// - `.yaml` / `.yml`: YAML format
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_file;
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_file(Path::new("storyforge.toml"))?;
///     println!("{} stages", config.pipeline.stages.len());
///     Ok(())
/// }
/// ```
pub fn load_from_file(path: &Path) -> Result<Config, ConfigFileError> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or(ConfigFileError::NoExtension)?;

    match extension.to_lowercase().as_str() {
        "toml" => load_from_toml(path),
        "yaml" | "yml" => load_from_yaml(path),
        other => Err(ConfigFileError::UnsupportedFormat(other.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storyforge.toml");

        let toml_content = r#"
[providers]
default_provider = "anthropic"
max_attempts = 5

[providers.anthropic]
api_key = "sk-ant-test"
base_url = "http://localhost:9100/v1"

[circuit_breaker]
failure_threshold = 4
cooldown_seconds = 12

[rate_limits.models]
"gpt-4o" = 20

[[pipeline.stages]]
name = "outline"
max_tokens = 800
json_mode = false

[pricing.models."house-model"]
prompt_per_1k = 0.5
completion_per_1k = 1.5
"#;
        fs::write(&path, toml_content).unwrap();

        let config = load_from_toml(&path).unwrap();
        assert_eq!(config.providers.default_provider, "anthropic");
        assert_eq!(config.providers.max_attempts, 5);
        assert!(config.providers.anthropic.is_configured());
        assert_eq!(config.circuit_breaker.failure_threshold, 4);
        assert_eq!(config.rate_limits.models.get("gpt-4o"), Some(&20));
        assert_eq!(config.pipeline.stages.len(), 1);
        assert_eq!(config.pipeline.stages[0].name, "outline");
        assert!(!config.pipeline.stages[0].json_mode);
        assert_eq!(
            config.pricing.models.get("house-model").unwrap().completion_per_1k,
            1.5
        );
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_from_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storyforge.yaml");

        let yaml_content = r#"
providers:
  openai:
    api_key: sk-test
    base_url: http://localhost:9000/v1
rate_limits:
  default_provider_rpm: 120
  providers:
    openai: 30
observability:
  log_level: debug
"#;
        fs::write(&path, yaml_content).unwrap();

        let config = load_from_yaml(&path).unwrap();
        assert_eq!(config.providers.openai.base_url, "http://localhost:9000/v1");
        assert_eq!(config.rate_limits.default_provider_rpm, 120);
        assert_eq!(config.rate_limits.providers.get("openai"), Some(&30));
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.pipeline.stages.len(), 3);
    }

    #[test]
    fn test_load_from_file_unsupported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storyforge.json");
        fs::write(&path, "{}").unwrap();

        let result = load_from_file(&path);
        assert!(matches!(result, Err(ConfigFileError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_load_from_file_no_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storyforge");
        fs::write(&path, "").unwrap();

        let result = load_from_file(&path);
        assert!(matches!(result, Err(ConfigFileError::NoExtension)));
    }

    #[test]
    fn test_load_from_toml_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[invalid\n").unwrap();

        let result = load_from_file(&path);
        assert!(matches!(result, Err(ConfigFileError::TomlParse(_))));
    }

    #[test]
    fn test_load_from_toml_not_found() {
        let path = Path::new("/nonexistent/path/storyforge.toml");
        let result = load_from_toml(path);
        assert!(matches!(result, Err(ConfigFileError::FileNotFound(_))));
    }
}
