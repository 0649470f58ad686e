//! # Configuration Validation
//!
//! Provides validation for all configuration structures using the `validator`
//! crate, plus the cross-field rules the derive cannot express.

use crate::config::Config;
use std::collections::HashSet;
use validator::{Validate, ValidationError, ValidationErrors};

const KNOWN_PROVIDERS: &[&str] = &["openai", "anthropic", "openai_compatible"];

/// Validate configuration structure.
///
/// # M-CANONICAL-DOCS
///
/// ## Usage
/// ```rust,no_run
/// use config::{Config, validate};
///
/// let config = Config::default();
/// match validate(&config) {
///     Ok(()) => println!("Configuration is valid"),
///     Err(errors) => println!("Validation errors: {:?}", errors),
/// }
/// ```
///
/// ## Validation Rules
/// - Field ranges declared on each section (thresholds, timeouts, ports)
/// - `observability.log_level`: "trace", "debug", "info", "warn" or "error"
/// - `pipeline.stages`: at least one stage, names unique
/// - `providers.default_provider` and every `providers.priority` entry must
///   name a known provider
pub fn validate(config: &Config) -> Result<(), ValidationErrors> {
    let mut errors = match config.validate() {
        Ok(()) => ValidationErrors::new(),
        Err(errors) => errors
    };

    if config.pipeline.stages.is_empty() {
        errors.add("stages", ValidationError::new("no_stages"));
    }

    let mut seen = HashSet::new();
    if config
        .pipeline
        .stages
        .iter()
        .any(|stage| !seen.insert(stage.name.as_str()))
    {
        errors.add("stages", ValidationError::new("duplicate_stage_name"));
    }

    if !KNOWN_PROVIDERS.contains(&config.providers.default_provider.as_str()) {
        errors.add("default_provider", ValidationError::new("unknown_provider"));
    }
    if config
        .providers
        .priority
        .iter()
        .any(|name| !KNOWN_PROVIDERS.contains(&name.as_str()))
    {
        errors.add("priority", ValidationError::new("unknown_provider"));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageConfig;

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_failure_threshold() {
        let mut config = Config::default();
        config.circuit_breaker.failure_threshold = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.observability.log_level = "loud".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_valid_log_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let mut config = Config::default();
            config.observability.log_level = level.to_string();
            assert!(validate(&config).is_ok());
        }
    }

    #[test]
    fn test_validate_empty_stage_list() {
        let mut config = Config::default();
        config.pipeline.stages.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_duplicate_stage_names() {
        let mut config = Config::default();
        config.pipeline.stages.push(StageConfig::new("beats", 100));
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = Config::default();
        config.providers.priority.push("cohere".to_string());
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.providers.default_provider = "cohere".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_negative_budget() {
        let mut config = Config::default();
        config.pipeline.default_budget_usd = -1.0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_server_port_zero() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(validate(&config).is_err());
    }
}
