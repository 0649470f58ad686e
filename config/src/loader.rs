//! # Environment Variable Loader
//!
//! Loads configuration from environment variables following 12-factor app
//! principles.
//!
//! # Naming Convention
//! - `OPENAI_*`, `ANTHROPIC_*`, `COMPAT_*`: vendor credentials and endpoints
//! - `LLM_*`: shared provider call settings
//! - `CB_*`: circuit breaker settings
//! - `RL_*`: rate limit settings
//! - `GEN_*`: pipeline settings
//! - `SRV_*`: admin server settings
//! - `OB_*`: observability settings

use crate::config::{
    ANTHROPIC_DEFAULT_BASE_URL, CircuitBreakerConfig, Config, OPENAI_DEFAULT_BASE_URL,
    ObservabilityConfig, PipelineConfig, PricingConfig, ProviderEndpointConfig, ProvidersConfig,
    RateLimitConfig, ServerConfig, StageConfig
};
use std::collections::BTreeMap;
use std::env;

/// Load configuration from environment variables.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Builds a full [`Config`] where every field is either read from the
/// environment or left at its default. Unset variables never fail; a variable
/// that is set but unparseable is an error.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_env;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_env()?;
///     println!("Default model: {}", config.pipeline.default_model);
///     Ok(())
/// }
/// ```
///
/// ## Environment Variables
/// ### Providers
/// - `OPENAI_API_KEY`, `OPENAI_BASE_URL`
/// - `ANTHROPIC_API_KEY`, `ANTHROPIC_BASE_URL`
/// - `COMPAT_API_KEY`, `COMPAT_BASE_URL`: OpenAI-compatible endpoint
/// - `LLM_DEFAULT_PROVIDER` (default: "openai")
/// - `LLM_PROVIDER_PRIORITY`: comma separated provider names
/// - `LLM_TIMEOUT_SECONDS` (default: 60)
/// - `LLM_MAX_ATTEMPTS` (default: 3)
/// - `LLM_RETRY_BASE_DELAY_MS` (default: 500)
///
/// ### Circuit Breaker (`CB_*`)
/// - `CB_FAILURE_THRESHOLD` (default: 3)
/// - `CB_COOLDOWN_SECONDS` (default: 30)
///
/// ### Rate Limits (`RL_*`)
/// - `RL_DEFAULT_PROVIDER_RPM` (default: 60)
/// - `RL_WINDOW_SECONDS` (default: 60)
/// - `RL_PROVIDER_LIMITS`: `name=rpm` pairs, comma separated
/// - `RL_MODEL_LIMITS`: `name=rpm` pairs, comma separated
///
/// ### Pipeline (`GEN_*`)
/// - `GEN_DEFAULT_MODEL` (default: "gpt-4o-mini")
/// - `GEN_BUDGET_USD` (default: 1.0)
/// - `GEN_REUSE_COMPLETED` (default: true)
/// - `GEN_VALIDATE_ARTIFACTS` (default: true)
/// - `GEN_STAGE_MODELS`: `stage=model` pairs applied to the default stages
///
/// ### Server (`SRV_*`) and Observability (`OB_*`)
/// - `SRV_HOST` (default: "0.0.0.0"), `SRV_PORT` (default: 8080)
/// - `OB_METRICS_ENABLED` (default: true), `OB_LOG_LEVEL` (default: "info")
pub fn load_from_env() -> Result<Config, Box<dyn std::error::Error>> {
    let config = Config {
        providers: load_providers_from_env()?,
        circuit_breaker: load_circuit_breaker_from_env()?,
        rate_limits: load_rate_limits_from_env()?,
        pipeline: load_pipeline_from_env()?,
        pricing: PricingConfig::default(),
        server: load_server_from_env()?,
        observability: load_observability_from_env()?
    };

    Ok(config)
}

fn load_providers_from_env() -> Result<ProvidersConfig, Box<dyn std::error::Error>> {
    let defaults = ProvidersConfig::default();
    Ok(ProvidersConfig {
        openai: ProviderEndpointConfig {
            api_key: env::var("OPENAI_API_KEY").ok(),
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| OPENAI_DEFAULT_BASE_URL.to_string())
        },
        anthropic: ProviderEndpointConfig {
            api_key: env::var("ANTHROPIC_API_KEY").ok(),
            base_url: env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| ANTHROPIC_DEFAULT_BASE_URL.to_string())
        },
        openai_compatible: ProviderEndpointConfig {
            api_key: env::var("COMPAT_API_KEY").ok(),
            base_url: env::var("COMPAT_BASE_URL").unwrap_or_default()
        },
        default_provider: env::var("LLM_DEFAULT_PROVIDER").unwrap_or(defaults.default_provider),
        priority: env::var("LLM_PROVIDER_PRIORITY")
            .map(|raw| split_list(&raw))
            .unwrap_or(defaults.priority),
        request_timeout_seconds: parse_optional_env("LLM_TIMEOUT_SECONDS")?
            .unwrap_or(defaults.request_timeout_seconds),
        max_attempts: parse_optional_env("LLM_MAX_ATTEMPTS")?.unwrap_or(defaults.max_attempts),
        retry_base_delay_ms: parse_optional_env("LLM_RETRY_BASE_DELAY_MS")?
            .unwrap_or(defaults.retry_base_delay_ms)
    })
}

fn load_circuit_breaker_from_env() -> Result<CircuitBreakerConfig, Box<dyn std::error::Error>> {
    let defaults = CircuitBreakerConfig::default();
    Ok(CircuitBreakerConfig {
        failure_threshold: parse_optional_env("CB_FAILURE_THRESHOLD")?
            .unwrap_or(defaults.failure_threshold),
        cooldown_seconds: parse_optional_env("CB_COOLDOWN_SECONDS")?
            .unwrap_or(defaults.cooldown_seconds)
    })
}

fn load_rate_limits_from_env() -> Result<RateLimitConfig, Box<dyn std::error::Error>> {
    let defaults = RateLimitConfig::default();
    Ok(RateLimitConfig {
        default_provider_rpm: parse_optional_env("RL_DEFAULT_PROVIDER_RPM")?
            .unwrap_or(defaults.default_provider_rpm),
        window_seconds: parse_optional_env("RL_WINDOW_SECONDS")?
            .unwrap_or(defaults.window_seconds),
        providers: match env::var("RL_PROVIDER_LIMITS") {
            Ok(raw) => parse_limit_pairs(&raw)?,
            Err(_) => defaults.providers
        },
        models: match env::var("RL_MODEL_LIMITS") {
            Ok(raw) => parse_limit_pairs(&raw)?,
            Err(_) => defaults.models
        }
    })
}

fn load_pipeline_from_env() -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let defaults = PipelineConfig::default();
    let mut stages: Vec<StageConfig> = defaults.stages;
    if let Ok(raw) = env::var("GEN_STAGE_MODELS") {
        for (stage, model) in parse_pairs(&raw)? {
            if let Some(entry) = stages.iter_mut().find(|s| s.name == stage) {
                entry.model = Some(model);
            }
        }
    }

    Ok(PipelineConfig {
        default_model: env::var("GEN_DEFAULT_MODEL").unwrap_or(defaults.default_model),
        default_budget_usd: parse_optional_env("GEN_BUDGET_USD")?
            .unwrap_or(defaults.default_budget_usd),
        reuse_completed_jobs: parse_optional_env("GEN_REUSE_COMPLETED")?
            .unwrap_or(defaults.reuse_completed_jobs),
        validate_artifacts: parse_optional_env("GEN_VALIDATE_ARTIFACTS")?
            .unwrap_or(defaults.validate_artifacts),
        stages
    })
}

fn load_server_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let defaults = ServerConfig::default();
    Ok(ServerConfig {
        host: env::var("SRV_HOST").unwrap_or(defaults.host),
        port: parse_optional_env("SRV_PORT")?.unwrap_or(defaults.port)
    })
}

fn load_observability_from_env() -> Result<ObservabilityConfig, Box<dyn std::error::Error>> {
    let defaults = ObservabilityConfig::default();
    Ok(ObservabilityConfig {
        metrics_enabled: parse_optional_env("OB_METRICS_ENABLED")?
            .unwrap_or(defaults.metrics_enabled),
        log_level: env::var("OB_LOG_LEVEL").unwrap_or(defaults.log_level)
    })
}

fn parse_env<T>(key: &str) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static
{
    match env::var(key) {
        Ok(s) => s
            .parse::<T>()
            .map_err(|e| format!("{key}: {e}").into()),
        Err(e) => Err(Box::new(e) as Box<dyn std::error::Error>)
    }
}

/// `Ok(None)` when unset, an error when set but unparseable.
fn parse_optional_env<T>(key: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static
{
    if env::var_os(key).is_none() {
        return Ok(None);
    }
    parse_env(key).map(Some)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_pairs(raw: &str) -> Result<Vec<(String, String)>, Box<dyn std::error::Error>> {
    split_list(raw)
        .into_iter()
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => {
                Ok((k.trim().to_string(), v.trim().to_string()))
            }
            _ => Err(format!("expected name=value, got '{pair}'").into())
        })
        .collect()
}

fn parse_limit_pairs(raw: &str) -> Result<BTreeMap<String, u32>, Box<dyn std::error::Error>> {
    let mut limits = BTreeMap::new();
    for (name, value) in parse_pairs(raw)? {
        let rpm: u32 = value
            .parse()
            .map_err(|e| format!("limit for {name}: {e}"))?;
        limits.insert(name, rpm);
    }
    Ok(limits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "OPENAI_API_KEY",
        "OPENAI_BASE_URL",
        "ANTHROPIC_API_KEY",
        "ANTHROPIC_BASE_URL",
        "COMPAT_API_KEY",
        "COMPAT_BASE_URL",
        "LLM_DEFAULT_PROVIDER",
        "LLM_PROVIDER_PRIORITY",
        "LLM_TIMEOUT_SECONDS",
        "LLM_MAX_ATTEMPTS",
        "CB_FAILURE_THRESHOLD",
        "CB_COOLDOWN_SECONDS",
        "RL_PROVIDER_LIMITS",
        "RL_MODEL_LIMITS",
        "GEN_STAGE_MODELS",
        "GEN_BUDGET_USD",
        "GEN_DEFAULT_MODEL",
        "SRV_PORT",
        "OB_LOG_LEVEL",
    ];

    fn clear_vars() {
        for var in VARS {
            unsafe {
                env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_load_from_env_defaults() {
        clear_vars();
        let config = load_from_env().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    #[serial]
    fn test_load_from_env_overrides() {
        clear_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "sk-test");
            env::set_var("CB_FAILURE_THRESHOLD", "5");
            env::set_var("CB_COOLDOWN_SECONDS", "10");
            env::set_var("LLM_PROVIDER_PRIORITY", "anthropic, openai");
            env::set_var("OB_LOG_LEVEL", "debug");
        }

        let config = load_from_env().unwrap();
        clear_vars();

        assert_eq!(config.providers.openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.providers.openai.base_url, OPENAI_DEFAULT_BASE_URL);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.cooldown_seconds, 10);
        assert_eq!(config.providers.priority, vec!["anthropic", "openai"]);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_load_limit_maps_from_env() {
        clear_vars();
        unsafe {
            env::set_var("RL_PROVIDER_LIMITS", "openai=100,anthropic=40");
            env::set_var("RL_MODEL_LIMITS", "gpt-4o=10");
            env::set_var("GEN_STAGE_MODELS", "beats=claude-3-5-haiku-latest");
        }

        let config = load_from_env().unwrap();
        clear_vars();

        assert_eq!(config.rate_limits.providers.get("openai"), Some(&100));
        assert_eq!(config.rate_limits.providers.get("anthropic"), Some(&40));
        assert_eq!(config.rate_limits.models.get("gpt-4o"), Some(&10));
        assert_eq!(
            config.pipeline.stages[0].model.as_deref(),
            Some("claude-3-5-haiku-latest")
        );
        assert_eq!(config.pipeline.stages[1].model, None);
    }

    #[test]
    #[serial]
    fn test_invalid_number_is_an_error() {
        clear_vars();
        unsafe {
            env::set_var("GEN_BUDGET_USD", "lots");
        }
        let result = load_from_env();
        clear_vars();
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_limit_pairs_rejects_garbage() {
        assert!(parse_limit_pairs("openai").is_err());
        assert!(parse_limit_pairs("openai=fast").is_err());
        assert!(parse_limit_pairs("").unwrap().is_empty());
    }
}
