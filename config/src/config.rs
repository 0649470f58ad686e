//! # Configuration Structures
//!
//! This module defines all configuration structures for the generation
//! orchestration service.
//!
//! All configuration structures:
//! - Use `serde` for serialization/deserialization
//! - Use `validator` for input validation
//! - Default to values that run locally without a config file

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use validator::Validate;

/// Main configuration structure for the generation service.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Aggregates provider credentials, resilience tuning, pipeline stages,
/// pricing, the admin server and observability.
///
/// ## Usage
/// ```rust,no_run
/// use config::Config;
///
/// let config = Config::default();
/// println!("Breaker threshold: {}", config.circuit_breaker.failure_threshold);
/// ```
///
/// ## Fields
/// - `providers`: LLM vendor endpoints, credentials and retry settings
/// - `circuit_breaker`: failure threshold and cooldown
/// - `rate_limits`: static per-provider and per-model RPM ceilings
/// - `pipeline`: stage definitions, default model and budget
/// - `pricing`: per-model USD prices per 1k tokens
/// - `server`: admin HTTP listener
/// - `observability`: logging level and metrics exposition
///
/// ## Validation
/// All nested configurations must pass their own validation rules.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    #[validate(nested)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    #[validate(nested)]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(default)]
    #[validate(nested)]
    pub rate_limits: RateLimitConfig,

    #[serde(default)]
    #[validate(nested)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    #[validate(nested)]
    pub pricing: PricingConfig,

    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,

    #[serde(default)]
    #[validate(nested)]
    pub observability: ObservabilityConfig
}

/// LLM provider configuration.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Holds one endpoint per supported vendor plus the shared call settings
/// (timeout, retry attempts, backoff base).
///
/// ## Fields
/// - `openai`, `anthropic`, `openai_compatible`: endpoint settings
/// - `default_provider`: provider used when a job names none
/// - `priority`: fixed fallback order of the remaining providers
/// - `request_timeout_seconds`: hard timeout per HTTP attempt (default: 60)
/// - `max_attempts`: attempts per call inside one adapter (default: 3)
/// - `retry_base_delay_ms`: base backoff delay (default: 500)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ProvidersConfig {
    #[serde(default = "default_openai_endpoint")]
    #[validate(nested)]
    pub openai: ProviderEndpointConfig,

    #[serde(default = "default_anthropic_endpoint")]
    #[validate(nested)]
    pub anthropic: ProviderEndpointConfig,

    #[serde(default)]
    #[validate(nested)]
    pub openai_compatible: ProviderEndpointConfig,

    #[serde(default = "default_provider_name")]
    #[validate(length(min = 1))]
    pub default_provider: String,

    #[serde(default = "default_provider_priority")]
    pub priority: Vec<String>,

    #[serde(default = "default_request_timeout_seconds")]
    #[validate(range(min = 1, max = 600))]
    pub request_timeout_seconds: u64,

    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    #[validate(range(min = 1, max = 60000))]
    pub retry_base_delay_ms: u64
}

pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const ANTHROPIC_DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

fn default_openai_endpoint() -> ProviderEndpointConfig {
    ProviderEndpointConfig {
        api_key: None,
        base_url: OPENAI_DEFAULT_BASE_URL.to_string()
    }
}

fn default_anthropic_endpoint() -> ProviderEndpointConfig {
    ProviderEndpointConfig {
        api_key: None,
        base_url: ANTHROPIC_DEFAULT_BASE_URL.to_string()
    }
}

fn default_provider_name() -> String {
    "openai".to_string()
}

fn default_provider_priority() -> Vec<String> {
    vec![
        "openai".to_string(),
        "anthropic".to_string(),
        "openai_compatible".to_string(),
    ]
}

fn default_request_timeout_seconds() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai: default_openai_endpoint(),
            anthropic: default_anthropic_endpoint(),
            openai_compatible: ProviderEndpointConfig::default(),
            default_provider: default_provider_name(),
            priority: default_provider_priority(),
            request_timeout_seconds: default_request_timeout_seconds(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms()
        }
    }
}

impl ProvidersConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// One vendor endpoint. A provider is active only when it has a key and a
/// base URL.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct ProviderEndpointConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    #[validate(length(max = 2048))]
    pub base_url: String
}

impl ProviderEndpointConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty()) && !self.base_url.is_empty()
    }
}

/// Circuit breaker tuning.
///
/// ## Fields
/// - `failure_threshold`: consecutive failures that open the circuit (default: 3)
/// - `cooldown_seconds`: how long an open circuit skips calls (default: 30)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_failure_threshold")]
    #[validate(range(min = 1, max = 1000))]
    pub failure_threshold: u32,

    #[serde(default = "default_cooldown_seconds")]
    #[validate(range(min = 1, max = 86400))]
    pub cooldown_seconds: u64
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_cooldown_seconds() -> u64 {
    30
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_seconds: default_cooldown_seconds()
        }
    }
}

impl CircuitBreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

/// Static rate-limit defaults. Admin overrides are applied at runtime on top
/// of these and never written back.
///
/// A configured ceiling of `0` means "no ceiling".
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct RateLimitConfig {
    /// Ceiling for any provider without an explicit entry.
    #[serde(default = "default_provider_rpm")]
    pub default_provider_rpm: u32,

    #[serde(default = "default_window_seconds")]
    #[validate(range(min = 1, max = 3600))]
    pub window_seconds: u64,

    #[serde(default)]
    pub providers: BTreeMap<String, u32>,

    #[serde(default)]
    pub models: BTreeMap<String, u32>
}

fn default_provider_rpm() -> u32 {
    60
}

fn default_window_seconds() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_provider_rpm: default_provider_rpm(),
            window_seconds: default_window_seconds(),
            providers: BTreeMap::new(),
            models: BTreeMap::new()
        }
    }
}

/// Pipeline configuration.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Defines the ordered stages and the job-level defaults the coordinator
/// falls back to when params do not say otherwise.
///
/// ## Fields
/// - `default_model`: global model default (default: "gpt-4o-mini")
/// - `default_budget_usd`: per-job ceiling when params carry none (default: 1.0)
/// - `reuse_completed_jobs`: reuse an identical completed job (default: true)
/// - `validate_artifacts`: run post-persist validation (default: true)
/// - `stages`: ordered stage definitions (default: beats, chapters, nodes)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct PipelineConfig {
    #[serde(default = "default_model")]
    #[validate(length(min = 1, max = 255))]
    pub default_model: String,

    #[serde(default = "default_budget_usd")]
    #[validate(range(min = 0.0, max = 10000.0))]
    pub default_budget_usd: f64,

    #[serde(default = "default_true")]
    pub reuse_completed_jobs: bool,

    #[serde(default = "default_true")]
    pub validate_artifacts: bool,

    #[serde(default = "default_stages")]
    #[validate(nested)]
    pub stages: Vec<StageConfig>
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_budget_usd() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

/// The three narrative stages: outline beats, chapters, then branching nodes.
pub fn default_stages() -> Vec<StageConfig> {
    vec![
        StageConfig::new("beats", 1500),
        StageConfig::new("chapters", 3000),
        StageConfig::new("nodes", 4000),
    ]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            default_budget_usd: default_budget_usd(),
            reuse_completed_jobs: true,
            validate_artifacts: true,
            stages: default_stages()
        }
    }
}

/// One pipeline stage definition.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct StageConfig {
    #[validate(length(min = 1, max = 64))]
    pub name: String,

    /// Stage default model; params overrides win over this.
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default = "default_stage_max_tokens")]
    #[validate(range(min = 1, max = 200000))]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f32,

    #[serde(default = "default_true")]
    pub json_mode: bool
}

fn default_stage_max_tokens() -> u32 {
    2000
}

fn default_temperature() -> f32 {
    0.7
}

impl StageConfig {
    pub fn new(name: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            name: name.into(),
            model: None,
            max_tokens,
            temperature: default_temperature(),
            json_mode: true
        }
    }
}

/// USD prices per 1k tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate, PartialEq)]
pub struct ModelPricing {
    #[validate(range(min = 0.0))]
    pub prompt_per_1k: f64,

    #[validate(range(min = 0.0))]
    pub completion_per_1k: f64
}

/// Pricing table used for pre-call estimates and post-call billing.
///
/// Models missing from `models` are billed at `default`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct PricingConfig {
    #[serde(default = "default_model_pricing")]
    #[validate(nested)]
    pub default: ModelPricing,

    #[serde(default = "default_pricing_models")]
    pub models: BTreeMap<String, ModelPricing>
}

fn default_model_pricing() -> ModelPricing {
    ModelPricing {
        prompt_per_1k: 0.001,
        completion_per_1k: 0.002
    }
}

fn default_pricing_models() -> BTreeMap<String, ModelPricing> {
    let mut models = BTreeMap::new();
    let mut add = |name: &str, prompt_per_1k: f64, completion_per_1k: f64| {
        models.insert(
            name.to_string(),
            ModelPricing {
                prompt_per_1k,
                completion_per_1k
            }
        );
    };
    add("gpt-4o-mini", 0.00015, 0.0006);
    add("gpt-4o", 0.0025, 0.01);
    add("claude-3-5-haiku-latest", 0.0008, 0.004);
    add("claude-3-5-sonnet-latest", 0.003, 0.015);
    models
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            default: default_model_pricing(),
            models: default_pricing_models()
        }
    }
}

/// Admin HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    #[validate(length(min = 1, max = 255))]
    pub host: String,

    #[serde(default = "default_server_port")]
    #[validate(range(min = 1, max = 65535))]
    pub port: u16
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port()
        }
    }
}

/// Observability configuration.
///
/// ## Fields
/// - `metrics_enabled`: install the Prometheus recorder (default: true)
/// - `log_level`: default `EnvFilter` directive (default: "info")
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ObservabilityConfig {
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    #[serde(default = "default_log_level")]
    #[validate(custom(function = "validate_log_level"))]
    pub log_level: String
}

fn default_log_level() -> String {
    "info".to_string()
}

fn validate_log_level(value: &str) -> Result<(), validator::ValidationError> {
    match value {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(validator::ValidationError::new("Invalid log level"))
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            log_level: default_log_level()
        }
    }
}
