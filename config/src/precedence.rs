//! # Configuration Precedence
//!
//! Merges configuration from multiple sources with precedence rules.
//!
//! # Precedence Order
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values (lowest priority)
//!
//! Merging is field by field: a source wins a field when its value differs
//! from the default, so a cooldown from the file and a threshold from the
//! environment combine. Collections (`stages`, limit maps, pricing models)
//! are treated as single fields.

use crate::config::{Config, ProviderEndpointConfig, ProvidersConfig};
use std::fmt::Debug;

/// Merge multiple configuration sources with precedence.
///
/// # M-CANONICAL-DOCS
///
/// ## Usage
/// ```rust,no_run
/// use config::{Config, merge_configs, load_from_file, load_from_env};
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let defaults = Config::default();
///     let from_file = load_from_file(Path::new("storyforge.toml"))?;
///     let from_env = load_from_env()?;
///
///     let _config = merge_configs(defaults, from_file, "file", from_env, "env", None, "cli");
///     Ok(())
/// }
/// ```
pub fn merge_configs(
    defaults: Config,
    file_config: Config,
    file_source_name: &str,
    env_config: Config,
    env_source_name: &str,
    cli_config: Option<Config>,
    cli_source_name: &str
) -> Config {
    let mut config = defaults;

    config = merge_with_logging(config, file_config, file_source_name);
    config = merge_with_logging(config, env_config, env_source_name);

    if let Some(cli) = cli_config {
        config = merge_with_logging(config, cli, cli_source_name);
    }

    config
}

macro_rules! merge_fields {
    ($base:ident, $over:ident, $defaults:ident, $changes:ident; $section:ident: $($field:ident),+) => {
        $(
            merge_field(
                &mut $base.$section.$field,
                &$over.$section.$field,
                &$defaults.$section.$field,
                concat!(stringify!($section), ".", stringify!($field)),
                &mut $changes
            );
        )+
    };
}

fn merge_with_logging(mut base: Config, override_config: Config, source_name: &str) -> Config {
    let defaults = Config::default();
    let mut changes = Vec::new();

    merge_providers(
        &mut base.providers,
        &override_config.providers,
        &defaults.providers,
        &mut changes
    );

    merge_fields!(base, override_config, defaults, changes;
        circuit_breaker: failure_threshold, cooldown_seconds);
    merge_fields!(base, override_config, defaults, changes;
        rate_limits: default_provider_rpm, window_seconds, providers, models);
    merge_fields!(base, override_config, defaults, changes;
        pipeline: default_model, default_budget_usd, reuse_completed_jobs, validate_artifacts, stages);
    merge_fields!(base, override_config, defaults, changes; pricing: default, models);
    merge_fields!(base, override_config, defaults, changes; server: host, port);
    merge_fields!(base, override_config, defaults, changes;
        observability: metrics_enabled, log_level);

    for change in &changes {
        tracing::debug!(source = source_name, "config override: {}", change);
    }
    if !changes.is_empty() {
        tracing::info!("Configuration from {}: {} overrides", source_name, changes.len());
    }

    base
}

/// A source wins a field only when it moved that field off its default.
fn merge_field<T: PartialEq + Clone + Debug>(
    base: &mut T,
    override_value: &T,
    default_value: &T,
    name: &str,
    changes: &mut Vec<String>
) {
    if override_value != default_value && override_value != base {
        changes.push(format!("{} = {:?}", name, override_value));
        base.clone_from(override_value);
    }
}

fn merge_providers(
    base: &mut ProvidersConfig,
    override_config: &ProvidersConfig,
    defaults: &ProvidersConfig,
    changes: &mut Vec<String>
) {
    merge_endpoint(
        &mut base.openai,
        &override_config.openai,
        &defaults.openai,
        "providers.openai",
        changes
    );
    merge_endpoint(
        &mut base.anthropic,
        &override_config.anthropic,
        &defaults.anthropic,
        "providers.anthropic",
        changes
    );
    merge_endpoint(
        &mut base.openai_compatible,
        &override_config.openai_compatible,
        &defaults.openai_compatible,
        "providers.openai_compatible",
        changes
    );

    merge_field(
        &mut base.default_provider,
        &override_config.default_provider,
        &defaults.default_provider,
        "providers.default_provider",
        changes
    );
    merge_field(
        &mut base.priority,
        &override_config.priority,
        &defaults.priority,
        "providers.priority",
        changes
    );
    merge_field(
        &mut base.request_timeout_seconds,
        &override_config.request_timeout_seconds,
        &defaults.request_timeout_seconds,
        "providers.request_timeout_seconds",
        changes
    );
    merge_field(
        &mut base.max_attempts,
        &override_config.max_attempts,
        &defaults.max_attempts,
        "providers.max_attempts",
        changes
    );
    merge_field(
        &mut base.retry_base_delay_ms,
        &override_config.retry_base_delay_ms,
        &defaults.retry_base_delay_ms,
        "providers.retry_base_delay_ms",
        changes
    );
}

fn merge_endpoint(
    base: &mut ProviderEndpointConfig,
    override_config: &ProviderEndpointConfig,
    defaults: &ProviderEndpointConfig,
    name: &str,
    changes: &mut Vec<String>
) {
    if override_config.api_key.is_some() && override_config.api_key != base.api_key {
        changes.push(format!("{}.api_key = ***", name));
        base.api_key.clone_from(&override_config.api_key);
    }
    merge_field(
        &mut base.base_url,
        &override_config.base_url,
        &defaults.base_url,
        &format!("{}.base_url", name),
        changes
    );
}
