//! Composition root: configuration loading and component wiring.

use crate::ux_error::UxError;
use config::Config;
use observability::{CostTracker, GenerationTelemetry, PricingTable};
use pipeline::{PipelineCoordinator, StageOutputValidator};
use providers::ProviderRegistry;
use resilience::{CircuitBreaker, FallbackOrchestrator, RateLimiter};
use server::AppState;
use std::path::Path;
use std::sync::Arc;
use storage::InMemoryJobRepository;

/// Defaults, then the optional file, then the environment; validated.
pub fn load_config(path: Option<&Path>) -> Result<Config, UxError> {
    let file_config = match path {
        Some(path) => config::load_from_file(path).map_err(|err| {
            UxError::new("Could not load configuration file")
                .why(err.to_string())
                .fix("Check the path passed to --config (or STORYFORGE_CONFIG)")
                .fix("Use a .toml, .yaml or .yml extension")
        })?,
        None => Config::default()
    };

    let env_config = config::load_from_env().map_err(|err| {
        UxError::new("Invalid environment configuration")
            .why(err.to_string())
            .fix("Numeric variables such as LLM_TIMEOUT_SECONDS must be integers")
    })?;

    let merged = config::merge_configs(
        Config::default(),
        file_config,
        "file",
        env_config,
        "env",
        None,
        "cli"
    );

    config::validate(&merged).map_err(|err| {
        UxError::new("Configuration failed validation")
            .why(err.to_string())
            .suggest("storyforge --config storyforge.toml serve")
    })?;

    Ok(merged)
}

/// Shared resilience state, built once per process.
pub struct Resilience {
    pub breaker: Arc<CircuitBreaker>,
    pub limiter: Arc<RateLimiter>,
    pub telemetry: Arc<GenerationTelemetry>
}

impl Resilience {
    pub fn from_config(config: &Config) -> Self {
        let telemetry = Arc::new(GenerationTelemetry::new());
        Self {
            breaker: Arc::new(
                CircuitBreaker::from_config(&config.circuit_breaker)
                    .with_telemetry(telemetry.clone())
            ),
            limiter: Arc::new(
                RateLimiter::from_config(&config.rate_limits).with_telemetry(telemetry.clone())
            ),
            telemetry
        }
    }

    /// Admin state over the same limiter and breaker the pipeline uses, so
    /// overrides posted to the server reach running jobs.
    pub fn admin_state(&self) -> AppState {
        AppState::new(self.limiter.clone(), self.breaker.clone())
    }
}

pub struct Pipeline {
    pub coordinator: Arc<PipelineCoordinator>,
    pub repository: Arc<InMemoryJobRepository>,
    pub costs: Arc<CostTracker>
}

pub fn build_pipeline(config: &Config, resilience: &Resilience) -> anyhow::Result<Pipeline> {
    let registry = ProviderRegistry::from_config(&config.providers)?;
    if registry.is_empty() {
        return Err(UxError::new("No LLM providers are configured")
            .why("Every provider is missing an API key or base URL")
            .fix("Set OPENAI_API_KEY or ANTHROPIC_API_KEY")
            .fix("Or set COMPAT_API_KEY and COMPAT_BASE_URL for an OpenAI-compatible endpoint")
            .into());
    }
    tracing::info!(providers = ?registry.names(), "Provider registry ready");

    let orchestrator = FallbackOrchestrator::new(
        resilience.breaker.clone(),
        resilience.limiter.clone(),
        Arc::new(PricingTable::from_config(&config.pricing))
    )
    .with_telemetry(resilience.telemetry.clone());

    let repository = Arc::new(InMemoryJobRepository::new());
    let costs = Arc::new(CostTracker::new());
    let validator = StageOutputValidator::new(
        config.pipeline.stages.iter().map(|stage| stage.name.clone())
    );

    let coordinator = PipelineCoordinator::new(
        config.pipeline.clone(),
        repository.clone(),
        Arc::new(registry),
        Arc::new(orchestrator)
    )
    .with_usage_recorder(costs.clone())
    .with_validator(Arc::new(validator))
    .with_telemetry(resilience.telemetry.clone())
    .with_request_timeout(config.providers.request_timeout());

    Ok(Pipeline {
        coordinator: Arc::new(coordinator),
        repository,
        costs
    })
}
