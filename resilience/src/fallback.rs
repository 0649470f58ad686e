//! Model and provider fallback.
//!
//! Candidates are tried model-major: every provider in the chain for the
//! first model, then every provider for the next model, and so on.

use crate::circuit_breaker::CircuitBreaker;
use crate::rate_limiter::{Acquisition, RateLimiter};
use errors::{ErrorCategory, OrchestrationError, ProviderError};
use gen_core::{CompletionRequest, CostEstimator, LlmResult};
use observability::GenerationTelemetry;
use providers::LlmProvider;
use std::sync::Arc;
use thiserror::Error;

/// A provider call that was made and failed.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedAttempt {
    pub provider: String,
    pub model: String,
    pub category: ErrorCategory,
    pub error: ProviderError
}

impl FailedAttempt {
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    pub provider: String,
    pub model: String,
    pub result: LlmResult,
    pub cost_usd: f64,
    pub failed_attempts: Vec<FailedAttempt>
}

/// Chain exhausted. Failed attempts are kept so callers can audit them.
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct FallbackError {
    pub error: OrchestrationError,
    pub failed_attempts: Vec<FailedAttempt>
}

pub struct FallbackOrchestrator {
    breaker: Arc<CircuitBreaker>,
    limiter: Arc<RateLimiter>,
    pricing: Arc<dyn CostEstimator>,
    telemetry: Arc<GenerationTelemetry>
}

impl FallbackOrchestrator {
    pub fn new(
        breaker: Arc<CircuitBreaker>,
        limiter: Arc<RateLimiter>,
        pricing: Arc<dyn CostEstimator>
    ) -> Self {
        Self {
            breaker,
            limiter,
            pricing,
            telemetry: Arc::new(GenerationTelemetry::new())
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<GenerationTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn pricing(&self) -> &Arc<dyn CostEstimator> {
        &self.pricing
    }

    /// Runs `request` against each (model, provider) pair until one succeeds.
    ///
    /// `request.model` is replaced with each candidate model in turn. `stage`
    /// only labels metrics and log lines.
    pub async fn execute(
        &self,
        stage: &str,
        models: &[String],
        chain: &[Arc<dyn LlmProvider>],
        request: &CompletionRequest
    ) -> Result<FallbackOutcome, FallbackError> {
        if models.is_empty() || chain.is_empty() {
            return Err(FallbackError {
                error: OrchestrationError::NoProvidersConfigured,
                failed_attempts: Vec::new()
            });
        }

        let mut failed_attempts = Vec::new();
        let mut circuit_skips = 0usize;
        let mut rate_limit_skips = 0usize;

        for model in models {
            for provider in chain {
                let name = provider.name();

                if !self.breaker.allow(name) {
                    tracing::debug!(provider = name, model = %model, stage, "Skipping provider: circuit open");
                    self.telemetry
                        .record_provider_skipped(name, model, stage, "circuit_open");
                    circuit_skips += 1;
                    continue;
                }

                if let Acquisition::Denied(scope) = self.limiter.try_acquire_for(name, model, 1) {
                    tracing::debug!(
                        provider = name,
                        model = %model,
                        scope = scope.as_str(),
                        "Skipping provider: rate limited"
                    );
                    self.telemetry
                        .record_provider_skipped(name, model, stage, scope.skip_reason());
                    rate_limit_skips += 1;
                    continue;
                }

                let mut attempt = request.clone();
                attempt.model = model.clone();

                match provider.complete(&attempt).await {
                    Ok(result) => {
                        self.breaker.on_success(name);
                        let cost_usd = self.pricing.estimate_cost_usd(
                            model,
                            result.usage.prompt_tokens,
                            result.usage.completion_tokens
                        );
                        self.telemetry
                            .record_provider_success(name, model, stage, &result.usage, cost_usd);
                        tracing::debug!(
                            provider = name,
                            model = %model,
                            prompt_tokens = result.usage.prompt_tokens,
                            completion_tokens = result.usage.completion_tokens,
                            "Provider call succeeded"
                        );
                        return Ok(FallbackOutcome {
                            provider: name.to_string(),
                            model: model.clone(),
                            result,
                            cost_usd,
                            failed_attempts
                        });
                    }
                    Err(error) => {
                        self.breaker.on_failure(name);
                        let category = error.category();
                        self.telemetry
                            .record_provider_failure(name, model, stage, category.as_str());
                        tracing::warn!(
                            provider = name,
                            model = %model,
                            stage,
                            category = category.as_str(),
                            error = %error,
                            "Provider call failed, trying next candidate"
                        );
                        failed_attempts.push(FailedAttempt {
                            provider: name.to_string(),
                            model: model.clone(),
                            category,
                            error
                        });
                    }
                }
            }
        }

        let error = match failed_attempts.last() {
            Some(last) => OrchestrationError::Provider(last.error.clone()),
            None if circuit_skips == 0 => OrchestrationError::AllProvidersRateLimited {
                skipped: rate_limit_skips
            },
            None => OrchestrationError::AllProvidersUnavailable {
                circuit_open: circuit_skips,
                rate_limited: rate_limit_skips
            }
        };

        Err(FallbackError {
            error,
            failed_attempts
        })
    }
}

