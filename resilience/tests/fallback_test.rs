use config::RateLimitConfig;
use errors::{ErrorCategory, OrchestrationError};
use gen_core::CompletionRequest;
use providers::LlmProvider;
use resilience::{CircuitBreaker, FallbackOrchestrator, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use testing::{FlatPricing, ScriptedProvider, rate_limited, server_error};

fn unlimited() -> RateLimitConfig {
    RateLimitConfig {
        default_provider_rpm: 0,
        ..RateLimitConfig::default()
    }
}

fn orchestrator(limits: RateLimitConfig) -> FallbackOrchestrator {
    FallbackOrchestrator::new(
        Arc::new(CircuitBreaker::new(3, Duration::from_secs(30))),
        Arc::new(RateLimiter::from_config(&limits)),
        Arc::new(FlatPricing::new(1.0, 2.0))
    )
}

fn models(names: &[&str]) -> Vec<String> {
    names.iter().map(|m| m.to_string()).collect()
}

fn request() -> CompletionRequest {
    CompletionRequest::new("ignored", "Write beats")
}

#[tokio::test]
async fn test_falls_through_to_second_provider() {
    let a = Arc::new(ScriptedProvider::always_failing("a"));
    let b = Arc::new(ScriptedProvider::new("b").then_text("{\"beats\":[]}", 10, 20));
    let chain: Vec<Arc<dyn LlmProvider>> = vec![a.clone(), b.clone()];

    let outcome = orchestrator(unlimited())
        .execute("beats", &models(&["m"]), &chain, &request())
        .await
        .unwrap();

    assert_eq!(outcome.provider, "b");
    assert_eq!(outcome.model, "m");
    assert_eq!(outcome.result.usage.total_tokens(), 30);
    assert!((outcome.cost_usd - 0.05).abs() < 1e-9);
    assert_eq!(outcome.failed_attempts.len(), 1);
    assert_eq!(outcome.failed_attempts[0].provider, "a");
    assert_eq!(outcome.failed_attempts[0].category, ErrorCategory::Server);
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
    assert_eq!(b.requests()[0].model, "m");
}

#[tokio::test]
async fn test_tries_every_provider_for_a_model_before_the_next_model() {
    let a = Arc::new(ScriptedProvider::always_failing("a"));
    let b = Arc::new(
        ScriptedProvider::new("b")
            .then(Err(server_error("b")))
            .then_text("ok", 1, 1)
    );
    let chain: Vec<Arc<dyn LlmProvider>> = vec![a.clone(), b.clone()];

    let outcome = orchestrator(unlimited())
        .execute("beats", &models(&["primary", "backup"]), &chain, &request())
        .await
        .unwrap();

    assert_eq!(outcome.provider, "b");
    assert_eq!(outcome.model, "backup");
    let order: Vec<(String, String)> = outcome
        .failed_attempts
        .iter()
        .map(|f| (f.provider.clone(), f.model.clone()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("a".to_string(), "primary".to_string()),
            ("b".to_string(), "primary".to_string()),
            ("a".to_string(), "backup".to_string())
        ]
    );
}

#[tokio::test]
async fn test_last_provider_error_is_reraised() {
    let a = Arc::new(ScriptedProvider::new("a").otherwise(Err(server_error("a"))));
    let b = Arc::new(ScriptedProvider::new("b").otherwise(Err(rate_limited("b"))));
    let chain: Vec<Arc<dyn LlmProvider>> = vec![a, b];

    let err = orchestrator(unlimited())
        .execute("beats", &models(&["m"]), &chain, &request())
        .await
        .unwrap_err();

    assert_eq!(err.error, OrchestrationError::Provider(rate_limited("b")));
    assert_eq!(err.failed_attempts.len(), 2);
}

#[tokio::test]
async fn test_model_ceiling_zero_skips_every_provider() {
    let orch = orchestrator(unlimited());
    orch.limiter().set_model_ceiling("m", 0);
    let a = Arc::new(ScriptedProvider::new("a"));
    let b = Arc::new(ScriptedProvider::new("b"));
    let chain: Vec<Arc<dyn LlmProvider>> = vec![a.clone(), b.clone()];

    let err = orch
        .execute("beats", &models(&["m"]), &chain, &request())
        .await
        .unwrap_err();

    assert_eq!(
        err.error,
        OrchestrationError::AllProvidersRateLimited { skipped: 2 }
    );
    assert_eq!(a.calls() + b.calls(), 0);

    orch.limiter().clear_model_ceiling("m");
    let outcome = orch
        .execute("beats", &models(&["m"]), &chain, &request())
        .await
        .unwrap();
    assert_eq!(outcome.provider, "a");
}

#[tokio::test]
async fn test_open_circuits_surface_as_unavailable() {
    let orch = orchestrator(unlimited());
    for _ in 0..3 {
        orch.breaker().on_failure("a");
    }
    let a = Arc::new(ScriptedProvider::new("a"));
    let chain: Vec<Arc<dyn LlmProvider>> = vec![a.clone()];

    let err = orch
        .execute("beats", &models(&["m"]), &chain, &request())
        .await
        .unwrap_err();

    assert_eq!(
        err.error,
        OrchestrationError::AllProvidersUnavailable {
            circuit_open: 1,
            rate_limited: 0
        }
    );
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn test_repeated_failures_open_the_circuit() {
    let orch = orchestrator(unlimited());
    let a = Arc::new(ScriptedProvider::always_failing("a"));
    let chain: Vec<Arc<dyn LlmProvider>> = vec![a.clone()];

    for _ in 0..3 {
        let _ = orch.execute("beats", &models(&["m"]), &chain, &request()).await;
    }
    assert!(!orch.breaker().allow("a"));

    let err = orch
        .execute("beats", &models(&["m"]), &chain, &request())
        .await
        .unwrap_err();
    assert!(matches!(
        err.error,
        OrchestrationError::AllProvidersUnavailable { .. }
    ));
    assert_eq!(a.calls(), 3);
}

#[tokio::test]
async fn test_empty_inputs_are_a_configuration_error() {
    let orch = orchestrator(unlimited());
    let chain: Vec<Arc<dyn LlmProvider>> = vec![Arc::new(ScriptedProvider::new("a"))];

    let no_models = orch.execute("beats", &[], &chain, &request()).await.unwrap_err();
    assert_eq!(no_models.error, OrchestrationError::NoProvidersConfigured);

    let no_chain = orch
        .execute("beats", &models(&["m"]), &[], &request())
        .await
        .unwrap_err();
    assert_eq!(no_chain.error, OrchestrationError::NoProvidersConfigured);
}

#[tokio::test]
async fn test_provider_ceiling_moves_to_next_provider() {
    let mut limits = unlimited();
    limits.providers.insert("a".to_string(), 1);
    let orch = orchestrator(limits);
    let a = Arc::new(ScriptedProvider::new("a"));
    let b = Arc::new(ScriptedProvider::new("b"));
    let chain: Vec<Arc<dyn LlmProvider>> = vec![a.clone(), b.clone()];

    let first = orch.execute("beats", &models(&["m"]), &chain, &request()).await.unwrap();
    let second = orch.execute("beats", &models(&["m"]), &chain, &request()).await.unwrap();

    assert_eq!(first.provider, "a");
    assert_eq!(second.provider, "b");
    assert!(second.failed_attempts.is_empty());
}
