use config::RateLimitConfig;
use gen_core::CompletionRequest;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use providers::LlmProvider;
use resilience::{CircuitBreaker, FallbackOrchestrator, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use testing::{FlatPricing, ScriptedProvider};

fn stage_counter(
    snapshot: &[(
        metrics_util::CompositeKey,
        Option<metrics::Unit>,
        Option<metrics::SharedString>,
        DebugValue
    )],
    name: &str,
    stage: &str,
    status: &str
) -> u64 {
    snapshot
        .iter()
        .filter(|(k, _, _, _)| {
            let key = k.key();
            key.name() == name
                && key.labels().any(|l| l.key() == "stage" && l.value() == stage)
                && key.labels().any(|l| l.key() == "status" && l.value() == status)
        })
        .map(|(_, _, _, v)| match v {
            DebugValue::Counter(n) => *n,
            _ => 0
        })
        .sum()
}

#[test]
fn test_provider_calls_carry_the_stage_label() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let orchestrator = FallbackOrchestrator::new(
        Arc::new(CircuitBreaker::new(3, Duration::from_secs(30))),
        Arc::new(RateLimiter::from_config(&RateLimitConfig {
            default_provider_rpm: 0,
            ..RateLimitConfig::default()
        })),
        Arc::new(FlatPricing::new(1.0, 2.0))
    );
    let chain: Vec<Arc<dyn LlmProvider>> = vec![
        Arc::new(ScriptedProvider::always_failing("a")),
        Arc::new(ScriptedProvider::new("b").then_text("{}", 10, 20)),
    ];
    let models = vec!["m".to_string()];
    let request = CompletionRequest::new("ignored", "Write chapters");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    metrics::with_local_recorder(&recorder, || {
        runtime
            .block_on(orchestrator.execute("chapters", &models, &chain, &request))
            .unwrap();
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        stage_counter(&snapshot, "generation_provider_calls_total", "chapters", "failure"),
        1
    );
    assert_eq!(
        stage_counter(&snapshot, "generation_provider_calls_total", "chapters", "success"),
        1
    );
}
