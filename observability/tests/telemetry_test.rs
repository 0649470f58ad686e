use gen_core::LlmUsage;
use metrics_util::CompositeKey;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use observability::GenerationTelemetry;

type SnapshotVec = Vec<(
    CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue
)>;

fn with_test_recorder<F, R>(f: F) -> (R, SnapshotVec)
where
    F: FnOnce() -> R
{
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, f);
    let snapshot = snapshotter.snapshot().into_vec();

    (result, snapshot)
}

fn counter_with_labels(snapshot: &SnapshotVec, name: &str, labels: &[(&str, &str)]) -> u64 {
    snapshot
        .iter()
        .filter(|(k, _, _, _)| {
            k.key().name() == name
                && labels.iter().all(|(label_name, label_value)| {
                    k.key()
                        .labels()
                        .any(|l| l.key() == *label_name && l.value() == *label_value)
                })
        })
        .map(|(_, _, _, v)| match v {
            DebugValue::Counter(n) => *n,
            _ => 0
        })
        .sum()
}

#[test]
fn test_skip_reasons_are_labelled() {
    let (_, snapshot) = with_test_recorder(|| {
        let telemetry = GenerationTelemetry::new();
        telemetry.record_provider_skipped("openai", "gpt-4o", "beats", "circuit_open");
        telemetry.record_provider_skipped("openai", "gpt-4o", "beats", "rate_limited_model");
        telemetry.record_provider_skipped("anthropic", "gpt-4o", "chapters", "rate_limited_model");
    });

    assert_eq!(
        counter_with_labels(
            &snapshot,
            "generation_provider_skipped_total",
            &[("reason", "rate_limited_model")]
        ),
        2
    );
    assert_eq!(
        counter_with_labels(
            &snapshot,
            "generation_provider_skipped_total",
            &[("provider", "openai"), ("reason", "circuit_open")]
        ),
        1
    );
    assert_eq!(
        counter_with_labels(
            &snapshot,
            "generation_provider_skipped_total",
            &[("stage", "chapters")]
        ),
        1
    );
}

#[test]
fn test_success_and_failure_share_call_counter() {
    let (_, snapshot) = with_test_recorder(|| {
        let telemetry = GenerationTelemetry::new();
        telemetry.record_provider_failure("openai", "gpt-4o", "nodes", "server");
        telemetry.record_provider_success(
            "anthropic",
            "gpt-4o",
            "nodes",
            &LlmUsage {
                prompt_tokens: 10,
                completion_tokens: 20,
                latency_ms: 40
            },
            0.001
        );
    });

    assert_eq!(
        counter_with_labels(
            &snapshot,
            "generation_provider_calls_total",
            &[("status", "failure"), ("category", "server")]
        ),
        1
    );
    assert_eq!(
        counter_with_labels(
            &snapshot,
            "generation_provider_calls_total",
            &[("provider", "anthropic"), ("status", "success")]
        ),
        1
    );
    assert_eq!(
        counter_with_labels(
            &snapshot,
            "generation_tokens_total",
            &[("stage", "nodes"), ("kind", "completion")]
        ),
        20
    );
    assert_eq!(
        counter_with_labels(
            &snapshot,
            "generation_provider_calls_total",
            &[("stage", "nodes")]
        ),
        2
    );
}

#[test]
fn test_job_and_stage_metrics() {
    let (_, snapshot) = with_test_recorder(|| {
        let telemetry = GenerationTelemetry::new();
        telemetry.record_stage_completed("beats", "openai", "gpt-4o-mini", 0.002, 30, 120.0);
        telemetry.record_budget_exceeded("chapters", "pre_call");
        telemetry.record_stage_failed("chapters", "budget_exceeded");
        telemetry.record_job_finished("failed", 0.002);
        telemetry.record_circuit_opened("openai");
    });

    assert_eq!(
        counter_with_labels(
            &snapshot,
            "generation_stage_total",
            &[("stage", "beats"), ("provider", "openai"), ("status", "ok")]
        ),
        1
    );
    assert_eq!(
        counter_with_labels(
            &snapshot,
            "generation_budget_exceeded_total",
            &[("phase", "pre_call")]
        ),
        1
    );
    assert_eq!(
        counter_with_labels(&snapshot, "generation_jobs_total", &[("status", "failed")]),
        1
    );
    assert_eq!(
        counter_with_labels(&snapshot, "generation_circuit_opened_total", &[]),
        1
    );
}
