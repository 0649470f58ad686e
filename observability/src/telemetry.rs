use gen_core::LlmUsage;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Cost counters are integral, so USD is also exported in micro-dollars.
const MICROS_PER_USD: f64 = 1_000_000.0;

#[derive(Debug, Default)]
pub struct GenerationTelemetry {
    _phantom: std::marker::PhantomData<()>
}

impl GenerationTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A (provider, model) candidate was skipped without a network call.
    /// `reason` is `circuit_open`, `rate_limited_model` or `rate_limited_provider`.
    pub fn record_provider_skipped(&self, provider: &str, model: &str, stage: &str, reason: &str) {
        counter!("generation_provider_skipped_total",
            "provider" => provider.to_string(),
            "model" => model.to_string(),
            "stage" => stage.to_string(),
            "reason" => reason.to_string()
        )
        .increment(1);
    }

    pub fn record_provider_success(
        &self,
        provider: &str,
        model: &str,
        stage: &str,
        usage: &LlmUsage,
        cost_usd: f64
    ) {
        let labels = [
            ("provider", provider.to_string()),
            ("model", model.to_string()),
            ("stage", stage.to_string()),
            ("status", "success".to_string())
        ];
        counter!("generation_provider_calls_total", &labels).increment(1);

        let labels = [
            ("provider", provider.to_string()),
            ("model", model.to_string()),
            ("stage", stage.to_string())
        ];
        histogram!("generation_provider_latency_seconds", &labels)
            .record(usage.latency_ms as f64 / 1000.0);
        histogram!("generation_cost_usd", &labels).record(cost_usd);
        counter!("generation_cost_microusd_total", &labels)
            .increment((cost_usd * MICROS_PER_USD).round() as u64);

        counter!("generation_tokens_total",
            "provider" => provider.to_string(),
            "model" => model.to_string(),
            "stage" => stage.to_string(),
            "kind" => "prompt"
        )
        .increment(usage.prompt_tokens);
        counter!("generation_tokens_total",
            "provider" => provider.to_string(),
            "model" => model.to_string(),
            "stage" => stage.to_string(),
            "kind" => "completion"
        )
        .increment(usage.completion_tokens);
    }

    /// `category` is `rate_limit`, `server` or `other`.
    pub fn record_provider_failure(&self, provider: &str, model: &str, stage: &str, category: &str) {
        let labels = [
            ("provider", provider.to_string()),
            ("model", model.to_string()),
            ("stage", stage.to_string()),
            ("status", "failure".to_string()),
            ("category", category.to_string())
        ];
        counter!("generation_provider_calls_total", &labels).increment(1);
    }

    pub fn record_circuit_opened(&self, provider: &str) {
        counter!("generation_circuit_opened_total",
            "provider" => provider.to_string()
        )
        .increment(1);
    }

    pub fn record_circuit_closed(&self, provider: &str) {
        counter!("generation_circuit_closed_total",
            "provider" => provider.to_string()
        )
        .increment(1);
    }

    pub fn record_stage_completed(
        &self,
        stage: &str,
        provider: &str,
        model: &str,
        cost_usd: f64,
        total_tokens: u64,
        duration_ms: f64
    ) {
        counter!("generation_stage_total",
            "stage" => stage.to_string(),
            "provider" => provider.to_string(),
            "status" => "ok"
        )
        .increment(1);
        histogram!("generation_stage_duration_seconds",
            "stage" => stage.to_string(),
            "provider" => provider.to_string(),
            "model" => model.to_string()
        )
        .record(duration_ms / 1000.0);
        histogram!("generation_stage_cost_usd", "stage" => stage.to_string()).record(cost_usd);
        histogram!("generation_stage_tokens", "stage" => stage.to_string())
            .record(total_tokens as f64);
    }

    pub fn record_stage_failed(&self, stage: &str, reason: &str) {
        counter!("generation_stage_total",
            "stage" => stage.to_string(),
            "status" => "failed",
            "reason" => reason.to_string()
        )
        .increment(1);
    }

    pub fn record_budget_exceeded(&self, stage: &str, phase: &str) {
        counter!("generation_budget_exceeded_total",
            "stage" => stage.to_string(),
            "phase" => phase.to_string()
        )
        .increment(1);
    }

    pub fn record_job_finished(&self, status: &str, cost_usd: f64) {
        counter!("generation_jobs_total", "status" => status.to_string()).increment(1);
        histogram!("generation_job_cost_usd").record(cost_usd);
    }

    pub fn record_job_reused(&self) {
        counter!("generation_jobs_reused_total").increment(1);
    }

    pub fn set_rate_limit_ceiling(&self, scope: &str, name: &str, rpm: u32) {
        gauge!("generation_rate_limit_ceiling",
            "scope" => scope.to_string(),
            "name" => name.to_string()
        )
        .set(rpm as f64);
    }
}

/// Installs the global Prometheus recorder and returns the handle that
/// renders `/metrics`.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    #[test]
    fn test_cost_counter_in_micro_dollars() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            let telemetry = GenerationTelemetry::new();
            let usage = LlmUsage {
                prompt_tokens: 10,
                completion_tokens: 20,
                latency_ms: 250
            };
            telemetry.record_provider_success("openai", "gpt-4o-mini", "beats", &usage, 0.0125);
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let micros = snapshot.iter().find_map(|(k, _, _, v)| match v {
            DebugValue::Counter(n) if k.key().name() == "generation_cost_microusd_total" => Some(*n),
            _ => None
        });
        assert_eq!(micros, Some(12_500));
    }
}
