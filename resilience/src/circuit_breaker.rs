use config::CircuitBreakerConfig;
use dashmap::DashMap;
use observability::GenerationTelemetry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open
}

#[derive(Debug, Clone, Default)]
struct ProviderCircuit {
    failures: u32,
    opened_until: Option<Instant>
}

/// Admin view of one provider's circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failures: u32,
    pub retry_after_ms: u64
}

/// Consecutive-failure breaker keyed by provider name.
///
/// A provider is blocked while `now < opened_until`. Once the cooldown
/// elapses the next call is let through; success closes the circuit and
/// another failure re-opens it with a fresh cooldown.
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    circuits: DashMap<String, ProviderCircuit>,
    telemetry: Arc<GenerationTelemetry>
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            circuits: DashMap::new(),
            telemetry: Arc::new(GenerationTelemetry::new())
        }
    }

    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        Self::new(config.failure_threshold, config.cooldown())
    }

    pub fn with_telemetry(mut self, telemetry: Arc<GenerationTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn allow(&self, provider: &str) -> bool {
        self.allow_at(provider, Instant::now())
    }

    pub fn allow_at(&self, provider: &str, now: Instant) -> bool {
        match self.circuits.get(provider) {
            Some(circuit) => circuit.opened_until.is_none_or(|until| until <= now),
            None => true
        }
    }

    pub fn on_success(&self, provider: &str) {
        let was_open = self
            .circuits
            .remove(provider)
            .is_some_and(|(_, circuit)| circuit.opened_until.is_some());

        if was_open {
            tracing::info!(provider, "Circuit breaker closed after successful call");
            self.telemetry.record_circuit_closed(provider);
        }
    }

    pub fn on_failure(&self, provider: &str) {
        self.on_failure_at(provider, Instant::now());
    }

    pub fn on_failure_at(&self, provider: &str, now: Instant) {
        let mut circuit = self.circuits.entry(provider.to_string()).or_default();
        circuit.failures = circuit.failures.saturating_add(1);

        if circuit.failures >= self.failure_threshold {
            circuit.opened_until = Some(now + self.cooldown);
            let failures = circuit.failures;
            drop(circuit);

            tracing::warn!(
                provider,
                failures,
                cooldown_secs = self.cooldown.as_secs(),
                "Circuit breaker opened"
            );
            self.telemetry.record_circuit_opened(provider);
        }
    }

    pub fn state(&self, provider: &str) -> CircuitState {
        if self.allow(provider) {
            CircuitState::Closed
        } else {
            CircuitState::Open
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, CircuitSnapshot> {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> BTreeMap<String, CircuitSnapshot> {
        self.circuits
            .iter()
            .map(|entry| {
                let retry_after = entry
                    .opened_until
                    .map(|until| until.saturating_duration_since(now))
                    .unwrap_or_default();
                let state = if retry_after.is_zero() {
                    CircuitState::Closed
                } else {
                    CircuitState::Open
                };
                (
                    entry.key().clone(),
                    CircuitSnapshot {
                        state,
                        failures: entry.failures,
                        retry_after_ms: retry_after.as_millis() as u64
                    }
                )
            })
            .collect()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::from_config(&CircuitBreakerConfig::default())
    }
}
