//! Fixed-window request ceilings for providers and models.
//!
//! Ceilings come from `[rate_limits]` and can be overridden at runtime through
//! the admin API. A configured `0` means "no ceiling"; an override of `0`
//! installed with [`RateLimiter::set_model_ceiling`] is a hard block.

use config::RateLimitConfig;
use observability::GenerationTelemetry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitScope {
    Model,
    Provider
}

impl LimitScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitScope::Model => "model",
            LimitScope::Provider => "provider"
        }
    }

    /// Reason label used by the provider-skip metric.
    pub fn skip_reason(&self) -> &'static str {
        match self {
            LimitScope::Model => "rate_limited_model",
            LimitScope::Provider => "rate_limited_provider"
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    Granted,
    Denied(LimitScope)
}

impl Acquisition {
    pub fn is_granted(&self) -> bool {
        matches!(self, Acquisition::Granted)
    }
}

/// Effective ceilings in requests per window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub providers: BTreeMap<String, u32>,
    pub models: BTreeMap<String, u32>
}

/// Partial override map accepted by the admin API.
///
/// `None` (sent as `null`, `0` or `""`) removes the override for that name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitOverrides {
    pub providers: BTreeMap<String, Option<u32>>,
    pub models: BTreeMap<String, Option<u32>>
}

impl RateLimitOverrides {
    /// Parses `{"providers": {name: rpm}, "models": {name: rpm}}`.
    ///
    /// Values may be non-negative integers, numeric strings, `""` or `null`.
    pub fn from_json(body: &Value) -> Result<Self, String> {
        let object = body
            .as_object()
            .ok_or_else(|| "body must be a JSON object".to_string())?;

        let mut overrides = Self::default();
        for (key, value) in object {
            let target = match key.as_str() {
                "providers" => &mut overrides.providers,
                "models" => &mut overrides.models,
                other => return Err(format!("unknown section '{}'", other))
            };
            if value.is_null() {
                continue;
            }
            let entries = value
                .as_object()
                .ok_or_else(|| format!("'{}' must be an object", key))?;
            for (name, raw) in entries {
                let ceiling =
                    parse_ceiling(raw).map_err(|reason| format!("{}.{}: {}", key, name, reason))?;
                target.insert(name.clone(), ceiling);
            }
        }
        Ok(overrides)
    }
}

fn parse_ceiling(raw: &Value) -> Result<Option<u32>, String> {
    let rpm = match raw {
        Value::Null => return Ok(None),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| format!("'{}' is not a non-negative integer", n))?,
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("'{}' is not a non-negative integer", s))?,
        other => return Err(format!("unsupported value {}", other))
    };
    if rpm == 0 {
        return Ok(None);
    }
    u32::try_from(rpm)
        .map(Some)
        .map_err(|_| format!("{} exceeds the maximum ceiling", rpm))
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32
}

#[derive(Debug, Default)]
struct LimiterState {
    provider_overrides: HashMap<String, u32>,
    model_overrides: HashMap<String, u32>,
    windows: HashMap<(LimitScope, String), Window>
}

impl LimiterState {
    fn used(&mut self, scope: LimitScope, name: &str, now: Instant, window: Duration) -> u32 {
        match self.windows.get_mut(&(scope, name.to_string())) {
            Some(w) if now.saturating_duration_since(w.started) < window => w.count,
            Some(w) => {
                w.started = now;
                w.count = 0;
                0
            }
            None => 0
        }
    }

    fn add(&mut self, scope: LimitScope, name: &str, amount: u32, now: Instant) {
        let w = self
            .windows
            .entry((scope, name.to_string()))
            .or_insert(Window {
                started: now,
                count: 0
            });
        w.count = w.count.saturating_add(amount);
    }
}

pub struct RateLimiter {
    default_provider_rpm: u32,
    provider_defaults: BTreeMap<String, u32>,
    model_defaults: BTreeMap<String, u32>,
    window: Duration,
    state: Mutex<LimiterState>,
    telemetry: Arc<GenerationTelemetry>
}

impl RateLimiter {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            default_provider_rpm: config.default_provider_rpm,
            provider_defaults: config.providers.clone(),
            model_defaults: config.models.clone(),
            window: Duration::from_secs(config.window_seconds.max(1)),
            state: Mutex::new(LimiterState::default()),
            telemetry: Arc::new(GenerationTelemetry::new())
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<GenerationTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn try_acquire_for(&self, provider: &str, model: &str, amount: u32) -> Acquisition {
        self.try_acquire_for_at(provider, model, amount, Instant::now())
    }

    /// Checks the model ceiling, then the provider ceiling, and counts the
    /// request against both only when both have room.
    pub fn try_acquire_for_at(
        &self,
        provider: &str,
        model: &str,
        amount: u32,
        now: Instant
    ) -> Acquisition {
        let mut state = self.state.lock();

        if let Some(ceiling) = self.model_ceiling(&state, model) {
            let used = state.used(LimitScope::Model, model, now, self.window);
            if used.saturating_add(amount) > ceiling {
                tracing::debug!(provider, model, used, ceiling, "Model rate limit reached");
                return Acquisition::Denied(LimitScope::Model);
            }
        }

        if let Some(ceiling) = self.provider_ceiling(&state, provider) {
            let used = state.used(LimitScope::Provider, provider, now, self.window);
            if used.saturating_add(amount) > ceiling {
                tracing::debug!(provider, model, used, ceiling, "Provider rate limit reached");
                return Acquisition::Denied(LimitScope::Provider);
            }
        }

        state.add(LimitScope::Model, model, amount, now);
        state.add(LimitScope::Provider, provider, amount, now);
        Acquisition::Granted
    }

    /// Installs a model ceiling; `0` blocks the model until cleared.
    pub fn set_model_ceiling(&self, model: &str, rpm: u32) {
        self.state.lock().model_overrides.insert(model.to_string(), rpm);
        self.telemetry.set_rate_limit_ceiling("model", model, rpm);
        tracing::info!(model, rpm, "Model rate limit override installed");
    }

    pub fn clear_model_ceiling(&self, model: &str) {
        self.state.lock().model_overrides.remove(model);
        tracing::info!(model, "Model rate limit override cleared");
    }

    pub fn set_provider_ceiling(&self, provider: &str, rpm: u32) {
        self.state
            .lock()
            .provider_overrides
            .insert(provider.to_string(), rpm);
        self.telemetry.set_rate_limit_ceiling("provider", provider, rpm);
        tracing::info!(provider, rpm, "Provider rate limit override installed");
    }

    pub fn clear_provider_ceiling(&self, provider: &str) {
        self.state.lock().provider_overrides.remove(provider);
        tracing::info!(provider, "Provider rate limit override cleared");
    }

    pub fn apply_overrides(&self, overrides: &RateLimitOverrides) -> RateLimitSnapshot {
        for (provider, ceiling) in &overrides.providers {
            match ceiling {
                Some(rpm) => self.set_provider_ceiling(provider, *rpm),
                None => self.clear_provider_ceiling(provider)
            }
        }
        for (model, ceiling) in &overrides.models {
            match ceiling {
                Some(rpm) => self.set_model_ceiling(model, *rpm),
                None => self.clear_model_ceiling(model)
            }
        }
        self.snapshot()
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        let state = self.state.lock();

        let mut providers = BTreeMap::new();
        let provider_names = self
            .provider_defaults
            .keys()
            .chain(state.provider_overrides.keys())
            .chain(
                state
                    .windows
                    .keys()
                    .filter(|(scope, _)| *scope == LimitScope::Provider)
                    .map(|(_, name)| name)
            );
        for name in provider_names {
            if let Some(rpm) = self.provider_ceiling(&state, name) {
                providers.insert(name.clone(), rpm);
            }
        }

        let mut models = BTreeMap::new();
        for name in self.model_defaults.keys().chain(state.model_overrides.keys()) {
            if let Some(rpm) = self.model_ceiling(&state, name) {
                models.insert(name.clone(), rpm);
            }
        }

        RateLimitSnapshot { providers, models }
    }

    fn model_ceiling(&self, state: &LimiterState, model: &str) -> Option<u32> {
        if let Some(rpm) = state.model_overrides.get(model) {
            return Some(*rpm);
        }
        self.model_defaults.get(model).copied().filter(|rpm| *rpm > 0)
    }

    fn provider_ceiling(&self, state: &LimiterState, provider: &str) -> Option<u32> {
        if let Some(rpm) = state.provider_overrides.get(provider) {
            return Some(*rpm);
        }
        match self.provider_defaults.get(provider) {
            Some(rpm) => Some(*rpm).filter(|rpm| *rpm > 0),
            None => Some(self.default_provider_rpm).filter(|rpm| *rpm > 0)
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}
