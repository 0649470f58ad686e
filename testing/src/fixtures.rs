use errors::ProviderError;
use gen_core::{CostEstimator, JobParams, LlmResult, LlmUsage};

/// Successful completion with the model left blank; [`crate::ScriptedProvider`]
/// fills in the requested model.
pub fn llm_result(text: &str, prompt_tokens: u64, completion_tokens: u64) -> LlmResult {
    LlmResult {
        text: text.to_string(),
        model: String::new(),
        usage: LlmUsage {
            prompt_tokens,
            completion_tokens,
            latency_ms: 5
        },
        raw: serde_json::json!({"fixture": true})
    }
}

pub fn server_error(provider: &str) -> ProviderError {
    ProviderError::Server {
        provider: provider.to_string(),
        status: 500,
        body: "internal error".to_string()
    }
}

pub fn rate_limited(provider: &str) -> ProviderError {
    ProviderError::RateLimited {
        provider: provider.to_string(),
        status: 429,
        body: "slow down".to_string()
    }
}

/// Params for a small story job.
pub fn story_params() -> JobParams {
    let mut params = JobParams::default();
    params.structure = Some("three_act".to_string());
    params.tone = Some("wry".to_string());
    params.genre = Some("noir".to_string());
    params.locale = Some("en-US".to_string());
    params.model = Some("gpt-4o-mini".to_string());
    params
}

/// Same price for every model, in USD per 1k tokens.
#[derive(Debug, Clone, Copy)]
pub struct FlatPricing {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64
}

impl FlatPricing {
    pub fn new(prompt_per_1k: f64, completion_per_1k: f64) -> Self {
        Self {
            prompt_per_1k,
            completion_per_1k
        }
    }

    pub fn free() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl CostEstimator for FlatPricing {
    fn estimate_cost_usd(&self, _model: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        (prompt_tokens as f64 / 1000.0) * self.prompt_per_1k
            + (completion_tokens as f64 / 1000.0) * self.completion_per_1k
    }
}
