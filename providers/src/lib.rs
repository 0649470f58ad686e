//! # LLM Provider Adapters
//!
//! Uniform completion interface over the supported vendors.
//!
//! - [`LlmProvider`] is the adapter contract, shared as `Arc<dyn LlmProvider>`
//! - Adapters retry transient failures internally ([`retry::RetryPolicy`])
//! - [`ProviderRegistry`] builds the configured adapters and the fallback
//!   chain order

pub mod anthropic;
mod http;
pub mod openai;
pub mod registry;
pub mod retry;

use async_trait::async_trait;
use errors::ProviderResult;
use gen_core::{CompletionRequest, LlmResult};

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
pub use registry::{ProviderKind, ProviderRegistry};
pub use retry::RetryPolicy;

/// A stateless completion adapter for one vendor endpoint.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name used for breaker, limiter and metric keys.
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<LlmResult>;

    /// Exact prompt token count when the vendor exposes one.
    async fn count_tokens(
        &self,
        _model: &str,
        _prompt: &str,
        _system: Option<&str>
    ) -> ProviderResult<Option<u64>> {
        Ok(None)
    }
}
