//! Provider construction and fallback chain ordering.

use config::ProvidersConfig;
use errors::{ProviderError, ProviderResult};
use std::str::FromStr;
use std::sync::Arc;
use strum::{Display, EnumString};

use crate::{AnthropicProvider, LlmProvider, OpenAiProvider, RetryPolicy};

/// The closed set of vendor integrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
pub enum ProviderKind {
    #[strum(serialize = "openai")]
    OpenAi,
    #[strum(serialize = "anthropic")]
    Anthropic,
    #[strum(serialize = "openai_compatible")]
    OpenAiCompatible
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::OpenAiCompatible
    ];
}

/// Configured adapters in fixed priority order.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn LlmProvider>>,
    default_provider: String
}

impl ProviderRegistry {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: Vec::new(),
            default_provider: default_provider.into()
        }
    }

    /// Appends a provider at the lowest priority. A provider registered under
    /// an existing name replaces it in place.
    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        match self
            .providers
            .iter()
            .position(|p| p.name() == provider.name())
        {
            Some(idx) => self.providers[idx] = provider,
            None => self.providers.push(provider)
        }
    }

    /// Builds every provider that has credentials, in `config.priority`
    /// order. Kinds missing from the priority list are appended after it.
    pub fn from_config(config: &ProvidersConfig) -> ProviderResult<Self> {
        let retry = RetryPolicy::new(config.max_attempts, config.retry_base_delay());
        let mut registry = Self::new(config.default_provider.clone());

        let mut order = Vec::with_capacity(ProviderKind::ALL.len());
        for name in &config.priority {
            let kind = ProviderKind::from_str(name).map_err(|_| ProviderError::Configuration {
                provider: name.clone(),
                reason: "unknown provider in priority list".to_string()
            })?;
            if !order.contains(&kind) {
                order.push(kind);
            }
        }
        for kind in ProviderKind::ALL {
            if !order.contains(&kind) {
                order.push(kind);
            }
        }

        for kind in order {
            let endpoint = match kind {
                ProviderKind::OpenAi => &config.openai,
                ProviderKind::Anthropic => &config.anthropic,
                ProviderKind::OpenAiCompatible => &config.openai_compatible
            };
            if !endpoint.is_configured() {
                tracing::debug!(provider = %kind, "provider has no credentials, not registered");
                continue;
            }
            let api_key = endpoint.api_key.clone().unwrap_or_default();
            let provider: Arc<dyn LlmProvider> = match kind {
                ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(
                    api_key,
                    endpoint.base_url.clone(),
                    retry.clone()
                )?),
                ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(
                    api_key,
                    endpoint.base_url.clone(),
                    retry.clone()
                )?),
                ProviderKind::OpenAiCompatible => Arc::new(OpenAiProvider::compatible(
                    kind.to_string(),
                    api_key,
                    endpoint.base_url.clone(),
                    retry.clone()
                )?)
            };
            tracing::info!(provider = %kind, base_url = %endpoint.base_url, "registered provider");
            registry.register(provider);
        }

        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Provider chain for one call: the preferred provider (or the configured
    /// default) first, then the rest in priority order. An unknown preferred
    /// name is ignored.
    pub fn chain(&self, preferred: Option<&str>) -> Vec<Arc<dyn LlmProvider>> {
        let head = preferred.unwrap_or(self.default_provider.as_str());
        let mut chain = Vec::with_capacity(self.providers.len());
        if let Some(first) = self.get(head) {
            chain.push(first);
        } else if preferred.is_some() {
            tracing::debug!(provider = head, "preferred provider not registered");
        }
        chain.extend(
            self.providers
                .iter()
                .filter(|p| p.name() != head)
                .cloned()
        );
        chain
    }
}
