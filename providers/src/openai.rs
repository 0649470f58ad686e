//! OpenAI chat completions adapter.
//!
//! Also serves any endpoint that speaks the same wire protocol (the
//! `openai_compatible` provider) via [`OpenAiProvider::compatible`].

use async_trait::async_trait;
use errors::ProviderResult;
use gen_core::{CompletionRequest, LlmResult, LlmUsage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::LlmProvider;
use crate::http::{build_client, invalid_response, send_json};
use crate::retry::{RetryPolicy, with_retry};

pub struct OpenAiProvider {
    name: String,
    client: Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<MessageContent>
}

/// `content` is a plain string from most deployments and an array of typed
/// parts from some.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>)
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64
}

impl OpenAiProvider {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        retry: RetryPolicy
    ) -> ProviderResult<Self> {
        Self::compatible("openai", api_key, base_url, retry)
    }

    /// An OpenAI-protocol endpoint registered under a different provider name.
    pub fn compatible(
        name: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        retry: RetryPolicy
    ) -> ProviderResult<Self> {
        let name = name.into();
        let client = build_client(&name)?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
            name
        })
    }

    async fn complete_once(&self, request: &CompletionRequest) -> ProviderResult<LlmResult> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt
        });

        let body = ChatRequest {
            model: &request.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request.json_mode.then_some(ResponseFormat {
                kind: "json_object"
            })
        };

        let started = Instant::now();
        let raw = send_json(
            &self.name,
            self.client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body),
            request.timeout
        )
        .await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        self.parse_response(raw, &request.model, latency_ms)
    }

    fn parse_response(
        &self,
        raw: serde_json::Value,
        requested_model: &str,
        latency_ms: u64
    ) -> ProviderResult<LlmResult> {
        let parsed: ChatResponse = serde_json::from_value(raw.clone())
            .map_err(|e| invalid_response(&self.name, e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| invalid_response(&self.name, "response has no choices"))?;

        let text = match choice.message.content {
            Some(MessageContent::Text(text)) => text,
            Some(MessageContent::Parts(parts)) => {
                parts.into_iter().filter_map(|p| p.text).collect::<String>()
            }
            None => String::new()
        };

        let usage = parsed.usage.unwrap_or_default();
        Ok(LlmResult {
            text,
            model: parsed.model.unwrap_or_else(|| requested_model.to_string()),
            usage: LlmUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                latency_ms
            },
            raw
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<LlmResult> {
        with_retry(&self.retry, &self.name, move |_| self.complete_once(request)).await
    }
}
