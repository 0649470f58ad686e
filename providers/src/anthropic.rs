//! Anthropic messages API adapter.

use async_trait::async_trait;
use errors::ProviderResult;
use gen_core::{CompletionRequest, LlmResult, LlmUsage};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::LlmProvider;
use crate::http::{build_client, invalid_response, send_json};
use crate::retry::{RetryPolicy, with_retry};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const JSON_INSTRUCTION: &str =
    "Respond with a single valid JSON object only. Do not wrap it in prose or code fences.";

const COUNT_TOKENS_TIMEOUT: Duration = Duration::from_secs(10);

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: [UserMessage<'a>; 1]
}

#[derive(Debug, Serialize)]
struct CountTokensRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [UserMessage<'a>; 1]
}

#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str
}

impl<'a> UserMessage<'a> {
    fn new(content: &'a str) -> [Self; 1] {
        [Self {
            role: "user",
            content
        }]
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<MessagesUsage>
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>
}

#[derive(Debug, Default, Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64
}

#[derive(Debug, Deserialize)]
struct CountTokensResponse {
    input_tokens: u64
}

impl AnthropicProvider {
    pub const NAME: &'static str = "anthropic";

    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        retry: RetryPolicy
    ) -> ProviderResult<Self> {
        Ok(Self {
            client: build_client(Self::NAME)?,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry
        })
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
    }

    fn system_prompt(request: &CompletionRequest) -> Option<String> {
        match (request.system.as_deref(), request.json_mode) {
            (Some(system), true) => Some(format!("{}\n\n{}", system, JSON_INSTRUCTION)),
            (None, true) => Some(JSON_INSTRUCTION.to_string()),
            (system, false) => system.map(str::to_string)
        }
    }

    async fn complete_once(&self, request: &CompletionRequest) -> ProviderResult<LlmResult> {
        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: Self::system_prompt(request),
            messages: UserMessage::new(&request.prompt)
        };

        let started = Instant::now();
        let raw = send_json(
            Self::NAME,
            self.post("/messages").json(&body),
            request.timeout
        )
        .await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        parse_response(raw, &request.model, latency_ms)
    }
}

fn parse_response(
    raw: serde_json::Value,
    requested_model: &str,
    latency_ms: u64
) -> ProviderResult<LlmResult> {
    let parsed: MessagesResponse = serde_json::from_value(raw.clone())
        .map_err(|e| invalid_response(AnthropicProvider::NAME, e.to_string()))?;

    let text: String = parsed
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();

    let usage = parsed.usage.unwrap_or_default();
    Ok(LlmResult {
        text,
        model: parsed.model.unwrap_or_else(|| requested_model.to_string()),
        usage: LlmUsage {
            prompt_tokens: usage.input_tokens,
            completion_tokens: usage.output_tokens,
            latency_ms
        },
        raw
    })
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<LlmResult> {
        with_retry(&self.retry, Self::NAME, move |_| self.complete_once(request)).await
    }

    /// Single attempt; callers fall back to a heuristic on any error.
    async fn count_tokens(
        &self,
        model: &str,
        prompt: &str,
        system: Option<&str>
    ) -> ProviderResult<Option<u64>> {
        let body = CountTokensRequest {
            model,
            system,
            messages: UserMessage::new(prompt)
        };

        let raw = send_json(
            Self::NAME,
            self.post("/messages/count_tokens").json(&body),
            COUNT_TOKENS_TIMEOUT
        )
        .await?;

        let parsed: CountTokensResponse = serde_json::from_value(raw)
            .map_err(|e| invalid_response(Self::NAME, e.to_string()))?;
        Ok(Some(parsed.input_tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_blocks_concatenated() {
        let raw = json!({
            "model": "claude-3-5-haiku-20241022",
            "content": [
                {"type": "text", "text": "{\"chapters\":"},
                {"type": "tool_use", "id": "x", "name": "noop", "input": {}},
                {"type": "text", "text": "[]}"}
            ],
            "usage": {"input_tokens": 30, "output_tokens": 7}
        });

        let result = parse_response(raw, "claude-3-5-haiku-latest", 9).unwrap();
        assert_eq!(result.text, "{\"chapters\":[]}");
        assert_eq!(result.model, "claude-3-5-haiku-20241022");
        assert_eq!(result.usage.prompt_tokens, 30);
        assert_eq!(result.usage.completion_tokens, 7);
    }

    #[test]
    fn test_json_mode_goes_through_system() {
        let request = CompletionRequest::new("claude", "write").with_json_mode(true);
        let system = AnthropicProvider::system_prompt(&request).unwrap();
        assert_eq!(system, JSON_INSTRUCTION);

        let request = request.with_system("You are a story editor.");
        let system = AnthropicProvider::system_prompt(&request).unwrap();
        assert!(system.starts_with("You are a story editor."));
        assert!(system.ends_with(JSON_INSTRUCTION));

        let plain = CompletionRequest::new("claude", "write");
        assert_eq!(AnthropicProvider::system_prompt(&plain), None);
    }
}
