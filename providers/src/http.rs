//! Shared HTTP plumbing: one JSON POST per attempt, vendor status mapping.

use errors::{ProviderError, ProviderResult};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;

const MAX_ERROR_BODY_CHARS: usize = 512;

pub(crate) fn build_client(provider: &str) -> ProviderResult<Client> {
    Client::builder()
        .build()
        .map_err(|e| ProviderError::Configuration {
            provider: provider.to_string(),
            reason: e.to_string()
        })
}

/// Sends `request` with a hard `timeout` and returns the decoded JSON body.
pub(crate) async fn send_json(
    provider: &str,
    request: RequestBuilder,
    timeout: Duration
) -> ProviderResult<serde_json::Value> {
    let resp = request
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| transport_error(provider, &e, timeout))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(classify_status(provider, status, &body));
    }

    let body = resp
        .text()
        .await
        .map_err(|e| transport_error(provider, &e, timeout))?;

    serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse {
        provider: provider.to_string(),
        reason: format!("body is not JSON: {}", e)
    })
}

pub(crate) fn classify_status(provider: &str, status: StatusCode, body: &str) -> ProviderError {
    let provider = provider.to_string();
    let body = utils::truncate_for_log(body, MAX_ERROR_BODY_CHARS);
    let status = status.as_u16();
    match status {
        429 => ProviderError::RateLimited {
            provider,
            status,
            body
        },
        s if s >= 500 => ProviderError::Server {
            provider,
            status,
            body
        },
        _ => ProviderError::Http {
            provider,
            status,
            body
        }
    }
}

fn transport_error(provider: &str, err: &reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout {
            provider: provider.to_string(),
            timeout_ms: timeout.as_millis() as u64
        }
    } else {
        ProviderError::Transport {
            provider: provider.to_string(),
            reason: err.to_string()
        }
    }
}

pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> ProviderError {
    ProviderError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status("openai", StatusCode::TOO_MANY_REQUESTS, ""),
            ProviderError::RateLimited { status: 429, .. }
        ));
        assert!(matches!(
            classify_status("openai", StatusCode::SERVICE_UNAVAILABLE, ""),
            ProviderError::Server { status: 503, .. }
        ));
        assert!(matches!(
            classify_status("openai", StatusCode::UNAUTHORIZED, "no key"),
            ProviderError::Http { status: 401, .. }
        ));
    }

    #[test]
    fn test_error_body_is_truncated() {
        let body = "x".repeat(2000);
        match classify_status("anthropic", StatusCode::BAD_GATEWAY, &body) {
            ProviderError::Server { body, .. } => assert!(body.len() < 600),
            other => panic!("unexpected {other:?}")
        }
    }
}
