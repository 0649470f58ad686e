//! Shared test doubles for the generation workspace.
//!
//! - [`ScriptedProvider`]: an [`LlmProvider`] that replays queued outcomes and
//!   counts calls
//! - [`RecordingUsageRecorder`] / [`FailingUsageRecorder`]: usage sinks that
//!   capture or reject records
//! - `fixtures`: canned results, errors and pricing

mod fixtures;

pub use fixtures::*;

use async_trait::async_trait;
use errors::{ProviderError, ProviderResult, SinkError};
use gen_core::{CompletionRequest, LlmResult, UsageRecord, UsageRecorder};
use parking_lot::Mutex;
use providers::LlmProvider;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Provider double that pops one scripted outcome per `complete` call.
///
/// When the script runs dry the fallback outcome is returned, which defaults
/// to a successful `{}` completion with 10/20 tokens.
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<ProviderResult<LlmResult>>>,
    fallback: Mutex<Option<ProviderResult<LlmResult>>>,
    token_count: Mutex<Option<ProviderResult<Option<u64>>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
    count_calls: AtomicUsize
}

impl ScriptedProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(None),
            token_count: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            count_calls: AtomicUsize::new(0)
        }
    }

    /// A provider whose every call fails with an HTTP 500.
    pub fn always_failing(name: &str) -> Self {
        let provider = Self::new(name);
        *provider.fallback.lock() = Some(Err(server_error(name)));
        provider
    }

    pub fn then(self, outcome: ProviderResult<LlmResult>) -> Self {
        self.script.lock().push_back(outcome);
        self
    }

    pub fn then_text(self, text: &str, prompt_tokens: u64, completion_tokens: u64) -> Self {
        self.then(Ok(llm_result(text, prompt_tokens, completion_tokens)))
    }

    pub fn otherwise(self, outcome: ProviderResult<LlmResult>) -> Self {
        *self.fallback.lock() = Some(outcome);
        self
    }

    pub fn with_token_count(self, outcome: ProviderResult<Option<u64>>) -> Self {
        *self.token_count.lock() = Some(outcome);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<LlmResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let scripted = self.script.lock().pop_front();
        let mut outcome = match scripted {
            Some(outcome) => outcome,
            None => self
                .fallback
                .lock()
                .clone()
                .unwrap_or_else(|| Ok(llm_result("{}", 10, 20)))
        };

        if let Ok(result) = &mut outcome {
            if result.model.is_empty() {
                result.model = request.model.clone();
            }
        }
        outcome
    }

    async fn count_tokens(
        &self,
        _model: &str,
        _prompt: &str,
        _system: Option<&str>
    ) -> ProviderResult<Option<u64>> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        self.token_count.lock().clone().unwrap_or(Ok(None))
    }
}

/// Usage sink that keeps every record it is handed.
#[derive(Default)]
pub struct RecordingUsageRecorder {
    records: Mutex<Vec<UsageRecord>>
}

impl RecordingUsageRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<UsageRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl UsageRecorder for RecordingUsageRecorder {
    async fn record(&self, record: &UsageRecord) -> Result<(), SinkError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Usage sink that rejects everything.
#[derive(Default)]
pub struct FailingUsageRecorder {
    attempts: AtomicUsize
}

impl FailingUsageRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UsageRecorder for FailingUsageRecorder {
    async fn record(&self, _record: &UsageRecord) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Unavailable {
            sink: "failing".to_string(),
            reason: "sink offline".to_string()
        })
    }
}

/// Convenience for tests that only need a provider error value.
pub fn transport_error(provider: &str) -> ProviderError {
    ProviderError::Transport {
        provider: provider.to_string(),
        reason: "connection reset".to_string()
    }
}
