//! # Generation Errors
//!
//! Error taxonomy shared by the provider adapters, the resilience layer and
//! the pipeline coordinator.
//!
//! - Uses `thiserror` for structured error definitions
//! - Named fields on every variant so log lines stay greppable
//! - `classified()` helpers produce the short messages stored on job rows

use thiserror::Error;

/// Coarse error category used for metric labels and job error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    RateLimit,
    Server,
    Other
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Server => "server",
            ErrorCategory::Other => "other"
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by a single provider adapter call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error("{provider} rate limited the request (HTTP {status}): {body}")]
    RateLimited {
        provider: String,
        status: u16,
        body: String
    },

    #[error("{provider} server error (HTTP {status}): {body}")]
    Server {
        provider: String,
        status: u16,
        body: String
    },

    #[error("{provider} request failed (HTTP {status}): {body}")]
    Http {
        provider: String,
        status: u16,
        body: String
    },

    #[error("{provider} transport error: {reason}")]
    Transport { provider: String, reason: String },

    #[error("{provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("{provider} returned an unparseable response: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("{provider} is misconfigured: {reason}")]
    Configuration { provider: String, reason: String }
}

impl ProviderError {
    pub fn provider(&self) -> &str {
        match self {
            ProviderError::RateLimited { provider, .. }
            | ProviderError::Server { provider, .. }
            | ProviderError::Http { provider, .. }
            | ProviderError::Transport { provider, .. }
            | ProviderError::Timeout { provider, .. }
            | ProviderError::InvalidResponse { provider, .. }
            | ProviderError::Configuration { provider, .. } => provider
        }
    }

    /// Whether the adapter's own retry loop should try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. }
                | ProviderError::Server { .. }
                | ProviderError::Transport { .. }
                | ProviderError::Timeout { .. }
        )
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ProviderError::RateLimited { .. } => ErrorCategory::RateLimit,
            ProviderError::Server { .. } => ErrorCategory::Server,
            _ => ErrorCategory::Other
        }
    }
}

/// Errors surfaced by the fallback orchestrator after walking the chain.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrchestrationError {
    #[error("every candidate was skipped by rate limiting ({skipped} skips)")]
    AllProvidersRateLimited { skipped: usize },

    #[error(
        "no provider was attempted: {circuit_open} skipped by open circuits, {rate_limited} by \
         rate limits"
    )]
    AllProvidersUnavailable {
        circuit_open: usize,
        rate_limited: usize
    },

    #[error("no providers or models configured for this call")]
    NoProvidersConfigured,

    #[error(transparent)]
    Provider(#[from] ProviderError)
}

impl OrchestrationError {
    pub fn classified(&self) -> String {
        match self {
            OrchestrationError::AllProvidersRateLimited { .. } => {
                "all_providers_rate_limited".to_string()
            }
            OrchestrationError::AllProvidersUnavailable { .. } => {
                "all_providers_unavailable".to_string()
            }
            OrchestrationError::NoProvidersConfigured => "no_providers_configured".to_string(),
            OrchestrationError::Provider(err) => {
                format!("provider_error:{}:{}", err.category(), err)
            }
        }
    }
}

/// Persistence collaborator errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RepositoryError {
    #[error("Job not found: {id}")]
    NotFound { id: String },

    #[error("Storage operation {operation} failed: {reason}")]
    Storage { operation: String, reason: String }
}

/// Failure of a best-effort side effect (usage ledger, external sinks).
///
/// Callers log and discard these; they never fail a job.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SinkError {
    #[error("Usage sink {sink} rejected the record: {reason}")]
    Rejected { sink: String, reason: String },

    #[error("Usage sink {sink} unavailable: {reason}")]
    Unavailable { sink: String, reason: String }
}

/// Errors that terminate a generation job.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("Budget exceeded: {spent:.4} USD > {budget:.4} USD")]
    BudgetExceeded { spent: f64, budget: f64 },

    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    #[error("Job {id} was canceled")]
    Canceled { id: String }
}

impl PipelineError {
    /// Low-cardinality label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            PipelineError::BudgetExceeded { .. } => "budget_exceeded",
            PipelineError::Orchestration(OrchestrationError::AllProvidersRateLimited { .. }) => {
                "all_providers_rate_limited"
            }
            PipelineError::Orchestration(OrchestrationError::AllProvidersUnavailable { .. }) => {
                "all_providers_unavailable"
            }
            PipelineError::Orchestration(OrchestrationError::NoProvidersConfigured) => {
                "no_providers_configured"
            }
            PipelineError::Orchestration(OrchestrationError::Provider(_)) => "provider_error",
            PipelineError::Repository(_) => "repository_error",
            PipelineError::JobNotFound { .. } => "job_not_found",
            PipelineError::Canceled { .. } => "canceled"
        }
    }

    /// Short message stored in the job's `error` column.
    pub fn classified(&self) -> String {
        match self {
            PipelineError::BudgetExceeded { spent, budget } => {
                format!("budget_exceeded:{:.4}>{:.4}", spent, budget)
            }
            PipelineError::Orchestration(err) => err.classified(),
            PipelineError::Repository(err) => format!("repository_error:{}", err),
            PipelineError::JobNotFound { id } => format!("job_not_found:{}", id),
            PipelineError::Canceled { .. } => "canceled".to_string()
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let server = ProviderError::Server {
            provider: "openai".to_string(),
            status: 503,
            body: String::new()
        };
        let http = ProviderError::Http {
            provider: "openai".to_string(),
            status: 400,
            body: "bad".to_string()
        };
        assert!(server.is_retryable());
        assert_eq!(server.category(), ErrorCategory::Server);
        assert!(!http.is_retryable());
        assert_eq!(http.category(), ErrorCategory::Other);
    }

    #[test]
    fn test_budget_message_format() {
        let err = PipelineError::BudgetExceeded {
            spent: 0.02,
            budget: 0.01
        };
        assert_eq!(err.classified(), "budget_exceeded:0.0200>0.0100");
    }

    #[test]
    fn test_provider_error_classified_through_pipeline() {
        let err = PipelineError::from(OrchestrationError::from(ProviderError::RateLimited {
            provider: "anthropic".to_string(),
            status: 429,
            body: "slow down".to_string()
        }));
        assert!(err.classified().starts_with("provider_error:rate_limit:anthropic"));
    }
}
