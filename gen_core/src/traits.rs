//! Port traits implemented by the persistence, pricing and usage adapters.

use async_trait::async_trait;
use errors::{RepositoryError, SinkError};
use uuid::Uuid;

use crate::types::{ArtifactRef, GenerationJob, StageLog, UsageRecord};

/// Persistence collaborator for jobs, stage logs and generated artifacts.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn load_job(&self, id: Uuid) -> Result<GenerationJob, RepositoryError>;

    async fn update_job(&self, job: &GenerationJob) -> Result<(), RepositoryError>;

    /// Appends a stage log. Writing a log whose `log_id` is already stored is
    /// a no-op.
    async fn save_stage_log(&self, log: &StageLog) -> Result<(), RepositoryError>;

    async fn persist_generated_artifact(
        &self,
        job: &GenerationJob,
        content: &serde_json::Value
    ) -> Result<ArtifactRef, RepositoryError>;

    /// Most recent completed job with the given params fingerprint, if any.
    async fn find_completed_by_fingerprint(
        &self,
        fingerprint: &str
    ) -> Result<Option<GenerationJob>, RepositoryError>;

    async fn stage_logs(&self, job_id: Uuid) -> Result<Vec<StageLog>, RepositoryError>;
}

/// Converts token usage into USD.
pub trait CostEstimator: Send + Sync {
    fn estimate_cost_usd(&self, model: &str, prompt_tokens: u64, completion_tokens: u64) -> f64;
}

/// Best-effort usage sink. Failures are logged by callers, never propagated.
#[async_trait]
pub trait UsageRecorder: Send + Sync {
    async fn record(&self, record: &UsageRecord) -> Result<(), SinkError>;
}

/// Post-persistence content validation.
#[async_trait]
pub trait ArtifactValidator: Send + Sync {
    async fn validate(&self, content: &serde_json::Value) -> Result<(), String>;
}
