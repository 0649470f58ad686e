use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use errors::RepositoryError;
use gen_core::{ArtifactRef, GenerationJob, JobRepository, JobStatus, StageLog, TokenUsage};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArtifact {
    pub artifact_id: String,
    pub version_id: String,
    pub job_id: Uuid,
    pub content: serde_json::Value,
    pub created_at: DateTime<Utc>
}

#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: DashMap<Uuid, GenerationJob>,
    stage_logs: RwLock<HashMap<Uuid, Vec<StageLog>>>,
    artifacts: DashMap<String, StoredArtifact>
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_job(&self, job: GenerationJob) {
        tracing::debug!(job_id = %job.id, "Inserted job");
        self.jobs.insert(job.id, job);
    }

    /// Marks a queued or running job canceled. Terminal jobs are returned
    /// unchanged.
    pub fn cancel_job(&self, id: Uuid) -> Result<GenerationJob, RepositoryError> {
        let mut job = self.jobs.get_mut(&id).ok_or_else(|| not_found(id))?;
        if !job.status.is_terminal() {
            job.mark_canceled();
            tracing::info!(job_id = %id, "Job canceled");
        }
        Ok(job.clone())
    }

    pub fn artifact(&self, artifact_id: &str) -> Option<StoredArtifact> {
        self.artifacts.get(artifact_id).map(|a| a.clone())
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Cost and token totals recomputed from the stage log table.
    pub fn totals_from_logs(&self, job_id: Uuid) -> (f64, TokenUsage) {
        let logs = self.stage_logs.read();
        let mut usage = TokenUsage::default();
        let mut cost = 0.0;
        for log in logs.get(&job_id).into_iter().flatten() {
            usage.add(&log.usage);
            cost += log.cost_usd;
        }
        (cost, usage)
    }
}

fn not_found(id: Uuid) -> RepositoryError {
    RepositoryError::NotFound { id: id.to_string() }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn load_job(&self, id: Uuid) -> Result<GenerationJob, RepositoryError> {
        self.jobs
            .get(&id)
            .map(|job| job.clone())
            .ok_or_else(|| not_found(id))
    }

    /// Overwrites the stored job. A canceled status is sticky: later writes
    /// update counters but never resurrect the job.
    async fn update_job(&self, job: &GenerationJob) -> Result<(), RepositoryError> {
        let mut stored = self.jobs.get_mut(&job.id).ok_or_else(|| not_found(job.id))?;

        if stored.status == JobStatus::Canceled && job.status != JobStatus::Canceled {
            let finished_at = stored.finished_at;
            *stored = job.clone();
            stored.status = JobStatus::Canceled;
            stored.finished_at = finished_at;
            return Ok(());
        }

        *stored = job.clone();
        Ok(())
    }

    async fn save_stage_log(&self, log: &StageLog) -> Result<(), RepositoryError> {
        let mut logs = self.stage_logs.write();
        let entries = logs.entry(log.job_id).or_default();
        if entries.iter().any(|existing| existing.log_id == log.log_id) {
            tracing::debug!(log_id = %log.log_id, "Stage log already stored");
            return Ok(());
        }
        entries.push(log.clone());
        Ok(())
    }

    async fn persist_generated_artifact(
        &self,
        job: &GenerationJob,
        content: &serde_json::Value
    ) -> Result<ArtifactRef, RepositoryError> {
        let artifact = StoredArtifact {
            artifact_id: utils::generate_prefixed_id("art"),
            version_id: utils::generate_prefixed_id("ver"),
            job_id: job.id,
            content: content.clone(),
            created_at: Utc::now()
        };
        let reference = ArtifactRef {
            artifact_id: artifact.artifact_id.clone(),
            version_id: artifact.version_id.clone()
        };
        tracing::info!(
            job_id = %job.id,
            artifact_id = %reference.artifact_id,
            "Persisted generated artifact"
        );
        self.artifacts.insert(artifact.artifact_id.clone(), artifact);
        Ok(reference)
    }

    async fn find_completed_by_fingerprint(
        &self,
        fingerprint: &str
    ) -> Result<Option<GenerationJob>, RepositoryError> {
        Ok(self
            .jobs
            .iter()
            .filter(|job| {
                job.status == JobStatus::Completed
                    && job.params_fingerprint == fingerprint
                    && !job.result_refs.is_empty()
            })
            .max_by_key(|job| job.finished_at)
            .map(|job| job.clone()))
    }

    async fn stage_logs(&self, job_id: Uuid) -> Result<Vec<StageLog>, RepositoryError> {
        Ok(self
            .stage_logs
            .read()
            .get(&job_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gen_core::{JobParams, StageStatus};

    fn log_for(job_id: Uuid, prompt_tokens: u64, completion_tokens: u64, cost: f64) -> StageLog {
        StageLog {
            log_id: Uuid::new_v4(),
            job_id,
            stage: "beats".to_string(),
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            prompt: "prompt".to_string(),
            raw_response: serde_json::json!({}),
            usage: TokenUsage::new(prompt_tokens, completion_tokens),
            cost_usd: cost,
            status: StageStatus::Ok,
            error: None,
            created_at: Utc::now()
        }
    }

    #[tokio::test]
    async fn test_load_unknown_job() {
        let repo = InMemoryJobRepository::new();
        let err = repo.load_job(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_stage_log_replay_is_idempotent() {
        let repo = InMemoryJobRepository::new();
        let job_id = Uuid::new_v4();
        let log = log_for(job_id, 10, 20, 0.03);

        repo.save_stage_log(&log).await.unwrap();
        repo.save_stage_log(&log).await.unwrap();
        repo.save_stage_log(&log_for(job_id, 1, 2, 0.01)).await.unwrap();

        assert_eq!(repo.stage_logs(job_id).await.unwrap().len(), 2);
        let (cost, usage) = repo.totals_from_logs(job_id);
        assert!((cost - 0.04).abs() < 1e-9);
        assert_eq!(usage, TokenUsage::new(11, 22));
    }

    #[tokio::test]
    async fn test_cancel_is_sticky() {
        let repo = InMemoryJobRepository::new();
        let mut job = GenerationJob::new(JobParams::default());
        job.mark_running();
        repo.insert_job(job.clone());

        let canceled = repo.cancel_job(job.id).unwrap();
        assert_eq!(canceled.status, JobStatus::Canceled);

        job.cost_usd = 0.5;
        repo.update_job(&job).await.unwrap();
        let stored = repo.load_job(job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Canceled);
        assert_eq!(stored.cost_usd, 0.5);
    }

    #[tokio::test]
    async fn test_cancel_leaves_terminal_jobs_alone() {
        let repo = InMemoryJobRepository::new();
        let mut job = GenerationJob::new(JobParams::default());
        job.mark_completed();
        repo.insert_job(job.clone());

        assert_eq!(repo.cancel_job(job.id).unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_artifacts_get_distinct_ids() {
        let repo = InMemoryJobRepository::new();
        let job = GenerationJob::new(JobParams::default());
        let content = serde_json::json!({"beats": ["a"]});

        let first = repo.persist_generated_artifact(&job, &content).await.unwrap();
        let second = repo.persist_generated_artifact(&job, &content).await.unwrap();

        assert_ne!(first, second);
        assert!(first.artifact_id.starts_with("art_"));
        assert!(first.version_id.starts_with("ver_"));
        assert_eq!(repo.artifact(&first.artifact_id).unwrap().content, content);
    }
}
