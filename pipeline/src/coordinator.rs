//! Pipeline coordinator.
//!
//! Owns the stage loop for one job at a time; concurrent jobs each get their
//! own task via [`PipelineCoordinator::spawn`]. Breaker, limiter and pricing
//! are shared through the injected [`FallbackOrchestrator`].

use crate::stages::{StagePrompt, build_prompt, parse_stage_output, resolve_models};
use chrono::Utc;
use config::{PipelineConfig, StageConfig};
use errors::{PipelineError, PipelineResult, RepositoryError};
use gen_core::{
    ArtifactValidator, CompletionRequest, GenerationJob, JobRepository, JobStatus, StageLog,
    StageStatus, TokenUsage, UsageRecord, UsageRecorder
};
use observability::{GenerationTelemetry, estimate_tokens};
use providers::{LlmProvider, ProviderRegistry};
use resilience::{FailedAttempt, FallbackOrchestrator, FallbackOutcome};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub struct PipelineCoordinator {
    config: PipelineConfig,
    repository: Arc<dyn JobRepository>,
    registry: Arc<ProviderRegistry>,
    orchestrator: Arc<FallbackOrchestrator>,
    usage_recorder: Option<Arc<dyn UsageRecorder>>,
    validator: Option<Arc<dyn ArtifactValidator>>,
    telemetry: Arc<GenerationTelemetry>,
    request_timeout: Duration
}

impl PipelineCoordinator {
    pub fn new(
        config: PipelineConfig,
        repository: Arc<dyn JobRepository>,
        registry: Arc<ProviderRegistry>,
        orchestrator: Arc<FallbackOrchestrator>
    ) -> Self {
        Self {
            config,
            repository,
            registry,
            orchestrator,
            usage_recorder: None,
            validator: None,
            telemetry: Arc::new(GenerationTelemetry::new()),
            request_timeout: Duration::from_secs(60)
        }
    }

    pub fn with_usage_recorder(mut self, recorder: Arc<dyn UsageRecorder>) -> Self {
        self.usage_recorder = Some(recorder);
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn ArtifactValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<GenerationTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the job on its own tokio task.
    pub fn spawn(self: &Arc<Self>, job_id: Uuid) -> JoinHandle<PipelineResult<GenerationJob>> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move { coordinator.run_job(job_id).await })
    }

    /// Runs the job to a terminal status and returns the final record.
    ///
    /// Stage failures are recorded on the job (`status = failed`, classified
    /// `error`) and returned as `Ok`. `Err` means the job could not be loaded
    /// or its first transition could not be persisted.
    pub async fn run_job(&self, job_id: Uuid) -> PipelineResult<GenerationJob> {
        let mut job = self
            .repository
            .load_job(job_id)
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound { id } => PipelineError::JobNotFound { id },
                other => PipelineError::Repository(other)
            })?;

        if job.status.is_terminal() {
            tracing::info!(job_id = %job.id, status = %job.status, "Job already finished, nothing to run");
            return Ok(job);
        }

        if self.config.reuse_completed_jobs && self.try_reuse(&mut job).await? {
            return Ok(job);
        }

        job.mark_running();
        self.repository.update_job(&job).await?;
        tracing::info!(
            job_id = %job.id,
            stages = self.config.stages.len(),
            "Generation job started"
        );

        match self.run_stages(&mut job).await {
            Ok(()) => {
                job.mark_completed();
                tracing::info!(
                    job_id = %job.id,
                    cost_usd = job.cost_usd,
                    total_tokens = job.token_usage.total_tokens,
                    "Generation job completed"
                );
            }
            Err(PipelineError::Canceled { .. }) => {
                job.mark_canceled();
                tracing::info!(job_id = %job.id, progress = job.progress, "Generation job canceled");
            }
            Err(err) => {
                job.mark_failed(err.classified());
                tracing::error!(job_id = %job.id, error = %err, "Generation job failed");
            }
        }

        if let Err(err) = self.repository.update_job(&job).await {
            tracing::error!(job_id = %job.id, error = %err, "Failed to persist final job state");
        }
        self.telemetry
            .record_job_finished(&job.status.to_string(), job.cost_usd);
        Ok(job)
    }

    async fn try_reuse(&self, job: &mut GenerationJob) -> PipelineResult<bool> {
        let prior = match self
            .repository
            .find_completed_by_fingerprint(&job.params_fingerprint)
            .await
        {
            Ok(Some(prior)) if prior.id != job.id => prior,
            Ok(_) => return Ok(false),
            Err(err) => {
                tracing::warn!(job_id = %job.id, error = %err, "Reuse lookup failed, running job");
                return Ok(false);
            }
        };

        job.mark_running();
        job.result_refs = prior.result_refs.clone();
        job.reused = true;
        job.mark_completed();
        self.repository.update_job(job).await?;

        tracing::info!(job_id = %job.id, reused_from = %prior.id, "Reused completed job");
        self.telemetry.record_job_reused();
        self.telemetry.record_job_finished("completed", 0.0);
        Ok(true)
    }

    async fn run_stages(&self, job: &mut GenerationJob) -> PipelineResult<()> {
        let budget = job
            .params
            .budget_usd
            .unwrap_or(self.config.default_budget_usd);
        let chain = self.registry.chain(job.params.provider.as_deref());
        let stage_count = self.config.stages.len();
        let mut outputs = Map::new();
        let mut previous: Option<Value> = None;

        for (index, stage) in self.config.stages.iter().enumerate() {
            let current = self.repository.load_job(job.id).await?;
            if current.status == JobStatus::Canceled {
                return Err(PipelineError::Canceled {
                    id: job.id.to_string()
                });
            }

            let output = self
                .run_stage(job, stage, &chain, previous.as_ref(), budget)
                .await
                .inspect_err(|err| {
                    self.telemetry.record_stage_failed(&stage.name, err.reason());
                })?;

            job.progress = ((index + 1) * 100 / stage_count) as u8;
            self.repository.update_job(job).await?;

            outputs.insert(stage.name.clone(), output.clone());
            previous = Some(output);
        }

        let content = Value::Object(outputs);
        let artifact = self
            .repository
            .persist_generated_artifact(job, &content)
            .await?;
        job.result_refs = vec![
            format!("artifact:{}", artifact.artifact_id),
            format!("version:{}", artifact.version_id),
        ];

        if self.config.validate_artifacts {
            if let Some(validator) = &self.validator {
                if let Err(reason) = validator.validate(&content).await {
                    tracing::warn!(
                        job_id = %job.id,
                        artifact_id = %artifact.artifact_id,
                        reason = %reason,
                        "Artifact validation failed"
                    );
                }
            }
        }

        Ok(())
    }

    async fn run_stage(
        &self,
        job: &mut GenerationJob,
        stage: &StageConfig,
        chain: &[Arc<dyn LlmProvider>],
        previous: Option<&Value>,
        budget: f64
    ) -> PipelineResult<Value> {
        let started = Instant::now();
        let models = resolve_models(stage, &job.params, &self.config.default_model);
        let primary_model = models
            .first()
            .cloned()
            .unwrap_or_else(|| self.config.default_model.clone());
        let prompt = build_prompt(stage, &job.params, previous);

        let prompt_tokens = self
            .estimate_prompt_tokens(chain.first(), &primary_model, &prompt)
            .await;
        let estimate = self.orchestrator.pricing().estimate_cost_usd(
            &primary_model,
            prompt_tokens,
            u64::from(stage.max_tokens)
        );
        if job.cost_usd + estimate > budget {
            tracing::warn!(
                job_id = %job.id,
                stage = %stage.name,
                estimate_usd = estimate,
                spent_usd = job.cost_usd,
                budget_usd = budget,
                "Projected stage cost exceeds budget"
            );
            self.telemetry.record_budget_exceeded(&stage.name, "pre_call");
            return Err(PipelineError::BudgetExceeded {
                spent: job.cost_usd + estimate,
                budget
            });
        }

        let request = CompletionRequest::new(primary_model, prompt.prompt.clone())
            .with_system(prompt.system.clone())
            .with_max_tokens(stage.max_tokens)
            .with_temperature(stage.temperature)
            .with_timeout(self.request_timeout)
            .with_json_mode(stage.json_mode);

        let outcome = match self.orchestrator.execute(&stage.name, &models, chain, &request).await {
            Ok(outcome) => outcome,
            Err(failure) => {
                self.log_failed_attempts(job, stage, &prompt, &failure.failed_attempts)
                    .await?;
                return Err(failure.error.into());
            }
        };
        self.log_failed_attempts(job, stage, &prompt, &outcome.failed_attempts)
            .await?;

        let usage = outcome.result.usage.token_usage();
        job.cost_usd += outcome.cost_usd;
        job.token_usage.add(&usage);
        self.save_log(job, stage, &prompt, &outcome.provider, &outcome.model, StageStatus::Ok, |log| {
            log.raw_response = outcome.result.raw.clone();
            log.usage = usage;
            log.cost_usd = outcome.cost_usd;
        })
        .await?;
        self.record_usage(job, stage, &outcome).await;

        if job.cost_usd > budget {
            tracing::warn!(
                job_id = %job.id,
                stage = %stage.name,
                spent_usd = job.cost_usd,
                budget_usd = budget,
                "Budget exceeded after provider call"
            );
            self.telemetry.record_budget_exceeded(&stage.name, "post_call");
            return Err(PipelineError::BudgetExceeded {
                spent: job.cost_usd,
                budget
            });
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.telemetry.record_stage_completed(
            &stage.name,
            &outcome.provider,
            &outcome.model,
            outcome.cost_usd,
            usage.total_tokens,
            elapsed_ms
        );
        tracing::info!(
            job_id = %job.id,
            stage = %stage.name,
            provider = %outcome.provider,
            model = %outcome.model,
            cost_usd = outcome.cost_usd,
            "Stage completed"
        );

        Ok(parse_stage_output(&outcome.result.text))
    }

    async fn estimate_prompt_tokens(
        &self,
        primary: Option<&Arc<dyn LlmProvider>>,
        model: &str,
        prompt: &StagePrompt
    ) -> u64 {
        let heuristic = estimate_tokens(&prompt.system) + estimate_tokens(&prompt.prompt);
        let Some(provider) = primary else {
            return heuristic;
        };

        match provider
            .count_tokens(model, &prompt.prompt, Some(&prompt.system))
            .await
        {
            Ok(Some(tokens)) => tokens,
            Ok(None) => heuristic,
            Err(err) => {
                tracing::debug!(
                    provider = provider.name(),
                    error = %err,
                    "Token count unavailable, using heuristic"
                );
                heuristic
            }
        }
    }

    async fn log_failed_attempts(
        &self,
        job: &GenerationJob,
        stage: &StageConfig,
        prompt: &StagePrompt,
        attempts: &[FailedAttempt]
    ) -> PipelineResult<()> {
        for attempt in attempts {
            let message = attempt.message();
            self.save_log(
                job,
                stage,
                prompt,
                &attempt.provider,
                &attempt.model,
                StageStatus::Failed,
                |log| {
                    log.raw_response = json!({
                        "error": message,
                        "category": attempt.category.as_str()
                    });
                    log.error = Some(message.clone());
                }
            )
            .await?;
        }
        Ok(())
    }

    async fn save_log<F>(
        &self,
        job: &GenerationJob,
        stage: &StageConfig,
        prompt: &StagePrompt,
        provider: &str,
        model: &str,
        status: StageStatus,
        fill: F
    ) -> PipelineResult<()>
    where
        F: FnOnce(&mut StageLog)
    {
        let mut log = StageLog {
            log_id: Uuid::new_v4(),
            job_id: job.id,
            stage: stage.name.clone(),
            provider: provider.to_string(),
            model: model.to_string(),
            prompt: prompt.prompt.clone(),
            raw_response: Value::Null,
            usage: TokenUsage::default(),
            cost_usd: 0.0,
            status,
            error: None,
            created_at: Utc::now()
        };
        fill(&mut log);
        self.repository.save_stage_log(&log).await?;
        Ok(())
    }

    async fn record_usage(&self, job: &GenerationJob, stage: &StageConfig, outcome: &FallbackOutcome) {
        let Some(recorder) = &self.usage_recorder else {
            return;
        };
        let record = UsageRecord {
            job_id: job.id,
            stage: stage.name.clone(),
            provider: outcome.provider.clone(),
            model: outcome.model.clone(),
            prompt_tokens: outcome.result.usage.prompt_tokens,
            completion_tokens: outcome.result.usage.completion_tokens,
            cost_usd: outcome.cost_usd,
            latency_ms: outcome.result.usage.latency_ms,
            recorded_at: Utc::now()
        };
        if let Err(err) = recorder.record(&record).await {
            tracing::warn!(job_id = %job.id, stage = %stage.name, error = %err, "Usage recording failed");
        }
    }
}
