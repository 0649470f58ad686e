use clap::Args;
use config::Config;
use gen_core::{GenerationJob, JobParams, JobStatus};
use std::path::{Path, PathBuf};

use crate::output;
use crate::runtime::{Resilience, build_pipeline};
use crate::ux_error;

#[derive(Args)]
pub struct RunArgs {
    /// Job params file (JSON or YAML)
    #[arg(long)]
    pub params: PathBuf,

    /// Override the job budget in USD
    #[arg(long)]
    pub budget: Option<f64>,

    /// Preferred provider for this job
    #[arg(long)]
    pub provider: Option<String>,

    /// Print a cost summary after the job
    #[arg(long)]
    pub summary: bool,

    /// Serve the admin API (rate limits, circuits) while the job runs
    #[arg(long)]
    pub admin: bool
}

pub async fn run(args: RunArgs, config: Config) -> anyhow::Result<()> {
    let mut params = read_params(&args.params)?;
    if let Some(budget) = args.budget {
        params.budget_usd = Some(budget);
    }
    if let Some(provider) = args.provider {
        params.provider = Some(provider);
    }

    let resilience = Resilience::from_config(&config);
    let pipeline = build_pipeline(&config, &resilience)?;

    let job = GenerationJob::new(params);
    let job_id = job.id;
    pipeline.repository.insert_job(job);

    let admin = args.admin.then(|| {
        output::info(&format!(
            "Admin API on http://{}:{} for the duration of the job",
            config.server.host, config.server.port
        ));
        let state = resilience.admin_state();
        let server_config = config.server.clone();
        tokio::spawn(async move {
            if let Err(err) = server::serve(&server_config, state).await {
                tracing::error!(error = %err, "Admin server stopped");
            }
        })
    });

    let outcome = pipeline.coordinator.spawn(job_id).await;
    if let Some(admin) = admin {
        admin.abort();
    }
    let job = outcome??;
    println!("{}", serde_json::to_string_pretty(&job)?);

    if args.summary {
        let summary = pipeline.costs.job_summary(job_id);
        output::subheader("Cost summary");
        output::kv("calls", summary.calls);
        output::kv("cost_usd", format!("{:.6}", summary.total_cost_usd));
        output::kv("prompt", summary.prompt_tokens);
        output::kv("completion", summary.completion_tokens);
        for (provider, cost) in &summary.by_provider {
            output::kv(provider, format!("{:.6}", cost));
        }
    }

    match job.status {
        JobStatus::Completed => {
            output::success(&format!("Job {} completed", job_id));
            Ok(())
        }
        status => anyhow::bail!(
            "job {} finished as {}: {}",
            job_id,
            status,
            job.error.as_deref().unwrap_or("no error recorded")
        )
    }
}

pub(crate) fn read_params(path: &Path) -> anyhow::Result<JobParams> {
    let display = path.display().to_string();
    let raw = std::fs::read_to_string(path)
        .map_err(|err| ux_error::invalid_params_file(&display, &err.to_string()))?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    let params = if is_yaml {
        serde_yaml::from_str(&raw)
            .map_err(|err| ux_error::invalid_params_file(&display, &err.to_string()))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|err| ux_error::invalid_params_file(&display, &err.to_string()))?
    };
    Ok(params)
}
