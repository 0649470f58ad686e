use clap::Args;
use config::Config;
use gen_core::GenerationJob;
use std::path::PathBuf;

use crate::commands::run::read_params;
use crate::output;
use crate::runtime::{Resilience, build_pipeline};

#[derive(Args)]
pub struct ServeArgs {
    /// Bind address (overrides SRV_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port (overrides SRV_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Do not install the Prometheus recorder
    #[arg(long)]
    pub no_metrics: bool,

    /// Job params file to run in the background (repeatable)
    #[arg(long = "params")]
    pub params: Vec<PathBuf>
}

pub async fn run(args: ServeArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let resilience = Resilience::from_config(&config);
    let mut state = resilience.admin_state();

    if config.observability.metrics_enabled && !args.no_metrics {
        let handle = observability::install_prometheus_recorder()?;
        state = state.with_metrics(handle);
    }

    if !args.params.is_empty() {
        let jobs = args
            .params
            .iter()
            .map(|path| read_params(path))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let pipeline = build_pipeline(&config, &resilience)?;

        for params in jobs {
            let job = GenerationJob::new(params);
            let job_id = job.id;
            pipeline.repository.insert_job(job);

            let handle = pipeline.coordinator.spawn(job_id);
            tokio::spawn(async move {
                match handle.await {
                    Ok(Ok(job)) => tracing::info!(
                        job_id = %job.id,
                        status = %job.status,
                        cost_usd = job.cost_usd,
                        error = job.error.as_deref().unwrap_or(""),
                        "Background job finished"
                    ),
                    Ok(Err(err)) => tracing::error!(job_id = %job_id, error = %err, "Background job aborted"),
                    Err(err) => tracing::error!(job_id = %job_id, error = %err, "Background job panicked")
                }
            });
        }
    }

    output::info(&format!(
        "Admin server on http://{}:{}",
        config.server.host, config.server.port
    ));
    server::serve(&config.server, state).await?;
    Ok(())
}
