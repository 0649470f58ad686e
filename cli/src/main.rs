use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;
mod runtime;
pub mod ux_error;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match runtime::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            err.display();
            std::process::exit(2);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Serve(args) => commands::serve::run(args, config).await,
        Commands::Run(args) => commands::run::run(args, config).await,
        Commands::Limits(cmd) => commands::limits::run(cmd).await
    };

    if let Err(err) = result {
        match err.downcast_ref::<ux_error::UxError>() {
            Some(ux) => ux.display(),
            None => output::error(&format!("{err:#}"))
        }
        std::process::exit(1);
    }
    Ok(())
}
