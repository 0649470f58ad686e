pub mod limits;
pub mod run;
pub mod serve;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "storyforge",
    author,
    version,
    about = "Storyforge - staged story generation over resilient LLM providers",
    long_about = "Runs the beats -> chapters -> nodes generation pipeline with provider \
                  fallback, circuit breaking, rate limiting and per-job budgets.\n\nConfiguration \
                  precedence: environment > --config file > defaults."
)]
pub struct Cli {
    /// Configuration file (TOML or YAML)
    #[arg(long, global = true, env = "STORYFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the admin server (health, metrics, rate limits, circuits)")]
    Serve(serve::ServeArgs),

    #[command(about = "Run one generation job locally and print the final job record")]
    Run(run::RunArgs),

    #[command(subcommand, about = "Inspect or override rate limits on a running server")]
    Limits(limits::LimitsCommand)
}
