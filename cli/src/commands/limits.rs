use clap::{Args, Subcommand};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::output;
use crate::ux_error;

#[derive(Subcommand)]
pub enum LimitsCommand {
    #[command(about = "Show effective provider and model limits")]
    Show(LimitsShowArgs),

    #[command(about = "Override or clear provider and model limits")]
    Set(LimitsSetArgs)
}

#[derive(Args)]
pub struct LimitsShowArgs {
    /// Admin server base URL
    #[arg(long, env = "STORYFORGE_URL", default_value = "http://127.0.0.1:8080")]
    pub url: String
}

#[derive(Args)]
pub struct LimitsSetArgs {
    /// Admin server base URL
    #[arg(long, env = "STORYFORGE_URL", default_value = "http://127.0.0.1:8080")]
    pub url: String,

    /// Provider limit as NAME=RPM (empty RPM clears)
    #[arg(long = "provider")]
    pub providers: Vec<String>,

    /// Model limit as NAME=RPM (empty RPM clears)
    #[arg(long = "model")]
    pub models: Vec<String>
}

pub async fn run(cmd: LimitsCommand) -> anyhow::Result<()> {
    match cmd {
        LimitsCommand::Show(args) => show(args).await,
        LimitsCommand::Set(args) => set(args).await
    }
}

async fn show(args: LimitsShowArgs) -> anyhow::Result<()> {
    let url = endpoint(&args.url);
    let response = client()?
        .get(&url)
        .send()
        .await
        .map_err(|err| ux_error::server_not_connected(&args.url, &err.to_string()))?;
    print_response(response).await
}

async fn set(args: LimitsSetArgs) -> anyhow::Result<()> {
    if args.providers.is_empty() && args.models.is_empty() {
        anyhow::bail!("nothing to change: pass --provider NAME=RPM or --model NAME=RPM");
    }

    let body = serde_json::json!({
        "providers": parse_pairs(&args.providers)?,
        "models": parse_pairs(&args.models)?
    });

    let url = endpoint(&args.url);
    let response = client()?
        .post(&url)
        .json(&body)
        .send()
        .await
        .map_err(|err| ux_error::server_not_connected(&args.url, &err.to_string()))?;
    print_response(response).await
}

fn client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?)
}

fn endpoint(base: &str) -> String {
    format!("{}/admin/rate-limits", base.trim_end_matches('/'))
}

async fn print_response(response: reqwest::Response) -> anyhow::Result<()> {
    let status = response.status();
    let body: Value = response.json().await?;

    if !status.is_success() {
        let message = body["error"]["message"]
            .as_str()
            .unwrap_or("request rejected")
            .to_string();
        anyhow::bail!("server returned {}: {}", status, message);
    }

    println!("{}", serde_json::to_string_pretty(&body)?);
    output::success("Rate limits retrieved");
    Ok(())
}

/// `NAME=RPM` pairs; an empty RPM becomes `null`, which clears the override.
fn parse_pairs(raw: &[String]) -> anyhow::Result<Map<String, Value>> {
    let mut pairs = Map::new();
    for entry in raw {
        let (name, rpm) = entry
            .split_once('=')
            .filter(|(name, _)| !name.trim().is_empty())
            .ok_or_else(|| ux_error::invalid_limit(entry))?;

        let value = match rpm.trim() {
            "" => Value::Null,
            digits => Value::from(
                digits
                    .parse::<u32>()
                    .map_err(|_| ux_error::invalid_limit(entry))?
            )
        };
        pairs.insert(name.trim().to_string(), value);
    }
    Ok(pairs)
}
