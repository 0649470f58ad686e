use assert_cmd::{Command, cargo_bin_cmd};
use predicates::prelude::*;
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROVIDER_VARS: [&str; 7] = [
    "OPENAI_API_KEY",
    "OPENAI_BASE_URL",
    "ANTHROPIC_API_KEY",
    "COMPAT_API_KEY",
    "COMPAT_BASE_URL",
    "LLM_PROVIDER_PRIORITY",
    "STORYFORGE_CONFIG"
];

fn storyforge() -> Command {
    let mut cmd = cargo_bin_cmd!("storyforge");
    for var in PROVIDER_VARS {
        cmd.env_remove(var);
    }
    cmd.env("RUST_LOG", "warn");
    cmd
}

fn params_file(contents: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_help_lists_commands() {
    storyforge()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("limits"));
}

#[test]
fn test_version() {
    storyforge()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("storyforge"));
}

#[test]
fn test_run_with_missing_params_file_fails() {
    storyforge()
        .args(["run", "--params", "/nonexistent/params.json"])
        .env("OPENAI_API_KEY", "sk-test")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid job params file"));
}

#[test]
fn test_run_without_providers_fails() {
    let params = params_file(r#"{"genre": "noir"}"#, ".json");
    storyforge()
        .args(["run", "--params"])
        .arg(params.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No LLM providers are configured"));
}

#[test]
fn test_missing_config_file_exits_with_usage_code() {
    storyforge()
        .args(["--config", "/nonexistent/storyforge.toml", "limits", "show"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Could not load configuration file"));
}

#[test]
fn test_limits_set_rejects_malformed_pair() {
    storyforge()
        .args(["limits", "set", "--model", "gpt-4o"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid limit"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_completes_against_openai_endpoint() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o-mini",
            "choices": [{"message": {"content": "{\"summary\": \"a quiet storm\"}"}}],
            "usage": {"prompt_tokens": 40, "completion_tokens": 12}
        })))
        .mount(&mock)
        .await;

    let params = params_file("genre: noir\ntone: wry\nbudget_usd: 0.5\n", ".yaml");
    let uri = mock.uri();
    let path = params.path().to_path_buf();

    let output = tokio::task::spawn_blocking(move || {
        storyforge()
            .args(["run", "--summary", "--params"])
            .arg(&path)
            .env("OPENAI_API_KEY", "sk-test")
            .env("OPENAI_BASE_URL", uri)
            .env("OB_METRICS_ENABLED", "false")
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let job: serde_json::Value = serde_json::Deserializer::from_str(&stdout)
        .into_iter()
        .next()
        .unwrap()
        .unwrap();
    assert_eq!(job["status"], "completed");
    assert_eq!(job["progress"], 100);
    assert!(!job["result_refs"].as_array().unwrap().is_empty());
    assert!(stdout.contains("Cost summary"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_limits_show_prints_server_snapshot() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/rate-limits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "providers": {"openai": 60},
            "models": {"gpt-4o": 30}
        })))
        .mount(&mock)
        .await;

    let uri = mock.uri();
    let output = tokio::task::spawn_blocking(move || {
        storyforge()
            .args(["limits", "show", "--url"])
            .arg(uri)
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"gpt-4o\": 30"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_limits_set_surfaces_server_rejection() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/admin/rate-limits"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": "INVALID_REQUEST", "message": "bad limit"}
        })))
        .mount(&mock)
        .await;

    let uri = mock.uri();
    let output = tokio::task::spawn_blocking(move || {
        storyforge()
            .args(["limits", "set", "--model", "gpt-4o=10", "--url"])
            .arg(uri)
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("bad limit"));
}
