//! Stage planning: model resolution, prompt assembly and output parsing.

use config::StageConfig;
use gen_core::JobParams;
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePrompt {
    pub system: String,
    pub prompt: String
}

/// Ordered candidate models for one stage.
///
/// The primary model is the first of: the per-stage override in params, the
/// configured stage model, the job model from params, the global default.
/// The params allow-list follows as fallbacks. Duplicates are dropped.
pub fn resolve_models(stage: &StageConfig, params: &JobParams, default_model: &str) -> Vec<String> {
    let primary = params
        .stage_models
        .get(&stage.name)
        .or(stage.model.as_ref())
        .or(params.model.as_ref())
        .map(String::as_str)
        .unwrap_or(default_model);

    let mut models = vec![primary.to_string()];
    for fallback in &params.models {
        if !fallback.is_empty() && !models.contains(fallback) {
            models.push(fallback.clone());
        }
    }
    models
}

/// The params every stage sees: the narrative knobs plus any extra keys.
pub fn context_slice(params: &JobParams) -> Value {
    let mut context = Map::new();
    for (key, value) in [
        ("structure", &params.structure),
        ("tone", &params.tone),
        ("genre", &params.genre),
        ("locale", &params.locale)
    ] {
        if let Some(value) = value {
            context.insert(key.to_string(), Value::String(value.clone()));
        }
    }
    for (key, value) in &params.extra {
        context.insert(key.clone(), value.clone());
    }
    Value::Object(context)
}

pub fn build_prompt(stage: &StageConfig, params: &JobParams, previous: Option<&Value>) -> StagePrompt {
    let mut system = format!(
        "You are a narrative designer producing the '{}' stage of an interactive story.",
        stage.name
    );
    if stage.json_mode {
        system.push_str(&format!(
            " Reply with a single JSON object whose top-level key is \"{}\".",
            stage.name
        ));
    }

    let previous = previous
        .map(Value::to_string)
        .unwrap_or_else(|| "none".to_string());
    let prompt = format!(
        "Stage: {}\nContext: {}\nPrevious stage output: {}",
        stage.name,
        context_slice(params),
        previous
    );

    StagePrompt { system, prompt }
}

/// Parses completion text into JSON.
///
/// Leading or trailing prose around the outermost object is ignored; text
/// with no parseable object is kept as `{"text": ...}`.
pub fn parse_stage_output(text: &str) -> Value {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return value;
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                return value;
            }
        }
    }

    json!({ "text": trimmed })
}
