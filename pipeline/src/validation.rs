use async_trait::async_trait;
use gen_core::ArtifactValidator;
use serde_json::Value;

/// Checks that the artifact carries a non-null output for every stage.
pub struct StageOutputValidator {
    stages: Vec<String>
}

impl StageOutputValidator {
    pub fn new(stages: impl IntoIterator<Item = String>) -> Self {
        Self {
            stages: stages.into_iter().collect()
        }
    }
}

#[async_trait]
impl ArtifactValidator for StageOutputValidator {
    async fn validate(&self, content: &Value) -> Result<(), String> {
        let object = content
            .as_object()
            .ok_or_else(|| "artifact is not a JSON object".to_string())?;

        let missing: Vec<&str> = self
            .stages
            .iter()
            .filter(|stage| object.get(stage.as_str()).is_none_or(Value::is_null))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("missing stage outputs: {}", missing.join(", ")))
        }
    }
}
