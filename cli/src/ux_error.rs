use colored::Colorize;

/// User-facing error with remediation steps.
#[derive(Debug)]
pub struct UxError {
    pub what: String,
    pub why: Option<String>,
    pub how_to_fix: Vec<String>,
    pub suggested_command: Option<String>
}

impl UxError {
    pub fn new(what: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            why: None,
            how_to_fix: Vec::new(),
            suggested_command: None
        }
    }

    pub fn why(mut self, reason: impl Into<String>) -> Self {
        self.why = Some(reason.into());
        self
    }

    pub fn fix(mut self, suggestion: impl Into<String>) -> Self {
        self.how_to_fix.push(suggestion.into());
        self
    }

    pub fn suggest(mut self, cmd: impl Into<String>) -> Self {
        self.suggested_command = Some(cmd.into());
        self
    }

    pub fn display(&self) {
        eprintln!();
        eprintln!("{} {}", "error:".red().bold(), self.what.white().bold());

        if let Some(why) = &self.why {
            eprintln!("       {}", why.dimmed());
        }

        if !self.how_to_fix.is_empty() {
            eprintln!();
            eprintln!("{}", "How to fix:".yellow().bold());
            for (i, fix) in self.how_to_fix.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, fix);
            }
        }

        if let Some(cmd) = &self.suggested_command {
            eprintln!();
            eprintln!("{}", "Try this:".green().bold());
            eprintln!("  $ {}", cmd.cyan());
        }
        eprintln!();
    }
}

impl std::fmt::Display for UxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.what)
    }
}

impl std::error::Error for UxError {}

pub fn server_not_connected(url: &str, reason: &str) -> UxError {
    UxError::new(format!("Cannot reach the admin server at {}", url))
        .why(reason.to_string())
        .fix("Start the server in another terminal")
        .fix("Pass the right address with --url")
        .suggest("storyforge serve")
}

pub fn invalid_params_file(path: &str, reason: &str) -> UxError {
    UxError::new(format!("Invalid job params file: '{}'", path))
        .why(reason.to_string())
        .fix("Provide a JSON (.json) or YAML (.yaml/.yml) object")
        .fix("Example: {\"genre\": \"noir\", \"tone\": \"wry\", \"budget_usd\": 0.5}")
}

pub fn invalid_limit(raw: &str) -> UxError {
    UxError::new(format!("Invalid limit: '{}'", raw))
        .why("Limits are written as NAME=RPM; an empty RPM clears the override")
        .suggest("storyforge limits set --model gpt-4o=30 --provider openai=")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_fixes() {
        let err = UxError::new("boom").why("because").fix("one").fix("two").suggest("retry");
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.why.as_deref(), Some("because"));
        assert_eq!(err.how_to_fix, vec!["one", "two"]);
        assert_eq!(err.suggested_command.as_deref(), Some("retry"));
    }

    #[test]
    fn test_converts_into_anyhow_and_back() {
        let err: anyhow::Error = invalid_limit("gpt-4o").into();
        assert!(err.downcast_ref::<UxError>().is_some());
    }
}
