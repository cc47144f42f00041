use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub command: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "command".to_string()
}

pub const SUGGESTION_KIND: &str = "suggestion";

impl Command {
    pub fn new(command: impl Into<String>, description: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
            kind: kind.into(),
        }
    }

    /// Suggestions are informational and never handed to the executor.
    pub fn is_suggestion(&self) -> bool {
        self.kind == SUGGESTION_KIND
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpretationMethod {
    PatternMatching,
    AiInterpretation,
    AiInterpretationFailed,
    AiError,
    Fallback,
}

impl InterpretationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterpretationMethod::PatternMatching => "pattern_matching",
            InterpretationMethod::AiInterpretation => "ai_interpretation",
            InterpretationMethod::AiInterpretationFailed => "ai_interpretation_failed",
            InterpretationMethod::AiError => "ai_error",
            InterpretationMethod::Fallback => "fallback",
        }
    }
}

impl fmt::Display for InterpretationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an interpretation was produced, with the fields that only make sense
/// for that path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum InterpretationOutcome {
    PatternMatching,
    AiInterpretation,
    AiInterpretationFailed { raw_response: String },
    AiError { cause: String },
    Fallback { warnings: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub intent: String,
    pub commands: Vec<Command>,
    pub confidence: f32,
    #[serde(flatten)]
    pub outcome: InterpretationOutcome,
}

impl Interpretation {
    pub fn method(&self) -> InterpretationMethod {
        match self.outcome {
            InterpretationOutcome::PatternMatching => InterpretationMethod::PatternMatching,
            InterpretationOutcome::AiInterpretation => InterpretationMethod::AiInterpretation,
            InterpretationOutcome::AiInterpretationFailed { .. } => {
                InterpretationMethod::AiInterpretationFailed
            }
            InterpretationOutcome::AiError { .. } => InterpretationMethod::AiError,
            InterpretationOutcome::Fallback { .. } => InterpretationMethod::Fallback,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(
            self.outcome,
            InterpretationOutcome::AiInterpretationFailed { .. } | InterpretationOutcome::AiError { .. }
        )
    }

    pub fn warnings(&self) -> &[String] {
        match &self.outcome {
            InterpretationOutcome::Fallback { warnings } => warnings,
            _ => &[],
        }
    }

    pub fn raw_response(&self) -> Option<&str> {
        match &self.outcome {
            InterpretationOutcome::AiInterpretationFailed { raw_response } => Some(raw_response),
            _ => None,
        }
    }

    pub fn executable_commands(&self) -> Vec<Command> {
        self.commands
            .iter()
            .filter(|c| !c.is_suggestion())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Blocked,
    Timeout,
    Error,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Blocked => "blocked",
            ExecutionStatus::Timeout => "timeout",
            ExecutionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub command: String,
    pub return_code: Option<i32>,
    pub output: String,
    pub error: Option<String>,
    pub status: ExecutionStatus,
}

impl ExecutionResult {
    pub fn success(command: &str, output: String) -> Self {
        Self {
            command: command.to_string(),
            return_code: Some(0),
            output,
            error: None,
            status: ExecutionStatus::Success,
        }
    }

    pub fn failed(command: &str, code: Option<i32>, output: String, error: String) -> Self {
        Self {
            command: command.to_string(),
            return_code: code,
            output,
            error: Some(error),
            status: ExecutionStatus::Failed,
        }
    }

    pub fn blocked(command: &str, reason: &str) -> Self {
        Self {
            command: command.to_string(),
            return_code: None,
            output: String::new(),
            error: Some(format!("Dangerous command blocked: {}", reason)),
            status: ExecutionStatus::Blocked,
        }
    }

    pub fn timeout(command: &str, seconds: u64, output: String) -> Self {
        Self {
            command: command.to_string(),
            return_code: None,
            output,
            error: Some(format!("Command timed out after {} seconds", seconds)),
            status: ExecutionStatus::Timeout,
        }
    }

    pub fn error(command: &str, error: String) -> Self {
        Self {
            command: command.to_string(),
            return_code: None,
            output: String::new(),
            error: Some(error),
            status: ExecutionStatus::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_input: String,
    pub interpretation: Interpretation,
    pub execution_results: Vec<ExecutionResult>,
    pub timestamp: DateTime<Utc>,
}

impl Interaction {
    pub fn new(
        user_input: impl Into<String>,
        interpretation: Interpretation,
        execution_results: Vec<ExecutionResult>,
    ) -> Self {
        Self {
            user_input: user_input.into(),
            interpretation,
            execution_results,
            timestamp: Utc::now(),
        }
    }

    /// True only when something ran and every result succeeded.
    pub fn all_succeeded(&self) -> bool {
        !self.execution_results.is_empty() && self.execution_results.iter().all(|r| r.is_success())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub intent: String,
    pub command: String,
    pub description: String,
}
