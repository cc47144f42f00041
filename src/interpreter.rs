use crate::error::AiError;
use crate::fallback::FallbackInterpreter;
use crate::llm::CompletionService;
use crate::patterns::PatternMatcher;
use crate::types::{Command, Interpretation, InterpretationOutcome, Pattern};
use serde::Deserialize;
use std::env;

const DEFAULT_AI_CONFIDENCE: f32 = 0.5;
const RAW_PREVIEW_CHARS: usize = 200;

/// What to do when the completion path fails or returns garbage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Replace degraded AI results with the local fallback interpretation.
    #[default]
    OnDegraded,
    /// Hand degraded AI results back as-is.
    Never,
}

#[derive(Deserialize)]
struct AiPlan {
    intent: String,
    commands: Vec<Command>,
    #[serde(default)]
    confidence: Option<f32>,
}

pub struct Interpreter<S> {
    matcher: PatternMatcher,
    fallback: FallbackInterpreter,
    service: S,
    policy: FallbackPolicy,
}

impl<S: CompletionService> Interpreter<S> {
    pub fn new(service: S, policy: FallbackPolicy) -> Self {
        Self {
            matcher: PatternMatcher::new(),
            fallback: FallbackInterpreter::new(),
            service,
            policy,
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn interpret(&self, text: &str) -> Interpretation {
        self.interpret_with_patterns(text, &[])
    }

    /// Like `interpret`, but previously successful patterns are offered to the
    /// model as examples.
    pub fn interpret_with_patterns(&self, text: &str, known: &[Pattern]) -> Interpretation {
        if text.trim().is_empty() {
            return self.fallback.fallback_interpret(text);
        }

        if let Some(matched) = self.matcher.match_text(text) {
            return matched;
        }

        let ai = self.ai_interpret(text, known);
        if !ai.is_degraded() || self.policy == FallbackPolicy::Never {
            return ai;
        }

        tracing::warn!(method = %ai.method(), intent = %ai.intent, "AI interpretation degraded, using fallback");
        let mut fallback = self.fallback.fallback_interpret(text);
        if let InterpretationOutcome::Fallback { warnings } = &mut fallback.outcome {
            warnings.push(degraded_note(&ai));
        }
        fallback
    }

    pub fn ai_interpret(&self, text: &str, known: &[Pattern]) -> Interpretation {
        let cwd = env::current_dir()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| ".".to_string());
        let prompt = build_prompt(text, known, &cwd);

        let raw = match self.service.complete(&prompt) {
            Ok(raw) => raw,
            Err(e) => {
                return Interpretation {
                    intent: format!("AI interpretation error: {}", e),
                    commands: vec![],
                    confidence: 0.0,
                    outcome: InterpretationOutcome::AiError { cause: e.to_string() },
                }
            }
        };

        match parse_ai_response(&raw) {
            Ok(interp) => interp,
            Err(e) => {
                tracing::debug!(error = %e, "model response rejected");
                Interpretation {
                    intent: "AI interpretation failed - using fallback".to_string(),
                    commands: vec![],
                    confidence: 0.0,
                    outcome: InterpretationOutcome::AiInterpretationFailed { raw_response: raw },
                }
            }
        }
    }
}

fn degraded_note(ai: &Interpretation) -> String {
    match ai.raw_response() {
        Some(raw) => format!(
            "{}; model said: {}",
            ai.intent,
            raw.chars().take(RAW_PREVIEW_CHARS).collect::<String>()
        ),
        None => ai.intent.clone(),
    }
}

pub fn build_prompt(request: &str, known: &[Pattern], cwd: &str) -> String {
    let examples = if known.is_empty() {
        String::new()
    } else {
        let lines = known
            .iter()
            .map(|p| format!("- \"{}\" -> {}", p.intent, p.command))
            .collect::<Vec<_>>()
            .join("\n");
        format!("\nCOMMANDS THAT WORKED BEFORE ON THIS MACHINE:\n{}\n", lines)
    };

    format!(
        r#"You are a Unix command line expert. Turn the user's request into shell commands.

RULES:
1. Use common, portable commands.
2. Prefer the fewest commands that do the job.
3. Never produce destructive commands against / or the home directory.
4. If the request cannot be done safely, return an empty commands array.
{examples}
Current directory: {cwd}

REQUEST: {request}

Respond with ONLY this JSON, no other text:
{{"intent": "short description", "commands": [{{"command": "the command", "description": "what it does", "type": "category"}}], "confidence": 0.0}}"#,
        examples = examples,
        cwd = cwd,
        request = request
    )
}

/// Pulls the outermost JSON object out of a model reply and checks its shape.
pub fn parse_ai_response(response: &str) -> Result<Interpretation, AiError> {
    let response = response.trim();
    let start = response.find('{');
    let end = response.rfind('}');

    let json_str = match (start, end) {
        (Some(s), Some(e)) if e > s => &response[s..=e],
        _ => {
            return Err(AiError::Parse {
                reason: "no JSON object found".into(),
                raw: response.to_string(),
            })
        }
    };

    let plan: AiPlan = serde_json::from_str(json_str).map_err(|e| AiError::Parse {
        reason: e.to_string(),
        raw: response.to_string(),
    })?;

    let confidence = plan
        .confidence
        .filter(|c| c.is_finite())
        .unwrap_or(DEFAULT_AI_CONFIDENCE)
        .clamp(0.0, 1.0);

    Ok(Interpretation {
        intent: plan.intent,
        commands: plan
            .commands
            .into_iter()
            .filter(|c| !c.command.trim().is_empty())
            .collect(),
        confidence,
        outcome: InterpretationOutcome::AiInterpretation,
    })
}
