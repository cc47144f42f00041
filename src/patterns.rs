use crate::types::{Command, Interpretation, InterpretationOutcome};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const PATTERN_CONFIDENCE: f32 = 0.9;

type Builder = fn(&Captures) -> Option<(String, Vec<Command>)>;

pub struct PatternRule {
    pub name: &'static str,
    detect: Regex,
    build: Builder,
}

static PACKAGE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9.+_-]*$").expect("valid package name"));

static SPLIT_TARGETS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*,\s*(?:and\s+)?|\s+and\s+|\s+&\s+").expect("valid target separator")
});

fn rule(name: &'static str, pattern: &str, build: Builder) -> PatternRule {
    PatternRule {
        name,
        detect: Regex::new(pattern).expect("valid pattern rule"),
        build,
    }
}

fn build_install(caps: &Captures) -> Option<(String, Vec<Command>)> {
    let targets: Vec<String> = SPLIT_TARGETS
        .split(caps.get(1)?.as_str())
        .map(|t| t.trim().trim_start_matches("the ").trim())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();
    // Anything that is not a bare package name goes to the model instead.
    if targets.is_empty() || !targets.iter().all(|t| PACKAGE_NAME.is_match(t)) {
        return None;
    }
    let commands = targets
        .iter()
        .map(|name| {
            Command::new(
                format!("sudo apt-get install -y {}", name),
                format!("Install {}", name),
                "package_install",
            )
        })
        .collect();
    Some((format!("Install {}", targets.join(", ")), commands))
}

fn build_create_folder(caps: &Captures) -> Option<(String, Vec<Command>)> {
    let name = caps.get(1)?.as_str();
    Some((
        format!("Create folder {}", name),
        vec![Command::new(
            format!("mkdir -p {}", name),
            format!("Create folder {}", name),
            "directory_create",
        )],
    ))
}

fn build_list_files(_caps: &Captures) -> Option<(String, Vec<Command>)> {
    Some((
        "List files in the current directory".to_string(),
        vec![Command::new(
            "ls -la",
            "List directory contents in long form",
            "file_list",
        )],
    ))
}

fn build_update_system(_caps: &Captures) -> Option<(String, Vec<Command>)> {
    Some((
        "Update system packages".to_string(),
        vec![Command::new(
            "sudo apt-get update && sudo apt-get upgrade -y",
            "Refresh package lists and upgrade installed packages",
            "system_update",
        )],
    ))
}

/// Ordered phrase rules. The first rule whose regex matches and whose
/// builder produces commands wins.
pub struct PatternMatcher {
    rules: Vec<PatternRule>,
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternMatcher {
    pub fn new() -> Self {
        Self {
            rules: vec![
                rule(
                    "install",
                    r"(?i)^\s*(?:please\s+)?(?:can you\s+)?install\s+(.+?)[\s.!]*$",
                    build_install,
                ),
                rule(
                    "create_folder",
                    r"(?i)\b(?:create|make)\s+(?:a\s+)?(?:new\s+)?(?:folder|directory|dir)\s+(?:called\s+|named\s+)?([\w.\-/~]+)",
                    build_create_folder,
                ),
                rule(
                    "list_files",
                    r"(?i)\b(?:list|show|display)(?:\s+me)?(?:\s+(?:all|the|my))*\s+(?:files|contents)\b",
                    build_list_files,
                ),
                rule(
                    "update_system",
                    r"(?i)\b(?:update|upgrade)\b.*\b(?:system|packages)\b",
                    build_update_system,
                ),
            ],
        }
    }

    pub fn match_text(&self, text: &str) -> Option<Interpretation> {
        self.rules.iter().find_map(|rule| {
            let caps = rule.detect.captures(text)?;
            let (intent, commands) = (rule.build)(&caps)?;
            tracing::debug!(rule = rule.name, "pattern matched");
            Some(Interpretation {
                intent,
                commands,
                confidence: PATTERN_CONFIDENCE,
                outcome: InterpretationOutcome::PatternMatching,
            })
        })
    }
}
